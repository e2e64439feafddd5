use crate::config::ClientConfig;
use crate::input::{self, InputField, SubmitOutcome};
use crate::message::Message;
use crate::store::{AppendOutcome, MessageStore};
use crate::transport::websocket::ChatConnection;
use crate::transport::{ConnectionError, ConnectionEvent, ConnectionState, Outbound};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Work the session hands to the view once the current render pass is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    ScrollToEnd,
}

/// The display container the history is shown in.
pub trait ChatView {
    /// Move to the newest message. Must be a no-op when nothing is mounted.
    fn scroll_to_end(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Opened,
    Appended(AppendOutcome),
    /// The frame was not valid json and was dropped.
    Dropped,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// One page-load worth of chat: the connection handle, the history and the
/// input line. Nothing here is global; everything runs on the caller's task.
pub struct ChatSession<O: Outbound = ChatConnection> {
    url: String,
    connection: Option<O>,
    closed: bool,
    close_code: Option<u16>,
    store: MessageStore,
    input: InputField,
    deferred: VecDeque<ViewAction>,
    dropped_frames: u64,
    notice: Option<Notice>,
}

impl<O: Outbound> ChatSession<O> {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.endpoint.url().to_string(),
            connection: None,
            closed: false,
            close_code: None,
            store: MessageStore::new(config.retention),
            input: InputField::new(config.max_input_chars),
            deferred: VecDeque::new(),
            dropped_frames: 0,
            notice: None,
        }
    }

    pub fn attach(&mut self, connection: O) {
        self.connection = Some(connection);
        self.closed = false;
        self.close_code = None;
    }

    pub fn connection(&self) -> Option<&O> {
        self.connection.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.closed {
            return ConnectionState::Closed;
        }
        self.connection
            .as_ref()
            .map(Outbound::state)
            .unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn input(&self) -> &InputField {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputField {
        &mut self.input
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn pending_view_actions(&self) -> usize {
        self.deferred.len()
    }

    pub fn handle_event(&mut self, event: ConnectionEvent) -> EventOutcome {
        match event {
            ConnectionEvent::Opened { url } => {
                info!(target: "webchat::session", "connected to {url}");
                self.url = url;
                self.notice = None;
                EventOutcome::Opened
            }
            ConnectionEvent::Frame(text) => self.handle_frame(&text),
            ConnectionEvent::Closed { code } => {
                info!(target: "webchat::session", "connection closed ({code})");
                self.closed = true;
                self.close_code = Some(code);
                self.notice = Some(Notice::info(format!("connection closed ({code})")));
                EventOutcome::Closed
            }
        }
    }

    fn handle_frame(&mut self, text: &str) -> EventOutcome {
        match Message::decode(text) {
            Ok(message) => {
                let outcome = self.store.append(message);
                self.deferred.push_back(ViewAction::ScrollToEnd);
                EventOutcome::Appended(outcome)
            }
            Err(err) => {
                self.dropped_frames += 1;
                warn!(
                    target: "webchat::session",
                    error = %err,
                    bytes = text.len(),
                    "dropping malformed frame"
                );
                EventOutcome::Dropped
            }
        }
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        let connection = if self.closed {
            None
        } else {
            self.connection.as_ref()
        };
        let outcome = input::submit(&mut self.input, connection);
        match outcome {
            SubmitOutcome::Sent => self.notice = None,
            SubmitOutcome::NotConnected => {
                self.notice = Some(Notice::error("not connected - message not sent"));
            }
            SubmitOutcome::Empty => {}
        }
        outcome
    }

    pub fn record_connect_failure(&mut self, err: &ConnectionError) {
        warn!(target: "webchat::session", error = %err, "could not open chat connection");
        self.notice = Some(Notice::error(err.to_string()));
    }

    /// Run the actions queued since the last render. `None` means no
    /// container is on screen; the actions are consumed without effect.
    pub fn after_render<V: ChatView + ?Sized>(&mut self, mut view: Option<&mut V>) -> usize {
        let mut ran = 0;
        while let Some(action) = self.deferred.pop_front() {
            match action {
                ViewAction::ScrollToEnd => {
                    if let Some(view) = view.as_deref_mut() {
                        view.scroll_to_end();
                    }
                }
            }
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;
    use crate::config::RetentionMode;
    use crate::transport::mock::MockOutbound;
    use serde_json::json;

    #[derive(Default)]
    struct CountingView {
        scrolls: usize,
    }

    impl ChatView for CountingView {
        fn scroll_to_end(&mut self) {
            self.scrolls += 1;
        }
    }

    fn session(mode: RetentionMode) -> ChatSession<MockOutbound> {
        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .retention(mode)
            .build()
            .unwrap();
        let mut session = ChatSession::new(&config);
        session.attach(MockOutbound::open());
        session
    }

    fn frame(text: &str) -> ConnectionEvent {
        ConnectionEvent::Frame(text.to_string())
    }

    #[test]
    fn frames_land_in_arrival_order() {
        let mut session = session(RetentionMode::Soft);
        session.handle_event(frame(r#"{"user":"a","text":"hi"}"#));
        session.handle_event(frame(r#"{"user":"b","text":"yo"}"#));
        assert_eq!(
            session.store().messages(),
            vec![
                Message::from(json!({"user": "a", "text": "hi"})),
                Message::from(json!({"user": "b", "text": "yo"})),
            ]
        );
    }

    #[test]
    fn hard_cap_keeps_last_twenty_frames() {
        let mut session = session(RetentionMode::Hard);
        for i in 0..25 {
            session.handle_event(frame(&format!(r#"{{"n":{i}}}"#)));
        }
        let kept: Vec<u64> = session
            .store()
            .iter()
            .map(|message| message.value()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(kept, (5..25).collect::<Vec<_>>());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut session = session(RetentionMode::Soft);
        session.handle_event(frame(r#"{"n":1}"#));
        let outcome = session.handle_event(frame("not json"));
        assert_eq!(outcome, EventOutcome::Dropped);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.dropped_frames(), 1);
        assert_eq!(session.pending_view_actions(), 1);
        assert_eq!(session.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn scroll_runs_once_per_append_after_render() {
        let mut session = session(RetentionMode::Soft);
        let mut view = CountingView::default();
        session.handle_event(frame(r#"{"n":1}"#));
        session.handle_event(frame(r#"{"n":2}"#));
        session.handle_event(frame("{"));
        assert_eq!(view.scrolls, 0);

        assert_eq!(session.after_render(Some(&mut view)), 2);
        assert_eq!(view.scrolls, 2);
        assert_eq!(session.after_render(Some(&mut view)), 0);
        assert_eq!(view.scrolls, 2);
    }

    #[test]
    fn missing_view_consumes_actions() {
        let mut session = session(RetentionMode::Soft);
        session.handle_event(frame(r#"{"n":1}"#));
        assert_eq!(session.after_render::<CountingView>(None), 1);
        assert_eq!(session.pending_view_actions(), 0);
    }

    #[test]
    fn submit_goes_through_connection() {
        let mut session = session(RetentionMode::Soft);
        session.input_mut().set_value("hello");
        assert_eq!(session.submit(), SubmitOutcome::Sent);
        assert_eq!(
            session.connection().unwrap().sent(),
            vec!["hello".to_string()]
        );
        assert_eq!(session.input().value(), "");
    }

    #[test]
    fn empty_submit_leaves_everything() {
        let mut session = session(RetentionMode::Soft);
        session.handle_event(frame(r#"{"n":1}"#));
        assert_eq!(session.submit(), SubmitOutcome::Empty);
        assert!(session.connection().unwrap().sent().is_empty());
        assert_eq!(session.store().len(), 1);
        assert!(session.notice().is_none());
    }

    #[test]
    fn failed_send_keeps_typed_text() {
        let mut session = session(RetentionMode::Soft);
        session.connection().unwrap().fail_sends(true);
        session.input_mut().set_value("important");
        assert_eq!(session.submit(), SubmitOutcome::NotConnected);
        assert_eq!(session.input().value(), "important");
        assert_eq!(session.notice().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn close_is_terminal() {
        let mut session = session(RetentionMode::Soft);
        session.handle_event(ConnectionEvent::Opened {
            url: "ws://chat.example.com/chat/".into(),
        });
        assert_eq!(
            session.handle_event(ConnectionEvent::Closed { code: 1000 }),
            EventOutcome::Closed
        );
        assert_eq!(session.connection_state(), ConnectionState::Closed);
        assert_eq!(session.close_code(), Some(1000));

        session.input_mut().set_value("anyone?");
        assert_eq!(session.submit(), SubmitOutcome::NotConnected);
        assert!(session.connection().unwrap().sent().is_empty());
        assert_eq!(session.input().value(), "anyone?");
        assert_eq!(session.notice().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn never_connected_session_reports_not_connected() {
        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .build()
            .unwrap();
        let mut session: ChatSession<MockOutbound> = ChatSession::new(&config);
        assert_eq!(session.connection_state(), ConnectionState::Uninitialized);
        session.input_mut().set_value("hello");
        assert_eq!(session.submit(), SubmitOutcome::NotConnected);
    }
}

use crate::client::chat_renderer::ChatRenderer;
use crate::session::{ChatSession, EventOutcome};
use crate::store::StoreRevision;
use crate::transport::websocket::{ChatConnection, ConnectionEvents};
use crate::transport::Outbound;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc::error::TryRecvError, watch};
use tracing::{debug, trace};

const LOOP_TICK: Duration = Duration::from_millis(25);
const SCROLL_LINES: isize = 1;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("terminal setup failed: {0}")]
    Setup(io::Error),
    #[error("terminal io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Continue,
    Quit,
}

/// Interactive chat screen. Keyboard input, socket events, rendering and the
/// deferred view actions all run on the one task that drives [`run`].
///
/// [`run`]: TerminalClient::run
pub struct TerminalClient<O: Outbound = ChatConnection> {
    session: ChatSession<O>,
    events: Option<ConnectionEvents>,
    revisions: watch::Receiver<StoreRevision>,
    renderer: ChatRenderer,
    tui: Option<Terminal<CrosstermBackend<io::Stdout>>>,
}

impl<O: Outbound> TerminalClient<O> {
    pub fn new(session: ChatSession<O>, events: Option<ConnectionEvents>) -> Self {
        let revisions = session.store().subscribe();
        Self {
            session,
            events,
            revisions,
            renderer: ChatRenderer::new(),
            tui: None,
        }
    }

    pub fn session(&self) -> &ChatSession<O> {
        &self.session
    }

    pub fn renderer(&self) -> &ChatRenderer {
        &self.renderer
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        self.setup_tui()?;
        debug!(target: "webchat::client", "client loop started");

        let run_result = self.run_loop().await;

        let teardown_result = self.teardown_tui();
        debug!(target: "webchat::client", "client loop stopped");

        match (run_result, teardown_result) {
            (Err(err), _) => Err(err),
            (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn run_loop(&mut self) -> Result<(), ClientError> {
        loop {
            if self.pump_input()? == KeyDisposition::Quit {
                return Ok(());
            }
            self.pump_connection_events();
            self.maybe_render()?;
            tokio::time::sleep(LOOP_TICK).await;
        }
    }

    fn pump_input(&mut self) -> Result<KeyDisposition, ClientError> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) => {
                    if self.handle_key(key) == KeyDisposition::Quit {
                        return Ok(KeyDisposition::Quit);
                    }
                }
                Event::Paste(data) => {
                    self.session.input_mut().insert_str(&data);
                    self.renderer.mark_dirty();
                }
                Event::Resize(..) => self.renderer.mark_dirty(),
                _ => {}
            }
        }
        Ok(KeyDisposition::Continue)
    }

    /// Drain whatever the socket has delivered since the last tick, in order.
    pub fn pump_connection_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        let mut disconnected = false;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    let outcome = self.session.handle_event(event);
                    trace!(target: "webchat::client", ?outcome, "connection event handled");
                    if !matches!(outcome, EventOutcome::Appended(_)) {
                        self.renderer.mark_dirty();
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.events = None;
        }
        if self.revisions.has_changed().unwrap_or(false) {
            self.revisions.borrow_and_update();
            self.renderer.mark_dirty();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyDisposition {
        if key.kind == KeyEventKind::Release {
            return KeyDisposition::Continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return KeyDisposition::Quit,
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => return KeyDisposition::Quit,
            KeyCode::Enter => {
                let outcome = self.session.submit();
                debug!(target: "webchat::client", ?outcome, "submit");
            }
            KeyCode::Tab => {
                let input = self.session.input_mut();
                if input.is_focused() {
                    input.blur();
                } else {
                    input.focus();
                }
            }
            KeyCode::PageUp => self.renderer.page_up(),
            KeyCode::PageDown => self.renderer.page_down(),
            KeyCode::Up => self.renderer.scroll_by(-SCROLL_LINES),
            KeyCode::Down => self.renderer.scroll_by(SCROLL_LINES),
            _ if self.session.input().is_focused() => self.handle_edit_key(key, ctrl),
            _ => {}
        }
        self.renderer.mark_dirty();
        KeyDisposition::Continue
    }

    fn handle_edit_key(&mut self, key: KeyEvent, ctrl: bool) {
        let input = self.session.input_mut();
        match key.code {
            KeyCode::Char('a') if ctrl => input.move_home(),
            KeyCode::Char('e') if ctrl => input.move_end(),
            KeyCode::Char('u') if ctrl => input.clear(),
            KeyCode::Char(ch) if !ctrl => {
                input.insert(ch);
            }
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Left => input.move_left(),
            KeyCode::Right => input.move_right(),
            KeyCode::Home => input.move_home(),
            KeyCode::End => input.move_end(),
            _ => {}
        }
    }

    fn maybe_render(&mut self) -> Result<(), ClientError> {
        if !self.renderer.take_dirty() {
            return Ok(());
        }
        self.draw()?;
        // Scroll requests measure the freshly rendered history.
        if self.session.after_render(Some(&mut self.renderer)) > 0 && self.renderer.take_dirty() {
            self.draw()?;
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<(), ClientError> {
        let Some(tui) = self.tui.as_mut() else {
            return Ok(());
        };
        let renderer = &mut self.renderer;
        let session = &self.session;
        tui.draw(|frame| renderer.render_frame(frame, session))?;
        Ok(())
    }

    fn setup_tui(&mut self) -> Result<(), ClientError> {
        enable_raw_mode().map_err(ClientError::Setup)?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableBracketedPaste).map_err(ClientError::Setup)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(ClientError::Setup)?;
        self.tui = Some(terminal);
        self.renderer.mark_dirty();
        Ok(())
    }

    fn teardown_tui(&mut self) -> Result<(), ClientError> {
        if let Some(mut terminal) = self.tui.take() {
            terminal.show_cursor().ok();
            terminal.clear()?;
        }
        disable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, DisableBracketedPaste, LeaveAlternateScreen)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;
    use crate::transport::mock::MockOutbound;
    use crate::transport::{ConnectionEvent, ConnectionState};
    use tokio::sync::mpsc;

    fn client() -> (
        TerminalClient<MockOutbound>,
        MockOutbound,
        mpsc::UnboundedSender<ConnectionEvent>,
    ) {
        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .build()
            .unwrap();
        let outbound = MockOutbound::open();
        let mut session = ChatSession::new(&config);
        session.attach(outbound.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        (TerminalClient::new(session, Some(rx)), outbound, tx)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(client: &mut TerminalClient<MockOutbound>, text: &str) {
        for ch in text.chars() {
            client.handle_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn enter_sends_typed_line() {
        let (mut client, outbound, _tx) = client();
        type_text(&mut client, "hello");
        assert_eq!(client.handle_key(key(KeyCode::Enter)), KeyDisposition::Continue);
        assert_eq!(outbound.sent(), vec!["hello".to_string()]);
        assert_eq!(client.session().input().value(), "");
    }

    #[test]
    fn enter_on_empty_line_sends_nothing() {
        let (mut client, outbound, _tx) = client();
        client.handle_key(key(KeyCode::Enter));
        assert!(outbound.sent().is_empty());
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let (mut client, _, _tx) = client();
        assert_eq!(client.handle_key(key(KeyCode::Esc)), KeyDisposition::Quit);
        assert_eq!(
            client.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyDisposition::Quit
        );
    }

    #[test]
    fn unfocused_input_ignores_typing() {
        let (mut client, _, _tx) = client();
        client.handle_key(key(KeyCode::Tab));
        type_text(&mut client, "abc");
        assert_eq!(client.session().input().value(), "");
        client.handle_key(key(KeyCode::Tab));
        type_text(&mut client, "abc");
        assert_eq!(client.session().input().value(), "abc");
    }

    #[test]
    fn events_are_drained_in_order() {
        let (mut client, outbound, tx) = client();
        tx.send(ConnectionEvent::Opened {
            url: "ws://chat.example.com/chat/".into(),
        })
        .unwrap();
        tx.send(ConnectionEvent::Frame(r#"{"n":1}"#.into())).unwrap();
        tx.send(ConnectionEvent::Frame("garbage".into())).unwrap();
        tx.send(ConnectionEvent::Frame(r#"{"n":2}"#.into())).unwrap();
        client.pump_connection_events();

        let kept: Vec<u64> = client
            .session()
            .store()
            .iter()
            .map(|message| message.value()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(kept, vec![1, 2]);

        outbound.set_state(ConnectionState::Closed);
        tx.send(ConnectionEvent::Closed { code: 1000 }).unwrap();
        drop(tx);
        client.pump_connection_events();
        assert_eq!(client.session().connection_state(), ConnectionState::Closed);
        assert!(client.events.is_none());
    }
}

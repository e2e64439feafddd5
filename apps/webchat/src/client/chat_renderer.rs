use crate::message::{Message, Priority};
use crate::session::{ChatSession, ChatView, NoticeKind};
use crate::transport::{ConnectionState, Outbound};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

const INSTRUCTIONS: &str = "Enter send • Tab focus • PgUp/PgDn scroll • Esc quit";

#[derive(Debug, Clone, PartialEq, Eq)]
struct HistoryRow {
    text: String,
    sender_chars: usize,
    priority: Priority,
}

/// Scrollable history container plus the input and status lines beneath it.
#[derive(Debug, Default)]
pub struct ChatRenderer {
    rows: Vec<HistoryRow>,
    viewport_height: usize,
    scroll_top: usize,
    history_area: Option<Rect>,
    needs_redraw: bool,
}

impl ChatRenderer {
    pub fn new() -> Self {
        Self {
            needs_redraw: true,
            ..Self::default()
        }
    }

    pub fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        let was_dirty = self.needs_redraw;
        self.needs_redraw = false;
        was_dirty
    }

    /// Whether the history container was laid out by the last render.
    pub fn is_mounted(&self) -> bool {
        self.history_area.is_some()
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn content_height(&self) -> usize {
        self.rows.len()
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    fn max_scroll(&self) -> usize {
        self.rows.len().saturating_sub(self.viewport_height)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let next = if delta.is_negative() {
            self.scroll_top.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_top.saturating_add(delta as usize)
        };
        let clamped = next.min(self.max_scroll());
        if clamped != self.scroll_top {
            self.scroll_top = clamped;
            self.needs_redraw = true;
        }
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(self.viewport_height.max(1) as isize));
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.viewport_height.max(1) as isize);
    }

    /// Text of the rows currently inside the viewport.
    pub fn visible_lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .skip(self.scroll_top)
            .take(self.viewport_height)
            .map(|row| row.text.clone())
            .collect()
    }

    pub fn render_frame<O: Outbound>(&mut self, frame: &mut Frame<'_>, session: &ChatSession<O>) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        let history_block = Block::default().borders(Borders::ALL).title(" webchat ");
        let inner = history_block.inner(chunks[0]);
        self.layout_history(session, inner);
        frame.render_widget(history_block, chunks[0]);
        if self.is_mounted() {
            frame.render_widget(self.render_history(), inner);
        }

        self.render_input(frame, session, chunks[1]);
        frame.render_widget(self.render_status_line(session), chunks[2]);
        self.needs_redraw = false;
    }

    fn layout_history<O: Outbound>(&mut self, session: &ChatSession<O>, inner: Rect) {
        if inner.width == 0 || inner.height == 0 {
            self.history_area = None;
            self.viewport_height = 0;
            return;
        }
        let width = inner.width as usize;
        self.rows = session
            .store()
            .iter()
            .flat_map(|message| history_rows(message, width))
            .collect();
        self.viewport_height = inner.height as usize;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
        self.history_area = Some(inner);
    }

    fn render_history(&self) -> Paragraph<'static> {
        let lines: Vec<Line<'static>> = self
            .rows
            .iter()
            .skip(self.scroll_top)
            .take(self.viewport_height)
            .map(render_row)
            .collect();
        Paragraph::new(lines)
    }

    fn render_input<O: Outbound>(&self, frame: &mut Frame<'_>, session: &ChatSession<O>, area: Rect) {
        let input = session.input();
        let title = match input.max_chars() {
            Some(limit) => format!(" message {}/{} ", input.char_count(), limit),
            None => " message ".to_string(),
        };
        let border_style = if input.is_focused() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(area);
        let width = inner.width as usize;
        // Keep the cursor inside the box by sliding the visible window.
        let offset = if width == 0 {
            0
        } else {
            input.cursor().saturating_sub(width - 1)
        };
        let visible: String = input.value().chars().skip(offset).take(width).collect();
        frame.render_widget(Paragraph::new(visible).block(block), area);

        if input.is_focused() && width > 0 && inner.height > 0 {
            let x = inner.x + (input.cursor() - offset) as u16;
            frame.set_cursor_position((x, inner.y));
        }
    }

    fn render_status_line<O: Outbound>(&self, session: &ChatSession<O>) -> Paragraph<'static> {
        let indicator = match session.connection_state() {
            ConnectionState::Open => {
                Span::styled("● connected", Style::default().fg(Color::Green))
            }
            ConnectionState::Uninitialized => {
                Span::styled("○ not connected", Style::default().fg(Color::Yellow))
            }
            // The socket task flips the state before its close event is drained.
            ConnectionState::Closed => {
                let label = match session.close_code() {
                    Some(code) => format!("✕ closed ({code})"),
                    None => "✕ closed".to_string(),
                };
                Span::styled(label, Style::default().fg(Color::Red))
            }
        };
        let mut spans = vec![indicator, Span::raw(format!("  {}", session.url()))];
        if let Some(notice) = session.notice() {
            let style = match notice.kind {
                NoticeKind::Error => Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
                NoticeKind::Info => Style::default(),
            };
            spans.push(Span::styled(format!(" • {}", notice.text), style));
        }
        spans.push(Span::styled(
            format!(" • {INSTRUCTIONS}"),
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(Line::from(spans)).block(Block::default())
    }
}

impl ChatView for ChatRenderer {
    fn scroll_to_end(&mut self) {
        if !self.is_mounted() {
            return;
        }
        let bottom = self.max_scroll();
        if self.scroll_top != bottom {
            self.scroll_top = bottom;
            self.needs_redraw = true;
        }
    }
}

fn history_rows(message: &Message, width: usize) -> Vec<HistoryRow> {
    let line = message.chat_line();
    let (text, sender_chars) = match (line.sender, line.body()) {
        (Some(sender), Some(body)) => (format!("{sender}: {body}"), sender.chars().count() + 1),
        (None, Some(body)) => (body, 0),
        _ => (message.to_string(), 0),
    };
    wrap_chars(&text, width)
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            let prefix = if index == 0 {
                sender_chars.min(text.chars().count())
            } else {
                0
            };
            HistoryRow {
                text,
                sender_chars: prefix,
                priority: line.priority,
            }
        })
        .collect()
}

fn render_row(row: &HistoryRow) -> Line<'static> {
    let base = match row.priority {
        Priority::Muted => Style::default().fg(Color::DarkGray),
        Priority::Primary => Style::default().add_modifier(Modifier::BOLD),
        Priority::Normal => Style::default(),
    };
    if row.sender_chars == 0 {
        return Line::from(Span::styled(row.text.clone(), base));
    }
    let split = row
        .text
        .char_indices()
        .nth(row.sender_chars)
        .map(|(index, _)| index)
        .unwrap_or(row.text.len());
    let (sender, rest) = row.text.split_at(split);
    let sender_style = if row.priority == Priority::Muted {
        base
    } else {
        base.fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    Line::from(vec![
        Span::styled(sender.to_string(), sender_style),
        Span::styled(rest.to_string(), base),
    ])
}

/// Hard-wraps on char count; embedded newlines start a new row.
fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for segment in text.split('\n') {
        let chars: Vec<char> = segment.chars().filter(|ch| *ch != '\r').collect();
        if chars.is_empty() {
            rows.push(String::new());
            continue;
        }
        rows.extend(chars.chunks(width).map(|chunk| chunk.iter().collect::<String>()));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfigBuilder;
    use crate::transport::ConnectionEvent;
    use crate::transport::mock::MockOutbound;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn session() -> ChatSession<MockOutbound> {
        let config = ClientConfigBuilder::new()
            .server("http://chat.example.com")
            .build()
            .unwrap();
        let mut session = ChatSession::new(&config);
        session.attach(MockOutbound::open());
        session
    }

    fn push(session: &mut ChatSession<MockOutbound>, sender: &str, data: &str) {
        let frame = serde_json::json!({ "sender": sender, "data": data }).to_string();
        session.handle_event(ConnectionEvent::Frame(frame));
    }

    fn draw(
        terminal: &mut Terminal<TestBackend>,
        renderer: &mut ChatRenderer,
        session: &ChatSession<MockOutbound>,
    ) {
        terminal
            .draw(|frame| renderer.render_frame(frame, session))
            .unwrap();
    }

    #[test]
    fn wraps_long_lines_and_newlines() {
        assert_eq!(wrap_chars("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_chars("ab\n\ncd", 5), vec!["ab", "", "cd"]);
        assert_eq!(wrap_chars("", 5), vec![""]);
    }

    #[test]
    fn rows_fall_back_to_json() {
        let message = Message::from(serde_json::json!({"user": "a", "text": "hi"}));
        let rows = history_rows(&message, 80);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, r#"{"text":"hi","user":"a"}"#);
        assert_eq!(rows[0].sender_chars, 0);
    }

    #[test]
    fn sender_prefix_is_split_out() {
        let message = Message::from(serde_json::json!({
            "sender": "Eager Hopper",
            "data": "hello",
            "priority": "primary",
        }));
        let rows = history_rows(&message, 80);
        assert_eq!(rows[0].text, "Eager Hopper: hello");
        assert_eq!(rows[0].sender_chars, 13);
        assert_eq!(rows[0].priority, Priority::Primary);
        let line = render_row(&rows[0]);
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "Eager Hopper:");
    }

    #[test]
    fn scroll_to_end_is_noop_before_mount() {
        let mut renderer = ChatRenderer::new();
        renderer.take_dirty();
        renderer.scroll_to_end();
        assert!(!renderer.is_mounted());
        assert_eq!(renderer.scroll_top(), 0);
        assert!(!renderer.take_dirty());
    }

    #[test]
    fn scrolls_to_newest_after_render() {
        let mut session = session();
        let mut renderer = ChatRenderer::new();
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        for i in 0..15 {
            push(&mut session, "Bot", &format!("line {i}"));
        }

        draw(&mut terminal, &mut renderer, &session);
        // 12 rows minus borders, input box and status line.
        assert_eq!(renderer.viewport_height(), 6);
        assert_eq!(renderer.content_height(), 15);
        assert_eq!(renderer.scroll_top(), 0);

        assert_eq!(session.after_render(Some(&mut renderer)), 15);
        assert_eq!(renderer.scroll_top(), 9);
        assert!(renderer.take_dirty());

        draw(&mut terminal, &mut renderer, &session);
        let visible = renderer.visible_lines();
        assert_eq!(visible.first().map(String::as_str), Some("Bot: line 9"));
        assert_eq!(visible.last().map(String::as_str), Some("Bot: line 14"));
    }

    #[test]
    fn manual_scroll_is_clamped() {
        let mut session = session();
        let mut renderer = ChatRenderer::new();
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        for i in 0..10 {
            push(&mut session, "Bot", &format!("line {i}"));
        }
        draw(&mut terminal, &mut renderer, &session);
        renderer.page_down();
        renderer.page_down();
        assert_eq!(renderer.scroll_top(), 4);
        renderer.scroll_by(-100);
        assert_eq!(renderer.scroll_top(), 0);
    }

    #[test]
    fn status_line_shows_connection_state() {
        let mut session = session();
        let mut renderer = ChatRenderer::new();
        let mut terminal = Terminal::new(TestBackend::new(120, 8)).unwrap();
        session.handle_event(ConnectionEvent::Closed { code: 1001 });
        draw(&mut terminal, &mut renderer, &session);

        let last_row = status_row(&terminal);
        assert!(last_row.contains("closed (1001)"));
        assert!(last_row.contains("ws://chat.example.com/chat/"));
    }

    #[test]
    fn closed_socket_before_close_event_has_no_code() {
        let session = session();
        session
            .connection()
            .unwrap()
            .set_state(ConnectionState::Closed);
        let mut renderer = ChatRenderer::new();
        let mut terminal = Terminal::new(TestBackend::new(120, 8)).unwrap();
        draw(&mut terminal, &mut renderer, &session);

        let last_row = status_row(&terminal);
        assert!(last_row.contains("✕ closed  ws://"));
    }

    fn status_row(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        (0..buffer.area.width)
            .map(|x| buffer[(x, buffer.area.height - 1)].symbol().to_string())
            .collect()
    }
}

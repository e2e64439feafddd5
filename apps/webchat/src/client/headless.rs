use crate::client::terminal::ClientError;
use crate::input::SubmitOutcome;
use crate::session::{ChatSession, ChatView, EventOutcome};
use crate::transport::Outbound;
use crate::transport::websocket::ConnectionEvents;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Line-oriented session without a terminal UI: every stored message is
/// written to `output` as one json line and every `input` line is submitted.
/// Ends when the connection closes or `input` reaches EOF.
pub async fn run<O, R, W>(
    mut session: ChatSession<O>,
    mut events: ConnectionEvents,
    input: R,
    mut output: W,
) -> Result<ChatSession<O>, ClientError>
where
    O: Outbound,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                let Some(event) = event else {
                    debug!(target: "webchat::headless", "connection event stream ended");
                    break;
                };
                match session.handle_event(event) {
                    EventOutcome::Appended(_) => {
                        if let Some(message) = session.store().iter().next_back() {
                            let mut line = message.to_string();
                            line.push('\n');
                            output.write_all(line.as_bytes()).await?;
                            output.flush().await?;
                        }
                    }
                    EventOutcome::Closed => break,
                    EventOutcome::Opened | EventOutcome::Dropped => {}
                }
                // No container on screen: scroll requests are consumed as no-ops.
                session.after_render::<dyn ChatView>(None);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(target: "webchat::headless", "input reached eof");
                    break;
                };
                if !session.input().fits(&line) {
                    warn!(
                        target: "webchat::headless",
                        chars = line.chars().count(),
                        limit = session.input().max_chars(),
                        "input dropped: over the character limit"
                    );
                    continue;
                }
                session.input_mut().set_value(line);
                if session.submit() == SubmitOutcome::NotConnected {
                    warn!(target: "webchat::headless", "input dropped: not connected");
                    session.input_mut().clear();
                }
            }
        }
    }
    Ok(session)
}

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use super::{
    ABNORMAL_CLOSURE, ConnectionError, ConnectionEvent, ConnectionState, NO_STATUS_RECEIVED,
    Outbound,
};

pub mod config;
use config::ChatEndpoint;

/// Receiving half of a chat connection; yields events in the order the socket
/// produced them.
pub type ConnectionEvents = mpsc::UnboundedReceiver<ConnectionEvent>;

/// The one WebSocket of a chat session. There is no reconnect: once the
/// socket ends the handle stays closed and every send is refused.
pub struct ChatConnection {
    url: String,
    outbound: mpsc::UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    ws_task: Option<tokio::task::JoinHandle<()>>,
}

impl ChatConnection {
    pub async fn connect(
        endpoint: &ChatEndpoint,
    ) -> Result<(Self, ConnectionEvents), ConnectionError> {
        let url = endpoint.url().to_string();
        debug!(target: "webchat::transport", url = %url, "opening chat socket");
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|source| ConnectionError::Connect {
                url: url.clone(),
                source: Box::new(source),
            })?;

        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<ConnectionEvent>();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);

        // Queued before the socket task starts so it always precedes any frame.
        let _ = tx_in.send(ConnectionEvent::Opened { url: url.clone() });

        let ws_task = tokio::spawn(async move {
            handle_websocket(ws_stream, rx_out, tx_in, state_tx).await;
        });

        Ok((
            Self {
                url,
                outbound: tx_out,
                state: state_rx,
                ws_task: Some(ws_task),
            },
            rx_in,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Outbound for ChatConnection {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::NotConnected);
        }
        self.outbound
            .send(text)
            .map_err(|_| ConnectionError::NotConnected)
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        if let Some(task) = self.ws_task.take() {
            task.abort();
        }
    }
}

async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            trace!(target: "webchat::transport", bytes = text.len(), "sending text frame");
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut code = ABNORMAL_CLOSURE;
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx_in.send(ConnectionEvent::Frame(text)).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if tx_in.send(ConnectionEvent::Frame(text)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        target: "webchat::transport",
                        bytes = err.as_bytes().len(),
                        "dropping binary frame that is not utf-8"
                    );
                }
            },
            Ok(Message::Close(frame)) => {
                code = frame
                    .map(|frame| u16::from(frame.code))
                    .unwrap_or(NO_STATUS_RECEIVED);
                break;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(target: "webchat::transport", error = %err, "chat socket failed");
                break;
            }
        }
    }

    state.send_replace(ConnectionState::Closed);
    let _ = tx_in.send(ConnectionEvent::Closed { code });

    send_task.abort();
    let _ = send_task.await;
}

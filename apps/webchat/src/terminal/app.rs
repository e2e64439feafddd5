use crate::client::{TerminalClient, headless};
use crate::config::ClientConfig;
use crate::session::ChatSession;
use crate::telemetry::logging;
use crate::terminal::cli::Cli;
use crate::terminal::error::CliError;
use crate::transport::websocket::ChatConnection;
use tokio::io::BufReader;
use tracing::{debug, info};

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.client_config()?;

    let log_config = if config.headless {
        cli.logging.to_config()
    } else {
        cli.logging.to_config().for_tui()
    };
    logging::init(&log_config)?;
    debug!(
        target: "webchat::app",
        url = %config.endpoint.url(),
        max = config.retention.max(),
        target_len = config.retention.target(),
        headless = config.headless,
        "starting chat client"
    );

    if config.headless {
        run_headless(&config).await
    } else {
        run_tui(&config).await
    }
}

async fn run_headless(config: &ClientConfig) -> Result<(), CliError> {
    let mut session: ChatSession = ChatSession::new(config);
    let (connection, events) = ChatConnection::connect(&config.endpoint).await?;
    session.attach(connection);
    let stdin = BufReader::new(tokio::io::stdin());
    let session = headless::run(session, events, stdin, tokio::io::stdout()).await?;
    info!(
        target: "webchat::app",
        state = %session.connection_state(),
        dropped_frames = session.dropped_frames(),
        "headless session finished"
    );
    Ok(())
}

/// The screen comes up even when the server is unreachable; the status line
/// then reports why and input is refused as not connected.
async fn run_tui(config: &ClientConfig) -> Result<(), CliError> {
    let mut session: ChatSession = ChatSession::new(config);
    let events = match ChatConnection::connect(&config.endpoint).await {
        Ok((connection, events)) => {
            session.attach(connection);
            Some(events)
        }
        Err(err) => {
            session.record_connect_failure(&err);
            None
        }
    };
    TerminalClient::new(session, events).run().await?;
    Ok(())
}

use clap::{Args, Parser};
use std::path::PathBuf;

use crate::config::{ClientConfig, ClientConfigBuilder, ConfigError, RetentionMode};
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "webchat",
    about = "💬  Terminal client for a WebSocket chat server",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("BUILD_TIMESTAMP"))
)]
pub struct Cli {
    #[arg(
        long,
        env = "WEBCHAT_SERVER",
        default_value = crate::config::DEFAULT_SERVER,
        help = "Origin of the chat server; https origins connect over wss"
    )]
    pub server: String,

    #[command(flatten)]
    pub history: HistoryArgs,

    #[arg(
        long = "max-input-chars",
        env = "WEBCHAT_MAX_INPUT_CHARS",
        value_name = "CHARS",
        help = "Longest line the input accepts (0 disables the limit)"
    )]
    pub max_input_chars: Option<usize>,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Skip the terminal UI: print messages as json lines and send stdin lines"
    )]
    pub headless: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl Cli {
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfigBuilder::new()
            .server(self.server.clone())
            .retention(self.history.retention)
            .max_messages(self.history.max_messages)
            .trim_to(self.history.trim_to)
            .max_input_chars(self.max_input_chars)
            .headless(self.headless)
            .build()
    }
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(
        long,
        value_enum,
        env = "WEBCHAT_RETENTION",
        default_value_t = RetentionMode::Soft,
        help = "How the message history is trimmed"
    )]
    pub retention: RetentionMode,

    #[arg(
        long = "max-messages",
        value_name = "COUNT",
        help = "History length that triggers trimming"
    )]
    pub max_messages: Option<usize>,

    #[arg(
        long = "trim-to",
        value_name = "COUNT",
        help = "Number of newest messages kept after trimming"
    )]
    pub trim_to: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "WEBCHAT_LOG_LEVEL",
        default_value_t = LogLevel::Info,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "WEBCHAT_LOG_FILE",
        help = "Write logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

use clap::Parser;
use webchat_client_core::terminal::{app, cli::Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = app::run(cli).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    // A headless session can end on close while stdin is still parked in a
    // blocking read; runtime shutdown would wait on it.
    std::process::exit(0);
}

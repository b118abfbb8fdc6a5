use std::path::PathBuf;

use clap::Parser;
use deskbridge::feed_server::{self, DEFAULT_DIR, DEFAULT_PORT};

/// Serve a local update feed for testing auto-update
#[derive(Parser, Debug)]
#[command(name = "update-server", version)]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding the channel manifest and artifacts
    #[arg(short, long, default_value = DEFAULT_DIR)]
    dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    feed_server::run(cli.port, cli.dir).await
}

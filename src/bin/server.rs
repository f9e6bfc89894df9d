use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::Rng as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use maze_escape_server::constants::{DEFAULT_MAZE_DIR, DEFAULT_PORT};
use maze_escape_server::link::{Acceptor, PeerLink};
use maze_escape_server::maze_store::load_mazes;
use maze_escape_server::session::Session;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Port to listen on for player connections.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding the maze definition files.
    #[arg(long, default_value = DEFAULT_MAZE_DIR)]
    maze_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mazes = load_mazes(&cli.maze_dir);
    let acceptor = Acceptor::bind(("0.0.0.0", cli.port))
        .await
        .context("failed to bind the server socket")?;
    info!(port = cli.port, mazes = mazes.len(), "listening");

    let seed = rand::rng().random::<u32>();
    let mut session = Session::new(acceptor, PeerLink::console(), mazes, seed);
    session.run().await;
    Ok(())
}

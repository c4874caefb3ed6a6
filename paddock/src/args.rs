use std::path::PathBuf;

use clap::Parser;

/// Paddock completion relay
#[derive(Debug, Parser)]
#[command(name = "paddock", about = "Side-by-side streaming relay for LLM endpoints")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "paddock.toml", env = "PADDOCK_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PADDOCK_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}

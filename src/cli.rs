use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "picbox")]
#[command(about = "Fetches the images of a post into object storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and download workers
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to, overriding the config file
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Path to the TOML config file (default: `PICBOX_CONFIG` or `config/picbox.toml`)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

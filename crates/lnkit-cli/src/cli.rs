//! CLI definition for lnkit-paydb.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and reclaim the payment store
#[derive(Parser, Debug)]
#[command(name = "lnkit-paydb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Working directory, defaults to ~/.lnkit
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Config file, defaults to <work-dir>/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Store commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every stored payment
    List,
    /// Show the stored payment for a hash
    Status {
        /// Hex encoded payment hash
        payment_hash: String,
    },
    /// List payments still in flight
    InFlight,
    /// Delete every succeeded or failed payment
    DeleteResolved,
}

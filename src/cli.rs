use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Keep a purchased audiobook library decrypted, complete and consistently
/// named in a single directory.
#[derive(Debug, Parser)]
#[command(name = "shelf", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON), merged over the defaults
    /// and the user configuration directory.
    #[arg(short, long, global = true, env = "SHELF_CONFIG")]
    pub config: Option<PathBuf>,
    /// Working directory holding sources, outputs and the catalog.
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,
    /// Catalog snapshot, relative to the working directory.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
    /// Store profile used by the download client.
    #[arg(short, long, global = true)]
    pub profile: Option<String>,
    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile every catalog entry: skip, convert, download or mark failed.
    Process,
    /// Rename existing decrypted outputs to their canonical names.
    Identify(IdentifyArgs),
    /// Write the catalog snapshot if it doesn't exist yet.
    Export,
}

#[derive(Debug, Args)]
pub struct IdentifyArgs {
    /// Ask which catalog entry an unidentified file belongs to.
    #[arg(short, long)]
    pub interactive: bool,
    /// Name files matching no catalog entry from their tags alone.
    #[arg(long)]
    pub fallback_to_tags: bool,
}

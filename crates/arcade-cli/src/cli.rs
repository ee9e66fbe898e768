use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arcade",
    about = "Host uploaded browser games as static bundles, replicated through an object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). `ARCADE_*` environment variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server, push workers and reconcile loop
    Serve,
    /// Ingest a zip archive into the local content store
    Ingest(IngestArgs),
    /// Push a local bundle to the remote store
    Push(BundleArgs),
    /// Run one reconciliation pass against the remote store
    Reconcile,
    /// Remove a bundle locally and from the remote store
    Remove(BundleArgs),
    /// List bundles in the local content store
    List,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Path to the zip archive
    pub archive: PathBuf,
    /// Skip pushing the new bundle to the remote store
    #[arg(long)]
    pub no_push: bool,
}

#[derive(Args)]
pub struct BundleArgs {
    /// Bundle id (UUID)
    pub bundle: String,
}

use clap::Parser;

/// Command-line flags for the `folio-worker` binary.
#[derive(Debug, Parser)]
#[command(name = "folio-worker", version, about = "Folio background job worker")]
pub struct Cli {
    /// Database path (overrides `database.path` from config)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Drain the queue once and exit instead of polling
    #[arg(long)]
    pub once: bool,

    /// Print the JSON Schema of a stored job or migration type and exit
    #[arg(long, value_name = "NAME")]
    pub schema: Option<String>,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long)]
    pub verbose: bool,
}

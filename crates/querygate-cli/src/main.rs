use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "querygate", version, about = "QueryGate intercepting proxy")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the intercepting proxy server.
    Serve {
        /// Path to the YAML configuration file.
        #[arg(long, short, default_value = "querygate.yaml")]
        config: PathBuf,
    },

    /// Validate a configuration file, optionally classifying a statement.
    Check {
        /// Path to the YAML configuration file.
        #[arg(long, short, default_value = "querygate.yaml")]
        config: PathBuf,

        /// Statement to classify against the configured block patterns.
        #[arg(long)]
        sql: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve { config } => commands::serve::serve(config).await,
        Command::Check { config, sql } => commands::check::check(config, sql.as_deref()),
    }
}

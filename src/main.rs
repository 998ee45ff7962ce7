//! CardioBench - Main Entry Point
//!
//! Tunes and compares tree-ensemble classifiers from the command line.

use clap::Parser;
use cardiobench::cli::{cmd_info, cmd_init_config, cmd_run, cmd_search, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with the step output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardiobench=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    cardiobench::report::configure_table_format();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args, models } => {
            cmd_run(&args, models)?;
        }
        Commands::Search { args, model } => {
            cmd_search(&args, model)?;
        }
        Commands::Info { data, head } => {
            cmd_info(data.as_deref(), head)?;
        }
        Commands::InitConfig { output } => {
            cmd_init_config(&output)?;
        }
    }

    Ok(())
}

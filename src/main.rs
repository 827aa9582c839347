use clap::Parser;
use log::{LevelFilter, error};
use shared_config::commands;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line arguments
#[derive(Parser)]
#[command(name = "shared-config")]
#[command(about = "Sync shared configuration files from a reference repository", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Repository checkout to update
    #[arg(value_name = "TARGET_DIRECTORY")]
    target: PathBuf,

    /// Repository checkout holding the main configuration
    #[arg(value_name = "REFERENCE_DIRECTORY")]
    reference: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    match commands::app::sync(&cli.target, &cli.reference) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if e.is_usage() => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initialize logging based on the verbosity level specified in the CLI
fn init_logging(cli: &Cli) {
    let mut builder = env_logger::builder();
    builder
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .format(|buf, record| {
            let level = record.level();
            let style = &buf.default_level_style(level);
            writeln!(buf, "[{style}{level}{style:#}] {}", record.args())
        });

    if !cli.verbose {
        builder.format_timestamp(None);
    }

    builder.init();
}

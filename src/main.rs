//! hresearch binary entry point.

use clap::Parser;
use hresearch::cli::{Cli, execute};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let output = execute(&cli)?;

    #[allow(clippy::print_stdout)]
    {
        print!("{output}");
    }

    Ok(())
}

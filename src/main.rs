use anyhow::Result;
use clap::Parser;
use layer_mem_profiler::cli::Cli;
use tracing_subscriber::filter::{Directive, LevelFilter};

fn main() -> Result<()> {
    let default_directive: Directive = "layer_mem_profiler=info"
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_directive),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}

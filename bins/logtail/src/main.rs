mod config;
mod error;
mod render;

use clap::Parser;
use config::{Cli, Commands};

mod cmd;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url.as_deref();
    let result = match cli.command {
        Commands::Tail(args) => cmd::tail::run(&cli.config, base_url, args).await,
        Commands::Query(args) => cmd::query::run(&cli.config, base_url, args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

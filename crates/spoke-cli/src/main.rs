//! CLI entry point.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use spoke_cli::handlers::say::SayArgs;
use spoke_cli::handlers::{say, serve};
use spoke_cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "spoke=info,spoke_cli=info,spoke_voice=info,spoke_axum=info";
const VERBOSE_LOG_FILTER: &str =
    "spoke=debug,spoke_cli=debug,spoke_voice=debug,spoke_axum=debug,tower_http=debug";

fn init_logging(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            host,
            port,
            queue_capacity,
            allowed_origins,
        } => {
            let pipeline = cli.pipeline.config(queue_capacity);
            let server = serve::server_config(host, port, allowed_origins);
            serve::execute(pipeline, server).await?;
        }
        Commands::Say {
            text,
            voice,
            speed,
            timeout,
        } => {
            let pipeline = cli.pipeline.config(spoke_voice::DEFAULT_QUEUE_CAPACITY);
            let args = SayArgs {
                text,
                voice,
                speed,
                timeout: Duration::from_secs(timeout),
            };
            tokio::task::spawn_blocking(move || say::execute(pipeline, args)).await??;
        }
    }

    Ok(())
}

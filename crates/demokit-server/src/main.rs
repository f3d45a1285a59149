use anyhow::Context;
use clap::Parser;
use demokit_server::{check, resolve, telemetry, Cli, Command, DemoServer, ResolveOutcome, ResolveRequest};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("loading configuration")?;
    telemetry::init(&config.log_filter, config.log_format)?;

    match cli.command {
        Command::Serve { listen } => {
            let addr = listen.unwrap_or(config.listen);
            let server = Arc::new(DemoServer::from_config(&config).context("starting demo server")?);
            server.serve(addr, shutdown_signal()).await?;
        }
        Command::Check => {
            let report = check(&config).context("checking fixtures")?;
            print!("{report}");
        }
        Command::Resolve {
            key,
            args,
            scenario,
            mutation,
        } => {
            let request = ResolveRequest {
                key,
                args,
                scenario,
                mutation,
            };
            let outcome = resolve(&config, &request).context("resolving fixture")?;
            println!("{outcome}");
            if outcome == ResolveOutcome::Missing {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}

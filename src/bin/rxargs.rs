use anyhow::Result;
use clap::Parser;
use rxargs::cli::app::usage;
use rxargs::cli::{exit_code, Cli, CliError};
use tracing::{debug, error};

fn spawn_signal_listener() {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => debug!("Received SIGINT"),
                _ = sigterm.recv() => debug!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        std::process::exit(exit_code::INTERRUPTED);
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with child output
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    spawn_signal_listener();

    if let Err(e) = cli.execute().await {
        error!("Command execution failed: {:?}", e);

        if matches!(e, CliError::NoCommand) {
            eprintln!("{}", usage());
        }
        eprintln!("Error: {}", e.user_message());

        std::process::exit(e.exit_code());
    }

    Ok(())
}

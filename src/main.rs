use color_eyre::Result;
use servolink::cli::{Cli, Command};
use servolink::config::Config;
use servolink::error::LinkError;
use servolink::{host, target};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup()?;

    Ok(ExitCode::from(exit_status(run().await)))
}

/// Logs a failure once and maps it to its exit code.
fn exit_status(result: Result<(), LinkError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}

async fn run() -> Result<(), LinkError> {
    let cli = Cli::parse(std::env::args().skip(1))?;
    let config = load_config(&cli).await?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    match cli.command {
        Command::Host { joystick, address } => {
            info!("Starting host: {} -> {}", joystick, address);
            host::run(config, &joystick, &address, cancel).await
        }
        Command::Target => {
            info!("Starting target on {}", config.target.bind);
            target::run(&config, cancel).await
        }
    }
}

async fn load_config(cli: &Cli) -> Result<Config, LinkError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            let path = Config::default_path()?;
            Config::ensure_default_config(&path).await?;
            path
        }
    };
    Ok(Config::load(&path).await?)
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
        cancel.cancel();
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_their_exit_code() {
        assert_eq!(exit_status(Ok(())), 0);
        assert_eq!(exit_status(Err(LinkError::Usage("no command".into()))), 2);
    }
}

//! plugsw binary entry point
//!
//! Dispatches to daemon mode or subcommands based on CLI arguments.

use clap::Parser;
use color_eyre::eyre::Result;
use plugsw::cli::{Args, Command};
use plugsw::pulse::Role;
use plugsw::{commands, config::Config, daemon, logging};

/// CLI commands only log warnings unless `RUST_LOG` says otherwise
fn init_logging() {
    logging::init_stderr("warn");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        None => {
            init_logging();
            let config = Config::load()?;
            commands::status(&config, false).await
        }

        Some(Command::Daemon {
            foreground,
            log_file,
        }) => {
            let config = Config::load()?;
            if foreground {
                // Daemon sets up its own logging from the config
                daemon::run(config, log_file).await
            } else {
                init_logging();
                commands::start_daemon().await
            }
        }

        Some(Command::Status { json }) => {
            init_logging();
            let config = Config::load()?;
            commands::status(&config, json).await
        }

        Some(Command::ListDevices { json }) => {
            init_logging();
            let config = Config::load()?;
            commands::list_devices(&config, json).await
        }

        Some(Command::SetOutput { device }) => {
            init_logging();
            let config = Config::load()?;
            commands::select(&config, Role::Output, &device).await
        }

        Some(Command::SetInput { device }) => {
            init_logging();
            let config = Config::load()?;
            commands::select(&config, Role::Source, &device).await
        }

        Some(Command::ClearOutput) => {
            init_logging();
            let config = Config::load()?;
            commands::clear(&config, Role::Output).await
        }

        Some(Command::ClearInput) => {
            init_logging();
            let config = Config::load()?;
            commands::clear(&config, Role::Source).await
        }

        Some(Command::Monitor { state }) => {
            init_logging();
            commands::set_monitoring(state.enabled()).await
        }

        Some(Command::Refresh) => {
            init_logging();
            commands::refresh().await
        }

        Some(Command::Shutdown) => {
            init_logging();
            commands::shutdown().await
        }

        Some(Command::Validate) => {
            init_logging();
            let config = Config::load()?;
            commands::validate(&config)
        }
    }
}

//! Daemon mode
//!
//! A single event loop owns the engine. Hotplug events, IPC requests and
//! signals all land in one `select!`, so each engine operation (a full
//! reconciliation pass included) completes before the next one starts.

use color_eyre::eyre::{self, Context, Result};
use std::process::Stdio;
use std::time::Instant;
use tokio::net::UnixStream;
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::daemon_manager::DaemonManager;
use crate::engine::Engine;
use crate::hotplug::HotplugMonitor;
use crate::ipc::{self, IpcServer, Request, Response};
use crate::logging;
use crate::pulse::{AudioGateway, Pactl};
use crate::view::DaemonView;

/// A request forwarded from an IPC connection, with the slot for its answer
type Command = (Request, oneshot::Sender<Response>);

const COMMAND_QUEUE: usize = 16;

/// Run the daemon until a signal, an IPC shutdown, or loss of the event source
///
/// # Errors
/// Returns an error if logging, the preference store, the udev monitor, or the
/// IPC socket cannot be set up, and when the udev monitor exits.
pub async fn run(config: Config, log_to_file: bool) -> Result<()> {
    let _log_guard = if log_to_file {
        Some(logging::init_file(&config.settings.log_level)?)
    } else {
        logging::init_stderr(&config.settings.log_level);
        None
    };

    info!("Starting plugsw daemon v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = Pactl::validate_tool() {
        warn!("{:#}", e);
    }

    let manager = DaemonManager::detect();
    debug!("Daemon manager: {}", manager);

    let store = config.preference_store()?;
    info!("Preferences file: {:?}", store.path());

    let gateway = Pactl::new(config.command_timeout());
    let view = DaemonView::new(&config.settings);
    let mut engine = Engine::new(gateway, view, store);

    let start_time = Instant::now();
    let failures = engine.refresh().await;
    if failures > 0 {
        warn!("Initial device enumeration incomplete ({} failure(s))", failures);
    }

    let mut hotplug = HotplugMonitor::spawn(&config.settings.subsystem)?;

    let ipc_server = IpcServer::bind().await?;
    info!("IPC server listening on {:?}", ipc_server.socket_path());

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(COMMAND_QUEUE);
    let mut sigterm =
        unix_signal(SignalKind::terminate()).wrap_err("Failed to install SIGTERM handler")?;

    manager.notify_ready();
    info!("Waiting for hotplug events...");

    let stop_reason = loop {
        tokio::select! {
            event = hotplug.recv() => {
                let Some(event) = event else {
                    error!("Hotplug event source lost (udevadm exited)");
                    break StopReason::HotplugLost;
                };
                debug!("Reconciling after {} {}", event.action, event.devpath);
                let report = engine.on_hardware_event().await;
                if report.failures > 0 {
                    debug!("Pass finished with {} failure(s)", report.failures);
                }
            }

            Some(stream) = ipc_server.accept() => {
                let command_tx = command_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_client(stream, command_tx).await {
                        error!("IPC request handling error: {:#}", e);
                    }
                });
            }

            Some((request, reply)) = command_rx.recv() => {
                let uptime_secs = start_time.elapsed().as_secs();
                let (response, stop) = handle_request(&mut engine, request, uptime_secs).await;
                if reply.send(response).is_err() {
                    debug!("IPC client went away before the reply");
                }
                if stop {
                    info!("Shutdown requested via IPC");
                    break StopReason::Requested;
                }
            }

            _ = signal::ctrl_c() => {
                info!("Received SIGINT");
                break StopReason::Signal;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break StopReason::Signal;
            }
        }
    };

    manager.notify_stopping();
    drop(hotplug);
    info!("Shutting down");
    stop_reason.into_result()
}

/// Why the event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// SIGINT or SIGTERM
    Signal,
    /// IPC `Shutdown`
    Requested,
    /// `udevadm` exited; the daemon can no longer see hotplug events
    HotplugLost,
}

impl StopReason {
    /// Only a stop nobody asked for is a failure exit
    fn into_result(self) -> Result<()> {
        match self {
            Self::Signal | Self::Requested => Ok(()),
            Self::HotplugLost => Err(eyre::eyre!("Hotplug event source lost")),
        }
    }
}

/// Read one request from `stream`, hand it to the event loop, write the answer
async fn serve_client(mut stream: UnixStream, commands: mpsc::Sender<Command>) -> Result<()> {
    let request = ipc::read_request(&mut stream).await?;
    debug!("IPC request: {:?}", request);

    let (reply_tx, reply_rx) = oneshot::channel();

    // The loop exits right after handling Shutdown, so answer first
    if request == Request::Shutdown {
        ipc::write_response(
            &mut stream,
            &Response::Ok {
                message: "Daemon shutting down".to_string(),
            },
        )
        .await?;
        commands
            .send((request, reply_tx))
            .await
            .map_err(|_| eyre::eyre!("Daemon event loop has stopped"))?;
        return Ok(());
    }

    commands
        .send((request, reply_tx))
        .await
        .map_err(|_| eyre::eyre!("Daemon event loop has stopped"))?;
    let response = reply_rx.await.wrap_err("Daemon dropped the request")?;

    ipc::write_response(&mut stream, &response).await
}

/// Apply one IPC request to the engine
///
/// Returns the response and whether the daemon should stop.
pub(crate) async fn handle_request<G: AudioGateway>(
    engine: &mut Engine<G, DaemonView>,
    request: Request,
    uptime_secs: u64,
) -> (Response, bool) {
    let response = match request {
        Request::Status => {
            let snapshot = engine.presenter().snapshot();
            Response::Status {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs,
                monitoring: engine.monitoring(),
                preferred_output: snapshot.preferred_output.clone(),
                preferred_source: snapshot.preferred_source.clone(),
                passes: engine.passes(),
                switches: snapshot.switches,
                last_warning: snapshot.last_warning.clone(),
            }
        }

        Request::ListDevices => {
            let snapshot = engine.presenter().snapshot();
            Response::Devices {
                outputs: snapshot.outputs.clone(),
                sources: snapshot.sources.clone(),
            }
        }

        Request::Select { role, device } => {
            let selected = engine.presenter().snapshot().find(role, &device).cloned();
            if engine.select(role, selected.as_ref()) {
                Response::Ok {
                    message: format!(
                        "Preferred {role}: {}",
                        engine.preference(role).unwrap_or_default()
                    ),
                }
            } else {
                Response::Error {
                    message: format!(
                        "No {role} device matching '{device}'. Run 'plugsw list-devices' to see what is connected"
                    ),
                }
            }
        }

        Request::Clear { role } => {
            engine.clear_preferred(role);
            Response::Ok {
                message: format!("Preferred {role} cleared"),
            }
        }

        Request::SetMonitoring { enabled } => {
            engine.set_monitoring(enabled);
            Response::Ok {
                message: format!(
                    "Monitoring {}",
                    if enabled { "enabled" } else { "disabled" }
                ),
            }
        }

        Request::Refresh => match engine.refresh().await {
            0 => Response::Ok {
                message: "Device lists refreshed".to_string(),
            },
            failures => Response::Error {
                message: format!("Refresh incomplete: {failures} enumeration(s) failed"),
            },
        },

        Request::Shutdown => {
            return (
                Response::Ok {
                    message: "Daemon shutting down".to_string(),
                },
                true,
            );
        }
    };

    (response, false)
}

/// Start a background daemon that logs to file
///
/// Re-executes the current binary as `plugsw daemon --foreground --log-file`
/// in its own process group with stdio detached. Returns the child's PID.
///
/// # Errors
/// Returns an error if the executable cannot be located or spawned.
pub fn spawn_detached() -> Result<u32> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().wrap_err("Failed to locate the plugsw executable")?;
    let child = std::process::Command::new(&exe)
        .args(["daemon", "--foreground", "--log-file"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .wrap_err_with(|| format!("Failed to start daemon: {exe:?}"))?;

    Ok(child.id())
}

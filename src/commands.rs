//! CLI commands
//!
//! Local commands (list-devices, validate) talk to `pactl` directly. The rest
//! go through the daemon over IPC; preference edits fall back to editing the
//! preference file when no daemon is running.

use color_eyre::eyre::{self, Result};
use crossterm::style::Stylize;
use std::time::Duration;

use crate::config::Config;
use crate::daemon;
use crate::daemon_manager::DaemonManager;
use crate::ipc::{self, Request, Response};
use crate::logging;
use crate::pulse::{AudioGateway, DeviceDescriptor, Pactl, Role};
use crate::style::PlugswStyle;
use crate::view::Snapshot;

// ============================================================================
// Local Commands (no daemon needed)
// ============================================================================

/// Enumerate both roles through `pactl`
async fn enumerate(config: &Config) -> Result<Snapshot> {
    let pactl = Pactl::new(config.command_timeout());
    Ok(Snapshot {
        outputs: pactl.list_devices(Role::Output).await?,
        sources: pactl.list_devices(Role::Source).await?,
        ..Snapshot::default()
    })
}

fn print_role(role: Role, devices: &[DeviceDescriptor], preferred: Option<&str>) {
    let title = match role {
        Role::Output => "OUTPUTS:",
        Role::Source => "INPUTS:",
    };
    println!("{}", title.header());
    println!("{}", "-".repeat(title.len()));

    if devices.is_empty() {
        println!("  {}", "(none)".secondary());
        return;
    }

    for device in devices {
        let is_preferred = preferred == Some(device.description.as_str());
        let marker = if is_preferred { "* " } else { "  " };
        let index = format!("{:>3}", device.index);
        if is_preferred {
            println!("{}{} {}", marker, index.secondary(), device.description.as_str().preferred());
        } else {
            println!("{}{} {}", marker, index.secondary(), device.description.as_str().bold());
        }
        println!("      {}", device.name.as_str().technical());
    }
}

/// List outputs and inputs, marking the preferred ones
///
/// # Errors
/// Returns an error if `pactl` fails or JSON serialization fails.
pub async fn list_devices(config: &Config, json_output: bool) -> Result<()> {
    let snapshot = enumerate(config).await?;
    let preferences = config.preference_store()?.load();

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "outputs": snapshot.outputs,
                "inputs": snapshot.sources,
                "preferred_output": preferences.preferred_output,
                "preferred_input": preferences.preferred_source,
            }))?
        );
        return Ok(());
    }

    print_role(Role::Output, &snapshot.outputs, preferences.get(Role::Output));
    println!();
    print_role(Role::Source, &snapshot.sources, preferences.get(Role::Source));
    println!("\n  {} = preferred", "*".secondary());

    for role in Role::ALL {
        if let Some(preferred) = preferences.get(role)
            && !snapshot.devices(role).iter().any(|d| d.description == preferred)
        {
            println!(
                "  {} preferred {} '{}' is not connected",
                "!".warning(),
                role,
                preferred
            );
        }
    }

    Ok(())
}

/// Format uptime in human-readable form
pub(crate) fn format_uptime(secs: u64) -> String {
    const SECS_PER_MINUTE: u64 = 60;
    const SECS_PER_HOUR: u64 = 3600;

    if secs < SECS_PER_MINUTE {
        return format!("{secs}s");
    }
    if secs < SECS_PER_HOUR {
        return format!("{mins}m", mins = secs / SECS_PER_MINUTE);
    }
    let hours = secs / SECS_PER_HOUR;
    let mins = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
    if mins > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{hours}h")
    }
}

/// Turn a daemon reply into its message, failing on error replies
fn expect_ok(response: Response) -> Result<String> {
    match response {
        Response::Ok { message } => Ok(message),
        Response::Error { message } => eyre::bail!("{message}"),
        other => eyre::bail!("Unexpected response: {other:?}"),
    }
}

async fn require_daemon() -> Result<()> {
    if !ipc::is_daemon_running().await {
        eyre::bail!("Daemon is not running. Start it with 'plugsw daemon'");
    }
    Ok(())
}

// ============================================================================
// Daemon Lifecycle
// ============================================================================

/// Start the daemon in the background
///
/// # Errors
/// Returns an error if a daemon is already running or the new one never answers.
pub async fn start_daemon() -> Result<()> {
    if ipc::is_daemon_running().await {
        eyre::bail!("Daemon is already running");
    }

    if DaemonManager::detect() == DaemonManager::Systemd {
        println!(
            "{} plugsw.service is installed; consider {}",
            "Note:".warning(),
            "systemctl --user start plugsw".technical()
        );
    }

    let pid = daemon::spawn_detached()?;

    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if ipc::is_daemon_running().await {
            println!(
                "{} {}",
                "Daemon started".success(),
                format!("(pid {pid})").secondary()
            );
            if let Ok(path) = logging::log_file_path() {
                println!("{} {}", "Log:".dim(), path.display());
            }
            return Ok(());
        }
    }

    let hint = logging::log_file_path()
        .map(|p| format!(" See {}", p.display()))
        .unwrap_or_default();
    eyre::bail!("Daemon did not come up within 2s.{hint}")
}

// ============================================================================
// IPC-based Commands
// ============================================================================

/// Query daemon status, falling back to the saved preferences
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub async fn status(config: &Config, json_output: bool) -> Result<()> {
    let daemon_status = if ipc::is_daemon_running().await {
        match ipc::send_request(Request::Status).await {
            Ok(status @ Response::Status { .. }) => Some(status),
            _ => None,
        }
    } else {
        None
    };

    let saved = config.preference_store().map(|store| store.load()).ok();

    if json_output {
        let daemon_json = match &daemon_status {
            Some(Response::Status {
                version,
                uptime_secs,
                monitoring,
                passes,
                switches,
                last_warning,
                ..
            }) => serde_json::json!({
                "running": true,
                "version": version,
                "uptime_secs": uptime_secs,
                "uptime_human": format_uptime(*uptime_secs),
                "monitoring": monitoring,
                "passes": passes,
                "switches": switches,
                "last_warning": last_warning,
            }),
            _ => serde_json::json!({ "running": false }),
        };

        let (preferred_output, preferred_input) = match &daemon_status {
            Some(Response::Status {
                preferred_output,
                preferred_source,
                ..
            }) => (preferred_output.clone(), preferred_source.clone()),
            _ => saved
                .map(|s| (s.preferred_output, s.preferred_source))
                .unwrap_or_default(),
        };

        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "preferred_output": preferred_output,
                "preferred_input": preferred_input,
                "daemon": daemon_json,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Preferences".header());
    println!("{}", "-".repeat(11));
    let (preferred_output, preferred_input) = match &daemon_status {
        Some(Response::Status {
            preferred_output,
            preferred_source,
            ..
        }) => (preferred_output.clone(), preferred_source.clone()),
        _ => saved
            .map(|s| (s.preferred_output, s.preferred_source))
            .unwrap_or_default(),
    };
    let none = || "(none)".secondary().to_string();
    println!(
        "{} {}",
        "Output:".dim(),
        preferred_output.map_or_else(none, |d| d.bold().to_string())
    );
    println!(
        "{} {}",
        "Input:".dim(),
        preferred_input.map_or_else(none, |d| d.bold().to_string())
    );
    println!();
    println!("{}", "Daemon".header());
    println!("{}", "-".repeat(6));

    match daemon_status {
        Some(Response::Status {
            version,
            uptime_secs,
            monitoring,
            passes,
            switches,
            last_warning,
            ..
        }) => {
            println!(
                "{} {}",
                "Status:".dim(),
                format!("Running (uptime: {})", format_uptime(uptime_secs)).success()
            );
            println!("{} {}", "Version:".dim(), version);
            if monitoring {
                println!("{} {}", "Monitoring:".dim(), "enabled".success());
            } else {
                println!("{} {}", "Monitoring:".dim(), "disabled".warning());
            }
            println!(
                "{} {} passes, {} switches",
                "Activity:".dim(),
                passes.to_string().technical(),
                switches.to_string().technical()
            );
            if let Some(warning) = last_warning {
                println!("{} {}", "Last warning:".dim(), warning.warning());
            }
        }
        _ => {
            println!("{} {}", "Status:".dim(), "Not running".error());
            println!("  Start with: {}", "plugsw daemon".technical());
        }
    }

    Ok(())
}

/// Make `device` the preferred device for `role`
///
/// With a daemon running the daemon resolves and saves the choice. Otherwise
/// the device is looked up in a fresh local enumeration and written to the
/// preference file directly.
///
/// # Errors
/// Returns an error if the device is unknown, the daemon rejects it, or the
/// preference file cannot be written.
pub async fn select(config: &Config, role: Role, device: &str) -> Result<()> {
    if ipc::is_daemon_running().await {
        let message = expect_ok(
            ipc::send_request(Request::Select {
                role,
                device: device.to_string(),
            })
            .await?,
        )?;
        println!("{}", message.success());
        return Ok(());
    }

    let snapshot = enumerate(config).await?;
    let Some(found) = snapshot.find(role, device) else {
        eyre::bail!("No {role} device matching '{device}'. Run 'plugsw list-devices' to see what is connected");
    };

    let store = config.preference_store()?;
    let mut state = store.load();
    state.set(role, Some(found.description.clone()));
    store.save(&state)?;

    println!(
        "{} {}",
        format!("Preferred {role}:").success(),
        found.description.as_str().bold()
    );
    println!(
        "  {}",
        "Daemon not running; takes effect once it starts".secondary()
    );
    Ok(())
}

/// Forget the preferred device for `role`
///
/// # Errors
/// Returns an error if the daemon rejects the request or the preference file
/// cannot be written.
pub async fn clear(config: &Config, role: Role) -> Result<()> {
    if ipc::is_daemon_running().await {
        let message = expect_ok(ipc::send_request(Request::Clear { role }).await?)?;
        println!("{}", message.success());
        return Ok(());
    }

    let store = config.preference_store()?;
    let mut state = store.load();
    state.set(role, None);
    store.save(&state)?;

    println!("{}", format!("Preferred {role} cleared").success());
    Ok(())
}

/// Pause or resume automatic switching
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn set_monitoring(enabled: bool) -> Result<()> {
    require_daemon().await?;
    let message = expect_ok(ipc::send_request(Request::SetMonitoring { enabled }).await?)?;
    println!("{}", message.success());
    Ok(())
}

/// Ask the daemon to re-enumerate devices
///
/// # Errors
/// Returns an error if no daemon is running or enumeration failed.
pub async fn refresh() -> Result<()> {
    require_daemon().await?;
    let message = expect_ok(ipc::send_request(Request::Refresh).await?)?;
    println!("{}", message.success());
    Ok(())
}

/// Gracefully shutdown the daemon
///
/// # Errors
/// Returns an error if no daemon is running or IPC communication fails.
pub async fn shutdown() -> Result<()> {
    require_daemon().await?;
    let message = expect_ok(ipc::send_request(Request::Shutdown).await?)?;
    println!("{}", message.success());
    Ok(())
}

/// Validate the config file and check for `pactl`
///
/// # Errors
/// Returns an error if `pactl` is missing.
pub fn validate(config: &Config) -> Result<()> {
    config.print_summary();
    Pactl::validate_tool()?;
    println!("\n{} pactl found", "✓".success());
    Ok(())
}

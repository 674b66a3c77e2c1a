//! Hardware hotplug events
//!
//! Watches udev through `udevadm monitor`, read on a dedicated thread, and forwards
//! one `HotplugEvent` per kernel device change into the daemon's event loop.
//! The daemon does not care what changed, only that something did.

use color_eyre::eyre::{self, Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// A device topology change reported by udev
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    /// udev action (`add`, `remove`, `bind`, `unbind`, `change`, ...)
    pub action: String,
    /// Kernel device path, e.g. `/devices/pci0000:00/0000:00:14.0/usb1/1-2`
    pub devpath: String,
}

/// Parse a `udevadm monitor` event header line
///
/// Header lines look like
/// `UDEV  [12345.678901] add      /devices/.../usb1/1-2 (usb)`.
/// Banner lines and anything else yield `None`.
#[must_use]
pub fn parse_monitor_line(line: &str) -> Option<HotplugEvent> {
    let rest = line
        .strip_prefix("UDEV")
        .or_else(|| line.strip_prefix("KERNEL"))?;

    // Timestamp in brackets separates the source tag from the payload
    let rest = rest.trim_start().strip_prefix('[')?;
    let (_timestamp, rest) = rest.split_once(']')?;

    let mut fields = rest.split_whitespace();
    let action = fields.next()?;
    let devpath = fields.next()?;
    if !devpath.starts_with('/') {
        return None;
    }

    Some(HotplugEvent {
        action: action.to_string(),
        devpath: devpath.to_string(),
    })
}

/// Running `udevadm monitor` and the thread reading its output
///
/// Dropping the monitor kills and reaps `udevadm`, which ends the reader thread.
pub struct HotplugMonitor {
    events: mpsc::UnboundedReceiver<HotplugEvent>,
    child: Child,
}

impl HotplugMonitor {
    /// Watch udev events for `subsystem`
    ///
    /// # Errors
    /// Returns an error if `udevadm` cannot be started.
    pub fn spawn(subsystem: &str) -> Result<Self> {
        let mut command = Command::new("udevadm");
        command.args(["monitor", "--udev", &format!("--subsystem-match={subsystem}")]);
        let monitor = Self::spawn_command(command)
            .wrap_err("Failed to start 'udevadm monitor'. Is systemd-udev (or eudev) installed?")?;

        info!("Watching udev subsystem '{}'", subsystem);
        Ok(monitor)
    }

    /// Run `command` and forward the event headers it prints
    pub(crate) fn spawn_command(mut command: Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .wrap_err("Failed to spawn hotplug monitor process")?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| eyre::eyre!("Monitor stdout was not captured"))?;

        let (tx, events) = mpsc::unbounded_channel();

        let reader = std::thread::Builder::new()
            .name("udev-monitor".to_string())
            .spawn(move || {
                if let Err(e) = read_events(BufReader::new(stdout), &tx) {
                    error!("udev monitor error: {:#}", e);
                }
            });

        if let Err(e) = reader {
            Self::stop(&mut child);
            return Err(e).wrap_err("Failed to spawn udev monitor thread");
        }

        Ok(Self { events, child })
    }

    /// Next event; `None` once the monitor process has exited
    pub async fn recv(&mut self) -> Option<HotplugEvent> {
        self.events.recv().await
    }

    /// PID of the monitor process
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn stop(child: &mut Child) {
        if let Err(e) = child.kill() {
            trace!("Monitor process already exited: {}", e);
        }
        match child.wait() {
            Ok(status) => debug!("Monitor process exited: {}", status),
            Err(e) => warn!("Could not reap monitor process: {}", e),
        }
    }
}

impl Drop for HotplugMonitor {
    fn drop(&mut self) {
        Self::stop(&mut self.child);
    }
}

/// Forward every event header found in `reader`
///
/// Returns once the input ends or the receiving side is closed.
///
/// # Errors
/// Returns an error if reading fails.
pub fn read_events(reader: impl BufRead, tx: &mpsc::UnboundedSender<HotplugEvent>) -> Result<()> {
    for line in reader.lines() {
        let line = line.wrap_err("Failed to read udevadm output")?;
        let Some(event) = parse_monitor_line(&line) else {
            trace!("udevadm: {}", line);
            continue;
        };

        debug!("Hotplug: {} {}", event.action, event.devpath);
        if tx.send(event).is_err() {
            debug!("Hotplug receiver closed, stopping monitor");
            return Ok(());
        }
    }

    info!("udevadm monitor output ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    const MONITOR_OUTPUT: &str = "\
monitor will print the received events for:
UDEV - the event which udev sends out after rule processing

UDEV  [18234.114521] add      /devices/pci0000:00/0000:00:14.0/usb1/1-2 (usb)
UDEV  [18234.120003] add      /devices/pci0000:00/0000:00:14.0/usb1/1-2/1-2:1.0 (usb)
UDEV  [18234.162977] bind     /devices/pci0000:00/0000:00:14.0/usb1/1-2 (usb)
UDEV  [18240.501112] remove   /devices/pci0000:00/0000:00:14.0/usb1/1-2 (usb)
";

    #[test]
    fn test_parse_udev_header() {
        let event =
            parse_monitor_line("UDEV  [18234.114521] add      /devices/pci0000:00/usb1/1-2 (usb)")
                .unwrap();
        assert_eq!(
            event,
            HotplugEvent {
                action: "add".to_string(),
                devpath: "/devices/pci0000:00/usb1/1-2".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_kernel_header() {
        let event = parse_monitor_line("KERNEL[99.000001] remove   /devices/usb1/1-4 (usb)").unwrap();
        assert_eq!(event.action, "remove");
    }

    #[test_case("" ; "empty line")]
    #[test_case("monitor will print the received events for:" ; "banner")]
    #[test_case("UDEV - the event which udev sends out after rule processing" ; "legend")]
    #[test_case("ACTION=add" ; "property line")]
    #[test_case("UDEV  [1.0] add" ; "missing devpath")]
    #[test_case("UDEV  [1.0] add usb1" ; "relative devpath")]
    fn test_parse_ignores_non_events(line: &str) {
        assert_eq!(parse_monitor_line(line), None);
    }

    #[test]
    fn test_read_events_forwards_every_header_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        read_events(MONITOR_OUTPUT.as_bytes(), &tx).unwrap();

        let mut actions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            actions.push(event.action);
        }
        assert_eq!(actions, vec!["add", "add", "bind", "remove"]);
    }

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        command
    }

    #[tokio::test]
    async fn test_monitor_forwards_events_then_closes() {
        let mut monitor = HotplugMonitor::spawn_command(shell(
            "echo 'UDEV  [1.000000] add      /devices/usb1/1-2 (usb)'",
        ))
        .unwrap();

        let event = monitor.recv().await.unwrap();
        assert_eq!(event.action, "add");
        assert_eq!(monitor.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropping_monitor_kills_process() {
        let mut monitor = HotplugMonitor::spawn_command(shell(
            "echo 'UDEV  [1.000000] add      /devices/usb1/1-2 (usb)'; exec sleep 30",
        ))
        .unwrap();
        assert!(monitor.recv().await.is_some());
        let proc_dir = std::path::PathBuf::from(format!("/proc/{}", monitor.id()));
        assert!(proc_dir.exists());

        drop(monitor);

        // Killed and reaped, so the PID is gone
        assert!(!proc_dir.exists());
    }

    #[test]
    fn test_read_events_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        assert!(read_events(MONITOR_OUTPUT.as_bytes(), &tx).is_ok());
    }
}

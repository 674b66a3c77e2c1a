//! Service supervision
//!
//! Tells whether the daemon runs as a systemd user unit and speaks the
//! sd_notify readiness protocol when it does.

use std::process::{Command, Stdio};
use tracing::{debug, warn};

const SERVICE_UNIT: &str = "plugsw.service";

/// How the daemon is being managed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonManager {
    /// Started by `systemctl --user`
    Systemd,
    /// Started from a shell or by `plugsw daemon`
    Direct,
}

impl DaemonManager {
    /// Detect which manager started (or would start) the daemon
    ///
    /// systemd sets `INVOCATION_ID` for every process it supervises. Without
    /// it, an installed `plugsw.service` unit still counts as systemd so the
    /// CLI can point users at `systemctl` instead of spawning a second copy.
    #[must_use]
    pub fn detect() -> Self {
        if std::env::var_os("INVOCATION_ID").is_some() {
            return Self::Systemd;
        }

        if Self::unit_installed() {
            Self::Systemd
        } else {
            Self::Direct
        }
    }

    /// True only when this process itself is a systemd service
    #[must_use]
    pub fn supervised() -> bool {
        std::env::var_os("INVOCATION_ID").is_some()
    }

    fn unit_installed() -> bool {
        Command::new("systemctl")
            .args(["--user", "cat", SERVICE_UNIT])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    /// Report that the socket is bound and the first refresh is done
    pub fn notify_ready(self) {
        self.notify(&[sd_notify::NotifyState::Ready], "READY=1");
    }

    /// Report that shutdown has begun
    pub fn notify_stopping(self) {
        self.notify(&[sd_notify::NotifyState::Stopping], "STOPPING=1");
    }

    fn notify(self, state: &[sd_notify::NotifyState], label: &str) {
        if self != Self::Systemd || !Self::supervised() {
            return;
        }
        match sd_notify::notify(false, state) {
            Ok(()) => debug!("sd_notify {}", label),
            Err(e) => warn!("sd_notify {} failed: {}", label, e),
        }
    }
}

impl std::fmt::Display for DaemonManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Systemd => write!(f, "systemd"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

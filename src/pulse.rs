//! `PulseAudio` integration
//!
//! Provides audio endpoint discovery and default switching via the `pactl`
//! command line tool. Works against both `PulseAudio` and `pipewire-pulse`.
//! - `pactl --format=json list sinks|sources`: snapshot of current endpoints
//! - `pactl set-default-sink|set-default-source`: change the system default
//!
//! Every call is bounded by a timeout; an unresponsive audio server is reported
//! as an ordinary failure instead of stalling the daemon's event loop.

use color_eyre::eyre::{self, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

// ============================================================================
// Device Types
// ============================================================================

/// Which side of the audio graph an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Playback endpoint (a `PulseAudio` sink)
    Output,
    /// Capture endpoint (a `PulseAudio` source)
    #[serde(rename = "input")]
    Source,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Output, Role::Source];

    /// Object kind as `pactl` names it
    #[must_use]
    pub fn pactl_kind(self) -> &'static str {
        match self {
            Role::Output => "sinks",
            Role::Source => "sources",
        }
    }

    fn set_default_command(self) -> &'static str {
        match self {
            Role::Output => "set-default-sink",
            Role::Source => "set-default-source",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Output => write!(f, "output"),
            Role::Source => write!(f, "input"),
        }
    }
}

/// One currently available audio endpoint
///
/// Built fresh from every enumeration and never mutated afterwards. The
/// `index` is only valid for the current audio server session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub index: u32,
    pub name: String,
    /// Human-readable label, the key preferences are matched against
    pub description: String,
    pub role: Role,
}

// ============================================================================
// Gateway Interface
// ============================================================================

/// Query/command surface over the audio server
///
/// The engine awaits each call to completion before issuing the next one.
pub trait AudioGateway {
    /// Snapshot of the endpoints currently available for `role`
    fn list_devices(&self, role: Role) -> impl Future<Output = Result<Vec<DeviceDescriptor>>>;

    /// Make `device` the default endpoint for its role
    fn set_default(&self, device: &DeviceDescriptor) -> impl Future<Output = Result<()>>;
}

// ============================================================================
// pactl JSON Structures
// ============================================================================

/// Entry of `pactl --format=json list sinks|sources`, only the fields we read
#[derive(Debug, Deserialize)]
struct PactlDevice {
    index: u32,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// Parse the JSON array printed by `pactl --format=json list <kind>`
///
/// # Errors
/// Returns an error if the output is not a JSON array of device objects.
pub fn parse_device_list(json: &[u8], role: Role) -> Result<Vec<DeviceDescriptor>> {
    let entries: Vec<PactlDevice> = serde_json::from_slice(json)
        .wrap_err_with(|| format!("Failed to parse pactl {} JSON", role.pactl_kind()))?;

    Ok(entries
        .into_iter()
        .map(|entry| DeviceDescriptor {
            index: entry.index,
            description: entry
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| entry.name.clone()),
            name: entry.name,
            role,
        })
        .collect())
}

// ============================================================================
// pactl Gateway
// ============================================================================

/// Default upper bound for a single `pactl` invocation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

/// `AudioGateway` backed by the `pactl` binary
#[derive(Debug, Clone)]
pub struct Pactl {
    program: PathBuf,
    timeout: Duration,
}

impl Default for Pactl {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl Pactl {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("pactl", timeout)
    }

    /// Gateway running `program` in place of `pactl`
    pub(crate) fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Check that `pactl` is available in `PATH`
    ///
    /// # Errors
    /// Returns an error with installation hints if `pactl` cannot be run.
    pub fn validate_tool() -> Result<()> {
        let available = std::process::Command::new("pactl")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());

        if !available {
            eyre::bail!(
                "Required tool 'pactl' not found in PATH\n\
                 \n\
                 Please install the PulseAudio client utilities for your distribution:\n\
                 - Arch/Manjaro: pacman -S libpulse\n\
                 - Fedora: dnf install pulseaudio-utils\n\
                 - Debian/Ubuntu: apt install pulseaudio-utils"
            );
        }

        Ok(())
    }

    /// Run `pactl` with `args`, killing it if it outlives the timeout
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let invocation = args.join(" ");
        trace!("pactl {}", invocation);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                eyre::eyre!(
                    "'pactl {invocation}' timed out after {}ms. Is the audio server responding?",
                    self.timeout.as_millis()
                )
            })?
            .wrap_err("Audio tool 'pactl' not found or failed. Is PulseAudio or pipewire-pulse installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eyre::bail!("'pactl {}' failed: {}", invocation, stderr.trim());
        }

        Ok(output.stdout)
    }
}

impl AudioGateway for Pactl {
    async fn list_devices(&self, role: Role) -> Result<Vec<DeviceDescriptor>> {
        let stdout = self
            .run(&["--format=json", "list", role.pactl_kind()])
            .await?;
        let devices = parse_device_list(&stdout, role)?;
        trace!("pactl listed {} {}", devices.len(), role.pactl_kind());
        Ok(devices)
    }

    async fn set_default(&self, device: &DeviceDescriptor) -> Result<()> {
        self.run(&[device.role.set_default_command(), &device.name])
            .await
            .wrap_err_with(|| {
                format!(
                    "Failed to set default {} to '{}'",
                    device.role, device.description
                )
            })?;

        debug!("Set default {}: {}", device.role, device.name);
        Ok(())
    }
}

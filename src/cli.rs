//! Command-line interface definitions
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Parser, Subcommand, ValueEnum};

/// plugsw - Plug Switcher
///
/// Keep your preferred audio output and input as the system default across USB hotplug.
#[derive(Parser)]
#[command(name = "plugsw")]
#[command(version)]
#[command(
    about = "Plug Switcher - Keep preferred audio devices as system default across USB hotplug"
)]
#[command(after_help = "\
BEHAVIOR:
  - The daemon watches udev for USB devices appearing or disappearing
  - After every change it re-lists outputs and inputs and makes the preferred
    ones the default again, if they are connected
  - Devices are matched by their description (e.g. \"USB Headset Analog Stereo\")
  - Preferences survive restarts; the monitoring switch does not

DAEMON MANAGEMENT:
  plugsw daemon              Run the daemon in background (detached)
  plugsw daemon --foreground Run in foreground with logs to stderr
  plugsw status              Query daemon status (or just: plugsw)
  plugsw monitor on|off      Pause or resume automatic switching
  plugsw refresh             Re-list devices without switching
  plugsw shutdown            Gracefully stop the daemon

PREFERENCES:
  plugsw list-devices        List outputs and inputs (local, no daemon needed)
  plugsw set-output DEVICE   Prefer an output (description, name, or index)
  plugsw set-input DEVICE    Prefer an input
  plugsw clear-output        Forget the preferred output
  plugsw clear-input         Forget the preferred input
  plugsw validate            Validate config file (local, no daemon needed)

IPC SOCKET:
  $XDG_RUNTIME_DIR/plugsw.sock (or /tmp/plugsw-$UID.sock)

AUDIO INTEGRATION:
  Uses 'pactl --format=json list' for queries and 'pactl set-default-sink'/
  'set-default-source' for switching (PulseAudio or pipewire-pulse).")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon (watches hotplug and restores preferred devices)
    Daemon {
        /// Run in foreground with logs to stderr
        #[arg(short, long)]
        foreground: bool,

        /// Log to the rotating daemon log instead of stderr
        #[arg(long, hide = true)]
        log_file: bool,
    },

    /// Query daemon status via IPC
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List available outputs and inputs
    ListDevices {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Prefer an output device
    SetOutput {
        /// Description, node name, or index as shown by list-devices
        device: String,
    },

    /// Prefer an input device
    SetInput {
        /// Description, node name, or index as shown by list-devices
        device: String,
    },

    /// Forget the preferred output
    ClearOutput,

    /// Forget the preferred input
    ClearInput,

    /// Turn automatic switching on or off
    Monitor {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Ask the daemon to re-list devices
    Refresh,

    /// Gracefully shutdown the daemon
    Shutdown,

    /// Validate config file (local, no daemon needed)
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    #[must_use]
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_toggle() {
        let args = Args::try_parse_from(["plugsw", "monitor", "off"]).unwrap();
        let Some(Command::Monitor { state }) = args.command else {
            panic!("expected monitor subcommand");
        };
        assert!(!state.enabled());

        assert!(Args::try_parse_from(["plugsw", "monitor", "maybe"]).is_err());
    }

    #[test]
    fn test_parse_set_output_keeps_spaces() {
        let args = Args::try_parse_from(["plugsw", "set-output", "USB Headset Analog Stereo"])
            .unwrap();
        let Some(Command::SetOutput { device }) = args.command else {
            panic!("expected set-output subcommand");
        };
        assert_eq!(device, "USB Headset Analog Stereo");
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let args = Args::try_parse_from(["plugsw"]).unwrap();
        assert!(args.command.is_none());
    }
}

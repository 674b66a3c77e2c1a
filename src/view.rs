//! Presentation state
//!
//! The engine reports everything the user should see through the `Presenter`
//! trait. The daemon's implementation, `DaemonView`, keeps the latest snapshot
//! for IPC clients and raises desktop notifications.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;
use crate::notification::{get_device_icon, send_notification};
use crate::pulse::{DeviceDescriptor, Role};

/// Sink for everything the engine publishes
pub trait Presenter {
    /// Fresh enumeration for `role`, replacing the previous list
    fn show_devices(&mut self, role: Role, devices: &[DeviceDescriptor]);

    /// Current preference text for `role` (`None` = no preference)
    fn show_preference(&mut self, role: Role, description: Option<&str>);

    fn show_monitoring(&mut self, enabled: bool);

    /// A default-switch command was issued successfully
    fn show_switch(&mut self, device: &DeviceDescriptor);

    /// Non-fatal problem worth telling the user about
    fn warn(&mut self, message: &str);
}

/// What IPC clients see of the daemon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub outputs: Vec<DeviceDescriptor>,
    pub sources: Vec<DeviceDescriptor>,
    pub preferred_output: Option<String>,
    pub preferred_source: Option<String>,
    pub monitoring: bool,
    pub switches: u64,
    pub last_warning: Option<String>,
}

impl Snapshot {
    #[must_use]
    pub fn devices(&self, role: Role) -> &[DeviceDescriptor] {
        match role {
            Role::Output => &self.outputs,
            Role::Source => &self.sources,
        }
    }

    #[must_use]
    pub fn preference(&self, role: Role) -> Option<&str> {
        match role {
            Role::Output => self.preferred_output.as_deref(),
            Role::Source => self.preferred_source.as_deref(),
        }
    }

    /// Look up a listed device by description, node name, or session index
    ///
    /// Descriptions win over names, names over indices.
    #[must_use]
    pub fn find(&self, role: Role, needle: &str) -> Option<&DeviceDescriptor> {
        let devices = self.devices(role);
        devices
            .iter()
            .find(|d| d.description == needle)
            .or_else(|| devices.iter().find(|d| d.name == needle))
            .or_else(|| {
                let index: u32 = needle.parse().ok()?;
                devices.iter().find(|d| d.index == index)
            })
    }
}

/// `Presenter` used by the daemon
pub struct DaemonView {
    snapshot: Snapshot,
    notify_switch: bool,
    notify_warnings: bool,
}

impl DaemonView {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            snapshot: Snapshot::default(),
            notify_switch: settings.notify_switch,
            notify_warnings: settings.notify_warnings,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Presenter for DaemonView {
    fn show_devices(&mut self, role: Role, devices: &[DeviceDescriptor]) {
        match role {
            Role::Output => self.snapshot.outputs = devices.to_vec(),
            Role::Source => self.snapshot.sources = devices.to_vec(),
        }
    }

    fn show_preference(&mut self, role: Role, description: Option<&str>) {
        let description = description.map(str::to_string);
        match role {
            Role::Output => self.snapshot.preferred_output = description,
            Role::Source => self.snapshot.preferred_source = description,
        }
    }

    fn show_monitoring(&mut self, enabled: bool) {
        self.snapshot.monitoring = enabled;
    }

    fn show_switch(&mut self, device: &DeviceDescriptor) {
        self.snapshot.switches += 1;

        if self.notify_switch {
            let summary = match device.role {
                Role::Output => "Audio Output",
                Role::Source => "Audio Input",
            };
            let icon = get_device_icon(device);
            if let Err(e) = send_notification(summary, &device.description, Some(icon)) {
                warn!("Notification failed: {}", e);
            }
        }
    }

    fn warn(&mut self, message: &str) {
        self.snapshot.last_warning = Some(message.to_string());

        if self.notify_warnings
            && let Err(e) = send_notification("plugsw", message, Some("dialog-warning"))
        {
            warn!("Notification failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn quiet_view() -> DaemonView {
        let settings = Settings {
            notify_switch: false,
            notify_warnings: false,
            ..Settings::default()
        };
        DaemonView::new(&settings)
    }

    fn device(index: u32, name: &str, description: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            index,
            name: name.to_string(),
            description: description.to_string(),
            role: Role::Output,
        }
    }

    #[test]
    fn test_show_devices_replaces_list_wholesale() {
        let mut view = quiet_view();
        view.show_devices(Role::Output, &[device(0, "a", "Speakers"), device(3, "b", "Headset A")]);
        view.show_devices(Role::Output, &[device(0, "a", "Speakers")]);

        assert_eq!(view.snapshot().outputs, vec![device(0, "a", "Speakers")]);
        assert!(view.snapshot().sources.is_empty());
    }

    #[test]
    fn test_preference_and_warning_are_recorded() {
        let mut view = quiet_view();
        view.show_preference(Role::Source, Some("USB Mic"));
        view.show_monitoring(true);
        view.warn("pactl timed out");

        let snapshot = view.snapshot();
        assert_eq!(snapshot.preference(Role::Source), Some("USB Mic"));
        assert_eq!(snapshot.preference(Role::Output), None);
        assert!(snapshot.monitoring);
        assert_eq!(snapshot.last_warning.as_deref(), Some("pactl timed out"));

        view.show_preference(Role::Source, None);
        assert_eq!(view.snapshot().preference(Role::Source), None);
    }

    #[test]
    fn test_show_switch_counts() {
        let mut view = quiet_view();
        view.show_switch(&device(3, "b", "Headset A"));
        view.show_switch(&device(3, "b", "Headset A"));
        assert_eq!(view.snapshot().switches, 2);
    }

    #[test]
    fn test_find_prefers_description_then_name_then_index() {
        let snapshot = Snapshot {
            outputs: vec![
                device(0, "alsa_output.builtin", "Speakers"),
                device(3, "alsa_output.usb", "Headset A"),
                device(7, "Headset A", "Odd Device"),
            ],
            ..Snapshot::default()
        };

        assert_eq!(snapshot.find(Role::Output, "Headset A").map(|d| d.index), Some(3));
        assert_eq!(snapshot.find(Role::Output, "alsa_output.builtin").map(|d| d.index), Some(0));
        assert_eq!(snapshot.find(Role::Output, "7").map(|d| d.index), Some(7));
        assert_eq!(snapshot.find(Role::Output, "Missing"), None);
        assert_eq!(snapshot.find(Role::Source, "Speakers"), None);
    }
}

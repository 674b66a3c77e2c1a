//! End-to-end engine scenarios through the public API
//!
//! A fake audio server stands in for `pactl`; hotplug is simulated by changing
//! its device lists between passes.

use color_eyre::eyre::Result;
use plugsw::{AudioGateway, DeviceDescriptor, Engine, PreferenceStore, Presenter, Role};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use tempfile::TempDir;

fn dev(role: Role, index: u32, name: &str, description: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        index,
        name: name.to_string(),
        description: description.to_string(),
        role,
    }
}

fn speakers() -> DeviceDescriptor {
    dev(Role::Output, 0, "alsa_output.pci.analog-stereo", "Built-in Audio")
}

fn headset_out(index: u32) -> DeviceDescriptor {
    dev(Role::Output, index, "alsa_output.usb-headset.analog-stereo", "USB Headset")
}

fn headset_mic(index: u32) -> DeviceDescriptor {
    dev(Role::Source, index, "alsa_input.usb-headset.mono", "USB Headset Mic")
}

fn laptop_mic() -> DeviceDescriptor {
    dev(Role::Source, 1, "alsa_input.pci.analog-stereo", "Built-in Mic")
}

/// Audio server whose defaults follow `set_default`
#[derive(Default)]
struct FakeServer {
    outputs: RefCell<Vec<DeviceDescriptor>>,
    sources: RefCell<Vec<DeviceDescriptor>>,
    default_output: RefCell<Option<String>>,
    default_source: RefCell<Option<String>>,
    commands: RefCell<usize>,
}

impl FakeServer {
    fn plug(&self, output: DeviceDescriptor, source: DeviceDescriptor) {
        self.outputs.borrow_mut().push(output);
        self.sources.borrow_mut().push(source);
    }

    fn unplug(&self, description_prefix: &str) {
        self.outputs
            .borrow_mut()
            .retain(|d| !d.description.starts_with(description_prefix));
        self.sources
            .borrow_mut()
            .retain(|d| !d.description.starts_with(description_prefix));
    }
}

impl AudioGateway for &FakeServer {
    async fn list_devices(&self, role: Role) -> Result<Vec<DeviceDescriptor>> {
        Ok(match role {
            Role::Output => self.outputs.borrow().clone(),
            Role::Source => self.sources.borrow().clone(),
        })
    }

    async fn set_default(&self, device: &DeviceDescriptor) -> Result<()> {
        *self.commands.borrow_mut() += 1;
        let slot = match device.role {
            Role::Output => &self.default_output,
            Role::Source => &self.default_source,
        };
        *slot.borrow_mut() = Some(device.name.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Screen {
    outputs: Vec<String>,
    sources: Vec<String>,
    warnings: usize,
}

impl Presenter for Screen {
    fn show_devices(&mut self, role: Role, devices: &[DeviceDescriptor]) {
        let labels = devices.iter().map(|d| d.description.clone()).collect();
        match role {
            Role::Output => self.outputs = labels,
            Role::Source => self.sources = labels,
        }
    }

    fn show_preference(&mut self, _role: Role, _description: Option<&str>) {}

    fn show_monitoring(&mut self, _enabled: bool) {}

    fn show_switch(&mut self, _device: &DeviceDescriptor) {}

    fn warn(&mut self, _message: &str) {
        self.warnings += 1;
    }
}

#[tokio::test]
async fn test_headset_follows_hotplug_and_survives_restart() {
    let dir = TempDir::new().unwrap();
    let prefs = dir.path().join("preferences.json");
    let server = FakeServer::default();
    server.outputs.borrow_mut().push(speakers());
    server.sources.borrow_mut().push(laptop_mic());

    {
        let mut engine = Engine::new(&server, Screen::default(), PreferenceStore::new(&prefs));
        server.plug(headset_out(7), headset_mic(8));
        engine.refresh().await;

        engine.set_preferred(Role::Output, "USB Headset".to_string());
        engine.set_preferred(Role::Source, "USB Headset Mic".to_string());

        let report = engine.on_hardware_event().await;
        assert_eq!(report.switched, vec![headset_out(7), headset_mic(8)]);
        assert_eq!(
            server.default_output.borrow().as_deref(),
            Some("alsa_output.usb-headset.analog-stereo")
        );
    }

    // New process: preferences come back from disk
    *server.default_output.borrow_mut() = None;
    *server.default_source.borrow_mut() = None;
    let mut engine = Engine::new(&server, Screen::default(), PreferenceStore::new(&prefs));
    assert_eq!(engine.preference(Role::Output), Some("USB Headset"));

    server.unplug("USB Headset");
    let report = engine.on_hardware_event().await;
    assert!(report.switched.is_empty());
    assert_eq!(engine.presenter().outputs, vec!["Built-in Audio"]);
    assert_eq!(engine.presenter().sources, vec!["Built-in Mic"]);
    assert_eq!(*server.default_output.borrow(), None);

    // Replugged with fresh session indices
    server.plug(headset_out(12), headset_mic(13));
    let report = engine.on_hardware_event().await;
    assert_eq!(report.switched, vec![headset_out(12), headset_mic(13)]);
    assert_eq!(
        server.default_source.borrow().as_deref(),
        Some("alsa_input.usb-headset.mono")
    );
    assert_eq!(engine.presenter().warnings, 0);
}

#[tokio::test]
async fn test_paused_monitoring_keeps_lists_current() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::default();
    server.outputs.borrow_mut().push(speakers());

    let mut engine = Engine::new(
        &server,
        Screen::default(),
        PreferenceStore::new(dir.path().join("preferences.json")),
    );
    engine.set_preferred(Role::Output, "USB Headset".to_string());
    engine.set_monitoring(false);

    server.plug(headset_out(4), headset_mic(5));
    let report = engine.on_hardware_event().await;

    assert!(report.monitoring_disabled);
    assert_eq!(*server.commands.borrow(), 0);
    assert_eq!(engine.presenter().outputs, vec!["Built-in Audio", "USB Headset"]);

    engine.set_monitoring(true);
    assert_eq!(*server.commands.borrow(), 0, "re-enabling alone switches nothing");

    engine.on_hardware_event().await;
    assert_eq!(*server.commands.borrow(), 1);
}

//! Shared fakes for unit tests

use color_eyre::eyre::{self, Result};
use std::sync::Mutex;

use crate::pulse::{AudioGateway, DeviceDescriptor, Role};
use crate::view::Presenter;

/// Build a descriptor with a name derived from the description
pub(crate) fn device(role: Role, index: u32, description: &str) -> DeviceDescriptor {
    let prefix = match role {
        Role::Output => "alsa_output",
        Role::Source => "alsa_input",
    };
    DeviceDescriptor {
        index,
        name: format!("{prefix}.{}", description.to_lowercase().replace(' ', "_")),
        description: description.to_string(),
        role,
    }
}

#[derive(Default)]
struct GatewayState {
    outputs: Vec<DeviceDescriptor>,
    sources: Vec<DeviceDescriptor>,
    fail_outputs: bool,
    fail_sources: bool,
    fail_set_default: bool,
    list_calls: usize,
    set_default_calls: Vec<DeviceDescriptor>,
}

/// In-memory `AudioGateway` with scriptable failures and a call log
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    state: Mutex<GatewayState>,
}

impl ScriptedGateway {
    pub fn new(outputs: Vec<DeviceDescriptor>, sources: Vec<DeviceDescriptor>) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                outputs,
                sources,
                ..GatewayState::default()
            }),
        }
    }

    pub fn set_devices(&self, role: Role, devices: Vec<DeviceDescriptor>) {
        let mut state = self.state.lock().unwrap();
        match role {
            Role::Output => state.outputs = devices,
            Role::Source => state.sources = devices,
        }
    }

    pub fn fail_listing(&self, role: Role, fail: bool) {
        let mut state = self.state.lock().unwrap();
        match role {
            Role::Output => state.fail_outputs = fail,
            Role::Source => state.fail_sources = fail,
        }
    }

    pub fn fail_set_default(&self, fail: bool) {
        self.state.lock().unwrap().fail_set_default = fail;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn set_default_calls(&self) -> Vec<DeviceDescriptor> {
        self.state.lock().unwrap().set_default_calls.clone()
    }
}

impl AudioGateway for ScriptedGateway {
    async fn list_devices(&self, role: Role) -> Result<Vec<DeviceDescriptor>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        match role {
            Role::Output if state.fail_outputs => eyre::bail!("Connection refused"),
            Role::Source if state.fail_sources => eyre::bail!("Connection refused"),
            Role::Output => Ok(state.outputs.clone()),
            Role::Source => Ok(state.sources.clone()),
        }
    }

    async fn set_default(&self, device: &DeviceDescriptor) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_set_default {
            eyre::bail!("Failed to set default {} to '{}'", device.role, device.description);
        }
        state.set_default_calls.push(device.clone());
        Ok(())
    }
}

/// `Presenter` that remembers the last value of everything it was shown
#[derive(Debug, Default)]
pub(crate) struct RecordingPresenter {
    pub outputs: Option<Vec<DeviceDescriptor>>,
    pub sources: Option<Vec<DeviceDescriptor>>,
    pub preferred_output: Option<Option<String>>,
    pub preferred_source: Option<Option<String>>,
    pub monitoring: Option<bool>,
    pub switches: Vec<DeviceDescriptor>,
    pub warnings: Vec<String>,
    pub device_publishes: usize,
}

impl RecordingPresenter {
    /// Last published list for `role`, `None` if never published
    pub fn devices(&self, role: Role) -> Option<Vec<DeviceDescriptor>> {
        match role {
            Role::Output => self.outputs.clone(),
            Role::Source => self.sources.clone(),
        }
    }

    /// Last published preference for `role`, `None` if never published
    pub fn preference(&self, role: Role) -> Option<Option<String>> {
        match role {
            Role::Output => self.preferred_output.clone(),
            Role::Source => self.preferred_source.clone(),
        }
    }
}

impl Presenter for RecordingPresenter {
    fn show_devices(&mut self, role: Role, devices: &[DeviceDescriptor]) {
        self.device_publishes += 1;
        match role {
            Role::Output => self.outputs = Some(devices.to_vec()),
            Role::Source => self.sources = Some(devices.to_vec()),
        }
    }

    fn show_preference(&mut self, role: Role, description: Option<&str>) {
        let value = Some(description.map(str::to_string));
        match role {
            Role::Output => self.preferred_output = value,
            Role::Source => self.preferred_source = value,
        }
    }

    fn show_monitoring(&mut self, enabled: bool) {
        self.monitoring = Some(enabled);
    }

    fn show_switch(&mut self, device: &DeviceDescriptor) {
        self.switches.push(device.clone());
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

//! Reconciliation engine
//!
//! Owns the user's preferences and the monitoring flag, and runs one
//! reconciliation pass per hardware event:
//!
//! 1. Re-enumerate outputs and inputs and republish both lists
//! 2. Stop if monitoring is disabled
//! 3. Enumerate outputs again and make every output whose description equals
//!    the preferred output the default
//! 4. Same for inputs
//!
//! Each pass derives everything from a fresh enumeration, so a dropped or
//! reordered hardware event is corrected by the next one. Gateway failures are
//! reported as warnings and never abort the remaining steps of a pass.
//!
//! Devices are matched by their human-readable description. Two different
//! devices that share a description cannot be told apart; both receive the
//! command.

use tracing::{debug, info, warn};

use crate::preferences::{PersistedState, PreferenceStore};
use crate::pulse::{AudioGateway, DeviceDescriptor, Role};
use crate::view::Presenter;

/// Outcome of a single reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Devices successfully made default, in the order the commands were issued
    pub switched: Vec<DeviceDescriptor>,
    /// Gateway calls that failed during the pass
    pub failures: usize,
    /// True when the pass stopped after the refresh because monitoring is off
    pub monitoring_disabled: bool,
}

/// Reconciliation state machine
///
/// Not meant for concurrent use: every operation takes `&mut self`, and the
/// daemon drives all of them from a single event loop.
pub struct Engine<G, P> {
    gateway: G,
    presenter: P,
    store: PreferenceStore,
    preferences: PersistedState,
    monitoring: bool,
    passes: u64,
}

impl<G: AudioGateway, P: Presenter> Engine<G, P> {
    /// Create an engine with preferences loaded from `store` and monitoring enabled
    pub fn new(gateway: G, mut presenter: P, store: PreferenceStore) -> Self {
        let preferences = store.load();

        for role in Role::ALL {
            presenter.show_preference(role, preferences.get(role));
        }
        presenter.show_monitoring(true);

        info!(
            "Preferences: output={:?}, input={:?}",
            preferences.preferred_output, preferences.preferred_source
        );

        Self {
            gateway,
            presenter,
            store,
            preferences,
            monitoring: true,
            passes: 0,
        }
    }

    #[must_use]
    pub fn monitoring(&self) -> bool {
        self.monitoring
    }

    #[must_use]
    pub fn preference(&self, role: Role) -> Option<&str> {
        self.preferences.get(role)
    }

    #[must_use]
    pub fn preferences(&self) -> &PersistedState {
        &self.preferences
    }

    /// Number of hardware-triggered passes run so far
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    #[must_use]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Enable or disable automatic switching
    ///
    /// Takes effect on the next hardware event. Not persisted.
    pub fn set_monitoring(&mut self, enabled: bool) {
        if self.monitoring != enabled {
            info!("Monitoring {}", if enabled { "enabled" } else { "disabled" });
        }
        self.monitoring = enabled;
        self.presenter.show_monitoring(enabled);
    }

    /// Adopt the selected device's description as the preference for `role`
    ///
    /// Does nothing and returns false when nothing is selected.
    pub fn select(&mut self, role: Role, selected: Option<&DeviceDescriptor>) -> bool {
        let Some(device) = selected else {
            debug!("No {} selected, preference unchanged", role);
            return false;
        };
        self.set_preferred(role, device.description.clone());
        true
    }

    /// Record `description` as the preferred device for `role` and persist it
    ///
    /// A blank description counts as clearing the preference.
    pub fn set_preferred(&mut self, role: Role, description: String) {
        if description.trim().is_empty() {
            self.clear_preferred(role);
            return;
        }
        info!("Preferred {} set to '{}'", role, description);
        self.preferences.set(role, Some(description));
        self.commit(role);
    }

    /// Remove the preference for `role` and persist the change
    pub fn clear_preferred(&mut self, role: Role) {
        info!("Preferred {} cleared", role);
        self.preferences.set(role, None);
        self.commit(role);
    }

    /// Publish and save after a preference edit
    ///
    /// A failed save leaves the in-memory change in place for this session.
    fn commit(&mut self, role: Role) {
        self.presenter
            .show_preference(role, self.preferences.get(role));

        if let Err(e) = self.store.save(&self.preferences) {
            let message = format!("Could not save preferences: {e:#}");
            warn!("{}", message);
            self.presenter.warn(&message);
        }
    }

    /// Re-enumerate both roles and republish the lists
    ///
    /// Never issues a switch command. Returns the number of failed enumerations;
    /// the list of a role that failed is left as previously published.
    pub async fn refresh(&mut self) -> usize {
        let mut failures = 0;

        for role in Role::ALL {
            match self.gateway.list_devices(role).await {
                Ok(devices) => {
                    debug!("Found {} {} device(s)", devices.len(), role);
                    self.presenter.show_devices(role, &devices);
                }
                Err(e) => {
                    failures += 1;
                    self.report(&format!("Could not list {} devices: {e:#}", role));
                }
            }
        }

        failures
    }

    /// Run one full reconciliation pass in response to a hardware event
    pub async fn on_hardware_event(&mut self) -> PassReport {
        self.passes += 1;
        let mut report = PassReport {
            failures: self.refresh().await,
            ..PassReport::default()
        };

        if !self.monitoring {
            debug!("Pass {}: monitoring disabled, no switching", self.passes);
            report.monitoring_disabled = true;
            return report;
        }

        for role in Role::ALL {
            self.apply_preference(role, &mut report).await;
        }

        debug!(
            "Pass {} done: {} switch(es), {} failure(s)",
            self.passes,
            report.switched.len(),
            report.failures
        );
        report
    }

    /// Steps 3/4 of a pass for one role
    async fn apply_preference(&mut self, role: Role, report: &mut PassReport) {
        let Some(preferred) = self.preferences.get(role).map(str::to_string) else {
            return;
        };

        let devices = match self.gateway.list_devices(role).await {
            Ok(devices) => devices,
            Err(e) => {
                report.failures += 1;
                self.report(&format!("Could not list {} devices: {e:#}", role));
                return;
            }
        };

        for device in devices.iter().filter(|d| d.description == preferred) {
            match self.gateway.set_default(device).await {
                Ok(()) => {
                    info!("Default {} -> {}", role, device.description);
                    self.presenter.show_switch(device);
                    report.switched.push(device.clone());
                }
                Err(e) => {
                    report.failures += 1;
                    self.report(&format!("{e:#}"));
                }
            }
        }
    }

    fn report(&mut self, message: &str) {
        warn!("{}", message);
        self.presenter.warn(message);
    }
}

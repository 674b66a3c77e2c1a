//! Configuration management
//!
//! Handles loading, parsing, and validating the TOML configuration file.
//! The user's device preferences are not stored here; see `preferences`.

use color_eyre::eyre::{self, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::preferences::PreferenceStore;

/// Longest accepted `command_timeout_ms`
const MAX_COMMAND_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// Public Configuration Types
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    /// Desktop notification when a preferred device is made default
    pub notify_switch: bool,
    /// Desktop notification for non-fatal failures (pactl errors, save errors)
    pub notify_warnings: bool,
    /// Upper bound for a single `pactl` call
    pub command_timeout_ms: u64,
    /// udev subsystem whose events trigger a reconciliation pass
    pub subsystem: String,
    /// Override for the preference file location
    pub preferences_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let file = SettingsFile::default();
        Self {
            log_level: file.log_level,
            notify_switch: file.notify_switch,
            notify_warnings: file.notify_warnings,
            command_timeout_ms: file.command_timeout_ms,
            subsystem: file.subsystem,
            preferences_file: file.preferences_file,
        }
    }
}

// ============================================================================
// Config File Deserialization (TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: SettingsFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_true")]
    notify_switch: bool,
    #[serde(default = "default_true")]
    notify_warnings: bool,
    #[serde(default = "default_command_timeout_ms")]
    command_timeout_ms: u64,
    #[serde(default = "default_subsystem")]
    subsystem: String,
    #[serde(default)]
    preferences_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_subsystem() -> String {
    "usb".to_string()
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            notify_switch: true,
            notify_warnings: true,
            command_timeout_ms: default_command_timeout_ms(),
            subsystem: default_subsystem(),
            preferences_file: None,
        }
    }
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration from the default XDG config path, creating it on first run
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, read, parsed, or validated.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Creating default config at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from an explicit path
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config: {path:?}"))?;

        let config_file: ConfigFile = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config: {path:?}"))?;

        Self::from_config_file(config_file)
    }

    fn from_config_file(config_file: ConfigFile) -> Result<Self> {
        let file = config_file.settings;
        let settings = Settings {
            log_level: file.log_level,
            notify_switch: file.notify_switch,
            notify_warnings: file.notify_warnings,
            command_timeout_ms: file.command_timeout_ms,
            subsystem: file.subsystem.trim().to_string(),
            preferences_file: file.preferences_file,
        };

        let config = Config { settings };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.settings.log_level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            level => eyre::bail!(
                "Invalid log_level '{level}'. Must be: error, warn, info, debug, or trace"
            ),
        }

        if self.settings.command_timeout_ms == 0
            || self.settings.command_timeout_ms > MAX_COMMAND_TIMEOUT_MS
        {
            eyre::bail!(
                "Invalid command_timeout_ms {}. Must be between 1 and {MAX_COMMAND_TIMEOUT_MS}",
                self.settings.command_timeout_ms
            );
        }

        if self.settings.subsystem.is_empty() {
            eyre::bail!("subsystem must not be empty (use \"usb\" to watch USB hotplug)");
        }

        Ok(())
    }

    /// Get the XDG config path for plugsw
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined or created.
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre::eyre!("Could not determine config directory"))?
            .join("plugsw");
        fs::create_dir_all(&config_dir)
            .wrap_err_with(|| format!("Failed to create config dir: {config_dir:?}"))?;
        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<()> {
        let default_config = r#"# plugsw (Plug Switcher) Configuration
#
# Keeps your preferred output and input devices as the system default
# whenever USB audio hardware is plugged or unplugged.
#
# Preferred devices are chosen with 'plugsw set-output' / 'plugsw set-input'
# and stored separately (preferences.json next to this file).

[settings]
log_level = "info"          # error, warn, info, debug, trace
notify_switch = true        # Notify when a preferred device is made default
notify_warnings = true      # Notify when pactl fails or preferences cannot be saved
command_timeout_ms = 2000   # Upper bound for each pactl call
subsystem = "usb"           # udev subsystem that triggers a re-check

# preferences_file = "/home/me/.local/share/plugsw/preferences.json"
"#;
        fs::write(path, default_config)
            .wrap_err_with(|| format!("Failed to write config: {path:?}"))?;

        eprintln!("Created default config at: {path:?}");
        eprintln!();
        eprintln!("Next steps:");
        eprintln!("  1. Run 'plugsw list-devices' to see available outputs and inputs");
        eprintln!("  2. Run 'plugsw daemon' to start");
        eprintln!("  3. Pick devices with 'plugsw set-output' and 'plugsw set-input'");
        eprintln!();

        Ok(())
    }

    /// Timeout applied to every `pactl` invocation
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.command_timeout_ms)
    }

    /// Preference store at the configured or default location
    ///
    /// # Errors
    /// Returns an error if no override is set and the config directory is unknown.
    pub fn preference_store(&self) -> Result<PreferenceStore> {
        let path = match &self.settings.preferences_file {
            Some(path) => path.clone(),
            None => PreferenceStore::default_path()?,
        };
        Ok(PreferenceStore::new(path))
    }

    /// Print a human-readable summary of the configuration
    pub fn print_summary(&self) {
        println!("✓ Configuration valid\n");

        println!("Settings:");
        println!("  log_level: {}", self.settings.log_level);
        println!("  notify_switch: {}", self.settings.notify_switch);
        println!("  notify_warnings: {}", self.settings.notify_warnings);
        println!("  command_timeout_ms: {}", self.settings.command_timeout_ms);
        println!("  subsystem: {}", self.settings.subsystem);

        match self.preference_store() {
            Ok(store) => {
                let state = store.load();
                println!("\nPreferences ({}):", store.path().display());
                println!(
                    "  output: {}",
                    state.preferred_output.as_deref().unwrap_or("(none)")
                );
                println!(
                    "  input: {}",
                    state.preferred_source.as_deref().unwrap_or("(none)")
                );
            }
            Err(e) => println!("\nPreferences: unavailable ({e})"),
        }

        if let Ok(path) = Self::get_config_path() {
            println!("\nConfig: {path:?}");
        }
    }
}

//! Preference persistence
//!
//! Stores the user's preferred output and input descriptions in a small JSON
//! file. Loading never fails: a missing or damaged file simply means no
//! preference is set. Saving replaces the file atomically.

use color_eyre::eyre::{self, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::pulse::Role;

/// Keys that must be present in every preference file
const REQUIRED_KEYS: [&str; 2] = ["preferred_output", "preferred_source"];

/// On-disk preference record
///
/// Both keys are always written, `null` meaning no preference for that role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub preferred_output: Option<String>,
    pub preferred_source: Option<String>,
}

impl PersistedState {
    /// Preferred description for `role`, if any
    #[must_use]
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Output => self.preferred_output.as_deref(),
            Role::Source => self.preferred_source.as_deref(),
        }
    }

    /// Blank descriptions are stored as no preference
    pub fn set(&mut self, role: Role, description: Option<String>) {
        let description = non_blank(description);
        match role {
            Role::Output => self.preferred_output = description,
            Role::Source => self.preferred_source = description,
        }
    }

    /// Parse a preference file, rejecting records that lack either key
    ///
    /// # Errors
    /// Returns an error for invalid JSON, a non-object document, a missing key,
    /// or a value that is neither a string nor `null`.
    pub fn from_json(contents: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(contents).wrap_err("Preference file is not valid JSON")?;

        for key in REQUIRED_KEYS {
            if value.get(key).is_none() {
                eyre::bail!("Preference file is missing '{key}'");
            }
        }

        let state: Self =
            serde_json::from_value(value).wrap_err("Preference file has invalid values")?;
        Ok(Self {
            preferred_output: non_blank(state.preferred_output),
            preferred_source: non_blank(state.preferred_source),
        })
    }
}

fn non_blank(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

/// File-backed store for `PersistedState`
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `$XDG_CONFIG_HOME/plugsw/preferences.json`
    ///
    /// # Errors
    /// Returns an error if the user's config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| eyre::eyre!("Could not determine config directory"))?;
        Ok(config_dir.join("plugsw").join("preferences.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the preference file
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable, or malformed.
    pub fn try_load(&self) -> Result<PersistedState> {
        let contents = std::fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read preferences: {}", self.path.display()))?;
        PersistedState::from_json(&contents)
            .wrap_err_with(|| format!("Failed to parse preferences: {}", self.path.display()))
    }

    /// Load preferences, falling back to "no preference" on any failure
    #[must_use]
    pub fn load(&self) -> PersistedState {
        match self.try_load() {
            Ok(state) => {
                debug!("Loaded preferences from {}", self.path.display());
                state
            }
            Err(e) if !self.path.exists() => {
                info!("No saved preferences at {} ({e})", self.path.display());
                PersistedState::default()
            }
            Err(e) => {
                warn!("Ignoring unusable preference file: {:#}", e);
                PersistedState::default()
            }
        }
    }

    /// Write preferences atomically (temp file in the same directory, then rename)
    ///
    /// Readers see either the previous or the new contents, never a partial file.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create preference dir: {}", dir.display()))?;

        let json = serde_json::to_vec_pretty(state).wrap_err("Failed to serialize preferences")?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .wrap_err_with(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp.write_all(&json)
            .wrap_err("Failed to write preferences")?;
        temp.write_all(b"\n")
            .wrap_err("Failed to write preferences")?;
        temp.as_file()
            .sync_all()
            .wrap_err("Failed to flush preferences to disk")?;
        temp.persist(&self.path)
            .wrap_err_with(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

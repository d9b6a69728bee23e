//! Persisted settings: the provider API key.
//!
//! Stored as `settings.json` in the per-user config directory:
//!
//! 1. `BILLDESK_CONFIG_DIR`, if set
//! 2. `$XDG_CONFIG_HOME/Billing`
//! 3. `$HOME/.config/Billing` (`%APPDATA%\Billing` on Windows)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::provider::{InvalidApiKeyError, validate_api_key};

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "Billing";

/// Errors reading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Could not determine a config directory (set BILLDESK_CONFIG_DIR or HOME)")]
    ConfigDir,

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    InvalidApiKey(#[from] InvalidApiKeyError),

    #[error("Malformed settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The settings document.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
}

impl Settings {
    /// The API key, if one is set.
    pub fn api_key(&self) -> Option<SecretString> {
        let key = self.api_key.trim();
        (!key.is_empty()).then(|| SecretString::from(key.to_string()))
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key_set", &!self.api_key.is_empty())
            .finish()
    }
}

/// Reads and writes `settings.json` in one directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    /// Store rooted at the per-user config directory.
    pub fn from_env() -> Result<Self, SettingsError> {
        config_dir().map(Self::at).ok_or(SettingsError::ConfigDir)
    }

    /// Store rooted at `dir`.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Load settings. A missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let path = self.path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse { path, source })
    }

    /// Write settings, creating the directory if needed.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let path = self.path();
        let write_err = |source: io::Error| SettingsError::Write {
            path: path.clone(),
            source,
        };

        create_private_dir(&self.dir).map_err(write_err)?;

        let json = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;
        write_private_file(&path, json.as_bytes()).map_err(write_err)?;

        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Replace the stored API key. Malformed keys are rejected and nothing is written.
    pub fn set_api_key(&self, api_key: &str) -> Result<Settings, SettingsError> {
        let api_key = api_key.trim();
        validate_api_key(api_key)?;

        let settings = Settings {
            api_key: api_key.to_string(),
        };
        self.save(&settings)?;
        Ok(settings)
    }
}

fn config_dir() -> Option<PathBuf> {
    let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty());

    if let Some(dir) = non_empty("BILLDESK_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }
    if cfg!(windows) {
        return non_empty("APPDATA").map(|d| PathBuf::from(d).join(APP_DIR));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }
    non_empty("HOME").map(|home| PathBuf::from(home).join(".config").join(APP_DIR))
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::write(path, contents)
}

// src/settings.rs
use crate::error::{SettingsError, SettingsResult};
use crate::lock::Pin;
use crate::observable::{Cell, Mapped, Watch};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The durable app-lock settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub app_lock_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_lock_pin: Option<String>,
}

/// Key-value store the settings live in.
pub trait PreferenceBackend: Send + Sync {
    fn read(&self) -> SettingsResult<Preferences>;

    fn write(&self, preferences: &Preferences) -> SettingsResult<()>;
}

/// Preferences kept in a small TOML file.
#[derive(Debug, Clone)]
pub struct TomlPreferences {
    path: PathBuf,
}

impl TomlPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TomlPreferences { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceBackend for TomlPreferences {
    fn read(&self) -> SettingsResult<Preferences> {
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| SettingsError::Parse(format!("{:?}: {}", self.path, e)))
    }

    fn write(&self, preferences: &Preferences) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!("Created settings directory: {:?}", parent);
            }
        }
        let toml_string = toml::to_string_pretty(preferences)
            .map_err(|e| SettingsError::Serialization(e.to_string()))?;

        // Stage and rename so an interrupted write never leaves a truncated file.
        let staging = self.path.with_extension("toml.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)
            .map_err(|e| {
                warn!("Failed to open {:?} for writing: {}", staging, e);
                SettingsError::Io(e)
            })?;
        file.write_all(toml_string.as_bytes())?;
        file.sync_all()?;
        fs::rename(&staging, &self.path).map_err(|e| {
            warn!("Failed to move {:?} into place: {}", staging, e);
            SettingsError::Io(e)
        })?;
        Ok(())
    }
}

/// Preferences that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    inner: Mutex<Preferences>,
}

impl MemoryPreferences {
    pub fn new(preferences: Preferences) -> Self {
        MemoryPreferences {
            inner: Mutex::new(preferences),
        }
    }
}

impl PreferenceBackend for MemoryPreferences {
    fn read(&self) -> SettingsResult<Preferences> {
        self.inner
            .lock()
            .map(|p| p.clone())
            .map_err(|e| SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
    }

    fn write(&self, preferences: &Preferences) -> SettingsResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        *inner = preferences.clone();
        Ok(())
    }
}

/// Reads the backend; an I/O failure yields the defaults, anything else is returned.
fn read_or_default(backend: &dyn PreferenceBackend) -> SettingsResult<Preferences> {
    match backend.read() {
        Ok(preferences) => Ok(preferences),
        Err(SettingsError::Io(e)) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!("No settings stored yet, using defaults");
            } else {
                warn!("Failed to read settings: {}. Using defaults.", e);
            }
            Ok(Preferences::default())
        }
        Err(e) => Err(e),
    }
}

/// Live access to the app-lock settings.
pub struct SettingsStore {
    backend: Arc<dyn PreferenceBackend>,
    preferences: Cell<Preferences>,
    write_lock: tokio::sync::Mutex<()>,
}

impl SettingsStore {
    pub async fn open(backend: Arc<dyn PreferenceBackend>) -> SettingsResult<Self> {
        let preferences = read_blocking(Arc::clone(&backend)).await?;
        info!("Settings loaded (app lock enabled: {})", preferences.app_lock_enabled);
        Ok(SettingsStore {
            backend,
            preferences: Cell::new(preferences),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn preferences(&self) -> Watch<Preferences> {
        self.preferences.subscribe()
    }

    pub fn app_lock_enabled(&self) -> Mapped<Preferences, bool> {
        self.preferences.subscribe().map(|p| p.app_lock_enabled)
    }

    pub fn app_lock_pin(&self) -> Mapped<Preferences, Option<String>> {
        self.preferences.subscribe().map(|p| p.app_lock_pin.clone())
    }

    pub async fn set_app_lock_enabled(&self, enabled: bool) -> SettingsResult<()> {
        self.edit(move |p| p.app_lock_enabled = enabled).await?;
        info!("App lock {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn set_app_lock_pin(&self, pin: &Pin) -> SettingsResult<()> {
        let pin = pin.as_str().to_string();
        self.edit(move |p| p.app_lock_pin = Some(pin)).await?;
        info!("App lock PIN updated");
        Ok(())
    }

    /// Re-reads the backend and publishes what it holds now.
    pub async fn reload(&self) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        let preferences = read_blocking(Arc::clone(&self.backend)).await?;
        self.preferences.set(preferences);
        Ok(())
    }

    async fn edit(&self, change: impl FnOnce(&mut Preferences)) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.preferences.get();
        change(&mut next);

        let backend = Arc::clone(&self.backend);
        let staged = next.clone();
        tokio::task::spawn_blocking(move || backend.write(&staged))
            .await
            .map_err(|e| SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))??;

        self.preferences.set(next);
        Ok(())
    }
}

async fn read_blocking(backend: Arc<dyn PreferenceBackend>) -> SettingsResult<Preferences> {
    tokio::task::spawn_blocking(move || read_or_default(backend.as_ref()))
        .await
        .map_err(|e| SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
}

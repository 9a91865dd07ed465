// src/config.rs
use crate::generator::PasswordCriteria;
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "acctkeep_config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GeneratorDefaults {
    pub length: usize,
    pub include_symbols: bool,
}

impl Default for GeneratorDefaults {
    fn default() -> Self {
        let criteria = PasswordCriteria::default();
        GeneratorDefaults {
            length: criteria.length,
            include_symbols: criteria.include_symbols,
        }
    }
}

impl GeneratorDefaults {
    pub fn criteria(&self) -> PasswordCriteria {
        PasswordCriteria {
            length: self.length,
            include_symbols: self.include_symbols,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Overrides the platform data directory when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub database_file: String,
    pub settings_file: String,
    #[serde(default)]
    pub generator: GeneratorDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            database_file: "accounts.db".to_string(),
            settings_file: "settings.toml".to_string(),
            generator: GeneratorDefaults::default(),
        }
    }
}

impl Config {
    fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(&self.database_file)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir().join(&self.settings_file)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "Acctkeep", "Acctkeep")
}

fn get_config_path() -> Option<PathBuf> {
    project_dirs().map(|proj_dirs| proj_dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn save_default_config(config_path: &Path, config: &Config) -> Result<(), String> {
    info!("Attempting to save default config to {:?}", config_path);
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)
                .map_err(|e| format!("Failed to create config directory {:?}: {}", parent_dir, e))?;
            info!("Created config directory: {:?}", parent_dir);
        }
    }

    let toml_string = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize default config to TOML: {}", e))?;

    let mut file = fs::File::create(config_path)
        .map_err(|e| format!("Failed to create default config file {:?}: {}", config_path, e))?;

    file.write_all(toml_string.as_bytes())
        .map_err(|e| format!("Failed to write default config to {:?}: {}", config_path, e))?;

    info!("Saved default configuration to {:?}", config_path);
    Ok(())
}

/// Reads the config at `config_path`, writing a default one if none exists.
/// Never fails: any problem is logged and the defaults are used.
pub fn load_config_from(config_path: &Path) -> Config {
    if !config_path.exists() {
        info!(
            "Config file not found at {:?}. Creating and using default configuration.",
            config_path
        );
        let default_config = Config::default();
        if let Err(e) = save_default_config(config_path, &default_config) {
            warn!("Failed to save default configuration: {}", e);
        }
        return default_config;
    }

    info!("Loading configuration from {:?}", config_path);
    match fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(loaded_config) => {
                info!("Configuration loaded successfully.");
                loaded_config
            }
            Err(e) => {
                warn!(
                    "Failed to parse config file at {:?}: {}. Using default configuration.",
                    config_path, e
                );
                Config::default()
            }
        },
        Err(e) => {
            warn!(
                "Failed to read config file at {:?}: {}. Using default configuration.",
                config_path, e
            );
            Config::default()
        }
    }
}

pub fn load_config() -> Config {
    match get_config_path() {
        Some(config_path) => load_config_from(&config_path),
        None => {
            warn!("Could not determine config directory. Using default configuration.");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_file, "accounts.db");
        assert_eq!(config.generator.length, 12);
        assert!(!config.generator.include_symbols);
    }

    #[test]
    fn test_missing_config_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = load_config_from(&config_path);
        assert_eq!(config, Config::default());
        assert!(config_path.exists());

        let reloaded = load_config_from(&config_path);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_toml_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("invalid_config.toml");
        fs::write(&config_path, "this is not valid toml content = definitely_broken").unwrap();

        assert_eq!(load_config_from(&config_path), Config::default());
    }

    #[test]
    fn test_partial_config_fills_generator_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("partial_config.toml");
        let partial = r#"
data_dir = "/tmp/acctkeep-test"
database_file = "vault.db"
settings_file = "prefs.toml"
"#;
        fs::write(&config_path, partial).unwrap();

        let config = load_config_from(&config_path);
        assert_eq!(config.generator, GeneratorDefaults::default());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/acctkeep-test/vault.db"));
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/acctkeep-test/prefs.toml"));
    }

    #[test]
    fn test_missing_mandatory_field_falls_back() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("no_db.toml");
        fs::write(&config_path, "settings_file = \"prefs.toml\"\n").unwrap();

        let config = load_config_from(&config_path);
        assert_eq!(config.settings_file, Config::default().settings_file);
    }
}

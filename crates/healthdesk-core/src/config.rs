use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const MIN_RECORD_SECONDS: u32 = 3;
pub const MAX_RECORD_SECONDS: u32 = 12;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub default_model: Option<String>,
    pub language: Option<String>,
    pub record_seconds: Option<u32>,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            gemini_api_key: None,
            default_model: None,
            language: Some("en".to_string()),
            record_seconds: Some(5),
            data_dir: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_api_key(key: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.gemini_api_key = Some(key.trim().to_string());
        config.save()
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    /// API key from `GOOGLE_API_KEY`, then `GEMINI_API_KEY`, then the config file.
    pub fn api_key(&self) -> Option<String> {
        ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .chain(self.gemini_api_key.clone())
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())
    }

    /// Returns where the API key comes from: "env", "config", or None
    pub fn key_source(&self) -> Option<&'static str> {
        let from_env = ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .any(|var| std::env::var(var).map(|k| !k.trim().is_empty()).unwrap_or(false));
        if from_env {
            Some("env")
        } else if self.gemini_api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false) {
            Some("config")
        } else {
            None
        }
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn record_seconds(&self) -> u32 {
        self.record_seconds
            .unwrap_or(5)
            .clamp(MIN_RECORD_SECONDS, MAX_RECORD_SECONDS)
    }

    /// Resolve the data directory: explicit override, then config, then the platform data dir.
    pub fn resolve_data_dir(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = cli_override {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("healthdesk"))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("healthdesk").join("config.json"))
    }
}

/// Layout of files under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("app_data.db")
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn exports(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("healthdesk.log")
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.uploads())?;
        fs::create_dir_all(self.exports())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.record_seconds(), 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::new();
        config.default_model = Some("gemini-2.5-flash".to_string());
        config.record_seconds = Some(40);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.model(), "gemini-2.5-flash");
        assert_eq!(loaded.record_seconds(), MAX_RECORD_SECONDS);
    }

    #[test]
    fn test_data_dir_override_wins() {
        let mut config = Config::new();
        config.data_dir = Some(PathBuf::from("/from/config"));
        let dir = config.resolve_data_dir(Some(Path::new("/from/cli"))).unwrap();
        assert_eq!(dir, PathBuf::from("/from/cli"));
        assert_eq!(config.resolve_data_dir(None).unwrap(), PathBuf::from("/from/config"));
    }

    #[test]
    fn test_data_paths_ensure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        paths.ensure().unwrap();
        assert!(paths.uploads().is_dir());
        assert!(paths.exports().is_dir());
        assert_eq!(paths.database().file_name().unwrap(), "app_data.db");
    }
}

use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use log::info;
use serde_json;

use crate::config::types::Config;
use crate::error::ConfigError;

// creates a path to rockctl.json in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rockctl").map(|dirs| {
        dirs.config_dir().join("rockctl.json")
    })
}

pub fn get_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    get_local_config_path().ok_or(ConfigError::NoConfigPath)
}

pub async fn read_config(path: &Path) -> Result<Config, ConfigError> {
    info!("Reading config file {}", path.to_string_lossy());
    let content = tokio::fs::read(path).await?;

    if content.is_empty() {
        return Ok(Config::default());
    }

    let content = str::from_utf8(&content)?;
    let config: Config = serde_json::from_str(content)?;
    config.validate()?;

    Ok(config)
}

/// Reads the config file, a missing file results in the default config.
pub async fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = get_config_path(explicit)?;

    match read_config(&path).await {
        Ok(config) => Ok(config),
        Err(err) if err.is_file_not_found_error() => {
            info!("Config file not found, using defaults");
            Ok(Config::default())
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.json"))).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rockctl.json");
        std::fs::write(&path, r#"{"livenessIntervalMs": 250}"#).unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.liveness_interval_ms, 250);
    }

    #[tokio::test]
    async fn empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rockctl.json");
        std::fs::write(&path, "").unwrap();

        assert_eq!(load_config(Some(&path)).await.unwrap(), Config::default());
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rockctl.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_config(Some(&path)).await, Err(ConfigError::JsonError { .. })));
    }

    #[tokio::test]
    async fn zero_interval_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rockctl.json");
        std::fs::write(&path, r#"{"livenessIntervalMs": 0}"#).unwrap();

        let result = load_config(Some(&path)).await;
        assert!(matches!(result, Err(ConfigError::ZeroTiming { field: "livenessIntervalMs" })));
    }
}

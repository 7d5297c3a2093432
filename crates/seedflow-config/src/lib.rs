pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{
    BuildWorkerSettings, DeploySettings, ENCRYPTION_KEY_ENV, PathSettings, Settings, ToolSettings,
};

use std::path::PathBuf;

/// Points at a settings file directly
pub const CONFIG_PATH_ENV: &str = "SEEDFLOW_CONFIG";

const CANDIDATES: [&str; 2] = ["seedflow.local.yaml", "seedflow.yaml"];

/// seedflow's per-user configuration directory, created on demand
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("seedflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locates `seedflow.yaml`
///
/// Search order:
/// 1. `SEEDFLOW_CONFIG` (direct path)
/// 2. current directory: seedflow.local.yaml, seedflow.yaml
/// 3. `./.seedflow/`, same order
/// 4. `~/.config/seedflow/seedflow.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".seedflow");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("seedflow").join("seedflow.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("seedflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("seedflow.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("seedflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("seedflow.yaml"), "{}").unwrap();
        fs::write(temp_dir.path().join("seedflow.local.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("seedflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_dot_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dot_dir = temp_dir.path().join(".seedflow");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join("seedflow.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with(".seedflow/seedflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "{}").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        let result = find_settings_file();

        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_find_settings_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();

        std::env::set_current_dir(original_dir).unwrap();
        // a global ~/.config/seedflow/seedflow.yaml on the test machine would be found instead
        let global_exists = dirs::config_dir()
            .map(|d| d.join("seedflow").join("seedflow.yaml").exists())
            .unwrap_or(false);
        if !global_exists {
            assert!(matches!(result, Err(ConfigError::SettingsFileNotFound)));
        }
    }
}

//! Daemon settings read from `seedflow.yaml`

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `encryption_key` from the file
pub const ENCRYPTION_KEY_ENV: &str = "SEEDFLOW_ENCRYPTION_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tool: ToolSettings,
    pub paths: PathSettings,
    pub deploy: DeploySettings,
    pub build_worker: BuildWorkerSettings,
    /// Base64 of 32 random bytes
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub binary: String,
    /// One subdirectory per component
    pub modules_dir: PathBuf,
    pub plugin_dir: Option<PathBuf>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            binary: "terraform".into(),
            modules_dir: PathBuf::from("modules"),
            plugin_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub exec_logs_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub ssh_keys_dir: PathBuf,
    pub store_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            exec_logs_dir: PathBuf::from("exec_logs"),
            plans_dir: PathBuf::from("plans"),
            ssh_keys_dir: PathBuf::from("ssh_keys"),
            store_file: PathBuf::from("seedflow-state.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            timeout_secs: 1800,
        }
    }
}

impl DeploySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildWorkerSettings {
    pub ami: String,
    pub spot_max_price: String,
    /// How long a launched worker may keep building
    pub valid_for_minutes: i64,
}

impl Default for BuildWorkerSettings {
    fn default() -> Self {
        Self {
            ami: "ami-0cef0a0c24a179fb3".into(),
            spot_max_price: "0.1".into(),
            valid_for_minutes: 5,
        }
    }
}

impl Settings {
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&text, path)?;
        settings.resolve_relative_to(path.parent().unwrap_or(Path::new(".")));
        Ok(settings)
    }

    /// Loads the first file [`crate::find_settings_file`] turns up
    pub fn discover() -> Result<(PathBuf, Self)> {
        let path = crate::find_settings_file()?;
        let settings = Self::load(&path)?;
        Ok((path, settings))
    }

    /// The environment variable wins over the file
    pub fn encryption_key(&self) -> Option<String> {
        std::env::var(ENCRYPTION_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.encryption_key.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.tool.binary.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "tool.binary",
                reason: "must not be empty".into(),
            });
        }
        if self.deploy.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "deploy.poll_interval_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.deploy.timeout_secs < self.deploy.poll_interval_secs {
            return Err(ConfigError::Invalid {
                key: "deploy.timeout_secs",
                reason: "must not be shorter than the poll interval".into(),
            });
        }
        if self.build_worker.valid_for_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "build_worker.valid_for_minutes",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Relative paths are anchored at the settings file's directory
    fn resolve_relative_to(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.tool.modules_dir);
        if let Some(dir) = self.tool.plugin_dir.as_mut() {
            anchor(dir);
        }
        anchor(&mut self.paths.exec_logs_dir);
        anchor(&mut self.paths.plans_dir);
        anchor(&mut self.paths.ssh_keys_dir);
        anchor(&mut self.paths.store_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = Settings::from_yaml("{}", Path::new("seedflow.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.tool.binary, "terraform");
        assert_eq!(settings.deploy.timeout(), Duration::from_secs(1800));
        assert_eq!(settings.build_worker.spot_max_price, "0.1");
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
tool:
  binary: /usr/local/bin/terraform
deploy:
  timeout_secs: 600
"#;
        let settings = Settings::from_yaml(yaml, Path::new("seedflow.yaml")).unwrap();
        assert_eq!(settings.tool.binary, "/usr/local/bin/terraform");
        assert_eq!(settings.tool.modules_dir, PathBuf::from("modules"));
        assert_eq!(settings.deploy.poll_interval_secs, 1);
        assert_eq!(settings.deploy.timeout_secs, 600);
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = Settings::from_yaml("deploy:\n  poll_interval_secs: 0\n", Path::new("x.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "deploy.poll_interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Settings::from_yaml("tool: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_load_anchors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seedflow.yaml");
        std::fs::write(&path, "paths:\n  plans_dir: out/plans\n  store_file: /var/lib/seedflow.json\n")
            .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.paths.plans_dir, dir.path().join("out/plans"));
        assert_eq!(settings.paths.store_file, PathBuf::from("/var/lib/seedflow.json"));
        assert_eq!(settings.tool.modules_dir, dir.path().join("modules"));
    }

    #[test]
    #[serial]
    fn test_encryption_key_env_override() {
        let settings = Settings {
            encryption_key: Some("from-file".into()),
            ..Default::default()
        };

        unsafe {
            std::env::remove_var(ENCRYPTION_KEY_ENV);
        }
        assert_eq!(settings.encryption_key().as_deref(), Some("from-file"));

        unsafe {
            std::env::set_var(ENCRYPTION_KEY_ENV, "from-env");
        }
        assert_eq!(settings.encryption_key().as_deref(), Some("from-env"));

        unsafe {
            std::env::remove_var(ENCRYPTION_KEY_ENV);
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "configuration file not found. Looked in:\n\
        - the current directory: seedflow.local.yaml, seedflow.yaml\n\
        - the ./.seedflow/ directory\n\
        - ~/.config/seedflow/seedflow.yaml\n\
        Set SEEDFLOW_CONFIG to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

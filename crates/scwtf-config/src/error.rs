use scwtf_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {attribute}: {message}")]
    Invalid {
        attribute: &'static str,
        message: String,
    },

    #[error("Profile {name:?} not found in {}", .path.display())]
    ProfileNotFound { name: String, path: PathBuf },

    #[error("Cannot parse config file {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl ConfigError {
    pub fn invalid(attribute: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            attribute,
            message: message.into(),
        }
    }
}

impl From<ConfigError> for CloudError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { attribute, message } => {
                CloudError::validation(attribute, message)
            }
            ConfigError::Cloud(inner) => inner,
            ConfigError::Io(io) => CloudError::Io(io),
            other => CloudError::Validation {
                attribute: None,
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

use scwtf_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Cassette not found: {}", .0.display())]
    CassetteNotFound(PathBuf),

    #[error("No recorded interaction matches {method} {url}")]
    NoMatch { method: String, url: String },

    #[error("Cannot parse cassette {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Record mode needs a live transport")]
    NoLiveTransport,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

// Recorder failures are never worth retrying: they surface as fatal IO errors.
impl From<RecorderError> for CloudError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::Cloud(inner) => inner,
            RecorderError::Io(io) => CloudError::Io(io),
            other => CloudError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;

//! Cassette files: recorded interactions of one test, stored as YAML

use crate::error::{RecorderError, Result};
use scwtf_cloud::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory cassettes live in, relative to the crate under test
pub const CASSETTE_DIR: &str = "testdata";

const CASSETTE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub request: HttpRequest,
    pub response: HttpResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cassette {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

fn default_version() -> u32 {
    CASSETTE_VERSION
}

impl Default for Cassette {
    fn default() -> Self {
        Self {
            version: CASSETTE_VERSION,
            interactions: Vec::new(),
        }
    }
}

impl Cassette {
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self {
            interactions,
            ..Default::default()
        }
    }

    pub fn push(&mut self, request: HttpRequest, response: HttpResponse) {
        self.interactions.push(Interaction { request, response });
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RecorderError::CassetteNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let cassette: Cassette =
            serde_yaml::from_str(&content).map_err(|source| RecorderError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            path = %path.display(),
            interactions = cassette.interactions.len(),
            "Loaded cassette"
        );
        Ok(cassette)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self).map_err(|source| RecorderError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), interactions = self.interactions.len(), "Saved cassette");
        Ok(())
    }
}

/// `testdata/<test-name>.cassette`, with path separators in the name flattened
pub fn cassette_path(test_name: &str) -> PathBuf {
    let name = test_name.replace("::", "-").replace(['/', '\\'], "-");
    Path::new(CASSETTE_DIR).join(format!("{name}.cassette"))
}

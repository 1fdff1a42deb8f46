//! CLI profile file (`config.yaml`)
//!
//! ```yaml
//! access_key: SCWXXXXXXXXXXXXXXXXX
//! secret_key: 11111111-1111-1111-1111-111111111111
//! default_region: fr-par
//! active_profile: staging
//! profiles:
//!   staging:
//!     default_region: nl-ams
//! ```
//!
//! Top-level keys form the default profile; a named profile overrides it
//! field by field.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "SCW_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub default_organization_id: Option<String>,
    #[serde(default)]
    pub default_project_id: Option<String>,
    #[serde(default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub default_zone: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Profile {
    /// `other` wins wherever it sets a field
    pub fn overridden_by(self, other: Profile) -> Profile {
        Profile {
            access_key: other.access_key.or(self.access_key),
            secret_key: other.secret_key.or(self.secret_key),
            default_organization_id: other.default_organization_id.or(self.default_organization_id),
            default_project_id: other.default_project_id.or(self.default_project_id),
            default_region: other.default_region.or(self.default_region),
            default_zone: other.default_zone.or(self.default_zone),
            api_url: other.api_url.or(self.api_url),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub default: Profile,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
    #[serde(skip)]
    pub path: PathBuf,
}

impl ConfigFile {
    /// Resolve a profile: the requested name, else `active_profile`, else the top level
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let Some(name) = name.or(self.active_profile.as_deref()) else {
            return Ok(self.default.clone());
        };
        match self.profiles.get(name) {
            Some(named) => Ok(self.default.clone().overridden_by(named.clone())),
            None => Err(ConfigError::ProfileNotFound {
                name: name.to_string(),
                path: self.path.clone(),
            }),
        }
    }
}

/// Location of the config file: `SCW_CONFIG_PATH`, then
/// `$XDG_CONFIG_HOME/scw/config.yaml`, then `~/.config/scw/config.yaml`
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(xdg).join("scw").join("config.yaml"));
    }
    dirs::home_dir().map(|home| home.join(".config").join("scw").join("config.yaml"))
}

/// Load the config file; a missing file is not an error
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Some(ConfigFile {
            path: path.to_path_buf(),
            ..Default::default()
        }));
    }
    let mut file: ConfigFile = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    file.path = path.to_path_buf();
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const CONFIG: &str = r#"
access_key: SCWTOPLEVEL000000000
secret_key: 11111111-1111-1111-1111-111111111111
default_region: fr-par
default_zone: fr-par-2
active_profile: staging
profiles:
  staging:
    default_region: nl-ams
    default_zone: nl-ams-1
  prod:
    access_key: SCWPROD0000000000000
"#;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_active_profile_overrides_top_level() {
        let (_dir, path) = write_config(CONFIG);
        let file = load_config_file(&path).unwrap().unwrap();

        let active = file.profile(None).unwrap();
        assert_eq!(active.default_region.as_deref(), Some("nl-ams"));
        assert_eq!(active.access_key.as_deref(), Some("SCWTOPLEVEL000000000"));

        let prod = file.profile(Some("prod")).unwrap();
        assert_eq!(prod.access_key.as_deref(), Some("SCWPROD0000000000000"));
        assert_eq!(prod.default_zone.as_deref(), Some("fr-par-2"));
    }

    #[test]
    fn test_unknown_profile() {
        let (_dir, path) = write_config(CONFIG);
        let file = load_config_file(&path).unwrap().unwrap();
        assert!(matches!(
            file.profile(Some("nope")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(&dir.path().join("absent.yaml")).unwrap().is_none());

        let (_dir, path) = write_config("profiles: [not, a, map]");
        assert!(matches!(load_config_file(&path), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    #[serial]
    fn test_config_path_resolution() {
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, Some("/tmp/explicit.yaml")),
                ("XDG_CONFIG_HOME", Some("/tmp/xdg")),
            ],
            || assert_eq!(config_path(), Some(PathBuf::from("/tmp/explicit.yaml"))),
        );
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, None),
                ("XDG_CONFIG_HOME", Some("/tmp/xdg")),
            ],
            || {
                assert_eq!(
                    config_path(),
                    Some(PathBuf::from("/tmp/xdg/scw/config.yaml"))
                )
            },
        );
    }
}

//! Provider-wide configuration
//!
//! [`Meta`] is built once when the host configures the provider and is then
//! shared, read-only, by every callback. Each value is resolved with the
//! precedence: provider arguments, environment, profile file, built-in default.

use crate::args::{HostValue, ProviderArgs};
use crate::error::{ConfigError, Result};
use crate::profile::{self, Profile};
use scwtf_cloud::api::{DEFAULT_API_URL, ScwClient};
use scwtf_cloud::http::{HttpTransport, ReqwestTransport};
use scwtf_cloud::locality::{Region, Zone};
use scwtf_cloud::wait::WaitConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const ENV_ACCESS_KEY: &str = "SCW_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "SCW_SECRET_KEY";
pub const ENV_PROJECT_ID: &str = "SCW_DEFAULT_PROJECT_ID";
pub const ENV_ORGANIZATION_ID: &str = "SCW_DEFAULT_ORGANIZATION_ID";
pub const ENV_REGION: &str = "SCW_DEFAULT_REGION";
pub const ENV_ZONE: &str = "SCW_DEFAULT_ZONE";
pub const ENV_API_URL: &str = "SCW_API_URL";
pub const ENV_PROFILE: &str = "SCW_PROFILE";
pub const ENV_S3_ENDPOINT: &str = "S3_ENDPOINT";
pub const ENV_ENABLE_BETA: &str = "SCW_ENABLE_BETA";

pub const DEFAULT_REGION: Region = Region::FrPar;
pub const DEFAULT_ZONE: Zone = Zone::FrPar1;

/// Knobs that don't come from the provider block
#[derive(Debug, Clone)]
pub struct MetaOptions {
    /// Shared transport; a reqwest transport is created when absent
    pub http: Option<Arc<dyn HttpTransport>>,
    /// Version of the host, reported in the user agent
    pub host_version: String,
    /// Overrides every resource's poll interval (zero in replayed tests)
    pub poll_interval: Option<Duration>,
    pub read_env: bool,
    /// Profile file to use; `None` means the default lookup
    pub config_path: Option<PathBuf>,
    pub read_profile: bool,
}

impl Default for MetaOptions {
    fn default() -> Self {
        Self {
            http: None,
            host_version: "unknown".to_string(),
            poll_interval: None,
            read_env: true,
            config_path: None,
            read_profile: true,
        }
    }
}

impl MetaOptions {
    /// Only the provider arguments count; environment and profile file are ignored
    pub fn isolated(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http: Some(http),
            read_env: false,
            read_profile: false,
            ..Default::default()
        }
    }
}

/// Immutable provider configuration
#[derive(Debug, Clone)]
pub struct Meta {
    access_key: Option<String>,
    secret_key: Option<String>,
    default_project_id: Option<String>,
    default_organization_id: Option<String>,
    default_region: Region,
    default_zone: Zone,
    api_url: String,
    s3_endpoint: Option<String>,
    http: Arc<dyn HttpTransport>,
    user_agent: String,
    enable_beta: bool,
    poll_interval: Option<Duration>,
}

struct Sources {
    read_env: bool,
    profile: Profile,
}

impl Sources {
    fn env(&self, name: &str) -> Option<String> {
        if !self.read_env {
            return None;
        }
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn pick(
        &self,
        arg: &HostValue<String>,
        env: &str,
        from_profile: &Option<String>,
    ) -> Option<String> {
        arg.as_known()
            .cloned()
            .or_else(|| self.env(env))
            .or_else(|| from_profile.clone())
    }
}

impl Meta {
    pub fn build(args: &ProviderArgs, options: MetaOptions) -> Result<Meta> {
        let profile_name = args.profile.as_known().cloned().or_else(|| {
            options
                .read_env
                .then(|| std::env::var(ENV_PROFILE).ok())
                .flatten()
                .filter(|v| !v.is_empty())
        });

        let profile = if options.read_profile {
            load_profile(options.config_path.clone(), profile_name.as_deref())?
        } else {
            Profile::default()
        };

        let src = Sources {
            read_env: options.read_env,
            profile,
        };

        let access_key = src.pick(&args.access_key, ENV_ACCESS_KEY, &src.profile.access_key);
        let secret_key = src.pick(&args.secret_key, ENV_SECRET_KEY, &src.profile.secret_key);
        let default_project_id =
            src.pick(&args.project_id, ENV_PROJECT_ID, &src.profile.default_project_id);
        let default_organization_id = src.pick(
            &args.organization_id,
            ENV_ORGANIZATION_ID,
            &src.profile.default_organization_id,
        );
        let region = src.pick(&args.region, ENV_REGION, &src.profile.default_region);
        let zone = src.pick(&args.zone, ENV_ZONE, &src.profile.default_zone);
        let api_url = src
            .pick(&args.api_url, ENV_API_URL, &src.profile.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if let Some(secret) = &secret_key {
            check_uuid("secret_key", secret)?;
        }
        if let Some(project) = &default_project_id {
            check_uuid("project_id", project)?;
        }
        if let Some(org) = &default_organization_id {
            check_uuid("organization_id", org)?;
        }
        let (default_region, default_zone) = resolve_locality(region.as_deref(), zone.as_deref())?;

        let http = match options.http {
            Some(http) => http,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let enable_beta = src
            .env(ENV_ENABLE_BETA)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        let meta = Meta {
            access_key,
            secret_key,
            default_project_id,
            default_organization_id,
            default_region,
            default_zone,
            api_url,
            s3_endpoint: src.env(ENV_S3_ENDPOINT),
            http,
            user_agent: format!(
                "scwtf/{} terraform/{}",
                env!("CARGO_PKG_VERSION"),
                options.host_version
            ),
            enable_beta,
            poll_interval: options.poll_interval,
        };
        info!(
            region = %meta.default_region,
            zone = %meta.default_zone,
            profile = profile_name.as_deref().unwrap_or("default"),
            beta = meta.enable_beta,
            "Provider configured"
        );
        Ok(meta)
    }

    /// A second configuration sharing this one's transport, with forced
    /// credentials and project
    pub fn side(&self, access_key: &str, secret_key: &str, project_id: &str) -> Meta {
        Meta {
            access_key: Some(access_key.to_string()),
            secret_key: Some(secret_key.to_string()),
            default_project_id: Some(project_id.to_string()),
            ..self.clone()
        }
    }

    pub fn access_key(&self) -> Option<&str> {
        self.access_key.as_deref()
    }

    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    pub fn default_project_id(&self) -> Option<&str> {
        self.default_project_id.as_deref()
    }

    pub fn default_organization_id(&self) -> Option<&str> {
        self.default_organization_id.as_deref()
    }

    pub fn default_region(&self) -> Region {
        self.default_region
    }

    pub fn default_zone(&self) -> Zone {
        self.default_zone
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Explicit object storage endpoint, when `S3_ENDPOINT` is set
    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn http(&self) -> Arc<dyn HttpTransport> {
        self.http.clone()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn enable_beta(&self) -> bool {
        self.enable_beta
    }

    /// API client for one callback
    pub fn client(&self, cancel: &CancellationToken) -> ScwClient {
        ScwClient::new(
            self.http.clone(),
            self.api_url.clone(),
            self.secret_key.clone().unwrap_or_default(),
            self.user_agent.clone(),
        )
        .with_cancel(cancel.clone())
    }

    /// Resource schedule with the configured poll interval applied
    pub fn wait_config(&self, base: WaitConfig) -> WaitConfig {
        match self.poll_interval {
            Some(interval) => base.with_poll_interval(interval).with_backoff(1.0, interval),
            None => base,
        }
    }
}

fn load_profile(explicit: Option<PathBuf>, name: Option<&str>) -> Result<Profile> {
    let Some(path) = explicit.or_else(profile::config_path) else {
        return Ok(Profile::default());
    };
    match profile::load_config_file(&path)? {
        Some(file) => {
            debug!(path = %path.display(), "Loaded profile file");
            file.profile(name)
        }
        None => match name {
            Some(name) => Err(ConfigError::ProfileNotFound {
                name: name.to_string(),
                path,
            }),
            None => Ok(Profile::default()),
        },
    }
}

fn check_uuid(attribute: &'static str, value: &str) -> Result<()> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ConfigError::invalid(attribute, format!("{value:?} is not a UUID")))
}

fn resolve_locality(region: Option<&str>, zone: Option<&str>) -> Result<(Region, Zone)> {
    let region = region
        .map(|r| r.parse::<Region>())
        .transpose()
        .map_err(|e| ConfigError::invalid("region", e.to_string()))?;
    let zone = zone
        .map(|z| z.parse::<Zone>())
        .transpose()
        .map_err(|e| ConfigError::invalid("zone", e.to_string()))?;

    match (region, zone) {
        (Some(region), Some(zone)) if zone.region() != region => Err(ConfigError::invalid(
            "zone",
            format!("zone {zone} is not in region {region}"),
        )),
        (Some(region), Some(zone)) => Ok((region, zone)),
        (Some(region), None) => Ok((region, region.default_zone())),
        (None, Some(zone)) => Ok((zone.region(), zone)),
        (None, None) => Ok((DEFAULT_REGION, DEFAULT_ZONE)),
    }
}

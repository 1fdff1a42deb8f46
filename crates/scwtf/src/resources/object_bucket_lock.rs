//! `scaleway_object_bucket_lock_configuration`: default retention of a lock bucket
//!
//! Object lock itself is chosen when the bucket is created; this resource only
//! manages the default retention rule. Putting the same rule twice is harmless,
//! and deleting the resource leaves the lock enabled without a default rule.

use super::object_bucket::parse_bucket_ref;
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::locality::{
    diff_suppress_locality, new_project_scoped_id, parse_project_scoped_id,
};
use scwtf_cloud::{
    Attribute, CloudError, Locality, Presence, ResourceState, Result, Schema, Validator,
};
use scwtf_object::ObjectLockConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const RETENTION_MODES: &[&str] = &["GOVERNANCE", "COMPLIANCE"];

const RETENTION_PATH: &str = "rule.0.default_retention.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfigAttrs {
    pub bucket: String,
    pub region: String,
    pub project_id: String,
    pub rule: Vec<LockRuleBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRuleBlock {
    pub default_retention: Vec<RetentionBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionBlock {
    pub mode: String,
    pub days: Option<i32>,
    pub years: Option<i32>,
}

impl LockConfigAttrs {
    fn config(&self) -> Result<ObjectLockConfig> {
        let Some(retention) = self.rule.first().and_then(|r| r.default_retention.first()) else {
            return Ok(ObjectLockConfig {
                enabled: true,
                ..Default::default()
            });
        };
        if retention.days.is_some() == retention.years.is_some() {
            return Err(CloudError::validation(
                format!("{RETENTION_PATH}.days"),
                "exactly one of days or years must be set",
            ));
        }
        Ok(ObjectLockConfig {
            enabled: true,
            mode: Some(retention.mode.clone()),
            days: retention.days,
            years: retention.years,
        })
    }

    fn set_config(&mut self, config: ObjectLockConfig) {
        self.rule = match config.mode {
            Some(mode) => vec![LockRuleBlock {
                default_retention: vec![RetentionBlock {
                    mode,
                    days: config.days,
                    years: config.years,
                }],
            }],
            None => Vec::new(),
        };
    }
}

#[derive(Debug, Default)]
pub struct ObjectBucketLockConfiguration;

#[async_trait]
impl Resource for ObjectBucketLockConfiguration {
    type Attrs = LockConfigAttrs;
    const KIND: &'static str = "scaleway_object_bucket_lock_configuration";

    fn schema(&self) -> Schema {
        let retention = Schema::v0()
            .with_attribute(
                "mode",
                Attribute::required_string().validate(Validator::OneOf(RETENTION_MODES)),
            )
            .with_attribute("days", Attribute::optional_int())
            .with_attribute("years", Attribute::optional_int())
            .with_conflicts(&["days", "years"]);
        let rule = Schema::v0().with_attribute(
            "default_retention",
            Attribute::block(retention, Presence::Required),
        );
        Schema::v0()
            .with_attribute(
                "bucket",
                Attribute::required_string()
                    .force_new()
                    .suppress_diff(diff_suppress_locality),
            )
            .with_attribute("rule", Attribute::block(rule, Presence::Required))
            .with_attribute("region", Attribute::region())
            .with_attribute("project_id", Attribute::project_id())
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<LockConfigAttrs>,
    ) -> Result<()> {
        let default_region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let (region, bucket, from_ref) = parse_bucket_ref(&state.attrs.bucket, default_region)?;
        let project = from_ref
            .or_else(|| Some(state.attrs.project_id.clone()).filter(|p| !p.is_empty()));
        let config = state.attrs.config()?;
        let store = ctx.object_store(region, project.as_deref()).await?;

        store.put_object_lock_configuration(&bucket, &config).await?;
        info!(bucket = %bucket, mode = ?config.mode, "Object lock configured");
        let id = new_project_scoped_id(Locality::Region(region), &bucket, project.as_deref());
        state.set_id(id);
        self.read(ctx, state).await
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<LockConfigAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        let region = locality.region();
        let store = ctx.object_store(region, project.as_deref()).await?;
        let result = store.get_object_lock_configuration(&bucket).await;
        let Some(config) = read_or_remove(state, result)? else {
            return Ok(());
        };

        let attrs = &mut state.attrs;
        attrs.set_config(config);
        if attrs.bucket.is_empty() {
            attrs.bucket = bucket;
        }
        attrs.region = region.to_string();
        if let Some(project) = project {
            attrs.project_id = project;
        }
        Ok(())
    }

    async fn update(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<LockConfigAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        if state.has_change(|a| &a.rule) {
            let config = state.attrs.config()?;
            let store = ctx.object_store(locality.region(), project.as_deref()).await?;
            store.put_object_lock_configuration(&bucket, &config).await?;
        }
        self.read(ctx, state).await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<LockConfigAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        let store = ctx.object_store(locality.region(), project.as_deref()).await?;
        let bare = ObjectLockConfig {
            enabled: true,
            ..Default::default()
        };
        let result = store.put_object_lock_configuration(&bucket, &bare).await;
        delete_tolerant(Self::KIND, result, Swallow::NONE)
    }
}

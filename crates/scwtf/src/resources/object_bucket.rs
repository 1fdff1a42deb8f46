//! `scaleway_object_bucket`: S3 bucket with its sub-configurations
//!
//! The ID is `{region}/{name}`, suffixed with `@{project}` when the bucket was
//! created under an explicit project so later calls present the same
//! project-scoped access key. Reading a sub-configuration the key is not
//! allowed to see yields a warning and leaves that part of the state alone.

use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::expand::{expand_object_tags, flatten_object_tags};
use scwtf_cloud::locality::{new_project_scoped_id, parse_project_scoped_id};
use scwtf_cloud::{
    Attribute, Locality, Presence, Region, ResourceState, Result, Schema, Validator, is_forbidden,
    is_not_found,
};
use scwtf_object::acl::{canned_acl, owner_project};
use scwtf_object::policy::{normalize_policy, policies_equivalent};
use scwtf_object::{
    CorsRule, LifecycleRule, ObjectStore, Transition, Website, delete_object_versions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketAttrs {
    pub name: String,
    pub region: String,
    pub project_id: String,
    pub tags: HashMap<String, String>,
    pub acl: String,
    pub force_destroy: bool,
    pub object_lock_enabled: bool,
    pub endpoint: String,
    /// Policy attached to the bucket, normalized; managed by `scaleway_object_bucket_policy`
    pub policy: String,
    pub versioning: Vec<VersioningBlock>,
    pub cors_rule: Vec<CorsBlock>,
    pub lifecycle_rule: Vec<LifecycleBlock>,
    pub website: Vec<WebsiteBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningBlock {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsBlock {
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age_seconds: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleBlock {
    pub id: String,
    pub prefix: String,
    pub enabled: bool,
    pub expiration_days: Option<i32>,
    pub transition: Vec<TransitionBlock>,
    pub abort_incomplete_multipart_upload_days: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionBlock {
    pub days: i32,
    pub storage_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteBlock {
    pub index_document: String,
    pub error_document: String,
}

impl From<&CorsBlock> for CorsRule {
    fn from(block: &CorsBlock) -> Self {
        CorsRule {
            allowed_methods: block.allowed_methods.clone(),
            allowed_origins: block.allowed_origins.clone(),
            allowed_headers: block.allowed_headers.clone(),
            expose_headers: block.expose_headers.clone(),
            max_age_seconds: block.max_age_seconds,
        }
    }
}

impl From<CorsRule> for CorsBlock {
    fn from(rule: CorsRule) -> Self {
        CorsBlock {
            allowed_methods: rule.allowed_methods,
            allowed_origins: rule.allowed_origins,
            allowed_headers: rule.allowed_headers,
            expose_headers: rule.expose_headers,
            max_age_seconds: rule.max_age_seconds,
        }
    }
}

impl From<&LifecycleBlock> for LifecycleRule {
    fn from(block: &LifecycleBlock) -> Self {
        LifecycleRule {
            id: Some(block.id.clone()).filter(|s| !s.is_empty()),
            prefix: Some(block.prefix.clone()).filter(|s| !s.is_empty()),
            enabled: block.enabled,
            expiration_days: block.expiration_days,
            transitions: block
                .transition
                .iter()
                .map(|t| Transition {
                    days: t.days,
                    storage_class: t.storage_class.clone(),
                })
                .collect(),
            abort_incomplete_multipart_upload_days: block.abort_incomplete_multipart_upload_days,
        }
    }
}

impl From<LifecycleRule> for LifecycleBlock {
    fn from(rule: LifecycleRule) -> Self {
        LifecycleBlock {
            id: rule.id.unwrap_or_default(),
            prefix: rule.prefix.unwrap_or_default(),
            enabled: rule.enabled,
            expiration_days: rule.expiration_days,
            transition: rule
                .transitions
                .into_iter()
                .map(|t| TransitionBlock {
                    days: t.days,
                    storage_class: t.storage_class,
                })
                .collect(),
            abort_incomplete_multipart_upload_days: rule.abort_incomplete_multipart_upload_days,
        }
    }
}

/// Bucket reference as written in other resources: `name`, `{region}/{name}`
/// or `{region}/{name}@{project}`
pub(crate) fn parse_bucket_ref(
    value: &str,
    default: Region,
) -> Result<(Region, String, Option<String>)> {
    if value.contains('/') {
        let (locality, name, project) = parse_project_scoped_id(value)?;
        Ok((locality.region(), name, project))
    } else {
        Ok((default, value.to_string(), None))
    }
}

pub fn bucket_endpoint(name: &str, region: Region) -> String {
    format!("https://{name}.s3.{region}.scw.cloud")
}

/// Outcome of reading one sub-configuration
enum Sub<T> {
    Found(T),
    Absent,
    /// Forbidden; the state keeps its planned value
    Skipped,
}

fn sub<T>(ctx: &CallContext, bucket: &str, what: &str, result: Result<T>) -> Result<Sub<T>> {
    match result {
        Ok(value) => Ok(Sub::Found(value)),
        Err(e) if is_not_found(&e) => Ok(Sub::Absent),
        Err(e) if is_forbidden(&e) => {
            ctx.warn(
                format!("Cannot read {what} of bucket {bucket}"),
                format!("{e}; the {what} configuration is left as planned"),
            );
            Ok(Sub::Skipped)
        }
        Err(e) => Err(e),
    }
}

fn block_schemas() -> (Schema, Schema, Schema, Schema) {
    let versioning =
        Schema::v0().with_attribute("enabled", Attribute::optional_bool().default_value(false));
    let cors = Schema::v0()
        .with_attribute("allowed_methods", Attribute::string_list(Presence::Required))
        .with_attribute("allowed_origins", Attribute::string_list(Presence::Required))
        .with_attribute("allowed_headers", Attribute::string_list(Presence::Optional))
        .with_attribute("expose_headers", Attribute::string_list(Presence::Optional))
        .with_attribute("max_age_seconds", Attribute::optional_int());
    let transition = Schema::v0()
        .with_attribute("days", Attribute::optional_int())
        .with_attribute(
            "storage_class",
            Attribute::required_string()
                .validate(Validator::OneOf(&["STANDARD", "GLACIER", "ONEZONE_IA"])),
        );
    let lifecycle = Schema::v0()
        .with_attribute("id", Attribute::optional_computed_string())
        .with_attribute("prefix", Attribute::optional_string())
        .with_attribute("enabled", Attribute::optional_bool())
        .with_attribute("expiration_days", Attribute::optional_int())
        .with_attribute("transition", Attribute::block(transition, Presence::Optional))
        .with_attribute("abort_incomplete_multipart_upload_days", Attribute::optional_int());
    let website = Schema::v0()
        .with_attribute("index_document", Attribute::required_string())
        .with_attribute("error_document", Attribute::optional_string());
    (versioning, cors, lifecycle, website)
}

async fn put_tags(
    store: &dyn ObjectStore,
    bucket: &str,
    tags: &HashMap<String, String>,
) -> Result<()> {
    if tags.is_empty() {
        store.delete_bucket_tagging(bucket).await
    } else {
        store.put_bucket_tagging(bucket, &expand_object_tags(tags)).await
    }
}

async fn put_cors(store: &dyn ObjectStore, bucket: &str, blocks: &[CorsBlock]) -> Result<()> {
    if blocks.is_empty() {
        store.delete_bucket_cors(bucket).await
    } else {
        let rules: Vec<CorsRule> = blocks.iter().map(CorsRule::from).collect();
        store.put_bucket_cors(bucket, &rules).await
    }
}

async fn put_lifecycle(
    store: &dyn ObjectStore,
    bucket: &str,
    blocks: &[LifecycleBlock],
) -> Result<()> {
    if blocks.is_empty() {
        store.delete_bucket_lifecycle(bucket).await
    } else {
        let rules: Vec<LifecycleRule> = blocks.iter().map(LifecycleRule::from).collect();
        store.put_bucket_lifecycle(bucket, &rules).await
    }
}

async fn put_website(store: &dyn ObjectStore, bucket: &str, blocks: &[WebsiteBlock]) -> Result<()> {
    match blocks.first() {
        None => store.delete_bucket_website(bucket).await,
        Some(block) => {
            let website = Website {
                index_document: block.index_document.clone(),
                error_document: Some(block.error_document.clone()).filter(|s| !s.is_empty()),
            };
            store.put_bucket_website(bucket, &website).await
        }
    }
}

fn versioning_enabled(blocks: &[VersioningBlock]) -> bool {
    blocks.first().is_some_and(|b| b.enabled)
}

#[derive(Debug, Default)]
pub struct ObjectBucket;

impl ObjectBucket {
    async fn store_for(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> Result<(Region, String, Arc<dyn ObjectStore>)> {
        let (locality, name, project) = parse_project_scoped_id(id)?;
        let region = locality.region();
        let store = ctx.object_store(region, project.as_deref()).await?;
        Ok((region, name, store))
    }
}

#[async_trait]
impl Resource for ObjectBucket {
    type Attrs = BucketAttrs;
    const KIND: &'static str = "scaleway_object_bucket";

    fn schema(&self) -> Schema {
        let (versioning, cors, lifecycle, website) = block_schemas();
        Schema::v0()
            .with_attribute("name", Attribute::required_string().force_new())
            .with_attribute("region", Attribute::region())
            .with_attribute("project_id", Attribute::project_id())
            .with_attribute("tags", Attribute::string_map(Presence::Optional))
            .with_attribute(
                "acl",
                Attribute::optional_string()
                    .default_value("private")
                    .validate(Validator::OneOf(CANNED_ACLS)),
            )
            .with_attribute("force_destroy", Attribute::optional_bool().default_value(false))
            .with_attribute("object_lock_enabled", Attribute::optional_bool().force_new())
            .with_attribute("endpoint", Attribute::computed_string())
            .with_attribute("policy", Attribute::computed_string())
            .with_attribute("versioning", Attribute::block(versioning, Presence::OptionalComputed))
            .with_attribute("cors_rule", Attribute::block(cors, Presence::Optional))
            .with_attribute("lifecycle_rule", Attribute::block(lifecycle, Presence::Optional))
            .with_attribute("website", Attribute::block(website, Presence::Optional))
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketAttrs>,
    ) -> Result<()> {
        let region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let project = Some(state.attrs.project_id.clone()).filter(|p| !p.is_empty());
        let name = state.attrs.name.clone();
        let store = ctx.object_store(region, project.as_deref()).await?;

        store.create_bucket(&name, state.attrs.object_lock_enabled).await?;
        info!(bucket = %name, region = %region, "Bucket created");
        state.set_id(new_project_scoped_id(Locality::Region(region), &name, project.as_deref()));

        let attrs = &state.attrs;
        if !attrs.tags.is_empty() {
            put_tags(store.as_ref(), &name, &attrs.tags).await?;
        }
        if !attrs.acl.is_empty() && attrs.acl != "private" {
            store.put_bucket_acl(&name, &attrs.acl).await?;
        }
        if versioning_enabled(&attrs.versioning) {
            store.put_bucket_versioning(&name, true).await?;
        }
        if !attrs.cors_rule.is_empty() {
            put_cors(store.as_ref(), &name, &attrs.cors_rule).await?;
        }
        if !attrs.lifecycle_rule.is_empty() {
            put_lifecycle(store.as_ref(), &name, &attrs.lifecycle_rule).await?;
        }
        if !attrs.website.is_empty() {
            put_website(store.as_ref(), &name, &attrs.website).await?;
        }

        self.read(ctx, state).await
    }

    async fn read(&self, ctx: &CallContext, state: &mut ResourceState<BucketAttrs>) -> Result<()> {
        let (region, name, store) = self.store_for(ctx, state.id()).await?;
        if read_or_remove(state, store.head_bucket(&name).await)?.is_none() {
            return Ok(());
        }

        let tags = sub(ctx, &name, "tags", store.get_bucket_tagging(&name).await)?;
        let acl = sub(ctx, &name, "ACL", store.get_bucket_acl(&name).await)?;
        let versioning = sub(ctx, &name, "versioning", store.get_bucket_versioning(&name).await)?;
        let cors = sub(ctx, &name, "CORS", store.get_bucket_cors(&name).await)?;
        let lifecycle = sub(ctx, &name, "lifecycle", store.get_bucket_lifecycle(&name).await)?;
        let website = sub(ctx, &name, "website", store.get_bucket_website(&name).await)?;
        let lock = store.get_object_lock_configuration(&name).await;
        let lock = sub(ctx, &name, "object lock", lock)?;
        let policy = sub(ctx, &name, "policy", store.get_bucket_policy(&name).await)?;

        let attrs = &mut state.attrs;
        attrs.name = name.clone();
        attrs.region = region.to_string();
        attrs.endpoint = bucket_endpoint(&name, region);

        match tags {
            Sub::Found(tags) => attrs.tags = flatten_object_tags(&tags),
            Sub::Absent => attrs.tags.clear(),
            Sub::Skipped => {}
        }
        if let Sub::Found(acl) = acl {
            attrs.acl = canned_acl(&acl).to_string();
            if let Some(project) = owner_project(&acl) {
                attrs.project_id = project.to_string();
            }
        }
        match versioning {
            Sub::Found(v) => attrs.versioning = vec![VersioningBlock { enabled: v.is_enabled() }],
            Sub::Absent => attrs.versioning = vec![VersioningBlock::default()],
            Sub::Skipped => {}
        }
        match cors {
            Sub::Found(rules) => attrs.cors_rule = rules.into_iter().map(CorsBlock::from).collect(),
            Sub::Absent => attrs.cors_rule.clear(),
            Sub::Skipped => {}
        }
        match lifecycle {
            Sub::Found(rules) => {
                attrs.lifecycle_rule = rules.into_iter().map(LifecycleBlock::from).collect();
            }
            Sub::Absent => attrs.lifecycle_rule.clear(),
            Sub::Skipped => {}
        }
        match website {
            Sub::Found(w) => {
                attrs.website = vec![WebsiteBlock {
                    index_document: w.index_document,
                    error_document: w.error_document.unwrap_or_default(),
                }];
            }
            Sub::Absent => attrs.website.clear(),
            Sub::Skipped => {}
        }
        match lock {
            Sub::Found(lock) => attrs.object_lock_enabled = lock.enabled,
            Sub::Absent => attrs.object_lock_enabled = false,
            Sub::Skipped => {}
        }
        match policy {
            Sub::Found(policy) if !policies_equivalent(&attrs.policy, &policy) => {
                attrs.policy = normalize_policy(&policy)?;
            }
            Sub::Found(_) | Sub::Skipped => {}
            Sub::Absent => attrs.policy.clear(),
        }
        Ok(())
    }

    async fn update(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketAttrs>,
    ) -> Result<()> {
        let (_, name, store) = self.store_for(ctx, state.id()).await?;
        let store = store.as_ref();

        if state.has_change(|a| &a.tags) {
            put_tags(store, &name, &state.attrs.tags).await?;
        }
        if state.has_change(|a| &a.acl) {
            store.put_bucket_acl(&name, &state.attrs.acl).await?;
        }
        if state.has_change(|a| &a.versioning) {
            store
                .put_bucket_versioning(&name, versioning_enabled(&state.attrs.versioning))
                .await?;
        }
        if state.has_change(|a| &a.cors_rule) {
            put_cors(store, &name, &state.attrs.cors_rule).await?;
        }
        if state.has_change(|a| &a.lifecycle_rule) {
            put_lifecycle(store, &name, &state.attrs.lifecycle_rule).await?;
        }
        if state.has_change(|a| &a.website) {
            put_website(store, &name, &state.attrs.website).await?;
        }

        self.read(ctx, state).await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketAttrs>,
    ) -> Result<()> {
        let (_, name, store) = self.store_for(ctx, state.id()).await?;
        if state.attrs.force_destroy {
            let deleted =
                delete_object_versions(store.clone(), &name, None, true, ctx.cancel()).await;
            let deleted = Swallow::NOT_FOUND.apply(Self::KIND, deleted)?;
            info!(bucket = %name, versions = deleted.unwrap_or(0), "Bucket emptied");
        }
        delete_tolerant(Self::KIND, store.delete_bucket(&name).await, Swallow::NONE)
    }
}

//! `scaleway_object_bucket_policy` (beta)

use super::object_bucket::parse_bucket_ref;
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use scwtf_cloud::locality::{new_project_scoped_id, parse_project_scoped_id};
use scwtf_cloud::{Attribute, Locality, ResourceState, Result, Schema, Validator};
use scwtf_object::policy::{normalize_policy, policies_equivalent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketPolicyAttrs {
    pub bucket: String,
    pub policy: String,
    pub region: String,
    pub project_id: String,
}

fn validate_policy(value: &Value) -> std::result::Result<(), String> {
    match value.as_str() {
        Some(text) => normalize_policy(text).map(|_| ()).map_err(|e| e.to_string()),
        None => Err("expected a JSON document as a string".to_string()),
    }
}

#[derive(Debug, Default)]
pub struct ObjectBucketPolicy;

#[async_trait]
impl Resource for ObjectBucketPolicy {
    type Attrs = BucketPolicyAttrs;
    const KIND: &'static str = "scaleway_object_bucket_policy";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("bucket", Attribute::required_string().force_new())
            .with_attribute(
                "policy",
                Attribute::required_string()
                    .validate(Validator::Custom(validate_policy))
                    .suppress_diff(policies_equivalent),
            )
            .with_attribute("region", Attribute::region())
            .with_attribute("project_id", Attribute::project_id())
    }

    fn is_beta(&self) -> bool {
        true
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketPolicyAttrs>,
    ) -> Result<()> {
        let default_region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let (region, bucket, from_ref) = parse_bucket_ref(&state.attrs.bucket, default_region)?;
        let project = from_ref
            .or_else(|| Some(state.attrs.project_id.clone()).filter(|p| !p.is_empty()));
        let store = ctx.object_store(region, project.as_deref()).await?;

        store.put_bucket_policy(&bucket, &state.attrs.policy).await?;
        info!(bucket = %bucket, "Bucket policy set");
        state.set_id(new_project_scoped_id(Locality::Region(region), &bucket, project.as_deref()));
        self.read(ctx, state).await
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketPolicyAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        let region = locality.region();
        let store = ctx.object_store(region, project.as_deref()).await?;
        let Some(policy) = read_or_remove(state, store.get_bucket_policy(&bucket).await)? else {
            return Ok(());
        };

        let attrs = &mut state.attrs;
        // keep the configured text while it means the same thing
        if !policies_equivalent(&attrs.policy, &policy) {
            attrs.policy = normalize_policy(&policy)?;
        }
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
        state: &mut ResourceState<BucketPolicyAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        let store = ctx.object_store(locality.region(), project.as_deref()).await?;
        store.put_bucket_policy(&bucket, &state.attrs.policy).await?;
        self.read(ctx, state).await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<BucketPolicyAttrs>,
    ) -> Result<()> {
        let (locality, bucket, project) = parse_project_scoped_id(state.id())?;
        let store = ctx.object_store(locality.region(), project.as_deref()).await?;
        delete_tolerant(Self::KIND, store.delete_bucket_policy(&bucket).await, Swallow::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_must_be_json() {
        let schema = ObjectBucketPolicy.schema();
        let diags = schema.validate(&json!({ "bucket": "b", "policy": "{not json" }));
        assert_eq!(
            diags.iter().next().and_then(|d| d.attribute.as_deref()),
            Some("policy")
        );
        assert!(!schema.validate(&json!({ "bucket": "b", "policy": "{}" })).has_errors());
    }

    #[test]
    fn test_reordered_policy_suppressed() {
        let attr = ObjectBucketPolicy.schema().attribute("policy").cloned().unwrap();
        let old =
            r#"{"Version":"2023-04-17","Statement":[{"Effect":"Allow","Action":["s3:GetObject"]}]}"#;
        let new =
            r#"{"Statement":{"Action":"s3:GetObject","Effect":"Allow"},"Version":"2023-04-17"}"#;
        assert!(attr.suppresses(old, new));
    }
}

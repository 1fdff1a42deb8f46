//! `scaleway_object`: one object in a bucket
//!
//! ID shape `{region}/{bucket}/{key}`; the key keeps any `/` it contains.
//! When the bucket was referenced as `{region}/{bucket}@{project}` the bucket
//! segment keeps that `@{project}` suffix, so every later call presents the
//! same project-scoped access key. Bucket names never contain `@`.
//! The body comes from exactly one of `file`, `content` or `content_base64`.

use super::object_bucket::parse_bucket_ref;
use crate::context::CallContext;
use crate::engine::{Swallow, delete_tolerant, read_or_remove, resolve_region};
use crate::resource::Resource;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use scwtf_cloud::expand::{expand_object_tags, flatten_object_tags};
use scwtf_cloud::locality::{
    Locality, diff_suppress_locality, new_nested_id, new_project_scoped_id, parse_nested_id,
};
use scwtf_cloud::{
    Attribute, CloudError, Presence, Region, ResourceState, Result, Schema, Validator,
    is_forbidden, is_not_found,
};
use scwtf_object::acl::is_public_read;
use scwtf_object::{ObjectStore, PutObject};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

pub const VISIBILITIES: &[&str] = &["private", "public-read"];
pub const STORAGE_CLASSES: &[&str] = &["STANDARD", "GLACIER", "ONEZONE_IA"];

/// Attributes whose change requires uploading the object again
const BODY_FIELDS: &[&str] = &[
    "file",
    "content",
    "content_base64",
    "hash",
    "metadata",
    "storage_class",
    "content_type",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectAttrs {
    pub bucket: String,
    pub key: String,
    pub file: String,
    pub content: String,
    pub content_base64: String,
    pub hash: String,
    pub content_type: String,
    pub storage_class: String,
    pub visibility: String,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub region: String,
}

impl ObjectAttrs {
    async fn body(&self) -> Result<Vec<u8>> {
        if !self.file.is_empty() {
            return Ok(tokio::fs::read(&self.file).await?);
        }
        if !self.content_base64.is_empty() {
            return BASE64
                .decode(self.content_base64.trim())
                .map_err(|e| {
                    CloudError::validation("content_base64", format!("invalid base64: {e}"))
                });
        }
        Ok(self.content.clone().into_bytes())
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect()
    }

    async fn upload(&self, bucket: &str) -> Result<PutObject> {
        Ok(PutObject {
            bucket: bucket.to_string(),
            key: self.key.clone(),
            body: self.body().await?,
            content_type: Some(self.content_type.clone()).filter(|s| !s.is_empty()),
            metadata: self.metadata(),
            tags: expand_object_tags(&self.tags),
            storage_class: Some(self.storage_class.clone()).filter(|s| !s.is_empty()),
            acl: Some(self.visibility.clone()).filter(|s| !s.is_empty()),
        })
    }
}

/// Location of an object, as encoded in its ID
#[derive(Debug, Clone, PartialEq, Eq)]
struct ObjectRef {
    region: Region,
    bucket: String,
    project: Option<String>,
    key: String,
}

impl ObjectRef {
    fn parse(id: &str) -> Result<Self> {
        let (region, bucket, key) = parse_nested_id(id)?;
        let (bucket, project) = match bucket.split_once('@') {
            Some((name, project)) if !name.is_empty() && !project.is_empty() => {
                (name.to_string(), Some(project.to_string()))
            }
            Some(_) => return Err(CloudError::invalid_id(id, "empty bucket or project")),
            None => (bucket, None),
        };
        Ok(Self {
            region,
            bucket,
            project,
            key,
        })
    }

    fn id(&self) -> String {
        match &self.project {
            Some(project) => {
                new_nested_id(self.region, &format!("{}@{project}", self.bucket), &self.key)
            }
            None => new_nested_id(self.region, &self.bucket, &self.key),
        }
    }

    /// Bucket reference as a user would write it
    fn bucket_ref(&self) -> String {
        match &self.project {
            Some(_) => new_project_scoped_id(
                Locality::Region(self.region),
                &self.bucket,
                self.project.as_deref(),
            ),
            None => self.bucket.clone(),
        }
    }

    async fn store(&self, ctx: &CallContext) -> Result<Arc<dyn ObjectStore>> {
        ctx.object_store(self.region, self.project.as_deref()).await
    }
}

fn validate_metadata_keys(value: &serde_json::Value) -> std::result::Result<(), String> {
    let Some(map) = value.as_object() else {
        return Ok(());
    };
    match map.keys().find(|k| k.trim().is_empty()) {
        Some(_) => Err("metadata keys must not be blank".to_string()),
        None => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct Object;

#[async_trait]
impl Resource for Object {
    type Attrs = ObjectAttrs;
    const KIND: &'static str = "scaleway_object";

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "bucket",
                Attribute::required_string()
                    .force_new()
                    .suppress_diff(diff_suppress_locality),
            )
            .with_attribute("key", Attribute::required_string().force_new())
            .with_attribute("file", Attribute::optional_string())
            .with_attribute("content", Attribute::optional_string())
            .with_attribute("content_base64", Attribute::optional_string())
            .with_attribute("hash", Attribute::optional_string())
            .with_attribute("content_type", Attribute::optional_computed_string())
            .with_attribute(
                "storage_class",
                Attribute::optional_computed_string().validate(Validator::OneOf(STORAGE_CLASSES)),
            )
            .with_attribute(
                "visibility",
                Attribute::optional_computed_string().validate(Validator::OneOf(VISIBILITIES)),
            )
            .with_attribute(
                "metadata",
                Attribute::string_map(Presence::Optional)
                    .validate(Validator::Custom(validate_metadata_keys)),
            )
            .with_attribute("tags", Attribute::string_map(Presence::Optional))
            .with_attribute("region", Attribute::region())
            .with_conflicts(&["file", "content", "content_base64"])
    }

    async fn create(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<ObjectAttrs>,
    ) -> Result<()> {
        let default_region = resolve_region(Some(state.attrs.region.as_str()), ctx.meta())?;
        let (region, bucket, project) = parse_bucket_ref(&state.attrs.bucket, default_region)?;
        let object = ObjectRef {
            region,
            bucket,
            project,
            key: state.attrs.key.clone(),
        };
        let store = object.store(ctx).await?;

        let upload = state.attrs.upload(&object.bucket).await?;
        let size = upload.body.len();
        store.put_object(upload).await?;
        info!(bucket = %object.bucket, key = %object.key, size, "Object uploaded");

        state.set_id(object.id());
        self.read(ctx, state).await
    }

    async fn read(&self, ctx: &CallContext, state: &mut ResourceState<ObjectAttrs>) -> Result<()> {
        let object = ObjectRef::parse(state.id())?;
        let store = object.store(ctx).await?;
        let (region, bucket, key) = (object.region, object.bucket.as_str(), object.key.as_str());
        let Some(head) = read_or_remove(state, store.head_object(bucket, key, None).await)? else {
            return Ok(());
        };

        let tags = match store.get_object_tagging(bucket, key).await {
            Ok(tags) => Some(flatten_object_tags(&tags)),
            Err(e) if is_not_found(&e) => Some(HashMap::new()),
            Err(e) if is_forbidden(&e) => {
                ctx.warn(format!("Cannot read tags of object {key}"), e.to_string());
                None
            }
            Err(e) => return Err(e),
        };
        let acl = match store.get_object_acl(bucket, key).await {
            Ok(acl) => Some(acl),
            Err(e) if is_forbidden(&e) => {
                ctx.warn(format!("Cannot read ACL of object {key}"), e.to_string());
                None
            }
            Err(e) => return Err(e),
        };

        let attrs = &mut state.attrs;
        let same_bucket = parse_bucket_ref(&attrs.bucket, region).is_ok_and(|(r, name, project)| {
            r == region && name == bucket && project == object.project
        });
        if attrs.bucket.is_empty() || !same_bucket {
            attrs.bucket = object.bucket_ref();
        }
        attrs.key = key.to_string();
        attrs.region = region.to_string();
        attrs.metadata = head.metadata.into_iter().collect();
        if let Some(class) = head.storage_class {
            attrs.storage_class = class;
        }
        if let Some(content_type) = head.content_type {
            attrs.content_type = content_type;
        }
        if let Some(tags) = tags {
            attrs.tags = tags;
        }
        if let Some(acl) = acl {
            let visibility = if is_public_read(&acl) { "public-read" } else { "private" };
            attrs.visibility = visibility.to_string();
        }
        Ok(())
    }

    async fn update(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<ObjectAttrs>,
    ) -> Result<()> {
        let object = ObjectRef::parse(state.id())?;
        let store = object.store(ctx).await?;
        let (bucket, key) = (object.bucket.as_str(), object.key.as_str());

        let changed = state.changed_fields()?;
        if BODY_FIELDS.iter().any(|f| changed.contains(*f)) {
            store.put_object(state.attrs.upload(bucket).await?).await?;
            info!(bucket = %bucket, key = %key, "Object uploaded again");
        } else {
            if state.has_change(|a| &a.tags) {
                store
                    .put_object_tagging(bucket, key, &expand_object_tags(&state.attrs.tags))
                    .await?;
            }
            if state.has_change(|a| &a.visibility) && !state.attrs.visibility.is_empty() {
                store.put_object_acl(bucket, key, &state.attrs.visibility).await?;
            }
        }
        self.read(ctx, state).await
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<ObjectAttrs>,
    ) -> Result<()> {
        let object = ObjectRef::parse(state.id())?;
        let store = object.store(ctx).await?;
        let result = store.delete_object(&object.bucket, &object.key, None, false).await;
        delete_tolerant(Self::KIND, result, Swallow::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_id_keeps_project_binding() {
        let id = "fr-par/tf-scoped@44444444-4444-4444-4444-444444444444/logs/a@b.txt";
        let object = ObjectRef::parse(id).unwrap();
        assert_eq!(object.bucket, "tf-scoped");
        assert_eq!(object.project.as_deref(), Some("44444444-4444-4444-4444-444444444444"));
        assert_eq!(object.key, "logs/a@b.txt");
        assert_eq!(object.id(), id);
        assert_eq!(
            object.bucket_ref(),
            "fr-par/tf-scoped@44444444-4444-4444-4444-444444444444"
        );

        let plain = ObjectRef::parse("nl-ams/tf-plain/k").unwrap();
        assert_eq!(plain.project, None);
        assert_eq!(plain.bucket_ref(), "tf-plain");
        assert!(ObjectRef::parse("fr-par/@p/k").is_err());
    }

    #[tokio::test]
    async fn test_body_sources() {
        let inline = ObjectAttrs {
            content: "hello".into(),
            ..Default::default()
        };
        assert_eq!(inline.body().await.unwrap(), b"hello");

        let encoded = ObjectAttrs {
            content_base64: BASE64.encode(b"\x00\x01binary"),
            ..Default::default()
        };
        assert_eq!(encoded.body().await.unwrap(), b"\x00\x01binary");

        let bad = ObjectAttrs {
            content_base64: "not base64!".into(),
            ..Default::default()
        };
        let err = bad.body().await.unwrap_err();
        assert_eq!(err.attribute(), Some("content_base64"));
    }

    #[tokio::test]
    async fn test_body_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object.txt");
        std::fs::write(&path, "from disk").unwrap();
        let attrs = ObjectAttrs {
            file: path.to_string_lossy().into_owned(),
            ..Default::default()
        };
        assert_eq!(attrs.body().await.unwrap(), b"from disk");
    }

    #[test]
    fn test_metadata_lowercased() {
        let attrs = ObjectAttrs {
            metadata: HashMap::from([("X-Owner".to_string(), "ops".to_string())]),
            ..Default::default()
        };
        assert_eq!(attrs.metadata().get("x-owner").map(String::as_str), Some("ops"));
    }

    #[test]
    fn test_body_sources_conflict() {
        let diags = Object.schema().validate(&json!({
            "bucket": "b",
            "key": "k",
            "content": "a",
            "content_base64": "YQ==",
        }));
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| d.summary == "Conflicting arguments"));
    }
}

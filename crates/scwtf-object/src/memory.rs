//! In-memory [`ObjectStore`] for tests
//!
//! Behaves like a small S3: versioned buckets keep every version and add
//! delete markers, unversioned buckets keep a single `null` version per key,
//! and a version under legal hold refuses deletion with `AccessDenied`.
//! Every call is logged by operation name so tests can assert on sequences.

use crate::acl::owner_id_for_project;
use crate::store::{ConnectParams, ObjectStore, StoreFactory};
use crate::types::{
    Acl, CorsRule, Grant, LifecycleRule, ObjectHead, ObjectLockConfig, ObjectVersion, PutObject,
    VersionCursor, VersionPage, Versioning, Website,
};
use async_trait::async_trait;
use scwtf_cloud::{ApiError, CloudError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_OWNER_PROJECT: &str = "11111111-1111-1111-1111-111111111111";
const DEFAULT_PAGE_SIZE: usize = 1000;
const NULL_VERSION: &str = "null";

fn s3_error(status: u16, code: &str, message: impl Into<String>) -> CloudError {
    CloudError::Api(ApiError::new(status, message).with_type(code))
}

fn no_such_bucket(bucket: &str) -> CloudError {
    s3_error(404, "NoSuchBucket", format!("bucket {bucket} does not exist"))
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    version_id: String,
    seq: u64,
    delete_marker: bool,
    body: Vec<u8>,
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    tags: Vec<(String, String)>,
    storage_class: Option<String>,
    legal_hold: bool,
    acl: Acl,
}

#[derive(Debug, Default)]
struct Bucket {
    versioning: Versioning,
    object_lock: Option<ObjectLockConfig>,
    tags: Vec<(String, String)>,
    acl: Acl,
    cors: Option<Vec<CorsRule>>,
    lifecycle: Option<Vec<LifecycleRule>>,
    website: Option<Website>,
    policy: Option<String>,
    entries: Vec<Entry>,
}

impl Bucket {
    fn latest(&self, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .max_by_key(|e| e.seq)
    }

    fn find(&self, key: &str, version_id: Option<&str>) -> Option<&Entry> {
        match version_id {
            Some(v) => self
                .entries
                .iter()
                .find(|e| e.key == key && e.version_id == v),
            None => self.latest(key).filter(|e| !e.delete_marker),
        }
    }

    fn find_mut(&mut self, key: &str, version_id: Option<&str>) -> Option<&mut Entry> {
        let seq = self.find(key, version_id)?.seq;
        self.entries.iter_mut().find(|e| e.seq == seq)
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Bucket>,
    calls: Vec<String>,
    denied: BTreeSet<String>,
    seq: u64,
}

impl State {
    fn bucket(&self, name: &str) -> Result<&Bucket> {
        self.buckets.get(name).ok_or_else(|| no_such_bucket(name))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut Bucket> {
        self.buckets.get_mut(name).ok_or_else(|| no_such_bucket(name))
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    owner_project: String,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            owner_project: DEFAULT_OWNER_PROJECT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Project reported as owner of new buckets and objects
    pub fn with_owner(mut self, project_id: impl Into<String>) -> Self {
        self.owner_project = project_id.into();
        self
    }

    /// Entries per version listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call and fail it if the operation is denied
    fn enter(&self, op: &str) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(op.to_string());
        if state.denied.contains(op) {
            return Err(s3_error(403, "AccessDenied", format!("{op}: access denied")));
        }
        Ok(state)
    }

    fn owner_acl(&self) -> Acl {
        let owner = owner_id_for_project(&self.owner_project);
        Acl {
            owner_id: Some(owner.clone()),
            grants: vec![Grant {
                grantee_id: Some(owner),
                grantee_uri: None,
                permission: "FULL_CONTROL".into(),
            }],
        }
    }

    /// Make every later call to `op` fail with `AccessDenied`
    pub fn deny(&self, op: &str) {
        self.lock().denied.insert(op.to_string());
    }

    pub fn allow(&self, op: &str) {
        self.lock().denied.remove(op);
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.lock().buckets.contains_key(bucket)
    }

    /// Object versions and delete markers left in a bucket
    pub fn version_count(&self, bucket: &str) -> usize {
        self.lock()
            .buckets
            .get(bucket)
            .map_or(0, |b| b.entries.len())
    }

    /// Body of the current version of an object
    pub fn object_body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        state.buckets.get(bucket)?.find(key, None).map(|e| e.body.clone())
    }

    /// Insert a bucket without logging a call
    pub fn seed_bucket(&self, bucket: &str, versioning: Versioning, object_lock: bool) {
        let acl = self.owner_acl();
        let mut state = self.lock();
        let entry = state.buckets.entry(bucket.to_string()).or_default();
        entry.versioning = versioning;
        entry.acl = acl;
        if object_lock {
            entry.object_lock = Some(ObjectLockConfig {
                enabled: true,
                ..Default::default()
            });
        }
    }

    /// Insert an object version without logging a call
    pub fn seed_version(&self, bucket: &str, key: &str, version_id: &str, legal_hold: bool) {
        self.seed_entry(bucket, key, version_id, false, legal_hold);
    }

    /// Insert a delete marker without logging a call
    pub fn seed_delete_marker(&self, bucket: &str, key: &str, version_id: &str) {
        self.seed_entry(bucket, key, version_id, true, false);
    }

    fn seed_entry(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        delete_marker: bool,
        legal_hold: bool,
    ) {
        let acl = self.owner_acl();
        let mut state = self.lock();
        let seq = state.next_seq();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .entries
            .push(Entry {
                key: key.to_string(),
                version_id: version_id.to_string(),
                seq,
                delete_marker,
                body: Vec::new(),
                content_type: None,
                metadata: BTreeMap::new(),
                tags: Vec::new(),
                storage_class: None,
                legal_hold,
                acl,
            });
    }
}

fn canned_grants(owner: &Acl, canned: &str) -> Result<Acl> {
    let mut acl = Acl {
        owner_id: owner.owner_id.clone(),
        grants: owner
            .grants
            .iter()
            .filter(|g| g.grantee_uri.is_none())
            .cloned()
            .collect(),
    };
    let public = |permission: &str| Grant {
        grantee_id: None,
        grantee_uri: Some(crate::acl::ALL_USERS_URI.to_string()),
        permission: permission.to_string(),
    };
    match canned {
        "private" => {}
        "public-read" => acl.grants.push(public("READ")),
        "public-read-write" => {
            acl.grants.push(public("READ"));
            acl.grants.push(public("WRITE"));
        }
        "authenticated-read" => acl.grants.push(Grant {
            grantee_id: None,
            grantee_uri: Some(crate::acl::AUTHENTICATED_USERS_URI.to_string()),
            permission: "READ".into(),
        }),
        other => {
            return Err(s3_error(400, "InvalidArgument", format!("unknown canned ACL {other}")));
        }
    }
    Ok(acl)
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> Result<()> {
        let acl = self.owner_acl();
        let mut state = self.enter("create_bucket")?;
        if state.buckets.contains_key(bucket) {
            return Err(s3_error(409, "BucketAlreadyOwnedByYou", format!("bucket {bucket} exists")));
        }
        let mut created = Bucket {
            acl,
            ..Default::default()
        };
        if object_lock {
            created.versioning = Versioning::Enabled;
            created.object_lock = Some(ObjectLockConfig {
                enabled: true,
                ..Default::default()
            });
        }
        state.buckets.insert(bucket.to_string(), created);
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        let state = self.enter("head_bucket")?;
        state.bucket(bucket).map(|_| ())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket")?;
        if !state.bucket(bucket)?.entries.is_empty() {
            return Err(s3_error(409, "BucketNotEmpty", format!("bucket {bucket} is not empty")));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        let state = self.enter("get_bucket_tagging")?;
        let tags = &state.bucket(bucket)?.tags;
        if tags.is_empty() {
            return Err(s3_error(404, "NoSuchTagSet", "no tag set"));
        }
        Ok(tags.clone())
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &[(String, String)]) -> Result<()> {
        let mut state = self.enter("put_bucket_tagging")?;
        state.bucket_mut(bucket)?.tags = tags.to_vec();
        Ok(())
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket_tagging")?;
        state.bucket_mut(bucket)?.tags.clear();
        Ok(())
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<Versioning> {
        let state = self.enter("get_bucket_versioning")?;
        Ok(state.bucket(bucket)?.versioning)
    }

    async fn put_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()> {
        let mut state = self.enter("put_bucket_versioning")?;
        let b = state.bucket_mut(bucket)?;
        if !enabled && b.object_lock.is_some() {
            return Err(s3_error(
                409,
                "InvalidBucketState",
                "versioning cannot be suspended on an object lock bucket",
            ));
        }
        b.versioning = if enabled {
            Versioning::Enabled
        } else {
            Versioning::Suspended
        };
        Ok(())
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<Acl> {
        let state = self.enter("get_bucket_acl")?;
        Ok(state.bucket(bucket)?.acl.clone())
    }

    async fn put_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()> {
        let mut state = self.enter("put_bucket_acl")?;
        let b = state.bucket_mut(bucket)?;
        b.acl = canned_grants(&b.acl, canned)?;
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>> {
        let state = self.enter("get_bucket_cors")?;
        state
            .bucket(bucket)?
            .cors
            .clone()
            .ok_or_else(|| s3_error(404, "NoSuchCORSConfiguration", "no CORS configuration"))
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        let mut state = self.enter("put_bucket_cors")?;
        state.bucket_mut(bucket)?.cors = Some(rules.to_vec());
        Ok(())
    }

    async fn delete_bucket_cors(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket_cors")?;
        state.bucket_mut(bucket)?.cors = None;
        Ok(())
    }

    async fn get_bucket_lifecycle(&self, bucket: &str) -> Result<Vec<LifecycleRule>> {
        let state = self.enter("get_bucket_lifecycle")?;
        state.bucket(bucket)?.lifecycle.clone().ok_or_else(|| {
            s3_error(404, "NoSuchLifecycleConfiguration", "no lifecycle configuration")
        })
    }

    async fn put_bucket_lifecycle(&self, bucket: &str, rules: &[LifecycleRule]) -> Result<()> {
        let mut state = self.enter("put_bucket_lifecycle")?;
        state.bucket_mut(bucket)?.lifecycle = Some(rules.to_vec());
        Ok(())
    }

    async fn delete_bucket_lifecycle(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket_lifecycle")?;
        state.bucket_mut(bucket)?.lifecycle = None;
        Ok(())
    }

    async fn get_bucket_website(&self, bucket: &str) -> Result<Website> {
        let state = self.enter("get_bucket_website")?;
        state.bucket(bucket)?.website.clone().ok_or_else(|| {
            s3_error(404, "NoSuchWebsiteConfiguration", "no website configuration")
        })
    }

    async fn put_bucket_website(&self, bucket: &str, website: &Website) -> Result<()> {
        let mut state = self.enter("put_bucket_website")?;
        state.bucket_mut(bucket)?.website = Some(website.clone());
        Ok(())
    }

    async fn delete_bucket_website(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket_website")?;
        state.bucket_mut(bucket)?.website = None;
        Ok(())
    }

    async fn get_object_lock_configuration(&self, bucket: &str) -> Result<ObjectLockConfig> {
        let state = self.enter("get_object_lock_configuration")?;
        state.bucket(bucket)?.object_lock.clone().ok_or_else(|| {
            s3_error(
                404,
                "ObjectLockConfigurationNotFoundError",
                "object lock is not enabled",
            )
        })
    }

    async fn put_object_lock_configuration(
        &self,
        bucket: &str,
        config: &ObjectLockConfig,
    ) -> Result<()> {
        let mut state = self.enter("put_object_lock_configuration")?;
        let b = state.bucket_mut(bucket)?;
        if b.object_lock.is_none() {
            return Err(s3_error(
                409,
                "InvalidBucketState",
                "object lock was not enabled at bucket creation",
            ));
        }
        b.object_lock = Some(ObjectLockConfig {
            enabled: true,
            ..config.clone()
        });
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String> {
        let state = self.enter("get_bucket_policy")?;
        state
            .bucket(bucket)?
            .policy
            .clone()
            .ok_or_else(|| s3_error(404, "NoSuchBucketPolicy", "no bucket policy"))
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        let mut state = self.enter("put_bucket_policy")?;
        if serde_json::from_str::<serde_json::Value>(policy).is_err() {
            return Err(s3_error(400, "MalformedPolicy", "policy is not valid JSON"));
        }
        state.bucket_mut(bucket)?.policy = Some(policy.to_string());
        Ok(())
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        let mut state = self.enter("delete_bucket_policy")?;
        state.bucket_mut(bucket)?.policy = None;
        Ok(())
    }

    async fn put_object(&self, object: PutObject) -> Result<Option<String>> {
        let owner = self.owner_acl();
        let mut state = self.enter("put_object")?;
        let seq = state.next_seq();
        let b = state.bucket_mut(&object.bucket)?;
        let acl = canned_grants(&owner, object.acl.as_deref().unwrap_or("private"))?;
        let versioned = b.versioning.is_enabled();
        let version_id = if versioned {
            format!("v{seq}")
        } else {
            if b.entries
                .iter()
                .any(|e| e.key == object.key && e.version_id == NULL_VERSION && e.legal_hold)
            {
                return Err(s3_error(403, "AccessDenied", "object is under legal hold"));
            }
            b.entries
                .retain(|e| !(e.key == object.key && e.version_id == NULL_VERSION));
            NULL_VERSION.to_string()
        };
        b.entries.push(Entry {
            key: object.key,
            version_id: version_id.clone(),
            seq,
            delete_marker: false,
            body: object.body,
            content_type: object.content_type,
            metadata: object
                .metadata
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            tags: object.tags,
            storage_class: object.storage_class,
            legal_hold: false,
            acl,
        });
        Ok(versioned.then_some(version_id))
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectHead> {
        let state = self.enter("head_object")?;
        let entry = state
            .bucket(bucket)?
            .find(key, version_id)
            .filter(|e| !e.delete_marker)
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))?;
        Ok(ObjectHead {
            etag: Some(format!("\"{:x}\"", entry.seq)),
            size: entry.body.len() as i64,
            metadata: entry.metadata.clone(),
            storage_class: entry.storage_class.clone(),
            content_type: entry.content_type.clone(),
            legal_hold: entry.legal_hold,
            version_id: Some(entry.version_id.clone()),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        _bypass_governance: bool,
    ) -> Result<()> {
        let mut state = self.enter("delete_object")?;
        let seq = state.next_seq();
        let b = state.bucket_mut(bucket)?;
        match version_id {
            Some(v) => {
                if let Some(entry) = b.entries.iter().find(|e| e.key == key && e.version_id == v) {
                    if entry.legal_hold {
                        return Err(s3_error(403, "AccessDenied", "object is under legal hold"));
                    }
                }
                b.entries.retain(|e| !(e.key == key && e.version_id == v));
            }
            None if b.versioning.is_enabled() => {
                b.entries.push(Entry {
                    key: key.to_string(),
                    version_id: format!("v{seq}"),
                    seq,
                    delete_marker: true,
                    body: Vec::new(),
                    content_type: None,
                    metadata: BTreeMap::new(),
                    tags: Vec::new(),
                    storage_class: None,
                    legal_hold: false,
                    acl: Acl::default(),
                });
            }
            None => {
                if b.entries
                    .iter()
                    .any(|e| e.key == key && e.version_id == NULL_VERSION && e.legal_hold)
                {
                    return Err(s3_error(403, "AccessDenied", "object is under legal hold"));
                }
                b.entries
                    .retain(|e| !(e.key == key && e.version_id == NULL_VERSION));
            }
        }
        Ok(())
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<(String, String)>> {
        let state = self.enter("get_object_tagging")?;
        state
            .bucket(bucket)?
            .find(key, None)
            .map(|e| e.tags.clone())
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &[(String, String)],
    ) -> Result<()> {
        let mut state = self.enter("put_object_tagging")?;
        let entry = state
            .bucket_mut(bucket)?
            .find_mut(key, None)
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))?;
        entry.tags = tags.to_vec();
        Ok(())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl> {
        let state = self.enter("get_object_acl")?;
        state
            .bucket(bucket)?
            .find(key, None)
            .map(|e| e.acl.clone())
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()> {
        let mut state = self.enter("put_object_acl")?;
        let entry = state
            .bucket_mut(bucket)?
            .find_mut(key, None)
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))?;
        entry.acl = canned_grants(&entry.acl, canned)?;
        Ok(())
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        on: bool,
    ) -> Result<()> {
        let mut state = self.enter("put_object_legal_hold")?;
        let b = state.bucket_mut(bucket)?;
        if b.object_lock.is_none() {
            return Err(s3_error(
                400,
                "InvalidRequest",
                "bucket is missing object lock configuration",
            ));
        }
        let entry = b
            .find_mut(key, version_id)
            .ok_or_else(|| s3_error(404, "NoSuchKey", format!("{key} not found")))?;
        entry.legal_hold = on;
        Ok(())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &VersionCursor,
    ) -> Result<VersionPage> {
        let state = self.enter("list_object_versions")?;
        let b = state.bucket(bucket)?;

        // Keys ascending, newest version first within a key
        let mut entries: Vec<&Entry> = b
            .entries
            .iter()
            .filter(|e| {
                cursor
                    .prefix
                    .as_deref()
                    .is_none_or(|p| e.key.starts_with(p))
            })
            .collect();
        entries.sort_by(|x, y| x.key.cmp(&y.key).then(y.seq.cmp(&x.seq)));

        let start = match (&cursor.key_marker, &cursor.version_id_marker) {
            (Some(key), Some(version)) => entries
                .iter()
                .position(|e| &e.key == key && &e.version_id == version)
                .map_or(0, |i| i + 1),
            (Some(key), None) => entries
                .iter()
                .position(|e| e.key.as_str() > key.as_str())
                .unwrap_or(entries.len()),
            _ => 0,
        };
        let remaining = &entries[start.min(entries.len())..];
        let taken = &remaining[..remaining.len().min(self.page_size)];
        let is_truncated = remaining.len() > taken.len();

        let mut page = VersionPage {
            is_truncated,
            ..Default::default()
        };
        for e in taken {
            let version = ObjectVersion {
                key: e.key.clone(),
                version_id: Some(e.version_id.clone()),
            };
            if e.delete_marker {
                page.delete_markers.push(version);
            } else {
                page.versions.push(version);
            }
        }
        if is_truncated {
            if let Some(last) = taken.last() {
                page.next_key_marker = Some(last.key.clone());
                page.next_version_id_marker = Some(last.version_id.clone());
            }
        }
        Ok(page)
    }
}

/// Hands out one shared [`MemoryStore`] and records every connection
#[derive(Debug, Default)]
pub struct MemoryStoreFactory {
    store: Arc<MemoryStore>,
    connections: Mutex<Vec<ConnectParams>>,
}

impl MemoryStoreFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    pub fn connections(&self) -> Vec<ConnectParams> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn ObjectStore>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());
        Ok(self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unversioned_overwrite_keeps_one_version() {
        let store = MemoryStore::new();
        store.create_bucket("b", false).await.unwrap();
        for body in [b"one".to_vec(), b"two".to_vec()] {
            let version = store
                .put_object(PutObject {
                    bucket: "b".into(),
                    key: "k".into(),
                    body,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert!(version.is_none());
        }
        assert_eq!(store.version_count("b"), 1);
        assert_eq!(store.object_body("b", "k").unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_versioned_delete_adds_marker() {
        let store = MemoryStore::new();
        store.seed_bucket("b", Versioning::Enabled, false);
        store.seed_version("b", "k", "v1", false);
        store.delete_object("b", "k", None, false).await.unwrap();

        assert_eq!(store.version_count("b"), 2);
        let err = store.head_object("b", "k", None).await.unwrap_err();
        assert!(scwtf_cloud::is_not_found(&err));
        assert!(store.head_object("b", "k", Some("v1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_pages_resume_after_marker() {
        let store = MemoryStore::new().with_page_size(2);
        store.seed_bucket("b", Versioning::Enabled, false);
        store.seed_version("b", "a", "a1", false);
        store.seed_version("b", "a", "a2", false);
        store.seed_version("b", "c", "c1", false);

        let first = store
            .list_object_versions("b", &VersionCursor::default())
            .await
            .unwrap();
        assert!(first.is_truncated);
        let ids: Vec<_> = first.versions.iter().map(|v| v.version_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);

        let second = store
            .list_object_versions(
                "b",
                &VersionCursor {
                    prefix: None,
                    key_marker: first.next_key_marker,
                    version_id_marker: first.next_version_id_marker,
                },
            )
            .await
            .unwrap();
        assert!(!second.is_truncated);
        assert_eq!(second.versions.len(), 1);
        assert_eq!(second.versions[0].key, "c");
    }

    #[tokio::test]
    async fn test_denied_operation() {
        let store = MemoryStore::new();
        store.seed_bucket("b", Versioning::Unversioned, false);
        store.deny("get_bucket_cors");
        let err = store.get_bucket_cors("b").await.unwrap_err();
        assert!(scwtf_cloud::is_forbidden(&err));
        store.allow("get_bucket_cors");
        let err = store.get_bucket_cors("b").await.unwrap_err();
        assert!(scwtf_cloud::is_not_found(&err));
        assert_eq!(store.calls_to("get_bucket_cors"), 2);
    }

    #[tokio::test]
    async fn test_delete_non_empty_bucket_conflicts() {
        let store = MemoryStore::new();
        store.seed_bucket("b", Versioning::Unversioned, false);
        store.seed_version("b", "k", NULL_VERSION, false);
        let err = store.delete_bucket("b").await.unwrap_err();
        assert!(scwtf_cloud::is_conflict(&err));
    }
}

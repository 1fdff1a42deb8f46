//! Object storage seam
//!
//! Resource handlers see object storage only through [`ObjectStore`]. The
//! production implementation is [`crate::s3::S3Store`]; tests use the
//! in-memory store behind the `test-utils` feature.

use crate::acl;
use crate::types::{
    Acl, CorsRule, LifecycleRule, ObjectHead, ObjectLockConfig, PutObject, VersionCursor,
    VersionPage, Versioning, Website,
};
use async_trait::async_trait;
use scwtf_cloud::Result;
use scwtf_cloud::locality::Region;
use std::sync::Arc;

#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    // Buckets
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> Result<()>;
    async fn head_bucket(&self, bucket: &str) -> Result<()>;
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<(String, String)>>;
    async fn put_bucket_tagging(&self, bucket: &str, tags: &[(String, String)]) -> Result<()>;
    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<()>;

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<Versioning>;
    async fn put_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()>;

    async fn get_bucket_acl(&self, bucket: &str) -> Result<Acl>;
    async fn put_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()>;

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>>;
    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()>;
    async fn delete_bucket_cors(&self, bucket: &str) -> Result<()>;

    async fn get_bucket_lifecycle(&self, bucket: &str) -> Result<Vec<LifecycleRule>>;
    async fn put_bucket_lifecycle(&self, bucket: &str, rules: &[LifecycleRule]) -> Result<()>;
    async fn delete_bucket_lifecycle(&self, bucket: &str) -> Result<()>;

    async fn get_bucket_website(&self, bucket: &str) -> Result<Website>;
    async fn put_bucket_website(&self, bucket: &str, website: &Website) -> Result<()>;
    async fn delete_bucket_website(&self, bucket: &str) -> Result<()>;

    async fn get_object_lock_configuration(&self, bucket: &str) -> Result<ObjectLockConfig>;
    async fn put_object_lock_configuration(
        &self,
        bucket: &str,
        config: &ObjectLockConfig,
    ) -> Result<()>;

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String>;
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;
    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()>;

    // Objects
    async fn put_object(&self, object: PutObject) -> Result<Option<String>>;
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectHead>;
    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> Result<()>;

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<(String, String)>>;
    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &[(String, String)],
    ) -> Result<()>;

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl>;
    async fn put_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()>;

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        on: bool,
    ) -> Result<()>;

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &VersionCursor,
    ) -> Result<VersionPage>;
}

/// What a callback needs to reach object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub region: Region,
    pub access_key: String,
    pub secret_key: String,
    /// Project the access key is scoped to
    pub project_id: Option<String>,
    /// Explicit endpoint (`S3_ENDPOINT`)
    pub endpoint: Option<String>,
}

impl ConnectParams {
    /// Endpoint URL: the explicit override, else `https://s3.<region>.scw.cloud`
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://s3.{}.scw.cloud", self.region),
        }
    }

    /// Access key as presented to S3, `{access}@{project}` when project-scoped
    pub fn presented_access_key(&self) -> String {
        acl::build_access_key(&self.access_key, self.project_id.as_deref())
    }
}

/// Opens a store per callback
#[async_trait]
pub trait StoreFactory: Send + Sync + std::fmt::Debug {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn ObjectStore>>;
}

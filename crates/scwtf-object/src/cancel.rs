//! Store wrapper bound to one callback's cancellation token

use crate::store::ObjectStore;
use crate::types::{
    Acl, CorsRule, LifecycleRule, ObjectHead, ObjectLockConfig, PutObject, VersionCursor,
    VersionPage, Versioning, Website,
};
use async_trait::async_trait;
use scwtf_cloud::{Result, call_or_cancel};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Every call races the token and yields `CloudError::Cancelled` once it fires
#[derive(Debug, Clone)]
pub struct CancellableStore {
    inner: Arc<dyn ObjectStore>,
    cancel: CancellationToken,
}

impl CancellableStore {
    pub fn new(inner: Arc<dyn ObjectStore>, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl ObjectStore for CancellableStore {
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.create_bucket(bucket, object_lock)).await
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.head_bucket(bucket)).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket(bucket)).await
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_tagging(bucket)).await
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &[(String, String)]) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_tagging(bucket, tags)).await
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket_tagging(bucket)).await
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<Versioning> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_versioning(bucket)).await
    }

    async fn put_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_versioning(bucket, enabled)).await
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<Acl> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_acl(bucket)).await
    }

    async fn put_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_acl(bucket, canned)).await
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_cors(bucket)).await
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_cors(bucket, rules)).await
    }

    async fn delete_bucket_cors(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket_cors(bucket)).await
    }

    async fn get_bucket_lifecycle(&self, bucket: &str) -> Result<Vec<LifecycleRule>> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_lifecycle(bucket)).await
    }

    async fn put_bucket_lifecycle(&self, bucket: &str, rules: &[LifecycleRule]) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_lifecycle(bucket, rules)).await
    }

    async fn delete_bucket_lifecycle(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket_lifecycle(bucket)).await
    }

    async fn get_bucket_website(&self, bucket: &str) -> Result<Website> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_website(bucket)).await
    }

    async fn put_bucket_website(&self, bucket: &str, website: &Website) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_website(bucket, website)).await
    }

    async fn delete_bucket_website(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket_website(bucket)).await
    }

    async fn get_object_lock_configuration(&self, bucket: &str) -> Result<ObjectLockConfig> {
        call_or_cancel(&self.cancel, self.inner.get_object_lock_configuration(bucket)).await
    }

    async fn put_object_lock_configuration(
        &self,
        bucket: &str,
        config: &ObjectLockConfig,
    ) -> Result<()> {
        let call = self.inner.put_object_lock_configuration(bucket, config);
        call_or_cancel(&self.cancel, call).await
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String> {
        call_or_cancel(&self.cancel, self.inner.get_bucket_policy(bucket)).await
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_bucket_policy(bucket, policy)).await
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.delete_bucket_policy(bucket)).await
    }

    async fn put_object(&self, object: PutObject) -> Result<Option<String>> {
        call_or_cancel(&self.cancel, self.inner.put_object(object)).await
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectHead> {
        call_or_cancel(&self.cancel, self.inner.head_object(bucket, key, version_id)).await
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> Result<()> {
        let call = self
            .inner
            .delete_object(bucket, key, version_id, bypass_governance);
        call_or_cancel(&self.cancel, call).await
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<(String, String)>> {
        call_or_cancel(&self.cancel, self.inner.get_object_tagging(bucket, key)).await
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &[(String, String)],
    ) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_object_tagging(bucket, key, tags)).await
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl> {
        call_or_cancel(&self.cancel, self.inner.get_object_acl(bucket, key)).await
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()> {
        call_or_cancel(&self.cancel, self.inner.put_object_acl(bucket, key, canned)).await
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        on: bool,
    ) -> Result<()> {
        let call = self
            .inner
            .put_object_legal_hold(bucket, key, version_id, on);
        call_or_cancel(&self.cancel, call).await
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &VersionCursor,
    ) -> Result<VersionPage> {
        call_or_cancel(&self.cancel, self.inner.list_object_versions(bucket, cursor)).await
    }
}

#[cfg(all(test, feature = "test-utils"))]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use scwtf_cloud::CloudError;

    #[tokio::test]
    async fn test_cancelled_token_skips_the_store() {
        let inner = Arc::new(MemoryStore::new());
        let store = CancellableStore::new(inner.clone(), CancellationToken::new());
        store.create_bucket("tf-cancel", false).await.unwrap();
        assert!(inner.bucket_exists("tf-cancel"));

        store.cancel().cancel();
        let err = store.delete_bucket("tf-cancel").await.unwrap_err();
        assert!(matches!(err, CloudError::Cancelled));
        assert!(inner.bucket_exists("tf-cancel"));
        assert_eq!(inner.calls_to("delete_bucket"), 0);
    }
}

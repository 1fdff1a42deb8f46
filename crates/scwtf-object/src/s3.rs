//! aws-sdk-s3 implementation of [`ObjectStore`]

use crate::store::{ConnectParams, ObjectStore, StoreFactory};
use crate::types::{
    Acl, CorsRule, Grant, LifecycleRule, ObjectHead, ObjectLockConfig, ObjectVersion, PutObject,
    Transition, VersionCursor, VersionPage, Versioning, Website,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region as AwsRegion};
use aws_sdk_s3::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    AbortIncompleteMultipartUpload, BucketCannedAcl, BucketLifecycleConfiguration,
    BucketVersioningStatus, CorsConfiguration, DefaultRetention, ErrorDocument, ExpirationStatus,
    IndexDocument, LifecycleExpiration, ObjectCannedAcl, ObjectLockEnabled, ObjectLockLegalHold,
    ObjectLockLegalHoldStatus, ObjectLockRetentionMode, ObjectLockRule, StorageClass, Tag, Tagging,
    TransitionStorageClass, VersioningConfiguration, WebsiteConfiguration,
};
use aws_sdk_s3::{Client, config};
use scwtf_cloud::{ApiError, CloudError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Object store backed by an S3 client bound to one region and credential set
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client for the given region and credentials. Path-style
    /// addressing is forced: bucket names may contain dots.
    pub async fn connect(params: &ConnectParams) -> Result<Self> {
        let credentials = Credentials::new(
            params.presented_access_key(),
            params.secret_key.clone(),
            None,
            None,
            "scaleway",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(AwsRegion::new(params.region.to_string()))
            .endpoint_url(params.endpoint_url())
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        debug!(endpoint = %params.endpoint_url(), region = %params.region, "S3 client ready");
        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Factory opening an [`S3Store`] per callback
#[derive(Debug, Clone, Copy, Default)]
pub struct S3StoreFactory;

#[async_trait]
impl StoreFactory for S3StoreFactory {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3Store::connect(params).await?))
    }
}

/// Map an SDK failure into the provider's error taxonomy
pub fn from_sdk<E>(err: SdkError<E, HttpResponse>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            CloudError::Transport(DisplayErrorContext(&err).to_string())
        }
        _ => {
            let status = err.raw_response().map_or(0, |r| r.status().as_u16());
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            let mut api = ApiError::new(status, message);
            if let Some(code) = err.code() {
                api = api.with_type(code);
            }
            CloudError::Api(api)
        }
    }
}

fn build_error(err: BuildError) -> CloudError {
    CloudError::Validation {
        attribute: None,
        message: err.to_string(),
    }
}

fn to_tags(tags: &[(String, String)]) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build().map_err(build_error))
        .collect()
}

fn tagging(tags: &[(String, String)]) -> Result<Tagging> {
    Tagging::builder()
        .set_tag_set(Some(to_tags(tags)?))
        .build()
        .map_err(build_error)
}

fn from_tags(tags: &[Tag]) -> Vec<(String, String)> {
    tags.iter()
        .map(|t| (t.key().to_string(), t.value().to_string()))
        .collect()
}

fn to_acl(owner: Option<&aws_sdk_s3::types::Owner>, grants: &[aws_sdk_s3::types::Grant]) -> Acl {
    Acl {
        owner_id: owner.and_then(|o| o.id()).map(str::to_string),
        grants: grants
            .iter()
            .map(|g| Grant {
                grantee_id: g.grantee().and_then(|e| e.id()).map(str::to_string),
                grantee_uri: g.grantee().and_then(|e| e.uri()).map(str::to_string),
                permission: g
                    .permission()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect(),
    }
}

/// URL-encoded tag set for `PutObject`
fn tagging_header(tags: &[(String, String)]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&"),
    )
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[allow(deprecated)]
fn to_lifecycle_rule(rule: &LifecycleRule) -> Result<aws_sdk_s3::types::LifecycleRule> {
    let mut builder = aws_sdk_s3::types::LifecycleRule::builder()
        .set_id(rule.id.clone())
        .prefix(rule.prefix.clone().unwrap_or_default())
        .status(if rule.enabled {
            ExpirationStatus::Enabled
        } else {
            ExpirationStatus::Disabled
        });
    if let Some(days) = rule.expiration_days {
        builder = builder.expiration(LifecycleExpiration::builder().days(days).build());
    }
    for t in &rule.transitions {
        builder = builder.transitions(
            aws_sdk_s3::types::Transition::builder()
                .days(t.days)
                .storage_class(TransitionStorageClass::from(t.storage_class.as_str()))
                .build(),
        );
    }
    if let Some(days) = rule.abort_incomplete_multipart_upload_days {
        builder = builder.abort_incomplete_multipart_upload(
            AbortIncompleteMultipartUpload::builder()
                .days_after_initiation(days)
                .build(),
        );
    }
    builder.build().map_err(build_error)
}

#[allow(deprecated)]
fn from_lifecycle_rule(rule: &aws_sdk_s3::types::LifecycleRule) -> LifecycleRule {
    LifecycleRule {
        id: rule.id().map(str::to_string),
        prefix: rule.prefix().filter(|p| !p.is_empty()).map(str::to_string),
        enabled: *rule.status() == ExpirationStatus::Enabled,
        expiration_days: rule.expiration().and_then(|e| e.days()),
        transitions: rule
            .transitions()
            .iter()
            .filter_map(|t| {
                Some(Transition {
                    days: t.days()?,
                    storage_class: t.storage_class()?.as_str().to_string(),
                })
            })
            .collect(),
        abort_incomplete_multipart_upload_days: rule
            .abort_incomplete_multipart_upload()
            .and_then(|a| a.days_after_initiation()),
    }
}

fn to_cors_rule(rule: &CorsRule) -> Result<aws_sdk_s3::types::CorsRule> {
    aws_sdk_s3::types::CorsRule::builder()
        .set_allowed_methods(Some(rule.allowed_methods.clone()))
        .set_allowed_origins(Some(rule.allowed_origins.clone()))
        .set_allowed_headers(Some(rule.allowed_headers.clone()))
        .set_expose_headers(Some(rule.expose_headers.clone()))
        .set_max_age_seconds(rule.max_age_seconds)
        .build()
        .map_err(build_error)
}

fn from_cors_rule(rule: &aws_sdk_s3::types::CorsRule) -> CorsRule {
    CorsRule {
        allowed_methods: rule.allowed_methods().to_vec(),
        allowed_origins: rule.allowed_origins().to_vec(),
        allowed_headers: rule.allowed_headers().to_vec(),
        expose_headers: rule.expose_headers().to_vec(),
        max_age_seconds: rule.max_age_seconds(),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn create_bucket(&self, bucket: &str, object_lock: bool) -> Result<()> {
        info!(bucket, object_lock, "Creating bucket");
        self.client
            .create_bucket()
            .bucket(bucket)
            .object_lock_enabled_for_bucket(object_lock)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        info!(bucket, "Deleting bucket");
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        let out = self
            .client
            .get_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(from_tags(out.tag_set()))
    }

    async fn put_bucket_tagging(&self, bucket: &str, tags: &[(String, String)]) -> Result<()> {
        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging(tags)?)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<Versioning> {
        let out = self
            .client
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(match out.status() {
            Some(BucketVersioningStatus::Enabled) => Versioning::Enabled,
            Some(BucketVersioningStatus::Suspended) => Versioning::Suspended,
            _ => Versioning::Unversioned,
        })
    }

    async fn put_bucket_versioning(&self, bucket: &str, enabled: bool) -> Result<()> {
        let status = if enabled {
            BucketVersioningStatus::Enabled
        } else {
            BucketVersioningStatus::Suspended
        };
        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(VersioningConfiguration::builder().status(status).build())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_acl(&self, bucket: &str) -> Result<Acl> {
        let out = self
            .client
            .get_bucket_acl()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(to_acl(out.owner(), out.grants()))
    }

    async fn put_bucket_acl(&self, bucket: &str, canned: &str) -> Result<()> {
        self.client
            .put_bucket_acl()
            .bucket(bucket)
            .acl(BucketCannedAcl::from(canned))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>> {
        let out = self
            .client
            .get_bucket_cors()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(out.cors_rules().iter().map(from_cors_rule).collect())
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        let rules = rules.iter().map(to_cors_rule).collect::<Result<Vec<_>>>()?;
        let cors = CorsConfiguration::builder()
            .set_cors_rules(Some(rules))
            .build()
            .map_err(build_error)?;
        self.client
            .put_bucket_cors()
            .bucket(bucket)
            .cors_configuration(cors)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket_cors(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket_cors()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_lifecycle(&self, bucket: &str) -> Result<Vec<LifecycleRule>> {
        let out = self
            .client
            .get_bucket_lifecycle_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(out.rules().iter().map(from_lifecycle_rule).collect())
    }

    async fn put_bucket_lifecycle(&self, bucket: &str, rules: &[LifecycleRule]) -> Result<()> {
        let rules = rules
            .iter()
            .map(to_lifecycle_rule)
            .collect::<Result<Vec<_>>>()?;
        let config = BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(build_error)?;
        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .lifecycle_configuration(config)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket_lifecycle(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket_lifecycle()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_website(&self, bucket: &str) -> Result<Website> {
        let out = self
            .client
            .get_bucket_website()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(Website {
            index_document: out
                .index_document()
                .map(|d| d.suffix().to_string())
                .unwrap_or_default(),
            error_document: out.error_document().map(|d| d.key().to_string()),
        })
    }

    async fn put_bucket_website(&self, bucket: &str, website: &Website) -> Result<()> {
        let index = IndexDocument::builder()
            .suffix(&website.index_document)
            .build()
            .map_err(build_error)?;
        let error = website
            .error_document
            .as_ref()
            .map(|key| ErrorDocument::builder().key(key).build())
            .transpose()
            .map_err(build_error)?;
        let config = WebsiteConfiguration::builder()
            .index_document(index)
            .set_error_document(error)
            .build();
        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(config)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket_website(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket_website()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_object_lock_configuration(&self, bucket: &str) -> Result<ObjectLockConfig> {
        let out = self
            .client
            .get_object_lock_configuration()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        let Some(config) = out.object_lock_configuration() else {
            return Ok(ObjectLockConfig::default());
        };
        let retention = config.rule().and_then(|r| r.default_retention());
        Ok(ObjectLockConfig {
            enabled: config.object_lock_enabled() == Some(&ObjectLockEnabled::Enabled),
            mode: retention
                .and_then(|r| r.mode())
                .map(|m| m.as_str().to_string()),
            days: retention.and_then(|r| r.days()),
            years: retention.and_then(|r| r.years()),
        })
    }

    async fn put_object_lock_configuration(
        &self,
        bucket: &str,
        config: &ObjectLockConfig,
    ) -> Result<()> {
        let mut builder = aws_sdk_s3::types::ObjectLockConfiguration::builder()
            .object_lock_enabled(ObjectLockEnabled::Enabled);
        if let Some(mode) = &config.mode {
            let retention = DefaultRetention::builder()
                .mode(ObjectLockRetentionMode::from(mode.as_str()))
                .set_days(config.days)
                .set_years(config.years)
                .build();
            builder = builder.rule(ObjectLockRule::builder().default_retention(retention).build());
        }
        self.client
            .put_object_lock_configuration()
            .bucket(bucket)
            .object_lock_configuration(builder.build())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<String> {
        let out = self
            .client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(out.policy().unwrap_or_default().to_string())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn put_object(&self, object: PutObject) -> Result<Option<String>> {
        info!(
            bucket = %object.bucket,
            key = %object.key,
            size = object.body.len(),
            "Uploading object"
        );
        let metadata = (!object.metadata.is_empty()).then(|| {
            object
                .metadata
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect()
        });
        let out = self
            .client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .body(ByteStream::from(object.body))
            .set_content_type(object.content_type)
            .set_metadata(metadata)
            .set_tagging(tagging_header(&object.tags))
            .set_storage_class(object.storage_class.as_deref().map(StorageClass::from))
            .set_acl(object.acl.as_deref().map(ObjectCannedAcl::from))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(out.version_id().map(str::to_string))
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectHead> {
        let out = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(ObjectHead {
            etag: out.e_tag().map(str::to_string),
            size: out.content_length().unwrap_or_default(),
            metadata: out
                .metadata()
                .map(|m| m.iter().map(|(k, v)| (k.to_lowercase(), v.clone())).collect())
                .unwrap_or_default(),
            storage_class: out.storage_class().map(|s| s.as_str().to_string()),
            content_type: out.content_type().map(str::to_string),
            legal_hold: out.object_lock_legal_hold_status() == Some(&ObjectLockLegalHoldStatus::On),
            version_id: out.version_id().map(str::to_string),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
    ) -> Result<()> {
        debug!(bucket, key, ?version_id, "Deleting object");
        let mut request = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string));
        if bypass_governance {
            request = request.bypass_governance_retention(true);
        }
        request.send().await.map_err(from_sdk)?;
        Ok(())
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<(String, String)>> {
        let out = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(from_tags(out.tag_set()))
    }

    async fn put_object_tagging(
        &self,
        bucket: &str,
        key: &str,
        tags: &[(String, String)],
    ) -> Result<()> {
        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging(tags)?)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> Result<Acl> {
        let out = self
            .client
            .get_object_acl()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(to_acl(out.owner(), out.grants()))
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, canned: &str) -> Result<()> {
        self.client
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(canned))
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        on: bool,
    ) -> Result<()> {
        let status = if on {
            ObjectLockLegalHoldStatus::On
        } else {
            ObjectLockLegalHoldStatus::Off
        };
        self.client
            .put_object_legal_hold()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .legal_hold(ObjectLockLegalHold::builder().status(status).build())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: &VersionCursor,
    ) -> Result<VersionPage> {
        let out = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .set_prefix(cursor.prefix.clone())
            .set_key_marker(cursor.key_marker.clone())
            .set_version_id_marker(cursor.version_id_marker.clone())
            .send()
            .await
            .map_err(from_sdk)?;

        let versions = out
            .versions()
            .iter()
            .filter_map(|v| {
                Some(ObjectVersion {
                    key: v.key()?.to_string(),
                    version_id: v.version_id().map(str::to_string),
                })
            })
            .collect();
        let delete_markers = out
            .delete_markers()
            .iter()
            .filter_map(|m| {
                Some(ObjectVersion {
                    key: m.key()?.to_string(),
                    version_id: m.version_id().map(str::to_string),
                })
            })
            .collect();

        Ok(VersionPage {
            versions,
            delete_markers,
            is_truncated: out.is_truncated() == Some(true),
            next_key_marker: out.next_key_marker().map(str::to_string),
            next_version_id_marker: out.next_version_id_marker().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagging_header_is_url_encoded() {
        let tags = vec![
            ("env".to_string(), "prod".to_string()),
            ("owner name".to_string(), "a&b=c".to_string()),
        ];
        assert_eq!(
            tagging_header(&tags).as_deref(),
            Some("env=prod&owner%20name=a%26b%3Dc")
        );
        assert!(tagging_header(&[]).is_none());
    }

    #[test]
    fn test_lifecycle_rule_conversion() {
        let rule = LifecycleRule {
            id: Some("expire-logs".into()),
            prefix: Some("logs/".into()),
            enabled: true,
            expiration_days: Some(30),
            transitions: vec![Transition {
                days: 7,
                storage_class: "GLACIER".into(),
            }],
            abort_incomplete_multipart_upload_days: Some(2),
        };
        let sdk = to_lifecycle_rule(&rule).unwrap();
        assert_eq!(from_lifecycle_rule(&sdk), rule);
    }

    #[test]
    fn test_cors_rule_conversion() {
        let rule = CorsRule {
            allowed_methods: vec!["GET".into(), "PUT".into()],
            allowed_origins: vec!["https://example.com".into()],
            allowed_headers: vec!["*".into()],
            expose_headers: vec!["ETag".into()],
            max_age_seconds: Some(3000),
        };
        let sdk = to_cors_rule(&rule).unwrap();
        assert_eq!(from_cors_rule(&sdk), rule);
    }
}

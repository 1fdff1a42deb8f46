//! Object storage entities, independent of the SDK

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub grantee_id: Option<String>,
    pub grantee_uri: Option<String>,
    /// `READ`, `WRITE`, `FULL_CONTROL`, ...
    pub permission: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    /// Owner as reported by the API (`<project>:<project>`)
    pub owner_id: Option<String>,
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Versioning {
    #[default]
    Unversioned,
    Enabled,
    Suspended,
}

impl Versioning {
    pub fn is_enabled(self) -> bool {
        self == Versioning::Enabled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsRule {
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age_seconds: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub days: i32,
    pub storage_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleRule {
    pub id: Option<String>,
    pub prefix: Option<String>,
    pub enabled: bool,
    pub expiration_days: Option<i32>,
    pub transitions: Vec<Transition>,
    pub abort_incomplete_multipart_upload_days: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Website {
    pub index_document: String,
    pub error_document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLockConfig {
    pub enabled: bool,
    /// `GOVERNANCE` or `COMPLIANCE`
    pub mode: Option<String>,
    pub days: Option<i32>,
    pub years: Option<i32>,
}

/// Object upload request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<(String, String)>,
    pub storage_class: Option<String>,
    /// Canned ACL (`private`, `public-read`)
    pub acl: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub etag: Option<String>,
    pub size: i64,
    pub metadata: BTreeMap<String, String>,
    pub storage_class: Option<String>,
    pub content_type: Option<String>,
    pub legal_hold: bool,
    pub version_id: Option<String>,
}

/// One entry of a version listing (object version or delete marker)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionPage {
    pub versions: Vec<ObjectVersion>,
    pub delete_markers: Vec<ObjectVersion>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
}

/// Continuation of a version listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCursor {
    pub prefix: Option<String>,
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

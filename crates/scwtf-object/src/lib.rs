//! S3-compatible object storage for the scwtf provider
//!
//! Resource handlers talk to an [`ObjectStore`] opened per callback through a
//! [`StoreFactory`]. Besides the SDK adapter this crate carries the pieces of
//! bucket semantics that are independent of the wire: ACL and owner helpers,
//! policy normalization, and the parallel deletion of every object version.

pub mod acl;
pub mod cancel;
pub mod policy;
pub mod s3;
pub mod store;
pub mod types;
pub mod versions;

#[cfg(feature = "test-utils")]
pub mod memory;

pub use cancel::CancellableStore;
pub use s3::{S3Store, S3StoreFactory};
pub use store::{ConnectParams, ObjectStore, StoreFactory};
pub use types::{
    Acl, CorsRule, Grant, LifecycleRule, ObjectHead, ObjectLockConfig, ObjectVersion, PutObject,
    Transition, VersionCursor, VersionPage, Versioning, Website,
};
pub use versions::delete_object_versions;

#[cfg(feature = "test-utils")]
pub use memory::{MemoryStore, MemoryStoreFactory};

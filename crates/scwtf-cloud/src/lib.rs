//! scwtf cloud core
//!
//! Building blocks shared by every resource handler of the provider:
//!
//! - [`locality`]: region/zone addressing and composite identifiers
//! - [`error`]: the error type and its classification into [`ErrorKind`]
//! - [`wait`]: status waiters and retry loops with cancellation
//! - [`pool`]: bounded fan-out for bulk operations
//! - [`state`], [`schema`], [`diag`], [`expand`]: the callback surface
//! - [`http`], [`api`]: the HTTP seam and the JSON API client

pub mod api;
pub mod diag;
pub mod error;
pub mod expand;
pub mod http;
pub mod locality;
pub mod pool;
pub mod schema;
pub mod state;
pub mod wait;

// Re-exports
pub use api::{DEFAULT_API_URL, ScwClient};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{
    ApiError, CloudError, ErrorKind, Result, is_conflict, is_forbidden, is_not_found,
    is_precondition, is_quota_exceeded, is_retryable, is_transient,
};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use locality::{Locality, Region, Zone};
pub use pool::WorkerPool;
pub use schema::{Attribute, AttributeType, Presence, Schema, Validator};
pub use state::{Operation, ResourceState, Timeouts};
pub use wait::{HasStatus, StatusSet, WaitConfig, call_or_cancel};

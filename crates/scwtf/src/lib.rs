//! scwtf: Scaleway infrastructure provider core
//!
//! The host configures a [`Provider`] once and then drives create, read,
//! update, delete and import callbacks by resource kind, possibly in
//! parallel. Each callback gets its own [`CallContext`]; the only state shared
//! between callbacks is the immutable configuration.

pub mod context;
pub mod engine;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod resources;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use context::CallContext;
pub use engine::{Swallow, delete_tolerant, diagnose, read_or_remove};
pub use logging::init_logging;
pub use provider::Provider;
pub use registry::{Features, Registry};
pub use resource::{CallRequest, CallResponse, Callback, DynamicResource, Resource, Typed};
pub use scwtf_cloud::{CloudError, Diagnostic, Diagnostics, Result};
pub use scwtf_config::{Meta, MetaOptions};

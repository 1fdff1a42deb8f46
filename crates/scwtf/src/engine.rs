//! Lifecycle helpers shared by resource handlers
//!
//! Handlers never test status codes. A call site that tolerates some failures
//! declares a [`Swallow`] set of error kinds; everything else surfaces and is
//! turned into diagnostics by [`diagnose`].

use scwtf_cloud::locality::{Region, Zone};
use scwtf_cloud::{CloudError, Diagnostic, Diagnostics, ErrorKind, ResourceState, Result};
use scwtf_config::Meta;
use tracing::{debug, warn};

/// Error kinds a call site absorbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swallow(&'static [ErrorKind]);

impl Swallow {
    pub const NONE: Swallow = Swallow(&[]);
    pub const NOT_FOUND: Swallow = Swallow(&[ErrorKind::NotFound]);
    /// Not-found and forbidden, for resources whose parent may vanish first
    pub const GONE: Swallow = Swallow(&[ErrorKind::NotFound, ErrorKind::Forbidden]);

    pub const fn of(kinds: &'static [ErrorKind]) -> Self {
        Swallow(kinds)
    }

    pub fn contains(&self, err: &CloudError) -> bool {
        self.0.contains(&err.kind())
    }

    /// `Ok(None)` when the error is absorbed
    pub fn apply<T>(&self, context: &str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) if self.contains(&e) => {
                debug!(context, kind = %e.kind(), error = %e, "Swallowed error");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Read wrapper: a not-found result removes the resource from state
pub fn read_or_remove<A, T>(state: &mut ResourceState<A>, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(id = %state.id(), "Resource not found, removing from state");
            state.clear_id();
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Delete wrapper: not-found always counts as done, plus whatever `extra` absorbs
pub fn delete_tolerant(context: &str, result: Result<()>, extra: Swallow) -> Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound || extra.contains(&e) => {
            debug!(context, kind = %e.kind(), "Already gone");
            Ok(())
        }
        other => other,
    }
}

/// Diagnostics for a surfaced error; an aggregate yields one per inner error
pub fn diagnose(err: &CloudError) -> Diagnostics {
    match err {
        CloudError::Aggregate(errors) => errors.iter().flat_map(diagnose).collect(),
        CloudError::Cancelled => Diagnostic::error("Operation cancelled")
            .with_detail("the host cancelled the operation before it completed")
            .into(),
        other => Diagnostic::from_error(other).into(),
    }
}

/// Region from the attribute, else the provider default
pub fn resolve_region(value: Option<&str>, meta: &Meta) -> Result<Region> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map_err(|_| CloudError::validation("region", format!("unknown region {v:?}"))),
        None => Ok(meta.default_region()),
    }
}

/// Zone from the attribute, else the provider default
pub fn resolve_zone(value: Option<&str>, meta: &Meta) -> Result<Zone> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse()
            .map_err(|_| CloudError::validation("zone", format!("unknown zone {v:?}"))),
        None => Ok(meta.default_zone()),
    }
}

/// Project from the attribute, else the provider default
pub fn resolve_project(value: Option<&str>, meta: &Meta) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .or(meta.default_project_id())
        .map(str::to_string)
        .ok_or_else(|| {
            CloudError::validation(
                "project_id",
                "no project_id given and no default project configured",
            )
        })
}

//! Resource handler trait and its host-facing adapter
//!
//! Handlers implement [`Resource`] over their own attribute record. The
//! registry stores them behind [`DynamicResource`], which moves JSON attribute
//! bags in and out of the typed [`ResourceState`] and turns failures into
//! diagnostics.

use crate::context::CallContext;
use crate::engine::diagnose;
use async_trait::async_trait;
use scwtf_cloud::{Diagnostics, ResourceState, Result, Schema, Timeouts};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use tracing::{error, info};

/// Lifecycle callbacks of one resource kind
#[async_trait]
pub trait Resource: Send + Sync + Debug + 'static {
    /// Typed attribute record. Attribute structs use `#[serde(default)]` so
    /// partial bags (import, computed fields) deserialize.
    type Attrs: Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync;

    /// Kind name as written in configurations, e.g. `scaleway_instance_ip`
    const KIND: &'static str;

    fn schema(&self) -> Schema;

    /// Registered only when beta features are enabled
    fn is_beta(&self) -> bool {
        false
    }

    async fn create(&self, ctx: &CallContext, state: &mut ResourceState<Self::Attrs>) -> Result<()>;

    async fn read(&self, ctx: &CallContext, state: &mut ResourceState<Self::Attrs>) -> Result<()>;

    async fn update(
        &self,
        ctx: &CallContext,
        state: &mut ResourceState<Self::Attrs>,
    ) -> Result<()> {
        self.read(ctx, state).await
    }

    async fn delete(&self, ctx: &CallContext, state: &mut ResourceState<Self::Attrs>) -> Result<()>;

    /// Prepare state from an import ID; the adapter reads afterwards
    async fn import(
        &self,
        _ctx: &CallContext,
        _state: &mut ResourceState<Self::Attrs>,
    ) -> Result<()> {
        Ok(())
    }

    fn has_sweeper(&self) -> bool {
        false
    }

    /// Delete leftovers from test runs; returns how many were removed
    async fn sweep(&self, _ctx: &CallContext) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Callback {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl std::fmt::Display for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callback::Create => write!(f, "create"),
            Callback::Read => write!(f, "read"),
            Callback::Update => write!(f, "update"),
            Callback::Delete => write!(f, "delete"),
            Callback::Import => write!(f, "import"),
        }
    }
}

/// What the host hands to a callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Current ID; the import ID for imports, empty on create
    #[serde(default)]
    pub id: String,
    /// Planned attributes (the current state on read and delete)
    #[serde(default)]
    pub planned: Value,
    #[serde(default)]
    pub prior: Option<Value>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl CallRequest {
    pub fn new(planned: Value) -> Self {
        Self {
            planned,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_prior(mut self, prior: Value) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// What a callback hands back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Empty when the resource no longer exists
    pub id: String,
    pub state: Value,
    pub diagnostics: Diagnostics,
}

impl CallResponse {
    pub fn failed(id: impl Into<String>, state: Value, diagnostics: Diagnostics) -> Self {
        Self {
            id: id.into(),
            state,
            diagnostics,
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }
}

/// Object-safe view of a [`Resource`]
#[async_trait]
pub trait DynamicResource: Send + Sync + Debug {
    fn kind(&self) -> &'static str;
    fn schema(&self) -> Schema;
    fn is_beta(&self) -> bool;
    fn has_sweeper(&self) -> bool;
    async fn call(
        &self,
        callback: Callback,
        ctx: &CallContext,
        request: CallRequest,
    ) -> CallResponse;
    async fn sweep(&self, ctx: &CallContext) -> Result<usize>;
}

/// Adapter from a typed [`Resource`] to [`DynamicResource`]
#[derive(Debug)]
pub struct Typed<R>(pub R);

impl<R: Resource> Typed<R> {
    async fn run(
        &self,
        callback: Callback,
        ctx: &CallContext,
        state: &mut ResourceState<R::Attrs>,
    ) -> Result<()> {
        match callback {
            Callback::Create => self.0.create(ctx, state).await,
            Callback::Read => self.0.read(ctx, state).await,
            Callback::Update => self.0.update(ctx, state).await,
            Callback::Delete => {
                self.0.delete(ctx, state).await?;
                state.clear_id();
                Ok(())
            }
            Callback::Import => {
                state.importing = true;
                self.0.import(ctx, state).await?;
                self.0.read(ctx, state).await
            }
        }
    }
}

#[async_trait]
impl<R: Resource> DynamicResource for Typed<R> {
    fn kind(&self) -> &'static str {
        R::KIND
    }

    fn schema(&self) -> Schema {
        self.0.schema()
    }

    fn is_beta(&self) -> bool {
        self.0.is_beta()
    }

    fn has_sweeper(&self) -> bool {
        self.0.has_sweeper()
    }

    async fn call(
        &self,
        callback: Callback,
        ctx: &CallContext,
        request: CallRequest,
    ) -> CallResponse {
        let CallRequest {
            id,
            planned,
            prior,
            timeouts,
        } = request;
        let planned = if planned.is_null() {
            Value::Object(Default::default())
        } else {
            planned
        };

        let decoded = ResourceState::<R::Attrs>::from_json(id.clone(), planned.clone(), prior);
        let mut state = match decoded {
            Ok(state) => state.with_timeouts(timeouts),
            Err(e) => {
                error!(kind = R::KIND, %callback, error = %e, "Cannot decode attributes");
                return CallResponse::failed(id, planned, diagnose(&e));
            }
        };

        info!(kind = R::KIND, %callback, id = %state.id(), "Resource callback");
        let result = self.run(callback, ctx, &mut state).await;

        let mut diagnostics = ctx.take_warnings();
        if let Err(e) = &result {
            error!(kind = R::KIND, %callback, id = %state.id(), error = %e, "Callback failed");
            diagnostics.extend(diagnose(e));
        }
        let attrs = match state.attrs_json() {
            Ok(attrs) => attrs,
            Err(e) => {
                diagnostics.extend(diagnose(&e));
                planned
            }
        };
        CallResponse {
            id: state.id,
            state: attrs,
            diagnostics,
        }
    }

    async fn sweep(&self, ctx: &CallContext) -> Result<usize> {
        self.0.sweep(ctx).await
    }
}

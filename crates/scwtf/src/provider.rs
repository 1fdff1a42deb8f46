//! Host-facing provider surface
//!
//! The host configures the provider once, then dispatches lifecycle callbacks
//! by resource kind. Every callback answers with a [`CallResponse`]; failures
//! travel as diagnostics, never as panics or errors.

use crate::context::CallContext;
use crate::engine::diagnose;
use crate::registry::{Features, Registry};
use crate::resource::{CallRequest, CallResponse, Callback};
use scwtf_cloud::{Attribute, CloudError, Diagnostic, Diagnostics, Schema};
use scwtf_config::{Meta, MetaOptions, ProviderArgs};
use scwtf_object::{S3StoreFactory, StoreFactory};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Provider {
    meta: Arc<Meta>,
    registry: Registry,
    stores: Arc<dyn StoreFactory>,
}

impl Provider {
    /// Arguments of the provider block
    ///
    /// Values are checked by [`Meta::build`] once host unknowns are resolved.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "access_key",
                Attribute::optional_string().describe("The Scaleway access key"),
            )
            .with_attribute(
                "secret_key",
                Attribute::optional_string()
                    .sensitive()
                    .describe("The Scaleway secret key"),
            )
            .with_attribute("profile", Attribute::optional_string())
            .with_attribute("project_id", Attribute::optional_string())
            .with_attribute("organization_id", Attribute::optional_string())
            .with_attribute("region", Attribute::optional_string())
            .with_attribute("zone", Attribute::optional_string())
            .with_attribute("api_url", Attribute::optional_string())
    }

    /// Validate the provider block and resolve the configuration
    pub fn configure(config: &Value, options: MetaOptions) -> Result<Provider, Diagnostics> {
        let diags = Self::schema().validate(config);
        if diags.has_errors() {
            return Err(diags);
        }
        let args = ProviderArgs::from_json(config);
        let meta = Meta::build(&args, options).map_err(|e| diagnose(&CloudError::from(e)))?;
        Ok(Self::from_meta(meta))
    }

    pub fn from_meta(meta: Meta) -> Self {
        let features = Features::from_meta(&meta);
        info!(beta = features.beta, "Building resource registry");
        Self {
            meta: Arc::new(meta),
            registry: Registry::new(features),
            stores: Arc::new(S3StoreFactory),
        }
    }

    /// Replace the object storage backend
    pub fn with_store_factory(mut self, stores: Arc<dyn StoreFactory>) -> Self {
        self.stores = stores;
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.registry = Registry::new(features);
        self
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resource_schema(&self, kind: &str) -> Option<Schema> {
        self.registry.get(kind).map(|r| r.schema())
    }

    fn context(&self, cancel: CancellationToken) -> CallContext {
        CallContext::new(self.meta.clone(), self.stores.clone(), cancel)
    }

    pub async fn create(
        &self,
        kind: &str,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        self.dispatch(Callback::Create, kind, request, cancel).await
    }

    pub async fn read(
        &self,
        kind: &str,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        self.dispatch(Callback::Read, kind, request, cancel).await
    }

    pub async fn update(
        &self,
        kind: &str,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        self.dispatch(Callback::Update, kind, request, cancel).await
    }

    pub async fn delete(
        &self,
        kind: &str,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        self.dispatch(Callback::Delete, kind, request, cancel).await
    }

    /// Import by ID; `request.id` carries the import ID
    pub async fn import(
        &self,
        kind: &str,
        request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        self.dispatch(Callback::Import, kind, request, cancel).await
    }

    async fn dispatch(
        &self,
        callback: Callback,
        kind: &str,
        mut request: CallRequest,
        cancel: CancellationToken,
    ) -> CallResponse {
        let Some(resource) = self.registry.get(kind) else {
            warn!(kind, %callback, "Unknown resource kind");
            let diag = Diagnostic::error(format!("Unknown resource kind {kind}"))
                .with_detail(
                    "the kind is not supported by this provider, or needs beta features enabled",
                );
            return CallResponse::failed(request.id, request.planned, diag.into());
        };

        if matches!(callback, Callback::Create | Callback::Update) {
            let schema = resource.schema();
            schema.apply_defaults(&mut request.planned);
            let diags = schema.validate(&request.planned);
            if diags.has_errors() {
                return CallResponse::failed(request.id, request.planned, diags);
            }
        }

        let ctx = self.context(cancel);
        resource.call(callback, &ctx, request).await
    }

    /// Run every sweeper; returns how many resources were removed
    pub async fn sweep(&self, cancel: CancellationToken) -> (usize, Diagnostics) {
        let ctx = self.context(cancel);
        let mut removed = 0;
        let mut diags = Diagnostics::new();
        for resource in self.registry.sweepers() {
            match resource.sweep(&ctx).await {
                Ok(n) => {
                    info!(kind = resource.kind(), removed = n, "Sweeper done");
                    removed += n;
                }
                Err(e) => {
                    warn!(kind = resource.kind(), error = %e, "Sweeper failed");
                    diags.extend(diagnose(&e));
                }
            }
        }
        diags.extend(ctx.take_warnings());
        (removed, diags)
    }
}

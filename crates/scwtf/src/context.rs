//! Per-callback context
//!
//! Parallel callbacks share only the immutable [`Meta`] and the store
//! factory. Everything else (API client, object store, warnings) belongs to
//! one [`CallContext`].

use scwtf_cloud::locality::Region;
use scwtf_cloud::{CloudError, Diagnostic, Diagnostics, Result, ScwClient, WaitConfig};
use scwtf_config::Meta;
use scwtf_object::{CancellableStore, ConnectParams, ObjectStore, StoreFactory};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug)]
pub struct CallContext {
    meta: Arc<Meta>,
    stores: Arc<dyn StoreFactory>,
    cancel: CancellationToken,
    warnings: Mutex<Diagnostics>,
}

impl CallContext {
    pub fn new(meta: Arc<Meta>, stores: Arc<dyn StoreFactory>, cancel: CancellationToken) -> Self {
        Self {
            meta,
            stores,
            cancel,
            warnings: Mutex::new(Diagnostics::new()),
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// API client bound to this callback's cancellation token
    pub fn client(&self) -> ScwClient {
        self.meta.client(&self.cancel)
    }

    pub fn wait_config(&self, base: WaitConfig) -> WaitConfig {
        self.meta.wait_config(base)
    }

    /// Object store for `region`, acting for `project_id` when given
    ///
    /// Every call on the returned store races this callback's token.
    pub async fn object_store(
        &self,
        region: Region,
        project_id: Option<&str>,
    ) -> Result<Arc<dyn ObjectStore>> {
        if self.cancel.is_cancelled() {
            return Err(CloudError::Cancelled);
        }
        let access_key = self.meta.access_key().ok_or_else(|| {
            CloudError::validation("access_key", "object storage needs an access key")
        })?;
        let secret_key = self.meta.secret_key().ok_or_else(|| {
            CloudError::validation("secret_key", "object storage needs a secret key")
        })?;
        let params = ConnectParams {
            region,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            project_id: project_id
                .or(self.meta.default_project_id())
                .map(str::to_string),
            endpoint: self.meta.s3_endpoint().map(str::to_string),
        };
        let store = self.stores.connect(&params).await?;
        Ok(Arc::new(CancellableStore::new(store, self.cancel.clone())))
    }

    /// Record a warning for the host
    pub fn warn(&self, summary: impl Into<String>, detail: impl Into<String>) {
        let diag = Diagnostic::warning(summary).with_detail(detail);
        warn!(summary = %diag.summary, detail = %diag.detail, "Warning diagnostic");
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diag);
    }

    /// Drain the warnings recorded so far
    pub fn take_warnings(&self) -> Diagnostics {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

//! Bulk deletion of every object version in a bucket

use crate::store::ObjectStore;
use crate::types::{ObjectVersion, VersionCursor};
use scwtf_cloud::{CloudError, Result, WorkerPool, call_or_cancel, is_forbidden, is_not_found};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delete every object version and delete marker under `prefix`.
///
/// Each listing page is deleted on a worker pool; errors from a page are
/// aggregated and stop the walk. With `force`, a version refused because of
/// a legal hold has the hold lifted and is deleted once more.
///
/// `cancel` is checked before each page and each deletion; once it fires the
/// walk stops with [`CloudError::Cancelled`].
///
/// Returns the number of entries deleted.
pub async fn delete_object_versions(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    prefix: Option<&str>,
    force: bool,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut cursor = VersionCursor {
        prefix: prefix.map(str::to_string),
        ..Default::default()
    };
    let mut deleted = 0;

    loop {
        let page = call_or_cancel(cancel, store.list_object_versions(bucket, &cursor)).await?;
        let entries: Vec<ObjectVersion> = page
            .versions
            .into_iter()
            .chain(page.delete_markers)
            .collect();
        debug!(bucket, count = entries.len(), "Deleting version page");

        let mut pool = WorkerPool::new(WorkerPool::default_size());
        let count = entries.len();
        for entry in entries {
            let store = store.clone();
            let bucket = bucket.to_string();
            let cancel = cancel.clone();
            pool.add(async move {
                let delete = delete_version(store.as_ref(), &bucket, &entry, force);
                call_or_cancel(&cancel, delete).await
            });
        }
        let errors = pool.close_and_wait().await;
        if cancel.is_cancelled() {
            warn!(bucket, deleted, "Version deletion cancelled");
            return Err(CloudError::Cancelled);
        }
        if let Some(err) = CloudError::aggregate(errors) {
            return Err(err);
        }
        deleted += count;

        if !page.is_truncated {
            break;
        }
        cursor.key_marker = page.next_key_marker;
        cursor.version_id_marker = page.next_version_id_marker;
    }

    info!(bucket, deleted, "Deleted object versions");
    Ok(deleted)
}

async fn delete_version(
    store: &dyn ObjectStore,
    bucket: &str,
    entry: &ObjectVersion,
    force: bool,
) -> Result<()> {
    let version = entry.version_id.as_deref();
    let err = match store.delete_object(bucket, &entry.key, version, force).await {
        Ok(()) => return Ok(()),
        Err(e) if is_not_found(&e) => return Ok(()),
        Err(e) => e,
    };
    if !(force && is_forbidden(&err)) {
        return Err(err);
    }

    let head = store.head_object(bucket, &entry.key, version).await?;
    if !head.legal_hold {
        return Err(err);
    }
    warn!(bucket, key = %entry.key, ?version, "Lifting legal hold before delete");
    store
        .put_object_legal_hold(bucket, &entry.key, version, false)
        .await?;
    match store.delete_object(bucket, &entry.key, version, force).await {
        Err(e) if !is_not_found(&e) => Err(e),
        _ => Ok(()),
    }
}

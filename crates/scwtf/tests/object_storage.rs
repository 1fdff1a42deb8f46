mod common;

use common::{PROJECT, with_memory_factory, with_memory_store};
use scwtf::CallRequest;
use scwtf_object::{ObjectStore, Versioning};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_bucket_read_skips_forbidden_sub_configuration() {
    let (provider, store) = with_memory_store();
    let planned = json!({
        "name": "tf-bucket-read",
        "region": "fr-par",
        "versioning": [{ "enabled": true }],
    });
    let created = provider
        .create("scaleway_object_bucket", CallRequest::new(planned), CancellationToken::new())
        .await;
    assert!(created.is_ok(), "{:?}", created.diagnostics);
    assert_eq!(created.id, "fr-par/tf-bucket-read");
    assert_eq!(created.state["versioning"][0]["enabled"], true);

    store.deny("get_bucket_lifecycle");
    store.deny("get_bucket_website");
    let read = provider
        .read(
            "scaleway_object_bucket",
            CallRequest::new(created.state.clone()).with_id(created.id.clone()),
            CancellationToken::new(),
        )
        .await;

    assert!(read.is_ok(), "{:?}", read.diagnostics);
    assert_eq!(read.diagnostics.warnings().count(), 2);
    assert!(read.diagnostics.iter().any(|d| d.summary.contains("lifecycle")));
    assert_eq!(read.state["acl"], "private");
    assert_eq!(read.state["endpoint"], "https://tf-bucket-read.s3.fr-par.scw.cloud");
}

#[tokio::test]
async fn test_force_destroy_removes_every_version() {
    let (provider, store) = with_memory_store();
    store.seed_bucket("tf-bucket-versions", Versioning::Enabled, false);
    store.seed_version("tf-bucket-versions", "a.txt", "v1", false);
    store.seed_version("tf-bucket-versions", "a.txt", "v2", false);
    store.seed_version("tf-bucket-versions", "dir/b.txt", "v3", false);
    store.seed_delete_marker("tf-bucket-versions", "dir/b.txt", "v4");

    let request = CallRequest::new(json!({
        "name": "tf-bucket-versions",
        "region": "fr-par",
        "force_destroy": true,
    }))
    .with_id("fr-par/tf-bucket-versions");
    let response = provider
        .delete("scaleway_object_bucket", request, CancellationToken::new())
        .await;

    assert!(response.is_ok(), "{:?}", response.diagnostics);
    assert!(response.is_gone());
    assert_eq!(store.calls_to("delete_object"), 4);
    assert!(!store.bucket_exists("tf-bucket-versions"));
}

#[tokio::test]
async fn test_delete_of_missing_bucket_succeeds() {
    let (provider, _) = with_memory_store();
    let request = CallRequest::new(json!({ "name": "tf-gone" })).with_id("fr-par/tf-gone");
    let response = provider
        .delete("scaleway_object_bucket", request, CancellationToken::new())
        .await;
    assert!(response.is_ok(), "{:?}", response.diagnostics);
    assert!(response.is_gone());
}

#[tokio::test]
async fn test_object_lifecycle() {
    let (provider, store) = with_memory_store();
    store.seed_bucket("tf-objects", Versioning::Unversioned, false);

    let planned = json!({
        "bucket": "tf-objects",
        "key": "docs/readme.txt",
        "content": "hello",
        "metadata": { "X-Owner": "ops" },
        "visibility": "public-read",
    });
    let created = provider
        .create("scaleway_object", CallRequest::new(planned), CancellationToken::new())
        .await;
    assert!(created.is_ok(), "{:?}", created.diagnostics);
    assert_eq!(created.id, "fr-par/tf-objects/docs/readme.txt");
    assert_eq!(created.state["visibility"], "public-read");
    assert_eq!(created.state["metadata"]["x-owner"], "ops");
    assert_eq!(
        store.object_body("tf-objects", "docs/readme.txt").as_deref(),
        Some(&b"hello"[..])
    );

    let deleted = provider
        .delete(
            "scaleway_object",
            CallRequest::new(created.state).with_id(created.id),
            CancellationToken::new(),
        )
        .await;
    assert!(deleted.is_ok(), "{:?}", deleted.diagnostics);
    assert!(store.object_body("tf-objects", "docs/readme.txt").is_none());
}

#[tokio::test]
async fn test_object_rejects_two_body_sources() {
    let (provider, store) = with_memory_store();
    let planned = json!({
        "bucket": "tf-objects",
        "key": "k",
        "content": "a",
        "content_base64": "YQ==",
    });
    let response = provider
        .create("scaleway_object", CallRequest::new(planned), CancellationToken::new())
        .await;
    assert!(!response.is_ok());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_object_in_other_project_keeps_its_access_key() {
    const OTHER: &str = "44444444-4444-4444-4444-444444444444";
    let (provider, factory) = with_memory_factory();
    let store = factory.store();
    store.seed_bucket("tf-scoped", Versioning::Unversioned, false);

    let bucket = format!("fr-par/tf-scoped@{OTHER}");
    let planned = json!({ "bucket": bucket, "key": "k", "content": "scoped" });
    let created = provider
        .create("scaleway_object", CallRequest::new(planned), CancellationToken::new())
        .await;
    assert!(created.is_ok(), "{:?}", created.diagnostics);
    assert_eq!(created.id, format!("fr-par/tf-scoped@{OTHER}/k"));
    assert_eq!(created.state["bucket"], bucket);

    let read = provider
        .read(
            "scaleway_object",
            CallRequest::new(json!({})).with_id(created.id.clone()),
            CancellationToken::new(),
        )
        .await;
    assert!(read.is_ok(), "{:?}", read.diagnostics);
    assert_eq!(read.id, created.id);
    assert_eq!(read.state["bucket"], bucket);

    let deleted = provider
        .delete(
            "scaleway_object",
            CallRequest::new(created.state).with_id(created.id),
            CancellationToken::new(),
        )
        .await;
    assert!(deleted.is_ok(), "{:?}", deleted.diagnostics);

    let projects: Vec<_> = factory
        .connections()
        .into_iter()
        .map(|c| c.project_id)
        .collect();
    assert_eq!(projects.len(), 4);
    assert!(projects.iter().all(|p| p.as_deref() == Some(OTHER)), "{projects:?}");
    assert!(!projects.iter().any(|p| p.as_deref() == Some(PROJECT)));
}

#[tokio::test]
async fn test_cancelled_force_destroy_leaves_bucket() {
    let (provider, factory) = with_memory_factory();
    let store = factory.store();
    store.seed_bucket("tf-bucket-cancel", Versioning::Enabled, false);
    store.seed_version("tf-bucket-cancel", "a.txt", "v1", false);
    store.seed_delete_marker("tf-bucket-cancel", "a.txt", "v2");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = CallRequest::new(json!({
        "name": "tf-bucket-cancel",
        "region": "fr-par",
        "force_destroy": true,
    }))
    .with_id("fr-par/tf-bucket-cancel");
    let response = provider
        .delete("scaleway_object_bucket", request, cancel)
        .await;

    assert!(!response.is_ok());
    assert!(!response.is_gone());
    assert!(response.diagnostics.iter().any(|d| d.summary == "Operation cancelled"));
    assert!(store.calls().is_empty());
    assert!(factory.connections().is_empty());
    assert!(store.bucket_exists("tf-bucket-cancel"));
    assert_eq!(store.version_count("tf-bucket-cancel"), 2);
}

#[tokio::test]
async fn test_bucket_read_reports_policy() {
    let (provider, store) = with_memory_store();
    store.seed_bucket("tf-bucket-policy", Versioning::Unversioned, false);
    store
        .put_bucket_policy(
            "tf-bucket-policy",
            r#"{"Version":"2023-04-17","Statement":[{"Effect":"Allow","Action":["s3:GetObject"]}]}"#,
        )
        .await
        .unwrap();

    let request = CallRequest::new(json!({ "name": "tf-bucket-policy" }))
        .with_id("fr-par/tf-bucket-policy");
    let read = provider
        .read("scaleway_object_bucket", request.clone(), CancellationToken::new())
        .await;
    assert!(read.is_ok(), "{:?}", read.diagnostics);
    assert!(read.diagnostics.is_empty());
    assert_eq!(
        read.state["policy"],
        r#"{"Statement":{"Action":"s3:GetObject","Effect":"Allow"},"Version":"2023-04-17"}"#
    );

    store.deny("get_bucket_policy");
    let denied = provider
        .read(
            "scaleway_object_bucket",
            CallRequest::new(read.state.clone()).with_id(read.id.clone()),
            CancellationToken::new(),
        )
        .await;
    assert!(denied.is_ok(), "{:?}", denied.diagnostics);
    assert_eq!(denied.diagnostics.warnings().count(), 1);
    assert!(denied.diagnostics.iter().any(|d| d.summary.contains("policy")));
    assert_eq!(denied.state["policy"], read.state["policy"]);
}

#[tokio::test]
async fn test_lock_configuration_lifecycle() {
    let (provider, store) = with_memory_store();
    store.seed_bucket("tf-bucket-lock", Versioning::Enabled, true);

    let planned = json!({
        "bucket": "fr-par/tf-bucket-lock",
        "rule": [{ "default_retention": [{ "mode": "GOVERNANCE", "days": 3 }] }],
    });
    let created = provider
        .create(
            "scaleway_object_bucket_lock_configuration",
            CallRequest::new(planned),
            CancellationToken::new(),
        )
        .await;
    assert!(created.is_ok(), "{:?}", created.diagnostics);
    assert_eq!(created.id, "fr-par/tf-bucket-lock");
    assert_eq!(created.state["rule"][0]["default_retention"][0]["mode"], "GOVERNANCE");
    assert_eq!(created.state["rule"][0]["default_retention"][0]["days"], 3);

    let mut planned = created.state.clone();
    planned["rule"] = json!([{ "default_retention": [{ "mode": "COMPLIANCE", "years": 1 }] }]);
    let updated = provider
        .update(
            "scaleway_object_bucket_lock_configuration",
            CallRequest::new(planned)
                .with_id(created.id.clone())
                .with_prior(created.state.clone()),
            CancellationToken::new(),
        )
        .await;
    assert!(updated.is_ok(), "{:?}", updated.diagnostics);
    let lock = store.get_object_lock_configuration("tf-bucket-lock").await.unwrap();
    assert_eq!(lock.mode.as_deref(), Some("COMPLIANCE"));
    assert_eq!((lock.days, lock.years), (None, Some(1)));
    assert_eq!(store.calls_to("put_object_lock_configuration"), 2);

    let unchanged = provider
        .update(
            "scaleway_object_bucket_lock_configuration",
            CallRequest::new(updated.state.clone())
                .with_id(updated.id.clone())
                .with_prior(updated.state.clone()),
            CancellationToken::new(),
        )
        .await;
    assert!(unchanged.is_ok(), "{:?}", unchanged.diagnostics);
    assert_eq!(store.calls_to("put_object_lock_configuration"), 2);

    let deleted = provider
        .delete(
            "scaleway_object_bucket_lock_configuration",
            CallRequest::new(updated.state).with_id(updated.id),
            CancellationToken::new(),
        )
        .await;
    assert!(deleted.is_ok(), "{:?}", deleted.diagnostics);
    let lock = store.get_object_lock_configuration("tf-bucket-lock").await.unwrap();
    assert!(lock.enabled);
    assert_eq!(lock.mode, None);
}

#[tokio::test]
async fn test_lock_configuration_needs_lock_bucket() {
    let (provider, store) = with_memory_store();
    store.seed_bucket("tf-bucket-nolock", Versioning::Enabled, false);

    let planned = json!({
        "bucket": "tf-bucket-nolock",
        "rule": [{ "default_retention": [{ "mode": "GOVERNANCE", "days": 1 }] }],
    });
    let response = provider
        .create(
            "scaleway_object_bucket_lock_configuration",
            CallRequest::new(planned),
            CancellationToken::new(),
        )
        .await;
    assert!(!response.is_ok());
    assert!(response.is_gone());
}

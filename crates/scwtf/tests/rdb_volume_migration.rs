mod common;

use common::{PROJECT, interaction, replaying};
use scwtf::CallRequest;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const ID: &str = "33333333-3333-3333-3333-333333333333";
const PATH: &str = "/rdb/v1/regions/fr-par/instances/33333333-3333-3333-3333-333333333333";

fn instance(volume_type: &str, size: u64) -> String {
    json!({
        "id": ID,
        "name": "tf-rdb-migrate",
        "status": "ready",
        "engine": "PostgreSQL-15",
        "node_type": "DB-DEV-S",
        "project_id": PROJECT,
        "volume": { "type": volume_type, "size": size },
        "endpoints": [{ "ip": "51.15.0.1", "port": 5432 }],
    })
    .to_string()
}

fn attrs(volume_type: &str, size: u64) -> Value {
    json!({
        "name": "tf-rdb-migrate",
        "node_type": "DB-DEV-S",
        "engine": "PostgreSQL-15",
        "volume_type": volume_type,
        "volume_size_in_gb": size,
        "region": "fr-par",
        "project_id": PROJECT,
    })
}

#[tokio::test]
async fn test_local_to_block_volume_migration() {
    let upgrade = format!("{PATH}/upgrade");
    let (provider, traffic, recorder) = replaying(vec![
        interaction("GET", PATH, "", 200, &instance("lssd", 5_000_000_000)),
        interaction(
            "POST",
            &upgrade,
            r#"{"volume_type":"bssd"}"#,
            200,
            &instance("bssd", 5_000_000_000),
        ),
        interaction("GET", PATH, "", 200, &instance("bssd", 5_000_000_000)),
        interaction(
            "POST",
            &upgrade,
            r#"{"volume_size":10000000000}"#,
            200,
            &instance("bssd", 10_000_000_000),
        ),
        interaction("GET", PATH, "", 200, &instance("bssd", 10_000_000_000)),
        interaction("GET", PATH, "", 200, &instance("bssd", 10_000_000_000)),
    ]);

    let request = CallRequest::new(attrs("bssd", 10))
        .with_id(format!("fr-par/{ID}"))
        .with_prior(attrs("lssd", 5));
    let response = provider
        .update("scaleway_rdb_instance", request, CancellationToken::new())
        .await;

    assert!(response.is_ok(), "{:?}", response.diagnostics);
    assert_eq!(
        traffic.seen(),
        vec![
            format!("GET {PATH}"),
            format!(r#"POST {upgrade} {{"volume_type":"bssd"}}"#),
            format!("GET {PATH}"),
            format!(r#"POST {upgrade} {{"volume_size":10000000000}}"#),
            format!("GET {PATH}"),
            format!("GET {PATH}"),
        ]
    );
    assert_eq!(response.state["volume_type"], "bssd");
    assert_eq!(response.state["volume_size_in_gb"], 10);
    assert_eq!(response.state["endpoint_port"], 5432);
    assert_eq!(recorder.unused(), 0);
}

#[tokio::test]
async fn test_volume_shrink_rejected_before_any_call() {
    let (provider, traffic, _) = replaying(Vec::new());
    let request = CallRequest::new(attrs("bssd", 10))
        .with_id(format!("fr-par/{ID}"))
        .with_prior(attrs("bssd", 20));
    let response = provider
        .update("scaleway_rdb_instance", request, CancellationToken::new())
        .await;

    assert!(!response.is_ok());
    let diag = response.diagnostics.errors().next().unwrap();
    assert_eq!(diag.attribute.as_deref(), Some("volume_size_in_gb"));
    assert!(traffic.seen().is_empty());
}

#[tokio::test]
async fn test_ha_cannot_be_disabled() {
    let (provider, traffic, _) = replaying(Vec::new());
    let mut prior = attrs("bssd", 10);
    prior["is_ha_cluster"] = json!(true);
    let request = CallRequest::new(attrs("bssd", 10))
        .with_id(format!("fr-par/{ID}"))
        .with_prior(prior);
    let response = provider
        .update("scaleway_rdb_instance", request, CancellationToken::new())
        .await;

    let diag = response.diagnostics.errors().next().unwrap();
    assert_eq!(diag.attribute.as_deref(), Some("is_ha_cluster"));
    assert!(traffic.seen().is_empty());
}

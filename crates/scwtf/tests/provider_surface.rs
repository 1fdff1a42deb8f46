mod common;

use common::{PROJECT, interaction, provider_args, replaying};
use scwtf::{CallRequest, Features, MetaOptions, Provider};
use serde_json::json;
use serial_test::serial;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_unknown_kind_is_a_diagnostic() {
    let (provider, traffic, _) = replaying(Vec::new());
    let response = provider
        .create("scaleway_k8s_cluster", CallRequest::new(json!({})), CancellationToken::new())
        .await;
    assert!(!response.is_ok());
    assert!(response.diagnostics.iter().any(|d| d.summary.contains("scaleway_k8s_cluster")));
    assert!(traffic.seen().is_empty());
}

#[tokio::test]
async fn test_beta_kinds_follow_features() {
    let (provider, _, _) = replaying(Vec::new());
    assert!(provider.resource_schema("scaleway_object_bucket_policy").is_none());

    let provider = provider.with_features(Features { beta: true });
    assert!(provider.resource_schema("scaleway_object_bucket_policy").is_some());
    assert!(provider.registry().features().beta);
}

#[test]
#[serial]
fn test_beta_flag_from_environment() {
    temp_env::with_var("SCW_ENABLE_BETA", Some("true"), || {
        let (_, traffic, _) = replaying(Vec::new());
        let options = MetaOptions {
            read_env: true,
            ..MetaOptions::isolated(traffic)
        };
        let provider = Provider::configure(&provider_args(), options).unwrap();
        assert!(provider.meta().enable_beta());
        assert!(provider.registry().get("scaleway_object_bucket_policy").is_some());
    });
}

#[tokio::test]
async fn test_validation_points_at_the_attribute() {
    let (provider, traffic, _) = replaying(Vec::new());
    let planned = json!({
        "node_type": "DB-DEV-S",
        "engine": "PostgreSQL-15",
        "volume_type": "floppy",
    });
    let response = provider
        .create("scaleway_rdb_instance", CallRequest::new(planned), CancellationToken::new())
        .await;

    let attrs: Vec<_> = response
        .diagnostics
        .errors()
        .filter_map(|d| d.attribute.as_deref())
        .collect();
    assert_eq!(attrs, vec!["volume_type"]);
    assert!(traffic.seen().is_empty());
}

#[tokio::test]
async fn test_missing_required_attribute() {
    let (provider, _, _) = replaying(Vec::new());
    let response = provider
        .create(
            "scaleway_domain_zone",
            CallRequest::new(json!({ "domain": "example.com" })),
            CancellationToken::new(),
        )
        .await;
    assert!(
        response
            .diagnostics
            .errors()
            .any(|d| d.attribute.as_deref() == Some("subdomain"))
    );
}

#[tokio::test]
async fn test_cancelled_callback_fails_without_traffic() {
    let (provider, traffic, _) = replaying(Vec::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = provider
        .create("scaleway_instance_ip", CallRequest::new(json!({ "zone": "fr-par-2" })), cancel)
        .await;

    assert!(!response.is_ok());
    assert!(response.diagnostics.iter().any(|d| d.summary == "Operation cancelled"));
    assert!(response.id.is_empty());
    assert!(traffic.seen().is_empty());
}

#[tokio::test]
async fn test_instance_ip_create_and_read() {
    const IP_ID: &str = "44444444-4444-4444-4444-444444444444";
    let ip = json!({
        "ip": {
            "id": IP_ID,
            "address": "51.15.10.10",
            "reverse": null,
            "server": null,
            "tags": ["tf"],
            "zone": "fr-par-1",
            "project": PROJECT,
            "organization": PROJECT,
        }
    })
    .to_string();
    let (provider, traffic, recorder) = replaying(vec![
        interaction(
            "POST",
            "/instance/v1/zones/fr-par-1/ips",
            r#"{"tags":["tf"]}"#,
            201,
            &ip,
        ),
        interaction("GET", &format!("/instance/v1/zones/fr-par-1/ips/{IP_ID}"), "", 200, &ip),
    ]);

    let response = provider
        .create(
            "scaleway_instance_ip",
            CallRequest::new(json!({ "tags": ["tf"] })),
            CancellationToken::new(),
        )
        .await;

    assert!(response.is_ok(), "{:?}", response.diagnostics);
    assert_eq!(response.id, format!("fr-par-1/{IP_ID}"));
    assert_eq!(response.state["address"], "51.15.10.10");
    assert_eq!(traffic.seen().len(), 2);
    assert_eq!(recorder.unused(), 0);
}

#[test]
fn test_invalid_provider_block() {
    let (_, traffic, _) = replaying(Vec::new());
    let err = Provider::configure(
        &json!({ "secret_key": "not-a-uuid", "colour": "blue" }),
        MetaOptions::isolated(traffic),
    )
    .unwrap_err();
    assert!(err.iter().any(|d| d.attribute.as_deref() == Some("colour")));

    let (_, traffic, _) = replaying(Vec::new());
    let args = json!({ "secret_key": "not-a-uuid" });
    let err = Provider::configure(&args, MetaOptions::isolated(traffic)).unwrap_err();
    assert!(err.has_errors());
}

#[tokio::test]
async fn test_import_reads_by_id() {
    const IP_ID: &str = "88888888-8888-8888-8888-888888888888";
    let ip = json!({
        "ip": {
            "id": IP_ID,
            "address": "51.15.20.20",
            "reverse": "ip.example.com",
            "server": { "id": "99999999-9999-9999-9999-999999999999" },
            "tags": [],
            "project": PROJECT,
            "organization": PROJECT,
        }
    })
    .to_string();
    let (provider, _, _) = replaying(vec![interaction(
        "GET",
        &format!("/instance/v1/zones/nl-ams-1/ips/{IP_ID}"),
        "",
        200,
        &ip,
    )]);

    let response = provider
        .import(
            "scaleway_instance_ip",
            CallRequest::default().with_id(format!("nl-ams-1/{IP_ID}")),
            CancellationToken::new(),
        )
        .await;

    assert!(response.is_ok(), "{:?}", response.diagnostics);
    assert_eq!(response.id, format!("nl-ams-1/{IP_ID}"));
    assert_eq!(response.state["reverse"], "ip.example.com");
    assert_eq!(response.state["zone"], "nl-ams-1");
}

#[tokio::test]
async fn test_sweep_removes_test_leftovers() {
    let zones = [
        "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "nl-ams-3", "pl-waw-1",
        "pl-waw-2", "pl-waw-3",
    ];
    let mut interactions = Vec::new();
    for zone in zones {
        let ips = if zone == "fr-par-2" {
            json!({ "ips": [
                { "id": "free", "address": "1.1.1.1", "server": null },
                { "id": "used", "address": "2.2.2.2", "server": { "id": "srv" } },
            ]})
        } else {
            json!({ "ips": [] })
        };
        let path = format!("/instance/v1/zones/{zone}/ips");
        interactions.push(interaction("GET", &path, "", 200, &ips.to_string()));
    }
    interactions.push(interaction("DELETE", "/instance/v1/zones/fr-par-2/ips/free", "", 204, ""));
    for region in ["fr-par", "nl-ams", "pl-waw"] {
        let instances = if region == "pl-waw" {
            json!({ "instances": [
                { "id": "i-1", "name": "tf-rdb-leftover", "status": "ready" },
                { "id": "i-2", "name": "production", "status": "ready" },
            ]})
        } else {
            json!({ "instances": [] })
        };
        interactions.push(interaction(
            "GET",
            &format!("/rdb/v1/regions/{region}/instances"),
            "",
            200,
            &instances.to_string(),
        ));
    }
    interactions.push(interaction("DELETE", "/rdb/v1/regions/pl-waw/instances/i-1", "", 200, "{}"));

    let (provider, traffic, recorder) = replaying(interactions);
    let (removed, diags) = provider.sweep(CancellationToken::new()).await;

    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(removed, 2);
    assert_eq!(recorder.unused(), 0);
    let deletes: Vec<_> = traffic.seen().into_iter().filter(|l| l.starts_with("DELETE")).collect();
    assert_eq!(
        deletes,
        vec![
            "DELETE /instance/v1/zones/fr-par-2/ips/free".to_string(),
            "DELETE /rdb/v1/regions/pl-waw/instances/i-1".to_string(),
        ]
    );
}

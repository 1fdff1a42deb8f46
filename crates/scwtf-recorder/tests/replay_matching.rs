use scwtf_cloud::{HttpRequest, HttpResponse, HttpTransport};
use scwtf_recorder::{Cassette, Interaction, Matcher, Recorder};

const BUCKETS_URL: &str = "https://api.scaleway.com/object/v1/regions/fr-par/buckets";

fn json_post(url: &str, body: &str) -> HttpRequest {
    HttpRequest::new("POST", url).with_json_body(body.to_string())
}

#[test]
fn test_randomized_bucket_name_matches() {
    let expected = json_post(BUCKETS_URL, r#"{"name":"tf_tests_bucket-12345"}"#);
    let actual = json_post(
        BUCKETS_URL,
        r#"{"name":"tf_tests_bucket-98765","project_id":"33333333-3333-3333-3333-333333333333"}"#,
    );
    assert!(Matcher::default().matches(&expected, &actual));

    let other_prefix = json_post(BUCKETS_URL, r#"{"name":"tf_other_bucket-98765"}"#);
    assert!(!Matcher::default().matches(&expected, &other_prefix));
}

#[tokio::test]
async fn test_replay_under_randomized_names() {
    let recorder = Recorder::from_cassette(Cassette::new(vec![
        Interaction {
            request: json_post(BUCKETS_URL, r#"{"name":"tf_tests_bucket-12345"}"#),
            response: HttpResponse::new(200, r#"{"name":"tf_tests_bucket-12345"}"#),
        },
        Interaction {
            request: HttpRequest::new(
                "GET",
                format!("{BUCKETS_URL}?project_id=1&name=tf_tests_bucket-12345"),
            ),
            response: HttpResponse::new(200, r#"{"buckets":[]}"#),
        },
    ]));

    let created = recorder
        .send(json_post(
            BUCKETS_URL,
            r#"{"name":"tf_tests_bucket-55555","project_id":"33333333-3333-3333-3333-333333333333"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(created.status, 200);

    // query values are compared exactly once volatile keys are gone
    let err = recorder
        .send(HttpRequest::new(
            "GET",
            format!("{BUCKETS_URL}?name=tf_tests_bucket-55555"),
        ))
        .await;
    assert!(err.is_err());

    let listed = recorder
        .send(HttpRequest::new(
            "GET",
            format!("{BUCKETS_URL}?name=tf_tests_bucket-12345&organization_id=9"),
        ))
        .await
        .unwrap();
    assert!(listed.body.contains("buckets"));
    assert_eq!(recorder.unused(), 0);
}

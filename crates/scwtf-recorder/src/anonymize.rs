//! Scrubbing of secrets before a cassette is written

use crate::cassette::Interaction;
use scwtf_cloud::HttpRequest;
use serde_json::Value;

/// Sensitive JSON fields and the placeholder they are replaced with
pub const SENSITIVE_FIELDS: &[(&str, &str)] = &[
    ("secret_key", "11111111-1111-1111-1111-111111111111"),
    ("access_key", "SCWXXXXXXXXXXXXXXXXX"),
    ("password", "<password>"),
    ("token", "<token>"),
    ("private_key", "<private-key>"),
];

/// Request headers never written to disk
pub const AUTH_HEADERS: &[&str] = &["x-auth-token", "authorization"];

/// Replace sensitive fields of a JSON body. Non-JSON bodies are returned as is.
pub fn anonymize_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            if scrub(&mut value) {
                value.to_string()
            } else {
                body.to_string()
            }
        }
        Err(_) => body.to_string(),
    }
}

/// Returns true when something was replaced
fn scrub(value: &mut Value) -> bool {
    let mut changed = false;
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                let placeholder = SENSITIVE_FIELDS
                    .iter()
                    .find(|(name, _)| *name == key.as_str())
                    .map(|(_, p)| *p);
                match placeholder {
                    Some(p) if field.is_string() => {
                        *field = Value::String(p.to_string());
                        changed = true;
                    }
                    _ => changed |= scrub(field),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                changed |= scrub(item);
            }
        }
        _ => {}
    }
    changed
}

pub fn strip_auth_headers(request: &mut HttpRequest) {
    request
        .headers
        .retain(|name, _| !AUTH_HEADERS.contains(&name.as_str()));
}

/// Prepare an interaction for storage: auth headers dropped from the
/// request, secrets replaced in the response body
pub fn anonymize_interaction(interaction: &mut Interaction) {
    strip_auth_headers(&mut interaction.request);
    interaction.response.body = anonymize_body(&interaction.response.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use scwtf_cloud::HttpResponse;
    use serde_json::json;

    #[test]
    fn test_secret_fields_are_replaced() {
        let body = json!({
            "api_key": {
                "access_key": "SCW1234567890ABCDEFG",
                "secret_key": "9f6b9c9c-0000-4000-8000-000000000000",
                "description": "tf"
            },
            "users": [{"name": "admin", "password": "hunter2"}]
        })
        .to_string();

        let scrubbed: Value = serde_json::from_str(&anonymize_body(&body)).unwrap();
        assert_eq!(
            scrubbed["api_key"]["secret_key"],
            "11111111-1111-1111-1111-111111111111"
        );
        assert_eq!(scrubbed["api_key"]["access_key"], "SCWXXXXXXXXXXXXXXXXX");
        assert_eq!(scrubbed["api_key"]["description"], "tf");
        assert_eq!(scrubbed["users"][0]["password"], "<password>");
    }

    #[test]
    fn test_untouched_bodies_keep_their_bytes() {
        let body = "{\"name\":  \"tf-zone\"}";
        assert_eq!(anonymize_body(body), body);
        assert_eq!(anonymize_body("<xml/>"), "<xml/>");
        assert_eq!(anonymize_body(""), "");
    }

    #[test]
    fn test_interaction_scrubbing() {
        let mut interaction = Interaction {
            request: HttpRequest::new("POST", "https://api.scaleway.com/iam/v1alpha1/api-keys")
                .with_header("X-Auth-Token", "secret")
                .with_header("User-Agent", "scwtf"),
            response: HttpResponse::new(200, r#"{"secret_key":"real"}"#),
        };
        anonymize_interaction(&mut interaction);
        assert!(interaction.request.header("x-auth-token").is_none());
        assert_eq!(interaction.request.header("user-agent"), Some("scwtf"));
        assert!(!interaction.response.body.contains("real"));
    }
}

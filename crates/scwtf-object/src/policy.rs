//! Bucket policy equivalence
//!
//! Two policy documents are equivalent when their canonical forms are equal.
//! The canonical form sorts object keys, collapses single-element arrays to
//! their element, sorts and deduplicates arrays of strings, and treats an
//! empty document (`""` or `"{}"`) as `{}`.

use scwtf_cloud::{CloudError, Result};
use serde_json::{Map, Value};

/// Canonical JSON text of a policy
pub fn normalize_policy(policy: &str) -> Result<String> {
    let trimmed = policy.trim();
    if trimmed.is_empty() {
        return Ok("{}".to_string());
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| CloudError::validation("policy", format!("invalid JSON policy: {e}")))?;
    Ok(canonical(value).to_string())
}

/// Diff suppressor for policy attributes
pub fn policies_equivalent(old: &str, new: &str) -> bool {
    match (normalize_policy(old), normalize_policy(new)) {
        (Ok(a), Ok(b)) => a == b,
        _ => old == new,
    }
}

fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, canonical(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(canonical).collect();
            if items.iter().all(Value::is_string) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                items.dedup();
            }
            if items.len() == 1 {
                items.pop().unwrap_or(Value::Null)
            } else {
                Value::Array(items)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"{
        "Version": "2023-04-17",
        "Id": "MyBucketPolicy",
        "Statement": [{
            "Sid": "Delegate",
            "Effect": "Allow",
            "Principal": {"SCW": ["project_id:22222222-2222-2222-2222-222222222222"]},
            "Action": ["s3:ListBucket", "s3:GetObject"],
            "Resource": ["bucket", "bucket/*"]
        }]
    }"#;

    #[test]
    fn test_empty_documents_are_equal() {
        assert_eq!(normalize_policy("").unwrap(), "{}");
        assert_eq!(normalize_policy("{}").unwrap(), "{}");
        assert!(policies_equivalent("", "{}"));
        assert!(policies_equivalent("  ", "{ }"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_policy(POLICY).unwrap();
        let twice = normalize_policy(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_structural_equivalence() {
        let reordered = r#"{"Statement":{"Resource":["bucket/*","bucket"],"Action":["s3:GetObject","s3:ListBucket","s3:GetObject"],"Principal":{"SCW":"project_id:22222222-2222-2222-2222-222222222222"},"Effect":"Allow","Sid":"Delegate"},"Id":"MyBucketPolicy","Version":"2023-04-17"}"#;
        assert!(policies_equivalent(POLICY, reordered));

        let different = POLICY.replace("s3:GetObject", "s3:PutObject");
        assert!(!policies_equivalent(POLICY, &different));
    }

    #[test]
    fn test_invalid_json() {
        let err = normalize_policy("{not json").unwrap_err();
        assert_eq!(err.attribute(), Some("policy"));
        assert!(policies_equivalent("{not json", "{not json"));
        assert!(!policies_equivalent("{not json", "{}"));
    }
}

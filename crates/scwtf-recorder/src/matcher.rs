//! Semantic request matching for replay
//!
//! Replayed requests rarely equal the recorded ones byte for byte: test
//! resources carry random name suffixes, project IDs differ between
//! accounts and XML fragments are not emitted in a stable order. The
//! [`Matcher`] compares requests in order:
//!
//! 1. method
//! 2. path
//! 3. query, without volatile keys
//! 4. host, with the bucket label of `*.scw.cloud` hosts fuzzed
//! 5. body: empty, file, XML, JSON or form, with volatile keys dropped and
//!    generated names compared by prefix

use regex::Regex;
use scwtf_cloud::HttpRequest;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Query keys that differ between recording and replay
pub const VOLATILE_QUERY_KEYS: &[&str] = &["organization_id", "project_id"];

/// Body keys that differ between recording and replay
pub const VOLATILE_BODY_KEYS: &[&str] = &[
    "organization_id",
    "project_id",
    "organization",
    "project",
    "default_project_id",
];

const S3_HOST_SUFFIX: &str = "scw.cloud";

static RANDOM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-\d+$").expect("random suffix regex"));

static GENERATED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tf-(.+)-[a-z]+-[a-z]+$").expect("generated name regex"));

#[derive(Debug, Clone)]
pub struct Matcher {
    volatile_query_keys: Vec<String>,
    volatile_body_keys: Vec<String>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            volatile_query_keys: VOLATILE_QUERY_KEYS.iter().map(|k| k.to_string()).collect(),
            volatile_body_keys: VOLATILE_BODY_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Matcher {
    /// Also ignore `key` in request bodies
    pub fn ignore_body_key(mut self, key: impl Into<String>) -> Self {
        self.volatile_body_keys.push(key.into());
        self
    }

    pub fn matches(&self, expected: &HttpRequest, actual: &HttpRequest) -> bool {
        if !expected.method.eq_ignore_ascii_case(&actual.method) {
            return false;
        }
        let (Ok(expected_url), Ok(actual_url)) =
            (Url::parse(&expected.url), Url::parse(&actual.url))
        else {
            return expected.url == actual.url && self.body_matches(expected, actual);
        };
        expected_url.path() == actual_url.path()
            && self.query(&expected_url) == self.query(&actual_url)
            && hosts_match(expected_url.host_str(), actual_url.host_str())
            && self.body_matches(expected, actual)
    }

    fn query(&self, url: &Url) -> BTreeMap<String, Vec<String>> {
        let mut bag: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in url.query_pairs() {
            if !self.volatile_query_keys.iter().any(|x| *x == k) {
                bag.entry(k.into_owned()).or_default().push(v.into_owned());
            }
        }
        for values in bag.values_mut() {
            values.sort();
        }
        bag
    }

    fn body_matches(&self, expected: &HttpRequest, actual: &HttpRequest) -> bool {
        if expected.body.is_empty() && actual.body.is_empty() {
            return true;
        }
        if is_file_body(actual) {
            return true;
        }
        if is_xml(&expected.body) {
            return true;
        }
        if let Ok(actual_json) = serde_json::from_str::<Value>(&actual.body) {
            let Ok(expected_json) = serde_json::from_str::<Value>(&expected.body) else {
                return false;
            };
            return values_match(
                &self.strip_json(expected_json),
                &self.strip_json(actual_json),
            );
        }
        let expected_form = self.form(&expected.body);
        let actual_form = self.form(&actual.body);
        expected_form.len() == actual_form.len()
            && expected_form.iter().zip(&actual_form).all(|((ek, ev), (ak, av))| {
                ek == ak
                    && ev.len() == av.len()
                    && ev.iter().zip(av).all(|(e, a)| names_match(e, a))
            })
    }

    fn strip_json(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| !self.volatile_body_keys.contains(k))
                    .map(|(k, v)| (k, self.strip_json(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.strip_json(v)).collect())
            }
            other => other,
        }
    }

    fn form(&self, body: &str) -> BTreeMap<String, Vec<String>> {
        let mut bag: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in url::form_urlencoded::parse(body.as_bytes()) {
            if !self.volatile_body_keys.iter().any(|x| *x == k) {
                bag.entry(k.into_owned()).or_default().push(v.into_owned());
            }
        }
        bag
    }
}

fn is_file_body(request: &HttpRequest) -> bool {
    request.header("content-type").is_some_and(|ct| {
        ct.starts_with("application/octet-stream") || ct.starts_with("multipart/form-data")
    })
}

/// Well-formed XML with at least one element
fn is_xml(body: &str) -> bool {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    if !body.trim_start().starts_with('<') {
        return false;
    }
    let mut reader = Reader::from_str(body);
    let mut elements = 0usize;
    let mut depth = 0isize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                elements += 1;
                depth += 1;
            }
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::Eof) => return elements > 0 && depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

fn hosts_match(expected: Option<&str>, actual: Option<&str>) -> bool {
    match (expected, actual) {
        (Some(e), Some(a)) if e.ends_with(S3_HOST_SUFFIX) && a.ends_with(S3_HOST_SUFFIX) => {
            let canonical = |host: &str| -> Vec<String> {
                host.split('.')
                    .enumerate()
                    .map(|(i, label)| {
                        if i == 0 {
                            strip_random_suffix(label).to_string()
                        } else {
                            label.to_string()
                        }
                    })
                    .collect()
            };
            canonical(e) == canonical(a)
        }
        (e, a) => e == a,
    }
}

fn strip_random_suffix(name: &str) -> &str {
    RANDOM_SUFFIX
        .captures(name)
        .and_then(|c| c.get(1))
        .map_or(name, |m| m.as_str())
}

/// Prefix a generated test name was built from, if it looks generated
fn generated_prefix(name: &str) -> Option<&str> {
    GENERATED_NAME
        .captures(name)
        .or_else(|| RANDOM_SUFFIX.captures(name))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// String equality, tolerant of randomized test names
pub fn names_match(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }
    match (generated_prefix(expected), generated_prefix(actual)) {
        (Some(e), Some(a)) => e == a,
        _ => false,
    }
}

fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::String(e), Value::String(a)) => names_match(e, a),
        (Value::Object(e), Value::Object(a)) => {
            e.len() == a.len()
                && e.iter()
                    .all(|(k, ev)| a.get(k).is_some_and(|av| values_match(ev, av)))
        }
        (Value::Array(e), Value::Array(a)) => {
            e.len() == a.len() && e.iter().zip(a).all(|(ev, av)| values_match(ev, av))
        }
        (e, a) => e == a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(url: &str, body: &str) -> HttpRequest {
        let mut req = HttpRequest::new("POST", url);
        req.body = body.to_string();
        req
    }

    #[test]
    fn test_randomized_name_and_volatile_key() {
        let expected = post(
            "https://api.scaleway.com/rdb/v1/regions/fr-par/instances",
            r#"{"name":"tf_tests_bucket-12345"}"#,
        );
        let actual = post(
            "https://api.scaleway.com/rdb/v1/regions/fr-par/instances",
            r#"{"name":"tf_tests_bucket-98765","project_id":"22222222-2222-2222-2222-222222222222"}"#,
        );
        assert!(Matcher::default().matches(&expected, &actual));
    }

    #[test]
    fn test_generated_tf_names() {
        assert!(names_match("tf-rdb-brave-turing", "tf-rdb-happy-lovelace"));
        assert!(!names_match("tf-rdb-brave-turing", "tf-lb-happy-lovelace"));
        assert!(!names_match("alpha", "beta"));
        assert!(names_match("bucket-1", "bucket-2"));
    }

    #[test]
    fn test_method_and_path_must_match() {
        let m = Matcher::default();
        let get =
            HttpRequest::new("GET", "https://api.scaleway.com/instance/v1/zones/fr-par-1/ips/x");
        let delete =
            HttpRequest::new("DELETE", "https://api.scaleway.com/instance/v1/zones/fr-par-1/ips/x");
        let other =
            HttpRequest::new("GET", "https://api.scaleway.com/instance/v1/zones/fr-par-1/ips/y");
        assert!(m.matches(&get, &get.clone()));
        assert!(!m.matches(&get, &delete));
        assert!(!m.matches(&get, &other));
    }

    #[test]
    fn test_volatile_query_keys_are_ignored() {
        let m = Matcher::default();
        let expected = HttpRequest::new(
            "GET",
            "https://api.scaleway.com/domain/v2beta1/dns-zones?dns_zone=a.example.com&project_id=1",
        );
        let actual = HttpRequest::new(
            "GET",
            "https://api.scaleway.com/domain/v2beta1/dns-zones?organization_id=9&dns_zone=a.example.com",
        );
        assert!(m.matches(&expected, &actual));

        let different = HttpRequest::new(
            "GET",
            "https://api.scaleway.com/domain/v2beta1/dns-zones?dns_zone=b.example.com",
        );
        assert!(!m.matches(&expected, &different));
    }

    #[test]
    fn test_s3_host_fuzz() {
        let m = Matcher::default();
        let expected = HttpRequest::new("GET", "https://tf-test-bucket-1234.s3.fr-par.scw.cloud/");
        let actual = HttpRequest::new("GET", "https://tf-test-bucket-5678.s3.fr-par.scw.cloud/");
        assert!(m.matches(&expected, &actual));

        let other_region =
            HttpRequest::new("GET", "https://tf-test-bucket-5678.s3.nl-ams.scw.cloud/");
        assert!(!m.matches(&expected, &other_region));

        let other_host = HttpRequest::new("GET", "https://bucket-1.example.com/");
        let other_host2 = HttpRequest::new("GET", "https://bucket-2.example.com/");
        assert!(!m.matches(&other_host, &other_host2));
    }

    #[test]
    fn test_xml_bodies_match_coarsely() {
        let m = Matcher::default();
        let expected = post(
            "https://s3.fr-par.scw.cloud/bucket?cors",
            "<CORSConfiguration><CORSRule><AllowedMethod>GET</AllowedMethod></CORSRule></CORSConfiguration>",
        );
        let actual = post(
            "https://s3.fr-par.scw.cloud/bucket?cors",
            "<CORSConfiguration><CORSRule><AllowedMethod>PUT</AllowedMethod></CORSRule></CORSConfiguration>",
        );
        assert!(m.matches(&expected, &actual));
        assert!(!is_xml("<unterminated>"));
        assert!(!is_xml("not xml"));
    }

    #[test]
    fn test_form_bodies() {
        let m = Matcher::default();
        let expected = post("https://api.scaleway.com/x", "name=tf-bucket-11&project_id=a&kind=s3");
        let actual = post("https://api.scaleway.com/x", "kind=s3&name=tf-bucket-22");
        assert!(m.matches(&expected, &actual));

        let different = post("https://api.scaleway.com/x", "kind=gcs&name=tf-bucket-22");
        assert!(!m.matches(&expected, &different));
    }

    #[test]
    fn test_empty_and_file_bodies() {
        let m = Matcher::default();
        let empty = HttpRequest::new("PUT", "https://s3.fr-par.scw.cloud/bucket/key");
        assert!(m.matches(&empty, &empty.clone()));

        let mut file = empty.clone().with_header("Content-Type", "application/octet-stream");
        file.body = "raw bytes".into();
        let mut recorded = empty.clone();
        recorded.body = "other bytes".into();
        assert!(m.matches(&recorded, &file));
    }

    #[test]
    fn test_json_values_must_match() {
        let m = Matcher::default();
        let expected = post("https://api.scaleway.com/x", r#"{"volume_type":"bssd"}"#);
        let actual = post("https://api.scaleway.com/x", r#"{"volume_type":"lssd"}"#);
        assert!(!m.matches(&expected, &actual));

        let extra = post(
            "https://api.scaleway.com/x",
            r#"{"volume_type":"bssd","enable_ha":true}"#,
        );
        assert!(!m.matches(&expected, &extra));
    }
}

//! Conversions between host attribute values and API request fields

use crate::error::{CloudError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Empty strings are "unset" for the host
pub fn expand_nullable_string(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn flatten_nullable_string(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

/// Copy a string map, dropping empty keys
pub fn expand_string_map(map: &HashMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Parse an RFC 3339 instant; empty means unset
pub fn expand_time(attribute: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| {
                CloudError::validation(attribute, format!("invalid RFC 3339 time {s:?}: {e}"))
            }),
    }
}

pub fn flatten_time(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Normalize an address to CIDR notation; bare addresses get a host mask
pub fn expand_ip_net(attribute: &str, value: &str) -> Result<String> {
    let (addr, mask) = match value.split_once('/') {
        Some((addr, mask)) => (addr, Some(mask)),
        None => (value, None),
    };
    let ip: IpAddr = addr
        .parse()
        .map_err(|_| CloudError::validation(attribute, format!("{value:?} is not an IP address")))?;
    let max = if ip.is_ipv4() { 32 } else { 128 };
    let bits = match mask {
        None => max,
        Some(m) => m
            .parse::<u8>()
            .ok()
            .filter(|b| *b <= max)
            .ok_or_else(|| {
                CloudError::validation(attribute, format!("invalid prefix length in {value:?}"))
            })?,
    };
    Ok(format!("{ip}/{bits}"))
}

/// Drop the host mask again when flattening
pub fn flatten_ip_net(value: &str) -> String {
    match value.split_once('/') {
        Some((addr, "32")) if addr.contains('.') => addr.to_string(),
        Some((addr, "128")) if addr.contains(':') => addr.to_string(),
        _ => value.to_string(),
    }
}

/// Tags as sent to the API: trimmed, non-empty, in order
pub fn expand_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None` when the tag list is unchanged, so updates skip the field
pub fn expand_updated_tags(old: Option<&[String]>, new: &[String]) -> Option<Vec<String>> {
    let new = expand_tags(new);
    match old {
        Some(old) if expand_tags(old) == new => None,
        _ => Some(new),
    }
}

/// S3 style `key=value` tags from a map, sorted by key
pub fn expand_object_tags(map: &HashMap<String, String>) -> Vec<(String, String)> {
    expand_string_map(map).into_iter().collect()
}

pub fn flatten_object_tags(tags: &[(String, String)]) -> HashMap<String, String> {
    tags.iter().cloned().collect()
}

pub fn gb_to_bytes(gb: u64) -> u64 {
    gb * 1_000_000_000
}

pub fn bytes_to_gb(bytes: u64) -> u64 {
    bytes / 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_string() {
        assert_eq!(expand_nullable_string(Some("")), None);
        assert_eq!(expand_nullable_string(None), None);
        assert_eq!(expand_nullable_string(Some("x")).as_deref(), Some("x"));
        assert_eq!(flatten_nullable_string(None), "");
    }

    #[test]
    fn test_time() {
        let t = expand_time("expires_at", Some("2026-01-02T03:04:05+01:00"))
            .unwrap()
            .unwrap();
        assert_eq!(flatten_time(Some(&t)), "2026-01-02T02:04:05Z");
        assert!(expand_time("expires_at", Some("")).unwrap().is_none());
        let err = expand_time("expires_at", Some("yesterday")).unwrap_err();
        assert_eq!(err.attribute(), Some("expires_at"));
    }

    #[test]
    fn test_ip_net() {
        assert_eq!(expand_ip_net("ip", "51.15.1.2").unwrap(), "51.15.1.2/32");
        assert_eq!(expand_ip_net("ip", "10.0.0.0/8").unwrap(), "10.0.0.0/8");
        assert_eq!(expand_ip_net("ip", "2001:db8::1").unwrap(), "2001:db8::1/128");
        assert!(expand_ip_net("ip", "10.0.0.0/33").is_err());
        assert!(expand_ip_net("ip", "nope").is_err());
        assert_eq!(flatten_ip_net("51.15.1.2/32"), "51.15.1.2");
        assert_eq!(flatten_ip_net("10.0.0.0/8"), "10.0.0.0/8");
    }

    #[test]
    fn test_tags() {
        let tags = vec![" a ".to_string(), "".to_string(), "b".to_string()];
        assert_eq!(expand_tags(&tags), vec!["a", "b"]);
        let same = vec!["a".to_string(), "b".to_string()];
        assert!(expand_updated_tags(Some(&same), &tags).is_none());
        assert_eq!(expand_updated_tags(None, &tags), Some(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_volume_units() {
        assert_eq!(gb_to_bytes(10), 10_000_000_000);
        assert_eq!(bytes_to_gb(10_000_000_000), 10);
    }
}

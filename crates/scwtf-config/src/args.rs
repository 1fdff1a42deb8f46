//! Provider arguments as supplied by the host

use serde_json::Value;

/// Placeholder the host sends for values that are unknown until apply
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A value received from the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostValue<T> {
    Known(T),
    /// Not computed yet (plan time)
    Unknown,
    #[default]
    Null,
}

impl<T> HostValue<T> {
    /// The value, if it is known. Unknown values count as absent.
    pub fn known(self) -> Option<T> {
        match self {
            HostValue::Known(v) => Some(v),
            HostValue::Unknown | HostValue::Null => None,
        }
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            HostValue::Known(v) => Some(v),
            HostValue::Unknown | HostValue::Null => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, HostValue::Unknown)
    }
}

impl HostValue<String> {
    pub fn from_host(value: Option<&str>) -> Self {
        match value {
            None | Some("") => HostValue::Null,
            Some(UNKNOWN_SENTINEL) => HostValue::Unknown,
            Some(v) => HostValue::Known(v.to_string()),
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }
}

impl From<&str> for HostValue<String> {
    fn from(value: &str) -> Self {
        HostValue::from_host(Some(value))
    }
}

/// Provider block arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderArgs {
    pub access_key: HostValue<String>,
    pub secret_key: HostValue<String>,
    pub profile: HostValue<String>,
    pub project_id: HostValue<String>,
    pub organization_id: HostValue<String>,
    pub region: HostValue<String>,
    pub zone: HostValue<String>,
    pub api_url: HostValue<String>,
}

impl ProviderArgs {
    /// Read the provider block from the host's JSON attribute bag
    pub fn from_json(value: &Value) -> Self {
        let field = |name: &str| HostValue::from_host(value.get(name).and_then(Value::as_str));
        Self {
            access_key: field("access_key"),
            secret_key: field("secret_key"),
            profile: field("profile"),
            project_id: field("project_id"),
            organization_id: field("organization_id"),
            region: field("region"),
            zone: field("zone"),
            api_url: field("api_url"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_sentinel_is_absent() {
        let args = ProviderArgs::from_json(&json!({
            "access_key": "SCWXXXXXXXXXXXXXXXXX",
            "secret_key": UNKNOWN_SENTINEL,
            "region": "",
            "zone": null,
        }));
        assert_eq!(args.access_key.as_deref(), Some("SCWXXXXXXXXXXXXXXXXX"));
        assert!(args.secret_key.is_unknown());
        assert_eq!(args.secret_key.clone().known(), None);
        assert_eq!(args.region, HostValue::Null);
        assert_eq!(args.zone, HostValue::Null);
        assert_eq!(args.project_id, HostValue::Null);
    }
}

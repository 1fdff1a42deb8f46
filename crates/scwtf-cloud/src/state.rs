//! Typed resource state handed to lifecycle callbacks
//!
//! The host moves attribute bags around as JSON. At the callback boundary the
//! bag is deserialized into the resource's own record type `T`, and change
//! queries go through field lenses (`|a| &a.volume_type`) instead of string
//! keys.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Lifecycle operation, used to pick a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Per-operation timeouts configured by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Duration>,
}

impl Timeouts {
    /// Configured timeout for `op`, or `default`
    pub fn get(&self, op: Operation, default: Duration) -> Duration {
        let configured = match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        };
        configured.unwrap_or(default)
    }
}

/// State of one resource instance during a callback
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    /// Composite identifier; empty means "not in state"
    pub id: String,

    /// Planned (then observed) attributes
    pub attrs: T,

    /// Attributes recorded before this operation, absent on create
    pub prior: Option<T>,

    pub timeouts: Timeouts,

    /// True while the host runs an import
    pub importing: bool,
}

impl<T> ResourceState<T> {
    pub fn new(attrs: T) -> Self {
        Self {
            id: String::new(),
            attrs,
            prior: None,
            timeouts: Timeouts::default(),
            importing: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_prior(mut self, prior: T) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Signal the host to drop the resource from its state
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    /// True when the field differs from its prior value (always true on create)
    pub fn has_change<V, L>(&self, lens: L) -> bool
    where
        V: PartialEq + ?Sized,
        L: Fn(&T) -> &V,
    {
        match &self.prior {
            Some(prior) => lens(prior) != lens(&self.attrs),
            None => true,
        }
    }

    /// `(old, new)` for a field; `old` is absent on create
    pub fn get_change<'a, V, L>(&'a self, lens: L) -> (Option<&'a V>, &'a V)
    where
        V: ?Sized,
        L: Fn(&'a T) -> &'a V,
    {
        (self.prior.as_ref().map(&lens), lens(&self.attrs))
    }
}

impl<T: Serialize> ResourceState<T> {
    /// Top-level attribute names whose value changed
    pub fn changed_fields(&self) -> Result<BTreeSet<String>> {
        let new = serde_json::to_value(&self.attrs)?;
        let old = match &self.prior {
            Some(prior) => serde_json::to_value(prior)?,
            None => serde_json::Value::Null,
        };
        Ok(diff_keys(&old, &new))
    }

    /// True when anything other than `names` changed
    pub fn has_changes_except(&self, names: &[&str]) -> Result<bool> {
        Ok(self
            .changed_fields()?
            .iter()
            .any(|field| !names.contains(&field.as_str())))
    }

    /// Attribute bag to hand back to the host
    pub fn attrs_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.attrs)?)
    }
}

impl<T: DeserializeOwned> ResourceState<T> {
    /// Build typed state from host attribute bags
    pub fn from_json(
        id: impl Into<String>,
        planned: serde_json::Value,
        prior: Option<serde_json::Value>,
    ) -> Result<Self> {
        let attrs = serde_json::from_value(planned)?;
        let prior = prior
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()?;
        Ok(Self {
            id: id.into(),
            attrs,
            prior,
            timeouts: Timeouts::default(),
            importing: false,
        })
    }
}

fn diff_keys(old: &serde_json::Value, new: &serde_json::Value) -> BTreeSet<String> {
    use serde_json::Value;

    let empty = serde_json::Map::new();
    let old_map = match old {
        Value::Object(m) => m,
        _ => &empty,
    };
    let new_map = match new {
        Value::Object(m) => m,
        _ => &empty,
    };

    old_map
        .keys()
        .chain(new_map.keys())
        .filter(|k| {
            old_map.get(*k).unwrap_or(&Value::Null) != new_map.get(*k).unwrap_or(&Value::Null)
        })
        .cloned()
        .collect()
}

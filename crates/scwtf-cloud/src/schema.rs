//! Attribute schemas
//!
//! A schema declares, per attribute, its type, presence, defaults, validators
//! and diff suppressor. The host uses it to plan; the provider uses
//! [`Schema::validate`] before dispatching a callback.
//!
//! ```
//! use scwtf_cloud::schema::{Attribute, Schema, Validator};
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string().force_new())
//!     .with_attribute(
//!         "project_id",
//!         Attribute::optional_computed_string().validate(Validator::Uuid),
//!     );
//! assert!(schema.attribute("name").is_some());
//! ```

use crate::diag::{Diagnostic, Diagnostics};
use crate::locality::{Locality, Region, Zone};
use serde_json::Value;
use std::collections::BTreeMap;

/// Returns true when two values must not produce a diff
pub type DiffSuppressFn = fn(&str, &str) -> bool;

/// Custom validator: `Err(message)` rejects the value
pub type ValidateFn = fn(&Value) -> std::result::Result<(), String>;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// Repeated nested block
    Block(Box<Schema>),
}

impl AttributeType {
    fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::Bool => "bool",
            AttributeType::List(_) => "list",
            AttributeType::Set(_) => "set",
            AttributeType::Map(_) => "map",
            AttributeType::Block(_) => "block",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

#[derive(Debug, Clone)]
pub enum Validator {
    Uuid,
    /// Bare UUID or `{locality}/{uuid}`
    UuidOrLocalized,
    Region,
    Zone,
    OneOf(&'static [&'static str]),
    IntRange { min: i64, max: i64 },
    Custom(ValidateFn),
}

impl Validator {
    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            Validator::Uuid => match value.as_str() {
                Some(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(()),
                _ => Err(format!("{value} is not a UUID")),
            },
            Validator::UuidOrLocalized => {
                let s = value.as_str().ok_or("expected a string")?;
                let bare = match s.split_once('/') {
                    Some((locality, rest)) => {
                        locality
                            .parse::<Locality>()
                            .map_err(|e| e.to_string())?;
                        rest
                    }
                    None => s,
                };
                uuid::Uuid::parse_str(bare)
                    .map(|_| ())
                    .map_err(|_| format!("{s:?} is not a UUID"))
            }
            Validator::Region => {
                let s = value.as_str().ok_or("expected a string")?;
                s.parse::<Region>().map(|_| ()).map_err(|e| e.to_string())
            }
            Validator::Zone => {
                let s = value.as_str().ok_or("expected a string")?;
                s.parse::<Zone>().map(|_| ()).map_err(|e| e.to_string())
            }
            Validator::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                _ => Err(format!("expected one of {}, got {value}", allowed.join(", "))),
            },
            Validator::IntRange { min, max } => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                _ => Err(format!("expected an integer between {min} and {max}, got {value}")),
            },
            Validator::Custom(f) => f(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub ty: AttributeType,
    pub presence: Presence,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub validators: Vec<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub description: String,
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.presence == other.presence
            && self.force_new == other.force_new
            && self.sensitive == other.sensitive
            && self.default == other.default
            && self.description == other.description
    }
}

impl Attribute {
    pub fn new(ty: AttributeType, presence: Presence) -> Self {
        Self {
            ty,
            presence,
            force_new: false,
            sensitive: false,
            default: None,
            validators: Vec::new(),
            diff_suppress: None,
            description: String::new(),
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, Presence::OptionalComputed)
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Optional)
    }

    pub fn optional_int() -> Self {
        Self::new(AttributeType::Int, Presence::Optional)
    }

    pub fn string_list(presence: Presence) -> Self {
        Self::new(AttributeType::List(Box::new(AttributeType::String)), presence)
    }

    pub fn string_map(presence: Presence) -> Self {
        Self::new(AttributeType::Map(Box::new(AttributeType::String)), presence)
    }

    pub fn block(schema: Schema, presence: Presence) -> Self {
        Self::new(AttributeType::Block(Box::new(schema)), presence)
    }

    /// Locality attribute defaulting to the provider's region
    pub fn region() -> Self {
        Self::optional_computed_string()
            .validate(Validator::Region)
            .force_new()
            .describe("The region you want to attach the resource to")
    }

    /// Locality attribute defaulting to the provider's zone
    pub fn zone() -> Self {
        Self::optional_computed_string()
            .validate(Validator::Zone)
            .force_new()
            .describe("The zone you want to attach the resource to")
    }

    pub fn project_id() -> Self {
        Self::optional_computed_string()
            .validate(Validator::Uuid)
            .force_new()
            .describe("The project_id you want to attach the resource to")
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn suppress_diff(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    /// True when `old` and `new` are considered the same planned value
    pub fn suppresses(&self, old: &str, new: &str) -> bool {
        old == new || self.diff_suppress.is_some_and(|f| f(old, new))
    }
}

/// Schema of a resource or of a nested block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub version: u32,
    pub attributes: BTreeMap<String, Attribute>,
    /// Groups of attributes that may not be set together
    pub conflicts: Vec<&'static [&'static str]>,
}

impl Schema {
    pub fn v0() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// At most one of `names` may be set
    pub fn with_conflicts(mut self, names: &'static [&'static str]) -> Self {
        self.conflicts.push(names);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Fill in declared defaults for absent attributes
    pub fn apply_defaults(&self, value: &mut Value) {
        if let Value::Object(map) = value {
            for (name, attr) in &self.attributes {
                if let Some(default) = &attr.default {
                    let slot = map.entry(name.clone()).or_insert(Value::Null);
                    if slot.is_null() {
                        *slot = default.clone();
                    }
                }
            }
        }
    }

    /// Check a configuration against the schema
    pub fn validate(&self, value: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        self.validate_at("", value, &mut diags);
        diags
    }

    fn validate_at(&self, prefix: &str, value: &Value, diags: &mut Diagnostics) {
        let Some(map) = value.as_object() else {
            diags.push(Diagnostic::error(format!("expected an object, got {value}")));
            return;
        };

        for key in map.keys() {
            if key != "id" && !self.attributes.contains_key(key) {
                diags.push(
                    Diagnostic::error("Unsupported argument")
                        .with_detail(format!("An argument named {key:?} is not expected here"))
                        .with_attribute(join(prefix, key)),
                );
            }
        }

        for (name, attr) in &self.attributes {
            let path = join(prefix, name);
            match map.get(name).filter(|v| !is_unset(v)) {
                None if attr.is_required() => diags.push(
                    Diagnostic::error("Missing required argument")
                        .with_detail(format!("The argument {name:?} is required"))
                        .with_attribute(path),
                ),
                None => {}
                Some(v) => check_value(&path, attr, &attr.ty, v, diags),
            }
        }

        for group in &self.conflicts {
            let set: Vec<_> = group
                .iter()
                .filter(|n| map.get(**n).is_some_and(|v| !is_unset(v)))
                .collect();
            if set.len() > 1 {
                diags.push(
                    Diagnostic::error("Conflicting arguments")
                        .with_detail(format!("Only one of {} may be set", group.join(", ")))
                        .with_attribute(join(prefix, set[1])),
                );
            }
        }
    }
}

/// Null and the empty string both mean "not set"
fn is_unset(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some("")
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn type_error(path: &str, ty: &AttributeType, value: &Value) -> Diagnostic {
    Diagnostic::error("Incorrect attribute value type")
        .with_detail(format!("expected {}, got {value}", ty.name()))
        .with_attribute(path)
}

fn check_value(
    path: &str,
    attr: &Attribute,
    ty: &AttributeType,
    value: &Value,
    diags: &mut Diagnostics,
) {
    let type_ok = match ty {
        AttributeType::String => value.is_string(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        AttributeType::Float => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(inner) | AttributeType::Set(inner) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_value(&format!("{path}.{i}"), attr, inner, item, diags);
                }
                return;
            }
            None => false,
        },
        AttributeType::Map(inner) => match value.as_object() {
            Some(entries) => {
                for (k, item) in entries {
                    if !inner_type_ok(inner, item) {
                        diags.push(type_error(&format!("{path}.{k}"), inner, item));
                    }
                }
                true
            }
            None => false,
        },
        AttributeType::Block(schema) => {
            match value {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        schema.validate_at(&format!("{path}.{i}"), item, diags);
                    }
                }
                other => schema.validate_at(path, other, diags),
            }
            return;
        }
    };

    if !type_ok {
        diags.push(type_error(path, ty, value));
        return;
    }

    for validator in &attr.validators {
        if let Err(message) = validator.check(value) {
            diags.push(
                Diagnostic::error("Invalid attribute value")
                    .with_detail(message)
                    .with_attribute(path),
            );
        }
    }
}

fn inner_type_ok(ty: &AttributeType, value: &Value) -> bool {
    match ty {
        AttributeType::String => value.is_string(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        AttributeType::Float => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        _ => true,
    }
}

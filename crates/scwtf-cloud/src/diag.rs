//! Diagnostics returned to the host

use crate::error::{CloudError, ErrorKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// Attribute path the diagnostic refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: String::new(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Error diagnostic for a surfaced failure, carrying its attribute path when known
    pub fn from_error(err: &CloudError) -> Self {
        let summary = match err.kind() {
            ErrorKind::Validation => err.to_string(),
            kind => format!("{kind}: {err}"),
        };
        let diag = Self::error(summary);
        match err.attribute() {
            Some(attr) => diag.with_attribute(attr),
            None => diag,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(attr) = &self.attribute {
            write!(f, " (at {attr})")?;
        }
        if !self.detail.is_empty() {
            write!(f, "\n  {}", self.detail)?;
        }
        Ok(())
    }
}

/// Diagnostics collected during one callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn error(&mut self, err: &CloudError) {
        self.push(Diagnostic::from_error(err));
    }

    pub fn warn(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary).with_detail(detail));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Error)
    }
}

impl From<CloudError> for Diagnostics {
    fn from(err: CloudError) -> Self {
        let mut diags = Diagnostics::new();
        diags.error(&err);
        diags
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Diagnostics(vec![diag])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Diagnostics(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_validation_error_keeps_attribute() {
        let err = CloudError::validation("volume_size_in_gb", "must be a multiple of 5");
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.attribute.as_deref(), Some("volume_size_in_gb"));
    }

    #[test]
    fn test_from_api_error_is_bare() {
        let diag = Diagnostic::from_error(&CloudError::api(403, "denied"));
        assert!(diag.attribute.is_none());
        assert!(diag.summary.starts_with("forbidden"));
    }

    #[test]
    fn test_collection() {
        let mut diags = Diagnostics::new();
        diags.warn("cannot read CORS", "AccessDenied");
        assert!(!diags.has_errors());
        diags.error(&CloudError::Cancelled);
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warnings().count(), 1);
    }
}

//! Cloud error types and their classification
//!
//! Every failure that crosses a resource handler is a [`CloudError`]. Handlers
//! never match on HTTP status codes directly: they ask [`ErrorKind::of`] (or one
//! of the `is_*` predicates) and decide whether to retry, swallow or surface.

use std::time::Duration;
use thiserror::Error;

/// Error body returned by the cloud API (and mapped from S3 error codes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,

    /// Typed error discriminator (`not_found`, `quotas_exceeded`, `NoSuchBucket`, ...)
    pub error_type: Option<String>,

    /// Human readable message
    pub message: String,

    /// Resource kind the error refers to, when the API tells us
    pub resource: Option<String>,

    /// Value of a `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: None,
            message: message.into(),
            resource: None,
            retry_after: None,
        }
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    fn has_type(&self, candidates: &[&str]) -> bool {
        self.error_type
            .as_deref()
            .is_some_and(|t| candidates.contains(&t))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            Some(t) => write!(f, "{} ({}): {}", self.status, t, self.message),
            None => write!(f, "{}: {}", self.status, self.message),
        }
    }
}

/// Provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error: {0}")]
    Api(ApiError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout waiting for {resource} (last status: {last_status})")]
    Timeout {
        resource: String,
        last_status: String,
    },

    #[error("{resource} reached failure status {status}")]
    FailureStatus { resource: String, status: String },

    #[error("Invalid identifier {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("Invalid argument{}: {message}", attribute_suffix(.attribute))]
    Validation {
        attribute: Option<String>,
        message: String,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Worker task panicked: {0}")]
    Panic(String),

    #[error("{} errors, first: {}", .0.len(), first_message(.0))]
    Aggregate(Vec<CloudError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

fn first_message(errors: &[CloudError]) -> String {
    errors.first().map(|e| e.to_string()).unwrap_or_default()
}

fn attribute_suffix(attribute: &Option<String>) -> String {
    attribute
        .as_ref()
        .map(|a| format!(" {a}"))
        .unwrap_or_default()
}

impl CloudError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        CloudError::Api(ApiError::new(status, message))
    }

    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Validation {
            attribute: Some(attribute.into()),
            message: message.into(),
        }
    }

    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Attribute the error refers to, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            CloudError::Validation { attribute, .. } => attribute.as_deref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::of(self)
    }

    /// Collapse a batch of errors: none, the single one, or an aggregate
    pub fn aggregate(mut errors: Vec<CloudError>) -> Option<CloudError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(CloudError::Aggregate(errors)),
        }
    }
}

/// Closed taxonomy every error is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Precondition,
    Transient,
    QuotaExceeded,
    Validation,
    Fatal,
}

const NOT_FOUND_TYPES: &[&str] = &[
    "not_found",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchVersion",
    "NoSuchBucketPolicy",
    "NoSuchTagSet",
    "NoSuchCORSConfiguration",
    "NoSuchLifecycleConfiguration",
    "NoSuchWebsiteConfiguration",
    "ObjectLockConfigurationNotFoundError",
];

const QUOTA_TYPES: &[&str] = &["quotas_exceeded", "QuotaExceeded"];

const FORBIDDEN_TYPES: &[&str] = &["permissions_denied", "denied_authentication", "AccessDenied"];

const CONFLICT_TYPES: &[&str] = &[
    "conflict",
    "transient_state",
    "already_exists",
    "BucketNotEmpty",
    "OperationAborted",
];

const PRECONDITION_TYPES: &[&str] = &["precondition_failed", "PreconditionFailed"];

const TRANSIENT_TYPES: &[&str] = &["SlowDown", "ServiceUnavailable", "InternalError"];

const VALIDATION_TYPES: &[&str] = &[
    "invalid_arguments",
    "out_of_stock",
    "InvalidArgument",
    "InvalidRequest",
    "MalformedXML",
    "MalformedPolicy",
];

impl ErrorKind {
    /// Classify an error. Exactly one kind matches; checks run in precedence order.
    pub fn of(err: &CloudError) -> ErrorKind {
        match err {
            CloudError::Api(api) => Self::of_api(api),
            CloudError::Transport(_) | CloudError::Timeout { .. } => ErrorKind::Transient,
            CloudError::InvalidId { .. } | CloudError::Validation { .. } => ErrorKind::Validation,
            CloudError::Precondition(_) => ErrorKind::Precondition,
            CloudError::Aggregate(errors) => errors.first().map_or(ErrorKind::Fatal, Self::of),
            CloudError::Cancelled
            | CloudError::FailureStatus { .. }
            | CloudError::Panic(_)
            | CloudError::Io(_)
            | CloudError::Json(_) => ErrorKind::Fatal,
        }
    }

    fn of_api(api: &ApiError) -> ErrorKind {
        if api.status == 404 || api.has_type(NOT_FOUND_TYPES) {
            ErrorKind::NotFound
        } else if api.has_type(QUOTA_TYPES) {
            ErrorKind::QuotaExceeded
        } else if api.status == 403 || api.has_type(FORBIDDEN_TYPES) {
            ErrorKind::Forbidden
        } else if api.status == 409 || api.has_type(CONFLICT_TYPES) {
            ErrorKind::Conflict
        } else if api.status == 412 || api.has_type(PRECONDITION_TYPES) {
            ErrorKind::Precondition
        } else if api.status >= 500
            || api.status == 429
            || api.retry_after.is_some()
            || api.has_type(TRANSIENT_TYPES)
        {
            ErrorKind::Transient
        } else if api.status == 400 || api.status == 422 || api.has_type(VALIDATION_TYPES) {
            ErrorKind::Validation
        } else {
            ErrorKind::Fatal
        }
    }

    /// Kinds the waiter and retry loops recover from locally
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Conflict)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Forbidden => write!(f, "forbidden"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Precondition => write!(f, "precondition"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::QuotaExceeded => write!(f, "quota-exceeded"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

pub fn is_not_found(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::NotFound
}

pub fn is_forbidden(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::Forbidden
}

pub fn is_conflict(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::Conflict
}

pub fn is_precondition(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::Precondition
}

pub fn is_transient(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::Transient
}

pub fn is_quota_exceeded(err: &CloudError) -> bool {
    ErrorKind::of(err) == ErrorKind::QuotaExceeded
}

pub fn is_retryable(err: &CloudError) -> bool {
    ErrorKind::of(err).is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    type Predicate = fn(&CloudError) -> bool;

    const PREDICATES: &[(ErrorKind, Predicate)] = &[
        (ErrorKind::NotFound, is_not_found),
        (ErrorKind::Forbidden, is_forbidden),
        (ErrorKind::Conflict, is_conflict),
        (ErrorKind::Precondition, is_precondition),
        (ErrorKind::Transient, is_transient),
        (ErrorKind::QuotaExceeded, is_quota_exceeded),
    ];

    fn samples() -> Vec<CloudError> {
        vec![
            CloudError::api(404, "instance not found"),
            CloudError::Api(ApiError::new(400, "gone").with_type("not_found")),
            CloudError::api(403, "subdomain not found"),
            CloudError::Api(ApiError::new(403, "quota").with_type("quotas_exceeded")),
            CloudError::api(409, "already exists"),
            CloudError::Api(ApiError::new(409, "busy").with_type("transient_state")),
            CloudError::api(412, "etag mismatch"),
            CloudError::api(503, "unavailable"),
            CloudError::Api(ApiError::new(200, "x").with_retry_after(Duration::from_secs(2))),
            CloudError::api(400, "bad"),
            CloudError::api(418, "teapot"),
            CloudError::Transport("connection reset".into()),
            CloudError::Cancelled,
            CloudError::validation("volume_size_in_gb", "must grow"),
        ]
    }

    #[test]
    fn test_predicates_are_mutually_exclusive() {
        for err in samples() {
            let matching: Vec<_> = PREDICATES
                .iter()
                .filter(|(_, p)| p(&err))
                .map(|(k, _)| *k)
                .collect();
            assert!(matching.len() <= 1, "{err} matched {matching:?}");
            if let Some(kind) = matching.first() {
                assert_eq!(*kind, err.kind());
            }
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(CloudError::api(404, "x").kind(), ErrorKind::NotFound);
        assert_eq!(CloudError::api(403, "x").kind(), ErrorKind::Forbidden);
        assert_eq!(CloudError::api(409, "x").kind(), ErrorKind::Conflict);
        assert_eq!(CloudError::api(412, "x").kind(), ErrorKind::Precondition);
        assert_eq!(CloudError::api(500, "x").kind(), ErrorKind::Transient);
        assert_eq!(CloudError::api(429, "x").kind(), ErrorKind::Transient);
        assert_eq!(CloudError::api(400, "x").kind(), ErrorKind::Validation);
        assert_eq!(CloudError::api(418, "x").kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_s3_codes() {
        let no_bucket = CloudError::Api(ApiError::new(404, "x").with_type("NoSuchBucket"));
        assert!(is_not_found(&no_bucket));

        let denied = CloudError::Api(ApiError::new(403, "x").with_type("AccessDenied"));
        assert!(is_forbidden(&denied));

        // S3 may answer 400 with a typed not-found code
        let no_lock = CloudError::Api(
            ApiError::new(400, "x").with_type("ObjectLockConfigurationNotFoundError"),
        );
        assert!(is_not_found(&no_lock));
    }

    #[test]
    fn test_retryable() {
        assert!(is_retryable(&CloudError::api(409, "x")));
        assert!(is_retryable(&CloudError::Transport("reset".into())));
        assert!(is_retryable(&CloudError::Timeout {
            resource: "rdb instance".into(),
            last_status: "provisioning".into(),
        }));
        assert!(!is_retryable(&CloudError::api(404, "x")));
        assert!(!is_retryable(&CloudError::Cancelled));
    }

    #[test]
    fn test_aggregate_takes_first_kind() {
        assert!(CloudError::aggregate(vec![]).is_none());
        let single = CloudError::aggregate(vec![CloudError::api(404, "x")]).unwrap();
        assert!(matches!(single, CloudError::Api(_)));

        let many = CloudError::aggregate(vec![
            CloudError::api(403, "denied"),
            CloudError::api(500, "boom"),
        ])
        .unwrap();
        assert_eq!(many.kind(), ErrorKind::Forbidden);
        assert!(many.to_string().starts_with("2 errors"));
    }

    #[test]
    fn test_validation_display_with_attribute() {
        let err = CloudError::validation("volume_size_in_gb", "cannot shrink");
        assert_eq!(
            err.to_string(),
            "Invalid argument volume_size_in_gb: cannot shrink"
        );
        assert_eq!(err.attribute(), Some("volume_size_in_gb"));
    }
}

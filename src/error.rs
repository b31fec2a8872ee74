use thiserror::Error;

/// Raw error shape returned by the remote provider.
///
/// Never reaches callers as-is: transient codes are retried, fatal codes are
/// translated by the application layer (see [`OnboardingError::Unknown`]).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("provider error [{code}]: {message}")]
pub struct ProviderError {
    /// Machine-readable error code (e.g. "lock_timeout", "rate_limit").
    pub code: String,
    pub message: String,
    /// The offending request parameter, when the provider names one.
    pub param: Option<String>,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            param: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// Validation-shaped provider errors pass through to callers with their
    /// field name instead of being wrapped as unknown.
    pub fn is_validation_shaped(&self) -> bool {
        matches!(
            self.code.as_str(),
            "parameter_invalid_empty" | "parameter_unknown" | "invalid_request_error"
        )
    }
}

#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("invalid value for field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("missing required field '{field}'")]
    MissingField { field: String },
    #[error("collection is full (limit {cap})")]
    CapacityExceeded { cap: usize },
    #[error("no such record: {id}")]
    NotFound { id: String },
    #[error("session has ended")]
    SessionEnded,
    #[error("operation cancelled")]
    Cancelled,
    #[error("remote call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ProviderError },
    #[error("unknown provider error")]
    Unknown,
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl OnboardingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OnboardingError>;

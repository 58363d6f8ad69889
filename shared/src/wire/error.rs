use thiserror::Error;

/// Reasons a synchronized record is rejected at the ingest boundary
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field `{field}` must be a finite number")]
    NonFinite { field: &'static str },

    #[error("Field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Field `{field}` has unknown tag `{value}`")]
    UnknownTag { field: &'static str, value: String },
}

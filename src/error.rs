use thiserror::Error;

/// Rejected declarations. Raised while building a descriptor, before any
/// remote call is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// Failures reported by a parameter store while running a lifecycle action.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("access denied for parameter '{name}': {message}")]
    AccessDenied { name: String, message: String },

    #[error("KMS key is not usable for parameter '{name}': {message}")]
    KeyAccess { name: String, message: String },

    #[error("parameter '{0}' not found")]
    ParameterNotFound(String),

    #[error("parameter '{0}' already exists")]
    ParameterAlreadyExists(String),

    #[error("SSM {operation} failed for '{name}': {message}")]
    Api {
        operation: &'static str,
        name: String,
        message: String,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ParameterNotFound(_))
    }
}

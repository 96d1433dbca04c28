//! # Error Definitions
//!
//! Every way a dispatch can fail, split by whether the target function ran.
//!
//! Pre-invocation failures (`MalformedRequest`, `NamespaceNotFound`,
//! `FunctionNotFound`, `Validation`) guarantee the target had no side
//! effects and are caused by the caller. `Invocation` means the target itself
//! failed; anything it already did stays done.

use serde_json::Value;
use serde_json::json;

use crate::validate::ValidationError;

#[derive(Debug)]
pub enum Error {
    /// The request body could not be decoded.
    MalformedRequest(String),
    /// The namespace has no registry entry.
    NamespaceNotFound { namespace: String },
    /// The name is absent from the namespace, or is not a function.
    FunctionNotFound { namespace: String, function: String },
    /// The arguments do not satisfy the declared parameters.
    Validation(ValidationError),
    /// The target function returned an error or panicked.
    Invocation { namespace: String, function: String, source: anyhow::Error },
    /// The ambient context was read outside any `with_context` scope.
    ContextUnavailable,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRequest(msg) => write!(f, "Malformed RPC request: {}", msg),
            Self::NamespaceNotFound { namespace } => {
                write!(f, "RPC filePath \"{}\" not found.", namespace)
            }
            Self::FunctionNotFound { namespace, function } => write!(
                f,
                "RPC function \"{}:{}\" not found or is not a function.",
                namespace, function
            ),
            Self::Validation(e) => write!(f, "{}", e),
            Self::Invocation { namespace, function, source } => {
                write!(f, "RPC call to \"{}:{}\" failed: {}", namespace, function, source)
            }
            Self::ContextUnavailable => write!(f, "Internal error: Couldn't find RPC context"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Invocation { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable name of the failure class, as reported in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "MalformedRequest",
            Self::NamespaceNotFound { .. } => "NamespaceNotFound",
            Self::FunctionNotFound { .. } => "FunctionNotFound",
            Self::Validation(_) => "ValidationError",
            Self::Invocation { .. } => "InvocationError",
            Self::ContextUnavailable => "InternalError",
        }
    }

    /// True when the target function was never called.
    pub fn is_pre_invocation(&self) -> bool {
        matches!(
            self,
            Self::MalformedRequest(_)
                | Self::NamespaceNotFound { .. }
                | Self::FunctionNotFound { .. }
                | Self::Validation(_)
        )
    }

    /// HTTP-style status a transport may answer with: 400 for caller
    /// mistakes, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        if self.is_pre_invocation() { 400 } else { 500 }
    }

    /// The message clients see. An invocation failure reports the target's
    /// own message unchanged.
    pub fn message(&self) -> String {
        match self {
            Self::Invocation { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Error body: `{"error": {"message": ..., "kind": ...}}`.
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "message": self.message(),
                "kind": self.kind(),
            }
        })
    }
}

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Classification of every error returned to callers.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParams,
    InsufficientFunds,
    NonceConflict,
    RecipientRejected,
    NotFound,
    PermissionDenied,
    InternalError,
}

impl ErrorKind {
    /// JSON-RPC style error code.
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::InvalidParams | ErrorKind::NonceConflict | ErrorKind::RecipientRejected => {
                -32602
            }
            ErrorKind::InternalError => -32603,
            _ => -32000,
        }
    }
}

/// Validation or business rule failure. Never transient, never retried.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RejectedError {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub id: String,
    pub message: String,
}

impl RejectedError {
    pub fn new(kind: ErrorKind, id: &str, message: String) -> Self {
        Self {
            kind,
            id: id.to_string(),
            message,
        }
    }
}

impl Display for RejectedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.id, self.message)
    }
}

impl std::error::Error for RejectedError {}

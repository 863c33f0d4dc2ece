use crate::error::{ErrorBag, ErrorKind};
use std::fmt::{Debug, Display, Formatter};

pub struct WalletError {
    pub inner: ErrorBag,
    pub file: &'static str,
    pub line: u32,
}

impl WalletError {
    pub fn from_bag(inner: ErrorBag, file: &'static str, line: u32) -> Self {
        Self { inner, file, line }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.inner {
            ErrorBag::Rejected(rejected) => rejected.kind,
            _ => ErrorKind::InternalError,
        }
    }

    pub fn id(&self) -> &str {
        match &self.inner {
            ErrorBag::Rejected(rejected) => &rejected.id,
            _ => "unexpected_error",
        }
    }

    /// Message safe to hand back to a caller; internal details stay in the logs.
    pub fn message(&self) -> String {
        match &self.inner {
            ErrorBag::Rejected(rejected) => rejected.message.clone(),
            _ => "Unexpected error".to_string(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self.inner, ErrorBag::Rejected(_))
    }

    /// The node answered with an error, as opposed to being unreachable or too slow.
    pub fn is_node_error(&self) -> bool {
        matches!(self.inner, ErrorBag::NodeError(_))
    }
}

impl Display for WalletError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for WalletError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({}:{})", self.inner, self.file, self.line)
    }
}

impl std::error::Error for WalletError {}

mod bag;
mod custom;
mod rejected;
mod wrapped;

pub use bag::ErrorBag;
pub use custom::{CustomError, NodeError};
pub use rejected::{ErrorKind, RejectedError};
pub use wrapped::WalletError;

/// Export macros for creating errors
mod macros;

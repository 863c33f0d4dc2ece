mod registration_ops;
mod token_balance_ops;
mod token_ops;
mod tx_ops;
mod whitelist_ops;

pub use registration_ops::*;
pub use token_balance_ops::*;
pub use token_ops::*;
pub use tx_ops::*;
pub use whitelist_ops::*;

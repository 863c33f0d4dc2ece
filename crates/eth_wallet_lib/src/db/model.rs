mod token_dao;
mod transaction_dao;

pub use token_dao::*;
pub use transaction_dao::*;

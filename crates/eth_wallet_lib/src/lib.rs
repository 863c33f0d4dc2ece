pub mod balance;
pub mod cache;
pub mod config;
pub mod contracts;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod eth;
pub mod refresher;
pub mod rpc;
pub mod runtime;
pub mod server;
pub mod setup;
pub mod skeleton;
pub mod submit;
pub mod tokens;
pub mod transaction;
pub mod utils;

#[cfg(test)]
mod test_utils;

use serde::Deserialize;

use std::fs;
use std::path::Path;

use crate::error::*;
use crate::{err_custom_create, err_from};

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub ethereum: Ethereum,
    #[serde(default)]
    pub submission: Submission,
    #[serde(default)]
    pub tokens: Tokens,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Ethereum {
    pub network_id: u64,
    pub rpc_endpoints: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_gas_price")]
    pub default_gas_price: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Submission {
    pub nonce_lock_ttl: u64,
}

impl Default for Submission {
    fn default() -> Self {
        Self { nonce_lock_ttl: 5 }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Tokens {
    pub bulk_refresh_cooldown: u64,
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            bulk_refresh_cooldown: 60,
        }
    }
}

fn default_request_timeout() -> u64 {
    5
}

fn default_gas_price() -> f64 {
    20.0
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WalletError> {
        Self::parse(&fs::read_to_string(path).map_err(err_from!())?)
    }

    pub fn parse(content: &str) -> Result<Self, WalletError> {
        match toml::from_str(content) {
            Ok(config) => Ok(config),
            Err(e) => Err(err_custom_create!("Failed to parse toml {:?}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = Config::parse(
            r#"
[ethereum]
network-id = 116
rpc-endpoints = ["http://127.0.0.1:8545"]
default-gas-price = 1.5

[tokens]
bulk-refresh-cooldown = 30
"#,
        )
        .unwrap();
        assert_eq!(config.ethereum.network_id, 116);
        assert_eq!(config.ethereum.request_timeout, 5);
        assert_eq!(config.submission.nonce_lock_ttl, 5);
        assert_eq!(config.tokens.bulk_refresh_cooldown, 30);
    }

    #[test]
    fn test_missing_ethereum_section() {
        assert!(Config::parse("[tokens]\nbulk-refresh-cooldown = 30\n").is_err());
    }
}

use crate::config::Config;
use crate::error::*;
use crate::err_from;
use crate::utils::gwei_to_u256;
use std::time::Duration;
use web3::types::U256;

/// Validated runtime view of [`Config`].
#[derive(Clone, Debug)]
pub struct WalletSetup {
    pub network_id: u64,
    pub rpc_endpoints: Vec<String>,
    pub request_timeout: Duration,
    pub default_gas_price: U256,
    pub nonce_lock_ttl: Duration,
    pub bulk_refresh_cooldown: Duration,
}

impl WalletSetup {
    pub fn new(config: &Config) -> Result<Self, WalletError> {
        Ok(WalletSetup {
            network_id: config.ethereum.network_id,
            rpc_endpoints: config.ethereum.rpc_endpoints.clone(),
            request_timeout: Duration::from_secs(config.ethereum.request_timeout),
            default_gas_price: gwei_to_u256(config.ethereum.default_gas_price)
                .map_err(err_from!())?,
            nonce_lock_ttl: Duration::from_secs(config.submission.nonce_lock_ttl),
            bulk_refresh_cooldown: Duration::from_secs(config.tokens.bulk_refresh_cooldown),
        })
    }

    #[cfg(test)]
    pub fn for_tests(network_id: u64) -> Self {
        WalletSetup {
            network_id,
            rpc_endpoints: vec![],
            request_timeout: Duration::from_secs(5),
            default_gas_price: U256::from(20_000_000_000u64),
            nonce_lock_ttl: Duration::from_secs(5),
            bulk_refresh_cooldown: Duration::from_secs(60),
        }
    }
}

use crate::contracts::{decode_balance_of_result, get_erc20_balance_of, get_erc20_transfer};
use crate::db::ops::*;
use crate::error::*;
use crate::eth::{checksum_validate_address, format_address, parse_address, validate_address};
use crate::rpc::{EthCall, GasEstimateRequest};
use crate::submit::TransactionSubmitter;
use crate::transaction::{RawTransaction, TX_GAS};
use crate::utils::{data_decoder, data_encoder, hex_to_u256, parse_int, u256_to_hex};
use crate::{err_from, err_reject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use web3::types::{Address, U256};

/// Input of [`TransactionSubmitter::create_transaction_skeleton`].
///
/// Historical spellings of the field names are accepted as aliases; anything
/// else is rejected. Numeric fields take a JSON number, a decimal string or a
/// `0x` hex string.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SkeletonRequest {
    #[serde(default, alias = "from")]
    pub from_address: Option<String>,
    #[serde(default, alias = "to")]
    pub to_address: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub nonce: Option<Value>,
    #[serde(default, alias = "startgas", alias = "gasLimit")]
    pub gas: Option<Value>,
    #[serde(default, alias = "gasPrice", alias = "gasprice")]
    pub gas_price: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, alias = "networkId", alias = "chainId", alias = "chain_id")]
    pub network_id: Option<Value>,
    #[serde(default)]
    pub token_address: Option<String>,
}

impl SkeletonRequest {
    pub fn from_json(value: Value) -> Result<Self, WalletError> {
        serde_json::from_value(value).map_err(|e| {
            log::debug!("Rejected skeleton arguments: {}", e);
            err_reject!(InvalidParams, "bad_arguments", "Bad Arguments")
        })
    }
}

/// Unsigned transaction ready for client side signing, all numbers as `0x` hex.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionSkeleton {
    pub tx: String,
    pub gas: String,
    pub gas_price: String,
    pub nonce: String,
    /// Token amount for token transfers, wei otherwise.
    pub value: String,
}

enum RequestedValue {
    Max,
    Amount(U256),
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn parse_requested_value(value: Option<&Value>) -> Result<RequestedValue, WalletError> {
    match value {
        None => Ok(RequestedValue::Amount(U256::zero())),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("max") => Ok(RequestedValue::Max),
        Some(Value::String(s)) if s.is_empty() => Ok(RequestedValue::Amount(U256::zero())),
        Some(v) => parse_int(v)
            .map(RequestedValue::Amount)
            .ok_or_else(|| err_reject!(InvalidParams, "invalid_value", "Invalid Value")),
    }
}

fn parse_data(data: Option<&Value>) -> Result<Vec<u8>, WalletError> {
    let invalid = || err_reject!(InvalidParams, "invalid_data", "Invalid Data field");
    match data {
        None => Ok(vec![]),
        Some(Value::String(s)) => data_decoder(s).map_err(|_| invalid()),
        Some(Value::Number(n)) => {
            let n = n.as_u64().ok_or_else(invalid)?;
            data_decoder(&format!("{:x}", n)).map_err(|_| invalid())
        }
        Some(_) => Err(invalid()),
    }
}

/// Network ids may come as a number or a decimal string. Zero and empty mean "not given".
fn parse_network_id(network_id: Option<&Value>) -> Result<Option<u64>, WalletError> {
    let invalid = || err_reject!(InvalidParams, "invalid_network_id", "Invalid Network Id");
    let network_id = match network_id {
        None => return Ok(None),
        Some(Value::String(s)) if s.is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid)?,
        Some(Value::Bool(false)) => return Ok(None),
        Some(_) => return Err(invalid()),
    };
    if network_id == 0 {
        return Ok(None);
    }
    Ok(Some(network_id))
}

fn check_address(address: &str, id: &str, what: &str) -> Result<Address, WalletError> {
    if !validate_address(address) {
        return Err(err_reject!(InvalidParams, id, "Invalid {} Address", what));
    }
    if address != address.to_lowercase() && !checksum_validate_address(address) {
        return Err(err_reject!(InvalidParams, id, "Invalid {} Address Checksum", what));
    }
    parse_address(address)
}

fn insufficient_funds() -> WalletError {
    err_reject!(InsufficientFunds, "insufficient_funds", "Insufficient Funds")
}

/// Node execution failures become `cannot_pay_recipient`, transport failures pass through.
fn recipient_rejection(err: WalletError) -> WalletError {
    if err.is_node_error() {
        cannot_pay_recipient()
    } else {
        err
    }
}

fn cannot_pay_recipient() -> WalletError {
    err_reject!(
        RecipientRejected,
        "invalid_to_address",
        "Cannot send payments to that address"
    )
}

/// `balance - gas * gas_price`, InsufficientFunds when that would be negative.
fn remainder_after_fee(balance: U256, gas: U256, gas_price: U256) -> Result<U256, WalletError> {
    gas.checked_mul(gas_price)
        .and_then(|fee| balance.checked_sub(fee))
        .ok_or_else(insufficient_funds)
}

impl TransactionSubmitter {
    async fn cached_token_balance(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<Option<U256>, WalletError> {
        let row = {
            let mut conn = self.conn.lock().await;
            get_token_balance(&mut conn, &format_address(&token), &format_address(&holder))
                .await
                .map_err(err_from!())?
        };
        match row {
            Some(row) => Ok(Some(hex_to_u256(&row.balance).map_err(err_from!())?)),
            None => Ok(None),
        }
    }

    async fn live_token_balance(&self, token: Address, holder: Address) -> Option<U256> {
        let call = EthCall::new(token, get_erc20_balance_of(holder));
        match self.rpc.eth_call(call).await {
            Ok(result) => match decode_balance_of_result(&result) {
                Ok(balance) => balance,
                Err(err) => {
                    log::error!("Invalid balanceOf result of token {:#x}: {}", token, err);
                    None
                }
            },
            Err(err) => {
                log::error!(
                    "Unable to get balance for token {:#x} for address {:#x}: {}",
                    token,
                    holder,
                    err
                );
                None
            }
        }
    }

    /// Value to send for a "max" native transfer, together with the gas it needs.
    async fn resolve_max_value(
        &self,
        from: Address,
        to: Option<Address>,
        data: &[u8],
        gas: Option<U256>,
        gas_price: U256,
    ) -> Result<(U256, U256), WalletError> {
        let balance = self.balances().get_balances(from).await?.confirmed;
        if let Some(gas) = gas {
            return Ok((remainder_after_fee(balance, gas, gas_price)?, gas));
        }
        let code = match to {
            Some(to) => self.rpc.get_code(to).await?,
            None => vec![],
        };
        if code.is_empty() {
            let gas = U256::from(TX_GAS);
            return Ok((remainder_after_fee(balance, gas, gas_price)?, gas));
        }

        // the fallback function may branch on the value sent, re-estimate until the gas is stable
        let estimate = |value: U256| GasEstimateRequest {
            from,
            to,
            value,
            data: data.to_vec(),
        };
        let mut gas = self
            .rpc
            .estimate_gas(estimate(U256::zero()))
            .await
            .map_err(recipient_rejection)?;
        let mut attempts = 0;
        loop {
            if attempts > 2 {
                log::warn!(
                    "Hit max attempts trying to get max value to send to contract {:?}",
                    to
                );
                return Err(cannot_pay_recipient());
            }
            let value = remainder_after_fee(balance, gas, gas_price)?;
            let gas_with_value = self
                .rpc
                .estimate_gas(estimate(value))
                .await
                .map_err(recipient_rejection)?;
            if gas_with_value == gas {
                return Ok((value, gas));
            }
            gas = gas_with_value;
            attempts += 1;
        }
    }

    pub async fn create_transaction_skeleton(
        &self,
        request: SkeletonRequest,
    ) -> Result<TransactionSkeleton, WalletError> {
        let from_str = request.from_address.as_deref().map(str::trim).unwrap_or("");
        let to_str = request.to_address.as_deref().map(str::trim);
        let token_str = request.token_address.as_deref().map(str::trim);

        let from = check_address(from_str, "invalid_from_address", "From")?;
        let mut to = match to_str {
            Some(to_str) => Some(check_address(to_str, "invalid_to_address", "To")?),
            None => None,
        };

        if let Some(network_id) = parse_network_id(request.network_id.as_ref())? {
            log::info!("Network id used: {}", network_id);
            if network_id != self.setup.network_id {
                return Err(err_reject!(
                    InvalidParams,
                    "invalid_network_id",
                    "Network ID does not match. expected: {}",
                    self.setup.network_id
                ));
            }
        }

        let nonce_value = present(request.nonce);
        let mut gas_price_value = present(request.gas_price);
        // a caller chosen price is only used to overwrite a known nonce or for allow-listed accounts
        if gas_price_value.is_some() && nonce_value.is_none() {
            let whitelisted = {
                let mut conn = self.conn.lock().await;
                is_gas_price_whitelisted(
                    &mut conn,
                    &format_address(&from),
                    to.as_ref().map(format_address).as_deref(),
                )
                .await
                .map_err(err_from!())?
            };
            if !whitelisted {
                gas_price_value = None;
            }
        }
        let gas_price = match gas_price_value {
            Some(gas_price) => parse_int(&gas_price).ok_or_else(|| {
                err_reject!(InvalidParams, "invalid_gas_price", "Invalid Gas Price")
            })?,
            None => self.resolve_gas_price().await,
        };

        let mut gas = match present(request.gas) {
            Some(gas) => Some(
                parse_int(&gas)
                    .ok_or_else(|| err_reject!(InvalidParams, "invalid_gas", "Invalid Gas"))?,
            ),
            None => None,
        };

        let nonce = match nonce_value {
            Some(nonce) => parse_int(&nonce)
                .ok_or_else(|| err_reject!(InvalidParams, "invalid_nonce", "Invalid Nonce"))?,
            None => self.balances().get_transaction_count(from).await?,
        };

        let mut data = parse_data(present(request.data).as_ref())?;
        let requested_value = parse_requested_value(present(request.value).as_ref())?;

        let mut token_value = None;
        let value = if let Some(token_str) = token_str {
            if !validate_address(token_str) {
                return Err(err_reject!(
                    InvalidParams,
                    "invalid_token_address",
                    "Invalid Token Address"
                ));
            }
            let token = parse_address(token_str)?;
            if !data.is_empty() {
                return Err(err_reject!(
                    InvalidParams,
                    "bad_arguments",
                    "Cannot include both data and token_address"
                ));
            }
            let recipient = to.ok_or_else(|| {
                err_reject!(InvalidParams, "invalid_to_address", "Invalid To Address")
            })?;
            let amount = match requested_value {
                RequestedValue::Amount(amount) => Some(amount),
                RequestedValue::Max => match self.cached_token_balance(token, from).await? {
                    Some(balance) => Some(balance),
                    None => self.live_token_balance(token, from).await,
                },
            };
            let amount =
                amount.ok_or_else(|| err_reject!(InvalidParams, "invalid_value", "Invalid Value"))?;
            data = get_erc20_transfer(recipient, amount);
            token_value = Some((token, amount));
            to = Some(token);
            U256::zero()
        } else {
            match requested_value {
                RequestedValue::Amount(amount) => amount,
                RequestedValue::Max => {
                    let (value, max_gas) = self
                        .resolve_max_value(from, to, &data, gas, gas_price)
                        .await?;
                    gas = Some(max_gas);
                    value
                }
            }
        };

        let gas = match gas {
            Some(gas) => gas,
            None => {
                let estimate = GasEstimateRequest {
                    from,
                    to,
                    value,
                    data: data.clone(),
                };
                match self.rpc.estimate_gas(estimate).await {
                    Ok(gas) if !data.is_empty() => gas.saturating_mul(U256::from(12)) / 10,
                    Ok(gas) => gas,
                    Err(err) if !err.is_node_error() => return Err(err),
                    Err(err) => {
                        log::debug!("Gas estimation failed: {}", err);
                        // for token transfers a failed estimate usually means a too low token balance
                        if let Some((token, amount)) = token_value {
                            if let Some(balance) = self.cached_token_balance(token, from).await? {
                                if balance < amount {
                                    return Err(insufficient_funds());
                                }
                            }
                        }
                        return Err(err_reject!(
                            InvalidParams,
                            "invalid_data",
                            "Unable to estimate gas for contract call"
                        ));
                    }
                }
            }
        };

        let tx = RawTransaction::new_unsigned(
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            Some(self.setup.network_id),
        );
        let intrinsic_gas = tx.intrinsic_gas_used();
        if intrinsic_gas > gas {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction",
                "Transaction gas is too low. There is not enough gas to cover minimal cost of the transaction (minimal: {}, got: {}). Try increasing supplied gas.",
                intrinsic_gas,
                gas
            ));
        }

        Ok(TransactionSkeleton {
            tx: data_encoder(&tx.encode()),
            gas: u256_to_hex(gas),
            gas_price: u256_to_hex(gas_price),
            nonce: u256_to_hex(nonce),
            value: u256_to_hex(token_value.map(|(_, amount)| amount).unwrap_or(value)),
        })
    }
}

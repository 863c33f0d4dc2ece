use crate::balance::{apply_pending_transactions, next_nonce, tx_max_cost, BalanceAggregator};
use crate::cache::{SharedCache, FAST_GAS_PRICE_KEY};
use crate::contracts::decode_erc20_transfer;
use crate::db::model::*;
use crate::db::ops::*;
use crate::db::DbHandle;
use crate::dispatcher::Dispatcher;
use crate::error::*;
use crate::eth::{
    format_address, parse_tx_hash, personal_ecrecover, validate_signature,
    validate_transaction_hash,
};
use crate::rpc::ChainRpc;
use crate::setup::WalletSetup;
use crate::transaction::RawTransaction;
use crate::utils::{data_decoder, data_encoder, hex_to_u256, parse_int_str, u256_to_hex};
use crate::{err_custom_create, err_from, err_reject};
use serde_json::{json, Value};
use sqlx::Connection;
use std::sync::Arc;
use web3::types::U256;

/// Builds, validates and records wallet transactions.
#[derive(Clone)]
pub struct TransactionSubmitter {
    pub(crate) setup: WalletSetup,
    pub(crate) conn: DbHandle,
    pub(crate) rpc: Arc<dyn ChainRpc>,
    pub(crate) cache: Arc<dyn SharedCache>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
}

fn invalid_transaction() -> WalletError {
    err_reject!(InvalidParams, "invalid_transaction", "Invalid Transaction")
}

fn nonce_used() -> WalletError {
    err_reject!(NonceConflict, "invalid_nonce", "Nonce already used")
}

/// Ledger representation of a transaction that passed validation.
fn new_transaction_row(
    tx: &RawTransaction,
    hash: String,
    from_address: String,
    to_address: Option<String>,
    nonce: i64,
    sender_id: Option<&str>,
) -> TransactionDao {
    let now = chrono::Utc::now();
    TransactionDao {
        transaction_id: 0,
        hash,
        from_address,
        to_address,
        nonce,
        value: u256_to_hex(tx.value),
        gas: u256_to_hex(tx.gas),
        gas_price: u256_to_hex(tx.gas_price),
        data: Some(data_encoder(&tx.data)),
        v: Some(format!("{:#x}", tx.v)),
        r: Some(u256_to_hex(tx.r)),
        s: Some(u256_to_hex(tx.s)),
        sender_id: sender_id.map(|s| s.to_string()),
        status: TransactionStatus::New.as_str().to_string(),
        created: now,
        updated: now,
        blocknumber: None,
    }
}

/// Node style JSON view of a ledger row.
fn transaction_row_to_json(tx: &TransactionDao) -> Value {
    json!({
        "hash": tx.hash,
        "nonce": u256_to_hex(U256::from(tx.nonce.max(0) as u64)),
        "blockHash": null,
        "blockNumber": tx.blocknumber.map(|b| format!("{:#x}", b)),
        "transactionIndex": null,
        "from": tx.from_address,
        "to": tx.to_address,
        "value": tx.value,
        "gas": tx.gas,
        "gasPrice": tx.gas_price,
        "input": tx.data.clone().unwrap_or_else(|| "0x".to_string()),
        "v": tx.v,
        "r": tx.r,
        "s": tx.s,
        "status": tx.status().map(|status| status.display_name()),
    })
}

impl TransactionSubmitter {
    pub fn new(
        setup: WalletSetup,
        conn: DbHandle,
        rpc: Arc<dyn ChainRpc>,
        cache: Arc<dyn SharedCache>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            setup,
            conn,
            rpc,
            cache,
            dispatcher,
        }
    }

    pub fn balances(&self) -> BalanceAggregator {
        BalanceAggregator::new(self.conn.clone(), self.rpc.clone())
    }

    /// Market gas price: cached fast price, then the node, then the configured default.
    pub async fn resolve_gas_price(&self) -> U256 {
        if let Some(cached) = self.cache.get(FAST_GAS_PRICE_KEY).await {
            if let Some(gas_price) = parse_int_str(&cached) {
                return gas_price;
            }
            log::warn!("Ignoring invalid cached gas price: {}", cached);
        }
        match self.rpc.gas_price().await {
            Ok(gas_price) => gas_price,
            Err(err) => {
                log::warn!("Failed to get gas price from node, using default: {}", err);
                self.setup.default_gas_price
            }
        }
    }

    pub async fn get_gas_price(&self) -> String {
        u256_to_hex(self.resolve_gas_price().await)
    }

    /// Validates a client signed transaction and queues it. Returns the transaction hash.
    pub async fn send_transaction(
        &self,
        encoded_tx: &str,
        signature: Option<&str>,
        sender_id: Option<&str>,
    ) -> Result<String, WalletError> {
        let bytes = data_decoder(encoded_tx).map_err(|_| invalid_transaction())?;
        let mut tx = RawTransaction::decode(&bytes).map_err(|err| {
            log::debug!("Failed to decode transaction: {}", err);
            invalid_transaction()
        })?;

        if tx.is_signed() {
            let tx_sig = data_encoder(&tx.signature().map_err(|_| invalid_transaction())?);
            if let Some(signature) = signature {
                if signature.to_lowercase() != tx_sig {
                    return Err(err_reject!(
                        InvalidParams,
                        "invalid_signature",
                        "Invalid Signature: Signature in payload and signature of transaction do not match"
                    ));
                }
            }
        } else {
            let signature = signature.ok_or_else(|| {
                err_reject!(InvalidParams, "missing_signature", "Missing Signature")
            })?;
            if !validate_signature(signature) {
                return Err(err_reject!(
                    InvalidParams,
                    "invalid_signature",
                    "Invalid Signature: {}",
                    if signature.len() != 132 {
                        "Invalid length"
                    } else {
                        "Invalid hex value"
                    }
                ));
            }
            let sig = data_decoder(signature)
                .map_err(|_| err_reject!(InvalidParams, "invalid_signature", "Invalid Signature"))?;
            tx.add_signature(&sig)
                .map_err(|_| err_reject!(InvalidParams, "invalid_signature", "Invalid Signature"))?;
        }

        if let Some(network_id) = tx.network_id() {
            if network_id != self.setup.network_id {
                return Err(err_reject!(
                    InvalidParams,
                    "invalid_network_id",
                    "Invalid Network ID"
                ));
            }
        }

        let sender = tx.sender().map_err(|err| {
            log::debug!("Failed to recover sender: {}", err);
            err_reject!(InvalidParams, "invalid_signature", "Invalid Signature")
        })?;
        let from_address = format_address(&sender);
        let to_address = tx.to.as_ref().map(format_address);

        let lock_key = format!("{}:{}", from_address, tx.nonce);
        if !self
            .cache
            .acquire(&lock_key, self.setup.nonce_lock_ttl)
            .await
        {
            return Err(nonce_used());
        }
        let res = self
            .submit_locked(&tx, sender, &from_address, to_address.clone(), sender_id)
            .await;
        self.cache.release(&lock_key).await;
        let tx_hash = res?;

        self.dispatcher.enqueue_transaction_processing(&from_address);
        self.dispatcher.track(
            sender_id,
            "Sent transaction",
            json!({"hash": tx_hash, "from": from_address}),
        );
        self.dispatcher.track(
            None,
            "Received transaction",
            json!({"hash": tx_hash, "to": to_address}),
        );
        Ok(tx_hash)
    }

    /// Critical section of [`send_transaction`](Self::send_transaction), run under the
    /// `(sender, nonce)` lock.
    async fn submit_locked(
        &self,
        tx: &RawTransaction,
        sender: web3::types::Address,
        from_address: &str,
        to_address: Option<String>,
        sender_id: Option<&str>,
    ) -> Result<String, WalletError> {
        if tx.nonce > U256::from(i64::MAX) {
            return Err(err_reject!(
                NonceConflict,
                "nonce_too_high",
                "Provided nonce is too high"
            ));
        }
        let nonce = tx.nonce.as_u64() as i64;

        let intrinsic_gas = tx.intrinsic_gas_used();
        if intrinsic_gas > tx.gas {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction",
                "Transaction gas is too low. There is not enough gas to cover minimal cost of the transaction (minimal: {}, got: {}). Try increasing supplied gas.",
                intrinsic_gas,
                tx.gas
            ));
        }

        // node state is read before the ledger is locked, rpc calls never run under the db lock
        let network_balance = self.rpc.balance(sender).await?;
        let network_nonce = self.rpc.transaction_count(sender).await?;

        let tx_hash = data_encoder(&tx.hash());
        let token_transfer = match &to_address {
            Some(_) => decode_erc20_transfer(&tx.data),
            None => None,
        };
        let row = new_transaction_row(
            tx,
            tx_hash.clone(),
            from_address.to_string(),
            to_address.clone(),
            nonce,
            sender_id,
        );

        let existing = {
            let mut conn = self.conn.lock().await;
            let mut db_transaction = conn.begin().await.map_err(err_from!())?;

            // the cache lock only covers one nonce, fund and nonce checks are decided here
            let existing = get_active_tx_by_nonce(&mut db_transaction, from_address, nonce)
                .await
                .map_err(err_from!())?;
            if let Some(existing) = &existing {
                let existing_gas_price = hex_to_u256(&existing.gas_price).map_err(err_from!())?;
                if existing_gas_price >= tx.gas_price
                    || existing.status() == Some(TransactionStatus::Confirmed)
                {
                    return Err(nonce_used());
                }
            }

            let mut spendable =
                apply_pending_transactions(&mut db_transaction, sender, network_balance)
                    .await?
                    .confirmed;
            if let Some(existing) = &existing {
                spendable = spendable.saturating_add(tx_max_cost(existing)?);
            }
            match tx.max_cost() {
                Some(cost) if cost <= spendable => {}
                _ => {
                    return Err(err_reject!(
                        InsufficientFunds,
                        "insufficient_funds",
                        "Insufficient Funds"
                    ))
                }
            }

            if existing.is_none() {
                let expected_nonce = next_nonce(&mut db_transaction, sender, network_nonce).await?;
                if tx.nonce < expected_nonce {
                    return Err(err_reject!(
                        NonceConflict,
                        "nonce_too_low",
                        "Provided nonce is too low"
                    ));
                }
                if tx.nonce > expected_nonce {
                    return Err(err_reject!(
                        NonceConflict,
                        "nonce_too_high",
                        "Provided nonce is too high"
                    ));
                }
            }

            if let Some(existing) = &existing {
                set_tx_status(
                    &mut db_transaction,
                    existing.transaction_id,
                    TransactionStatus::Error,
                )
                .await
                .map_err(err_from!())?;
            }

            let inserted = insert_tx(&mut db_transaction, &row)
                .await
                .map_err(err_from!())?;

            if let (Some(call), Some(contract)) = (&token_transfer, &to_address) {
                let token = get_token(&mut db_transaction, contract)
                    .await
                    .map_err(err_from!())?;
                if let Some(token) = token {
                    let token_tx = TokenTransactionDao {
                        transaction_id: inserted.transaction_id,
                        transaction_log_index: 0,
                        contract_address: token.contract_address,
                        from_address: call
                            .from
                            .as_ref()
                            .map(format_address)
                            .unwrap_or_else(|| from_address.to_string()),
                        to_address: format_address(&call.to),
                        value: u256_to_hex(call.value),
                    };
                    insert_token_tx(&mut db_transaction, &token_tx)
                        .await
                        .map_err(err_from!())?;
                }
            }
            db_transaction.commit().await.map_err(err_from!())?;
            existing
        };

        if let Some(existing) = &existing {
            log::info!(
                "Setting tx {} to error due to forced overwrite",
                existing.hash
            );
            self.dispatcher
                .set_transaction_status(existing.transaction_id, TransactionStatus::Error);
        }
        Ok(tx_hash)
    }

    /// Cancels a transaction that was not yet handed over to the node.
    /// `signature` is a personal_sign of `Cancel transaction <hash>` by the sender.
    pub async fn cancel_queued_transaction(
        &self,
        tx_hash: &str,
        signature: &str,
    ) -> Result<(), WalletError> {
        if !validate_transaction_hash(tx_hash) {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction_hash",
                "Invalid Transaction Hash"
            ));
        }
        if !validate_signature(signature) {
            return Err(err_reject!(
                InvalidParams,
                "invalid_signature",
                "Invalid Signature"
            ));
        }

        let tx = {
            let mut conn = self.conn.lock().await;
            get_active_tx_by_hash(&mut conn, &tx_hash.to_lowercase())
                .await
                .map_err(err_from!())?
        };
        let tx = tx.ok_or_else(|| err_reject!(NotFound, "not_found", "Transaction not found"))?;
        if !tx.status().map(|s| s.is_queued()).unwrap_or(false) {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction_status",
                "Transaction already sent to node"
            ));
        }

        let message = format!("Cancel transaction {}", tx_hash);
        if !personal_ecrecover(&message, signature, &tx.from_address)? {
            return Err(err_reject!(
                PermissionDenied,
                "permission_denied",
                "Permission Denied"
            ));
        }

        let cancelled = {
            let mut conn = self.conn.lock().await;
            cancel_queued_tx(&mut conn, tx.transaction_id)
                .await
                .map_err(err_from!())?
        };
        if !cancelled {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction_status",
                "Transaction already sent to node"
            ));
        }
        log::info!("Setting tx {} to error due to user cancelation", tx.hash);
        self.dispatcher
            .set_transaction_status(tx.transaction_id, TransactionStatus::Error);
        Ok(())
    }

    /// Node view of a transaction, or the queued ledger row the node does not know yet.
    pub async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Value>, WalletError> {
        if !validate_transaction_hash(tx_hash) {
            return Err(err_reject!(
                InvalidParams,
                "invalid_transaction_hash",
                "Invalid Transaction Hash"
            ));
        }
        if let Some(tx) = self.rpc.transaction_by_hash(parse_tx_hash(tx_hash)?).await? {
            return serde_json::to_value(tx)
                .map(Some)
                .map_err(|err| err_custom_create!("Failed to serialize transaction: {}", err));
        }
        let row = {
            let mut conn = self.conn.lock().await;
            get_active_tx_by_hash(&mut conn, &tx_hash.to_lowercase())
                .await
                .map_err(err_from!())?
        };
        Ok(row.as_ref().map(transaction_row_to_json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::model::TokenDao;
    use crate::dispatcher::DispatchEvent;
    use crate::eth::test_keys::{address_of, personal_sign, secret_key};
    use crate::error::ErrorKind;
    use crate::test_utils::{TestContext, TEST_NETWORK_ID};
    use crate::transaction::test_signing::{sign, sign_detached};
    use crate::contracts::get_erc20_transfer;
    use secp256k1::SecretKey;
    use web3::types::Address;

    const GWEI: u64 = 1_000_000_000;

    fn submitter(ctx: &TestContext) -> TransactionSubmitter {
        TransactionSubmitter::new(
            ctx.setup.clone(),
            ctx.conn.clone(),
            ctx.chain.clone(),
            ctx.cache.clone(),
            ctx.dispatcher.clone(),
        )
    }

    fn transfer(nonce: u64, gas_price_gwei: u64, to: Address) -> RawTransaction {
        RawTransaction::new_unsigned(
            U256::from(nonce),
            U256::from(gas_price_gwei * GWEI),
            U256::from(21000),
            Some(to),
            U256::from(GWEI),
            vec![],
            Some(TEST_NETWORK_ID),
        )
    }

    fn signed_hex(tx: &RawTransaction, sk: &SecretKey) -> String {
        data_encoder(&sign(tx, sk).encode())
    }

    async fn funded(ctx: &TestContext, n: u8) -> (SecretKey, Address) {
        let sk = secret_key(n);
        let address = address_of(&sk);
        ctx.chain.set_balance(address, U256::from(1_000_000 * GWEI));
        (sk, address)
    }

    async fn row_by_hash(ctx: &TestContext, hash: &str) -> TransactionDao {
        let mut conn = ctx.conn.lock().await;
        sqlx::query_as::<_, TransactionDao>("SELECT * FROM transactions WHERE hash = $1")
            .bind(hash)
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_signed_transaction() {
        let mut ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let to = Address::from_low_u64_be(2);
        let tx = transfer(0, 1, to);
        let hash = submitter(&ctx)
            .send_transaction(&signed_hex(&tx, &sk), None, Some("user-1"))
            .await
            .unwrap();
        assert_eq!(hash, data_encoder(&sign(&tx, &sk).hash()));

        let row = row_by_hash(&ctx, &hash).await;
        assert_eq!(row.from_address, format_address(&from));
        assert_eq!(row.to_address, Some(format_address(&to)));
        assert_eq!(row.status(), Some(TransactionStatus::New));
        assert_eq!(row.sender_id.as_deref(), Some("user-1"));
        assert_eq!(row.gas_price, "0x3b9aca00");

        let events = ctx.drain_events();
        assert_eq!(
            events[0],
            DispatchEvent::ProcessTransactions {
                address: format_address(&from)
            }
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, DispatchEvent::Track { event, .. } if event == "Sent transaction")));
    }

    #[tokio::test]
    async fn test_send_unsigned_with_detached_signature() {
        let ctx = TestContext::new().await;
        let (sk, _) = funded(&ctx, 1).await;
        let tx = transfer(0, 1, Address::from_low_u64_be(2));
        let unsigned = data_encoder(&tx.encode());
        let submitter = submitter(&ctx);

        let err = submitter
            .send_transaction(&unsigned, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "missing_signature");

        let err = submitter
            .send_transaction(&unsigned, Some("0x1234"), None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_signature");
        assert_eq!(err.message(), "Invalid Signature: Invalid length");

        let signature = data_encoder(&sign_detached(&tx, &sk));
        let hash = submitter
            .send_transaction(&unsigned, Some(&signature), None)
            .await
            .unwrap();
        assert_eq!(hash, data_encoder(&sign(&tx, &sk).hash()));
    }

    #[tokio::test]
    async fn test_signature_mismatch_and_network() {
        let ctx = TestContext::new().await;
        let (sk, _) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let tx = transfer(0, 1, Address::from_low_u64_be(2));
        let other_sig = data_encoder(&sign_detached(&tx, &secret_key(5)));
        let err = submitter
            .send_transaction(&signed_hex(&tx, &sk), Some(&other_sig), None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_signature");

        let mut wrong_network = tx.clone();
        wrong_network.v = 1;
        let err = submitter
            .send_transaction(&signed_hex(&wrong_network, &sk), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_network_id");

        let err = submitter
            .send_transaction("0xdeadbeef", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_transaction");
    }

    #[tokio::test]
    async fn test_nonce_checks() {
        let ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        ctx.chain.set_nonce(from, 2);
        let submitter = submitter(&ctx);
        let to = Address::from_low_u64_be(2);

        let err = submitter
            .send_transaction(&signed_hex(&transfer(1, 1, to), &sk), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonceConflict);
        assert_eq!(err.id(), "nonce_too_low");

        let err = submitter
            .send_transaction(&signed_hex(&transfer(3, 1, to), &sk), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "nonce_too_high");

        submitter
            .send_transaction(&signed_hex(&transfer(2, 1, to), &sk), None, None)
            .await
            .unwrap();
        // queued nonces chain before the node sees them
        submitter
            .send_transaction(&signed_hex(&transfer(3, 1, to), &sk), None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let ctx = TestContext::new().await;
        let sk = secret_key(1);
        ctx.chain
            .set_balance(address_of(&sk), U256::from(GWEI + 21000 * GWEI - 1));
        let err = submitter(&ctx)
            .send_transaction(
                &signed_hex(&transfer(0, 1, Address::from_low_u64_be(2)), &sk),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_overwrite_rules() {
        let mut ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let to = Address::from_low_u64_be(2);

        let first = submitter
            .send_transaction(&signed_hex(&transfer(0, 2, to), &sk), None, None)
            .await
            .unwrap();

        // equal and lower prices cannot replace it
        for gas_price in [2, 1] {
            let err = submitter
                .send_transaction(&signed_hex(&transfer(0, gas_price, to), &sk), None, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NonceConflict);
            assert_eq!(err.id(), "invalid_nonce");
        }

        ctx.drain_events();
        let second = submitter
            .send_transaction(&signed_hex(&transfer(0, 3, to), &sk), None, None)
            .await
            .unwrap();
        let old = row_by_hash(&ctx, &first).await;
        assert_eq!(old.status(), Some(TransactionStatus::Error));
        let new = row_by_hash(&ctx, &second).await;
        assert_eq!(new.status(), Some(TransactionStatus::New));
        assert!(ctx.drain_events().contains(&DispatchEvent::SetTransactionStatus {
            transaction_id: old.transaction_id,
            status: TransactionStatus::Error
        }));

        // a confirmed transaction is final
        {
            let mut conn = ctx.conn.lock().await;
            set_tx_status(&mut conn, new.transaction_id, TransactionStatus::Confirmed)
                .await
                .unwrap();
        }
        ctx.chain.set_nonce(from, 1);
        let err = submitter
            .send_transaction(&signed_hex(&transfer(0, 50, to), &sk), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_nonce");
    }

    #[tokio::test]
    async fn test_concurrent_same_nonce() {
        let ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let to = Address::from_low_u64_be(2);
        let a = signed_hex(&transfer(0, 5, to), &sk);
        let b = signed_hex(&transfer(0, 5, Address::from_low_u64_be(3)), &sk);

        let (ra, rb) = tokio::join!(
            submitter.send_transaction(&a, None, None),
            submitter.send_transaction(&b, None, None)
        );
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);
        let err = ra.err().or(rb.err()).unwrap();
        assert_eq!(err.kind(), ErrorKind::NonceConflict);

        let mut conn = ctx.conn.lock().await;
        let active = get_pending_outgoing_txs(&mut conn, &format_address(&from))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_nonces_share_one_balance() {
        let ctx = TestContext::new().await;
        let sk = secret_key(1);
        let from = address_of(&sk);
        // covers exactly one transfer of 1 gwei at 1 gwei gas price
        ctx.chain.set_balance(from, U256::from(GWEI + 21000 * GWEI));
        let submitter = submitter(&ctx);
        let to = Address::from_low_u64_be(2);
        let first = signed_hex(&transfer(0, 1, to), &sk);
        let second = signed_hex(&transfer(1, 1, to), &sk);

        let (r0, r1) = tokio::join!(
            submitter.send_transaction(&first, None, None),
            submitter.send_transaction(&second, None, None)
        );
        assert!(r0.is_ok());
        let err = r1.unwrap_err();
        assert!(
            err.kind() == ErrorKind::InsufficientFunds || err.id() == "nonce_too_high",
            "unexpected error {}",
            err
        );

        let balances = submitter.balances().get_balances(from).await.unwrap();
        assert_eq!(balances.confirmed, U256::zero());
        let mut conn = ctx.conn.lock().await;
        let active = get_pending_outgoing_txs(&mut conn, &format_address(&from))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_unconfirmed_transaction() {
        let mut ctx = TestContext::new().await;
        let sk = secret_key(1);
        let from = address_of(&sk);
        // enough for the replacement only once the replaced row is refunded
        ctx.chain.set_balance(from, U256::from(GWEI + 21000 * 3 * GWEI));
        let submitter = submitter(&ctx);
        let to = Address::from_low_u64_be(2);

        let first = submitter
            .send_transaction(&signed_hex(&transfer(0, 1, to), &sk), None, None)
            .await
            .unwrap();
        let old = row_by_hash(&ctx, &first).await;
        {
            let mut conn = ctx.conn.lock().await;
            set_tx_status(&mut conn, old.transaction_id, TransactionStatus::Unconfirmed)
                .await
                .unwrap();
        }
        ctx.drain_events();

        let second = submitter
            .send_transaction(&signed_hex(&transfer(0, 3, to), &sk), None, None)
            .await
            .unwrap();
        assert_eq!(
            row_by_hash(&ctx, &first).await.status(),
            Some(TransactionStatus::Error)
        );
        assert_eq!(
            row_by_hash(&ctx, &second).await.status(),
            Some(TransactionStatus::New)
        );
        assert!(ctx.drain_events().contains(&DispatchEvent::SetTransactionStatus {
            transaction_id: old.transaction_id,
            status: TransactionStatus::Error
        }));
    }

    #[tokio::test]
    async fn test_locked_nonce_fails_fast() {
        let ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let key = format!("{}:0", format_address(&from));
        assert!(ctx.cache.acquire(&key, ctx.setup.nonce_lock_ttl).await);
        let err = submitter(&ctx)
            .send_transaction(
                &signed_hex(&transfer(0, 1, Address::from_low_u64_be(2)), &sk),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonceConflict);
        assert_eq!(err.message(), "Nonce already used");
    }

    #[tokio::test]
    async fn test_token_transfer_is_recorded() {
        let ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let token = Address::from_low_u64_be(0x70);
        let recipient = Address::from_low_u64_be(2);
        {
            let mut conn = ctx.conn.lock().await;
            insert_token(
                &mut conn,
                &TokenDao {
                    contract_address: format_address(&token),
                    symbol: Some("TST".to_string()),
                    name: Some("Test".to_string()),
                    decimals: Some(18),
                    icon: None,
                    custom: false,
                    ready: true,
                },
            )
            .await
            .unwrap();
        }
        let mut tx = transfer(0, 1, token);
        tx.value = U256::zero();
        tx.gas = U256::from(60000);
        tx.data = get_erc20_transfer(recipient, U256::from(500));
        let hash = submitter(&ctx)
            .send_transaction(&signed_hex(&tx, &sk), None, None)
            .await
            .unwrap();

        let row = row_by_hash(&ctx, &hash).await;
        let mut conn = ctx.conn.lock().await;
        let token_txs = get_token_txs_by_tx(&mut conn, row.transaction_id)
            .await
            .unwrap();
        assert_eq!(
            token_txs,
            vec![TokenTransactionDao {
                transaction_id: row.transaction_id,
                transaction_log_index: 0,
                contract_address: format_address(&token),
                from_address: format_address(&from),
                to_address: format_address(&recipient),
                value: "0x1f4".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_cancel_queued_transaction() {
        let mut ctx = TestContext::new().await;
        let (sk, _) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let hash = submitter
            .send_transaction(
                &signed_hex(&transfer(0, 1, Address::from_low_u64_be(2)), &sk),
                None,
                None,
            )
            .await
            .unwrap();
        ctx.drain_events();

        let message = format!("Cancel transaction {}", hash);
        let err = submitter
            .cancel_queued_transaction(&hash, &personal_sign(&message, &secret_key(9)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        let err = submitter
            .cancel_queued_transaction(&format!("0x{}", "00".repeat(32)), &personal_sign(&message, &sk))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        submitter
            .cancel_queued_transaction(&hash, &personal_sign(&message, &sk))
            .await
            .unwrap();
        let row = row_by_hash(&ctx, &hash).await;
        assert_eq!(row.status(), Some(TransactionStatus::Error));
        assert_eq!(
            ctx.drain_events(),
            vec![DispatchEvent::SetTransactionStatus {
                transaction_id: row.transaction_id,
                status: TransactionStatus::Error
            }]
        );
    }

    #[tokio::test]
    async fn test_cancel_rejected_after_submission_to_node() {
        let ctx = TestContext::new().await;
        let (sk, _) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let hash = submitter
            .send_transaction(
                &signed_hex(&transfer(0, 1, Address::from_low_u64_be(2)), &sk),
                None,
                None,
            )
            .await
            .unwrap();
        let row = row_by_hash(&ctx, &hash).await;
        {
            let mut conn = ctx.conn.lock().await;
            set_tx_status(&mut conn, row.transaction_id, TransactionStatus::Unconfirmed)
                .await
                .unwrap();
        }
        let message = format!("Cancel transaction {}", hash);
        let err = submitter
            .cancel_queued_transaction(&hash, &personal_sign(&message, &sk))
            .await
            .unwrap_err();
        assert_eq!(err.id(), "invalid_transaction_status");
    }

    #[tokio::test]
    async fn test_get_transaction_from_ledger() {
        let ctx = TestContext::new().await;
        let (sk, from) = funded(&ctx, 1).await;
        let submitter = submitter(&ctx);
        let hash = submitter
            .send_transaction(
                &signed_hex(&transfer(0, 1, Address::from_low_u64_be(2)), &sk),
                None,
                None,
            )
            .await
            .unwrap();
        let tx = submitter.get_transaction(&hash).await.unwrap().unwrap();
        assert_eq!(tx["hash"], json!(hash));
        assert_eq!(tx["from"], json!(format_address(&from)));
        assert_eq!(tx["nonce"], json!("0x0"));
        assert_eq!(tx["status"], json!("queued"));

        let unknown = format!("0x{}", "11".repeat(32));
        assert!(submitter.get_transaction(&unknown).await.unwrap().is_none());
        let err = submitter.get_transaction("0x12").await.unwrap_err();
        assert_eq!(err.id(), "invalid_transaction_hash");
    }
}

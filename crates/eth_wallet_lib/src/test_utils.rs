use crate::cache::MemoryCache;
use crate::contracts::{get_erc20_balance_of, ERC20_BALANCE_OF_SELECTOR};
use crate::db::{create_sqlite_connection, DbHandle};
use crate::dispatcher::{ChannelDispatcher, DispatchEvent};
use crate::err_custom_create;
use crate::error::*;
use crate::rpc::{BatchResults, ChainRpc, EthCall, GasEstimateRequest};
use crate::setup::WalletSetup;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use web3::types::{Address, Transaction, H256, U256};

pub const TEST_NETWORK_ID: u64 = 116;

#[derive(Debug, Default)]
pub struct MockChainState {
    pub balances: HashMap<Address, U256>,
    pub nonces: HashMap<Address, U256>,
    pub gas_price: Option<U256>,
    pub code: HashMap<Address, Vec<u8>>,
    /// Results handed out by consecutive `estimate_gas` calls, `None` is a revert.
    pub estimates: VecDeque<Option<U256>>,
    pub default_estimate: Option<U256>,
    /// Every `estimate_gas` call fails as if the node could not be reached.
    pub estimate_unreachable: bool,
    pub estimate_requests: Vec<GasEstimateRequest>,
    /// `eth_call` results keyed by (contract, call data), `None` is a failed call.
    pub calls: HashMap<(Address, Vec<u8>), Option<Vec<u8>>>,
    pub transactions: HashMap<H256, Transaction>,
    pub batch_count: usize,
    pub batch_sizes: Vec<usize>,
}

/// Scripted node used by the tests.
#[derive(Debug, Default)]
pub struct MockChain {
    pub state: Mutex<MockChainState>,
}

fn node_error(msg: &str) -> WalletError {
    WalletError::from_bag(ErrorBag::NodeError(NodeError::new(msg)), file!(), line!())
}

pub fn u256_word(value: U256) -> Vec<u8> {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word.to_vec()
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.state.lock().unwrap().gas_price = Some(U256::from(1_000_000_000u64));
        chain.state.lock().unwrap().default_estimate = Some(U256::from(21000));
        chain
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state
            .lock()
            .unwrap()
            .nonces
            .insert(address, U256::from(nonce));
    }

    pub fn set_gas_price(&self, gas_price: Option<U256>) {
        self.state.lock().unwrap().gas_price = gas_price;
    }

    pub fn set_code(&self, address: Address, code: Vec<u8>) {
        self.state.lock().unwrap().code.insert(address, code);
    }

    pub fn push_estimate(&self, estimate: Option<U256>) {
        self.state.lock().unwrap().estimates.push_back(estimate);
    }

    pub fn set_default_estimate(&self, estimate: Option<U256>) {
        self.state.lock().unwrap().default_estimate = estimate;
    }

    pub fn set_estimate_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().estimate_unreachable = unreachable;
    }

    pub fn set_call_result(&self, to: Address, data: Vec<u8>, result: Option<Vec<u8>>) {
        self.state.lock().unwrap().calls.insert((to, data), result);
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, balance: U256) {
        self.set_call_result(token, get_erc20_balance_of(holder), Some(u256_word(balance)));
    }

    pub fn batch_count(&self) -> usize {
        self.state.lock().unwrap().batch_count
    }

    fn call_result(&self, call: &EthCall) -> Result<Vec<u8>, WalletError> {
        let state = self.state.lock().unwrap();
        match state.calls.get(&(call.to, call.data.clone())) {
            Some(Some(result)) => Ok(result.clone()),
            Some(None) => Err(node_error("execution reverted")),
            None if call.data.starts_with(&ERC20_BALANCE_OF_SELECTOR) => Ok(u256_word(U256::zero())),
            None => Ok(vec![]),
        }
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn eth_call(&self, call: EthCall) -> Result<Vec<u8>, WalletError> {
        self.call_result(&call)
    }

    async fn eth_call_batch(&self, calls: Vec<EthCall>) -> Result<BatchResults, WalletError> {
        {
            let mut state = self.state.lock().unwrap();
            state.batch_count += 1;
            state.batch_sizes.push(calls.len());
        }
        Ok(calls.iter().map(|call| self.call_result(call)).collect())
    }

    async fn gas_price(&self) -> Result<U256, WalletError> {
        self.state
            .lock()
            .unwrap()
            .gas_price
            .ok_or_else(|| err_custom_create!("gas price unavailable"))
    }

    async fn transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn estimate_gas(&self, request: GasEstimateRequest) -> Result<U256, WalletError> {
        let mut state = self.state.lock().unwrap();
        state.estimate_requests.push(request);
        let estimate = match state.estimates.pop_front() {
            Some(estimate) => estimate,
            None => state.default_estimate,
        };
        if state.estimate_unreachable {
            return Err(err_custom_create!("eth_estimateGas timed out after 5s"));
        }
        estimate.ok_or_else(|| node_error("gas required exceeds allowance"))
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, WalletError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn balance(&self, address: Address) -> Result<U256, WalletError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_by_hash(&self, hash: H256) -> Result<Option<Transaction>, WalletError> {
        Ok(self.state.lock().unwrap().transactions.get(&hash).cloned())
    }
}

/// Collaborators of a test case wired together over an in-memory ledger.
pub struct TestContext {
    pub setup: WalletSetup,
    pub conn: DbHandle,
    pub chain: Arc<MockChain>,
    pub cache: Arc<MemoryCache>,
    pub dispatcher: Arc<ChannelDispatcher>,
    pub events: UnboundedReceiver<DispatchEvent>,
}

impl TestContext {
    pub async fn new() -> Self {
        let conn = create_sqlite_connection(None, true).await.unwrap();
        let (dispatcher, events) = ChannelDispatcher::new();
        Self {
            setup: WalletSetup::for_tests(TEST_NETWORK_ID),
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
            chain: Arc::new(MockChain::new()),
            cache: Arc::new(MemoryCache::new()),
            dispatcher: Arc::new(dispatcher),
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<DispatchEvent> {
        let mut events = vec![];
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

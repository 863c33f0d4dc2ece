use crate::error::*;
use crate::setup::WalletSetup;
use crate::err_custom_create;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use web3::transports::{Batch, Http};
use web3::types::{
    Address, BlockNumber, Bytes, CallRequest, Transaction, TransactionId, H256, U256,
};
use web3::Web3;

fn node_or_transport_error(err: web3::Error) -> WalletError {
    let bag = match err {
        web3::Error::Rpc(rpc_err) => ErrorBag::NodeError(NodeError::new(&rpc_err.message)),
        err => ErrorBag::Web3Error(err),
    };
    WalletError::from_bag(bag, file!(), line!())
}

/// Single `eth_call` of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthCall {
    pub to: Address,
    pub data: Vec<u8>,
}

impl EthCall {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, data }
    }

    fn to_call_request(&self) -> CallRequest {
        CallRequest {
            to: Some(self.to),
            data: Some(Bytes(self.data.clone())),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasEstimateRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

/// Per call results of a batch, in call order.
pub type BatchResults = Vec<Result<Vec<u8>, WalletError>>;

/// Subset of the node JSON-RPC surface used by the wallet.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn eth_call(&self, call: EthCall) -> Result<Vec<u8>, WalletError>;

    /// Executes all calls in one round trip. The outer error means the batch itself failed.
    async fn eth_call_batch(&self, calls: Vec<EthCall>) -> Result<BatchResults, WalletError>;

    async fn gas_price(&self) -> Result<U256, WalletError>;

    /// Next nonce as seen by the node, pending transactions included.
    async fn transaction_count(&self, address: Address) -> Result<U256, WalletError>;

    async fn estimate_gas(&self, request: GasEstimateRequest) -> Result<U256, WalletError>;

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, WalletError>;

    async fn balance(&self, address: Address) -> Result<U256, WalletError>;

    async fn transaction_by_hash(&self, hash: H256) -> Result<Option<Transaction>, WalletError>;
}

/// [`ChainRpc`] over the web3 HTTP transport, one endpoint picked at random per call.
#[derive(Clone, Debug)]
pub struct Web3Gateway {
    transports: Vec<Http>,
    request_timeout: Duration,
}

impl Web3Gateway {
    pub fn new(setup: &WalletSetup) -> Result<Self, WalletError> {
        let mut transports = Vec::new();
        for endp in &setup.rpc_endpoints {
            let Ok(transport) = Http::new(endp) else {
                return Err(err_custom_create!("Failed to create transport for endpoint: {}", endp));
            };
            transports.push(transport);
        }
        if transports.is_empty() {
            return Err(err_custom_create!("No rpc endpoints configured"));
        }
        Ok(Self {
            transports,
            request_timeout: setup.request_timeout,
        })
    }

    fn transport(&self) -> Result<&Http, WalletError> {
        let mut rng = rand::thread_rng();
        self.transports
            .get(rng.gen_range(0..self.transports.len()))
            .ok_or_else(|| err_custom_create!("No rpc endpoints configured"))
    }

    fn provider(&self) -> Result<Web3<Http>, WalletError> {
        Ok(Web3::new(self.transport()?.clone()))
    }

    async fn timed<T, F>(&self, name: &str, fut: F) -> Result<T, WalletError>
    where
        F: Future<Output = Result<T, web3::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(res) => res.map_err(node_or_transport_error),
            Err(_) => Err(err_custom_create!(
                "{} timed out after {:?}",
                name,
                self.request_timeout
            )),
        }
    }
}

#[async_trait]
impl ChainRpc for Web3Gateway {
    async fn eth_call(&self, call: EthCall) -> Result<Vec<u8>, WalletError> {
        let web3 = self.provider()?;
        let res = self
            .timed("eth_call", web3.eth().call(call.to_call_request(), None))
            .await?;
        Ok(res.0)
    }

    async fn eth_call_batch(&self, calls: Vec<EthCall>) -> Result<BatchResults, WalletError> {
        if calls.is_empty() {
            return Ok(vec![]);
        }
        let web3 = Web3::new(Batch::new(self.transport()?.clone()));
        let pending = calls
            .iter()
            .map(|call| web3.eth().call(call.to_call_request(), None))
            .collect::<Vec<_>>();
        self.timed("batch eth_call", web3.transport().submit_batch())
            .await?;

        let mut results = Vec::with_capacity(pending.len());
        for call in pending {
            results.push(call.await.map(|bytes| bytes.0).map_err(node_or_transport_error));
        }
        Ok(results)
    }

    async fn gas_price(&self) -> Result<U256, WalletError> {
        let web3 = self.provider()?;
        self.timed("eth_gasPrice", web3.eth().gas_price()).await
    }

    async fn transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        let web3 = self.provider()?;
        self.timed(
            "eth_getTransactionCount",
            web3.eth()
                .transaction_count(address, Some(BlockNumber::Pending)),
        )
        .await
    }

    async fn estimate_gas(&self, request: GasEstimateRequest) -> Result<U256, WalletError> {
        let web3 = self.provider()?;
        let call_request = CallRequest {
            from: Some(request.from),
            to: request.to,
            value: Some(request.value),
            data: Some(Bytes(request.data)),
            ..Default::default()
        };
        self.timed("eth_estimateGas", web3.eth().estimate_gas(call_request, None))
            .await
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, WalletError> {
        let web3 = self.provider()?;
        let code = self
            .timed("eth_getCode", web3.eth().code(address, None))
            .await?;
        Ok(code.0)
    }

    async fn balance(&self, address: Address) -> Result<U256, WalletError> {
        let web3 = self.provider()?;
        self.timed(
            "eth_getBalance",
            web3.eth()
                .balance(address, Some(BlockNumber::Latest)),
        )
        .await
    }

    async fn transaction_by_hash(&self, hash: H256) -> Result<Option<Transaction>, WalletError> {
        let web3 = self.provider()?;
        self.timed(
            "eth_getTransactionByHash",
            web3.eth().transaction(TransactionId::Hash(hash)),
        )
        .await
    }
}

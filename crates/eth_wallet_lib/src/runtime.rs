use crate::balance::BalanceAggregator;
use crate::cache::{MemoryCache, SharedCache};
use crate::config;
use crate::db::{create_sqlite_connection, DbHandle};
use crate::dispatcher::{ChannelDispatcher, DispatchEvent, Dispatcher};
use crate::err_custom_create;
use crate::error::*;
use crate::refresher::{TokenBalanceRefresher, WILDCARD};
use crate::rpc::{ChainRpc, Web3Gateway};
use crate::setup::WalletSetup;
use crate::submit::TransactionSubmitter;
use crate::tokens::TokenDirectory;
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Every wallet operation wired to one set of collaborators.
#[derive(Clone)]
pub struct WalletServices {
    pub setup: WalletSetup,
    pub conn: DbHandle,
    pub submitter: TransactionSubmitter,
    pub balances: BalanceAggregator,
    pub tokens: TokenDirectory,
    pub refresher: TokenBalanceRefresher,
}

impl WalletServices {
    pub fn new(
        setup: WalletSetup,
        conn: DbHandle,
        rpc: Arc<dyn ChainRpc>,
        cache: Arc<dyn SharedCache>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        WalletServices {
            submitter: TransactionSubmitter::new(
                setup.clone(),
                conn.clone(),
                rpc.clone(),
                cache.clone(),
                dispatcher.clone(),
            ),
            balances: BalanceAggregator::new(conn.clone(), rpc.clone()),
            tokens: TokenDirectory::new(conn.clone(), rpc.clone(), dispatcher.clone()),
            refresher: TokenBalanceRefresher::new(setup.clone(), conn.clone(), rpc, cache, dispatcher),
            setup,
            conn,
        }
    }
}

pub struct WalletRuntime {
    pub runtime_handle: JoinHandle<()>,
    pub services: WalletServices,
}

/// Consumes dispatched events until every sender is gone.
/// Wildcard refresh requests are executed here, the rest belongs to downstream workers.
pub async fn dispatch_loop(
    mut events: UnboundedReceiver<DispatchEvent>,
    refresher: TokenBalanceRefresher,
) {
    while let Some(event) = events.recv().await {
        match event {
            DispatchEvent::WildcardTokenRefresh { address } => {
                let refresher = refresher.clone();
                tokio::spawn(async move {
                    if let Err(err) = refresher.update_token_cache(WILDCARD, &[address.clone()]).await {
                        log::error!("Token cache refresh for {} failed: {}", address, err);
                    }
                });
            }
            DispatchEvent::Notify { address, message } => {
                log::debug!("notify {}: {}", address, message);
            }
            DispatchEvent::ProcessTransactions { address } => {
                log::debug!("process transactions of {}", address);
            }
            DispatchEvent::SetTransactionStatus {
                transaction_id,
                status,
            } => {
                log::debug!(
                    "transaction {} status {}",
                    transaction_id,
                    status.as_str()
                );
            }
            DispatchEvent::Track {
                sender_id,
                event,
                data,
            } => {
                log::debug!("track {:?} {} {}", sender_id, event, data);
            }
        }
    }
    log::info!("Dispatch loop finished");
}

pub async fn start_wallet_engine(config: config::Config) -> Result<WalletRuntime, WalletError> {
    let setup = WalletSetup::new(&config)?;
    log::debug!("Starting wallet engine: {:#?}", setup);

    let db_file = env::var("DB_SQLITE_FILENAME")
        .map_err(|_| err_custom_create!("DB_SQLITE_FILENAME not set"))?;
    log::info!("connecting to sqlite file db: {}", db_file);
    let conn = create_sqlite_connection(Some(&db_file), true).await?;
    let conn = Arc::new(Mutex::new(conn));

    let rpc = Arc::new(Web3Gateway::new(&setup)?);
    let cache = Arc::new(MemoryCache::new());
    let (dispatcher, events) = ChannelDispatcher::new();

    let services = WalletServices::new(setup, conn, rpc, cache, Arc::new(dispatcher));
    let refresher = services.refresher.clone();
    let jh = tokio::spawn(async move { dispatch_loop(events, refresher).await });

    Ok(WalletRuntime {
        runtime_handle: jh,
        services,
    })
}

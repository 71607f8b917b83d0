use std::sync::Arc;
use std::time::Duration;

use crate::{
    conf::settings,
    pkg::internal::{
        chain::{
            Address, Contracts, Fees,
            abi::{PROFILE_CREATED, PROJECT_COMPLETED},
            contract::ContractCaller,
            events::{EventListener, LogSource, Subscription, log_occurrences},
            rpc::RpcClient,
            wallet::{RpcWallet, Wallet},
        },
        failure::{Failure, Outcome},
        postings::PostingBook,
        settlement::Settlement,
        store::{TableStore, memory::MemoryStore, rest::RestStore},
    },
    prelude::Result,
};

pub fn table_store(ephemeral: bool) -> Outcome<Arc<dyn TableStore>> {
    if ephemeral || settings.ephemeral_store {
        tracing::warn!("using the in-process table store, nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(RestStore::new(&settings.store_url, &settings.store_key)?))
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TableStore>,
    pub postings: Arc<PostingBook>,
    pub caller: Arc<ContractCaller>,
    pub settlement: Arc<Settlement>,
    pub listener: Arc<EventListener>,
    pub chain_id: u64,
    // kept alive for as long as the state is
    pub subscriptions: Arc<Vec<Subscription>>,
}

impl AppState {
    pub async fn new(ephemeral: bool) -> Result<AppState> {
        let store = table_store(ephemeral).map_err(Failure::reject)?;
        let rpc = Arc::new(RpcClient::new(&settings.rpc_url).map_err(Failure::reject)?);
        let account = settings
            .wallet_account
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(str::parse::<Address>)
            .transpose()
            .map_err(Failure::reject)?;
        let wallet = RpcWallet::new(rpc.clone(), settings.chain_id, account);
        if let Err(e) = wallet.connect().await {
            tracing::warn!("wallet not connected, contract calls will fail: {}", e);
        }
        let contracts = settings.contracts().map_err(Failure::reject)?;
        let fees = settings.fees().map_err(Failure::reject)?;
        Ok(AppState::assemble(
            store,
            Arc::new(wallet),
            rpc,
            contracts,
            fees,
            settings.chain_id,
            settings.poll_interval(),
        ))
    }

    /// Wires the shared services together and starts the event subscriptions.
    pub fn assemble(
        store: Arc<dyn TableStore>,
        wallet: Arc<dyn Wallet>,
        logs: Arc<dyn LogSource>,
        contracts: Contracts,
        fees: Fees,
        chain_id: u64,
        poll_interval: Duration,
    ) -> AppState {
        let postings = Arc::new(PostingBook::new());
        let caller = Arc::new(ContractCaller::new(wallet, contracts, fees));
        let settlement = Arc::new(Settlement::new(
            postings.clone(),
            caller.clone(),
            contracts.posting,
        ));
        let listener = Arc::new(EventListener::new(logs, poll_interval));
        let subscriptions = vec![
            settlement.watch(&listener),
            listener.subscribe(
                contracts.profile,
                &PROFILE_CREATED,
                log_occurrences(&PROFILE_CREATED),
            ),
            listener.subscribe(
                contracts.project,
                &PROJECT_COMPLETED,
                log_occurrences(&PROJECT_COMPLETED),
            ),
        ];
        AppState {
            store,
            postings,
            caller,
            settlement,
            listener,
            chain_id,
            subscriptions: Arc::new(subscriptions),
        }
    }
}

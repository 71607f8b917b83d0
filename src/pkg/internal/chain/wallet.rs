use std::sync::Arc;

use parking_lot::RwLock;

use super::{
    Address, TxHash,
    rpc::{RpcClient, TxRequest},
};
use crate::pkg::internal::failure::{Failure, Outcome};

/// Source of the active account and of signed transaction submission.
#[async_trait::async_trait]
pub trait Wallet: Send + Sync {
    /// The connected account, or `None` when no wallet is connected.
    fn account(&self) -> Option<Address>;

    async fn send_transaction(&self, tx: TxRequest) -> Outcome<TxHash>;
}

/// Wallet backed by an account the RPC node signs for.
pub struct RpcWallet {
    rpc: Arc<RpcClient>,
    chain_id: u64,
    account: RwLock<Option<Address>>,
}

impl RpcWallet {
    pub fn new(rpc: Arc<RpcClient>, chain_id: u64, account: Option<Address>) -> Self {
        RpcWallet {
            rpc,
            chain_id,
            account: RwLock::new(account),
        }
    }

    /// Verifies the node is on the expected chain and picks up an account
    /// when none was configured.
    pub async fn connect(&self) -> Outcome<Option<Address>> {
        let remote = self.rpc.chain_id().await?;
        if remote != self.chain_id {
            return Err(Failure::Network(format!(
                "node is on chain {}, expected {}",
                remote, self.chain_id
            )));
        }
        if self.account.read().is_none() {
            let first = self.rpc.accounts().await?.into_iter().next();
            *self.account.write() = first;
        }
        let account = *self.account.read();
        match account {
            Some(addr) => tracing::info!("wallet connected as {} on chain {}", addr, self.chain_id),
            None => tracing::warn!("node exposes no accounts, wallet stays disconnected"),
        }
        Ok(account)
    }
}

#[async_trait::async_trait]
impl Wallet for RpcWallet {
    fn account(&self) -> Option<Address> {
        *self.account.read()
    }

    async fn send_transaction(&self, tx: TxRequest) -> Outcome<TxHash> {
        self.rpc.send_transaction(&tx).await
    }
}

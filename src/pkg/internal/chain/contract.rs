use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::{
    Address, Contracts, Fees, TxHash, Wei,
    abi::{COMPLETE_POSTING, COMPLETE_PROJECT, CREATE_PROFILE, Function, Token},
    rpc::TxRequest,
    wallet::Wallet,
};
use crate::pkg::internal::failure::{Failure, Outcome};

/// Lifecycle of the most recent call. `Submitted` means handed to the wallet
/// and accepted by the node, not mined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Pending,
    Submitted(TxHash),
    Failed(Failure),
}

#[derive(Debug, Clone)]
pub struct ContractCall {
    pub address: Address,
    pub function: Function,
    pub args: Vec<Token>,
    pub value: Wei,
}

/// Fields `createProfile` records on chain.
#[derive(Debug, Clone)]
pub struct OnChainProfile {
    pub name: String,
    pub age: u32,
    pub location: String,
    pub gender: String,
    pub work_environment: String,
}

pub struct ContractCaller {
    wallet: Arc<dyn Wallet>,
    contracts: Contracts,
    fees: Fees,
    state: watch::Sender<CallState>,
}

impl ContractCaller {
    pub fn new(wallet: Arc<dyn Wallet>, contracts: Contracts, fees: Fees) -> Self {
        let (state, _) = watch::channel(CallState::Idle);
        ContractCaller {
            wallet,
            contracts,
            fees,
            state,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.wallet.account()
    }

    pub fn state(&self) -> CallState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CallState> {
        self.state.subscribe()
    }

    fn fail<T>(&self, failure: Failure) -> Outcome<T> {
        tracing::error!("contract call failed: {}", &failure);
        self.state.send_replace(CallState::Failed(failure.clone()));
        Err(failure)
    }

    /// Sends one transaction through the wallet. Nothing reaches the wallet when
    /// no account is connected or the arguments do not match the function.
    pub async fn submit(&self, call: ContractCall) -> Outcome<TxHash> {
        let Some(from) = self.wallet.account() else {
            return self.fail(Failure::MissingWallet);
        };
        let data = match call.function.encode_call(&call.args) {
            Ok(data) => data,
            Err(e) => return self.fail(e),
        };
        if call.address.is_zero() {
            tracing::warn!("{} targets the zero address placeholder", call.function.name);
        }
        self.state.send_replace(CallState::Pending);
        let tx = TxRequest {
            from,
            to: call.address,
            data,
            value: call.value,
        };
        match self.wallet.send_transaction(tx).await {
            Ok(hash) => {
                tracing::info!("{} submitted: {}", call.function.name, hash);
                self.state.send_replace(CallState::Submitted(hash));
                Ok(hash)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn create_profile(&self, profile: &OnChainProfile) -> Outcome<TxHash> {
        self.submit(ContractCall {
            address: self.contracts.profile,
            function: CREATE_PROFILE,
            args: vec![
                Token::String(profile.name.clone()),
                Token::Uint(profile.age as u128),
                Token::String(profile.location.clone()),
                Token::String(profile.gender.clone()),
                Token::String(profile.work_environment.clone()),
            ],
            value: self.fees.create_profile,
        })
        .await
    }

    pub async fn complete_posting(&self, posting_id: &str) -> Outcome<TxHash> {
        self.submit(ContractCall {
            address: self.contracts.posting,
            function: COMPLETE_POSTING,
            args: vec![Token::String(posting_id.to_string())],
            value: self.fees.complete_posting,
        })
        .await
    }

    pub async fn complete_project(&self, user: Address, project_index: usize) -> Outcome<TxHash> {
        self.submit(ContractCall {
            address: self.contracts.project,
            function: COMPLETE_PROJECT,
            args: vec![Token::Address(user), Token::Uint(project_index as u128)],
            value: self.fees.complete_project,
        })
        .await
    }
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::pkg::internal::chain::H256;

    /// Records every submission instead of signing it.
    pub struct FakeWallet {
        pub account: Option<Address>,
        pub sent: Mutex<Vec<TxRequest>>,
        pub reply: Mutex<Outcome<TxHash>>,
    }

    impl FakeWallet {
        pub fn connected() -> Self {
            FakeWallet {
                account: Some(Address([0x11; 20])),
                sent: Mutex::new(vec![]),
                reply: Mutex::new(Ok(H256([0xab; 32]))),
            }
        }

        pub fn disconnected() -> Self {
            FakeWallet {
                account: None,
                ..FakeWallet::connected()
            }
        }

        pub fn failing(failure: Failure) -> Self {
            let wallet = FakeWallet::connected();
            *wallet.reply.lock() = Err(failure);
            wallet
        }
    }

    #[async_trait::async_trait]
    impl Wallet for FakeWallet {
        fn account(&self) -> Option<Address> {
            self.account
        }

        async fn send_transaction(&self, tx: TxRequest) -> Outcome<TxHash> {
            self.sent.lock().push(tx);
            self.reply.lock().clone()
        }
    }
}

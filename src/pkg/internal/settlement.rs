use std::sync::Arc;

use crate::pkg::internal::{
    chain::{
        Address,
        abi::POSTING_COMPLETED,
        contract::ContractCaller,
        events::{EventListener, Subscription},
        rpc::Log,
    },
    failure::Outcome,
    postings::{Posting, PostingBook},
};

/// Drives a posting from submission of `completePosting` to the observed
/// `PostingCompleted` event.
pub struct Settlement {
    book: Arc<PostingBook>,
    caller: Arc<ContractCaller>,
    contract: Address,
}

impl Settlement {
    pub fn new(book: Arc<PostingBook>, caller: Arc<ContractCaller>, contract: Address) -> Self {
        Settlement {
            book,
            caller,
            contract,
        }
    }

    /// Submits the completion transaction. The posting is left untouched when
    /// submission fails and is `pending_confirmation` when it succeeds.
    pub async fn complete_posting(&self, posting_id: &str) -> Outcome<Posting> {
        self.book.begin_completion(posting_id)?;
        match self.caller.complete_posting(posting_id).await {
            Ok(tx_hash) => self.book.await_confirmation(posting_id, tx_hash),
            Err(e) => {
                self.book.abandon_completion(posting_id);
                Err(e)
            }
        }
    }

    /// Starts confirming postings from `PostingCompleted` logs.
    pub fn watch(&self, listener: &EventListener) -> Subscription {
        let book = self.book.clone();
        listener.subscribe(self.contract, &POSTING_COMPLETED, move |logs| {
            for log in logs {
                apply(&book, &log);
            }
        })
    }
}

fn apply(book: &PostingBook, log: &Log) {
    let tokens = match POSTING_COMPLETED.decode(&log.topics, &log.data.0) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("skipping undecodable PostingCompleted log: {}", e);
            return;
        }
    };
    let mut tokens = tokens.into_iter();
    let issuer = tokens.next().and_then(|t| t.into_address());
    let Some(posting_id) = tokens.next().and_then(|t| t.into_string()) else {
        return;
    };
    tracing::info!("PostingCompleted for {} by {:?}", &posting_id, issuer);
    book.confirm_completion(&posting_id);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;
    use tracing_test::traced_test;

    use super::*;
    use crate::pkg::internal::{
        category::Category,
        chain::{
            Contracts, Fees, H256, TxHash,
            abi::{Function, ParamType, Token},
            contract::testing::FakeWallet,
            events::testing::FakeChain,
            rpc::TxRequest,
            wallet::Wallet,
        },
        failure::Failure,
        postings::PostingStatus,
    };

    const POSTING_CONTRACT: Address = Address([2; 20]);

    fn setup(wallet: impl Wallet + 'static) -> (Arc<PostingBook>, Settlement, String) {
        let book = Arc::new(PostingBook::new());
        let posting = book.create(Posting::new("owner1", Category::Projects, "Audit", "VeriLearn"));
        let contracts = Contracts {
            posting: POSTING_CONTRACT,
            ..Contracts::default()
        };
        let caller = Arc::new(ContractCaller::new(Arc::new(wallet), contracts, Fees::default()));
        let settlement = Settlement::new(book.clone(), caller, POSTING_CONTRACT);
        (book, settlement, posting.id)
    }

    fn completed_log_data(posting_id: &str) -> (Vec<H256>, Vec<u8>) {
        let mut issuer = [0u8; 32];
        issuer[31] = 0x11;
        // a one-argument call body is exactly the ABI encoding of the event data
        let call = Function {
            name: "x",
            inputs: &[ParamType::String],
        }
        .encode_call(&[Token::String(posting_id.to_string())])
        .unwrap();
        (
            vec![POSTING_COMPLETED.topic(), H256(issuer)],
            call.0[4..].to_vec(),
        )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_completion_confirmed_by_event() {
        let (book, settlement, id) = setup(FakeWallet::connected());
        let chain = Arc::new(FakeChain::default());
        let listener = EventListener::new(chain.clone(), Duration::from_millis(10));
        let _sub = settlement.watch(&listener);
        sleep(Duration::from_millis(50)).await;

        let posting = settlement.complete_posting(&id).await.unwrap();
        assert!(matches!(posting.status, PostingStatus::PendingConfirmation { .. }));

        let (topics, data) = completed_log_data(&id);
        chain.emit(POSTING_CONTRACT, topics, data);
        for _ in 0..100 {
            if book.get(&id).unwrap().status == PostingStatus::Completed {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(book.get(&id).unwrap().status, PostingStatus::Completed);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_submission_leaves_posting_active() {
        let (book, settlement, id) = setup(FakeWallet::failing(Failure::UserDenied));
        assert_eq!(settlement.complete_posting(&id).await, Err(Failure::UserDenied));
        assert_eq!(book.get(&id).unwrap().status, PostingStatus::Active);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_posting_sends_nothing() {
        let wallet = FakeWallet::connected();
        let (_, settlement, _) = setup(wallet);
        assert!(matches!(
            settlement.complete_posting("nope").await,
            Err(Failure::NotFound(_))
        ));
    }

    #[test]
    fn test_apply_ignores_foreign_logs() {
        let book = PostingBook::new();
        let log = Log {
            address: POSTING_CONTRACT,
            topics: vec![],
            data: Default::default(),
            block_number: None,
            transaction_hash: None,
        };
        apply(&book, &log);
        assert!(book.list(None).is_empty());
    }

    /// Gives other tasks a turn before each submission reaches the wallet.
    struct YieldingWallet(Arc<FakeWallet>);

    #[async_trait::async_trait]
    impl Wallet for YieldingWallet {
        fn account(&self) -> Option<Address> {
            self.0.account()
        }

        async fn send_transaction(&self, tx: TxRequest) -> Outcome<TxHash> {
            tokio::task::yield_now().await;
            self.0.send_transaction(tx).await
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_concurrent_completion_sends_once() {
        let wallet = Arc::new(FakeWallet::connected());
        let (book, settlement, id) = setup(YieldingWallet(wallet.clone()));
        let (first, second) = tokio::join!(
            settlement.complete_posting(&id),
            settlement.complete_posting(&id)
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, Err(Failure::InvalidTransition { .. })))
        );
        assert_eq!(wallet.sent.lock().len(), 1);
        assert!(matches!(
            book.get(&id).unwrap().status,
            PostingStatus::PendingConfirmation { .. }
        ));
    }
}

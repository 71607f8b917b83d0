use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    pkg::{
        internal::{
            adaptors::profiles::mutators::ProfileMutator,
            chain::{Address, NATIVE_SYMBOL, TxHash, contract::CallState},
            failure::Failure,
        },
        server::state::AppState,
    },
    prelude::Result,
};

#[derive(Serialize)]
pub struct WalletStatus {
    pub account: Option<Address>,
    pub connected: bool,
    pub chain_id: u64,
    pub currency: &'static str,
    pub last_call: CallState,
    pub watched_events: usize,
}

pub async fn status(State(state): State<AppState>) -> Result<Json<WalletStatus>> {
    let account = state.caller.account();
    Ok(Json(WalletStatus {
        account,
        connected: account.is_some(),
        chain_id: state.chain_id,
        currency: NATIVE_SYMBOL,
        last_call: state.caller.state(),
        watched_events: state.listener.active(),
    }))
}

#[derive(Deserialize)]
pub struct CompleteProjectInput {
    /// profile holding the project
    pub user_id: String,
    /// wallet credited on chain
    pub address: Address,
    pub entry_id: Uuid,
}

/// Confirms a profile project on chain. The contract addresses projects by
/// position, so the entry's current index is resolved at call time.
pub async fn complete_project(
    State(state): State<AppState>,
    Json(input): Json<CompleteProjectInput>,
) -> Result<Json<Value>> {
    let profile = ProfileMutator::new(&*state.store)
        .current(&input.user_id)
        .await
        .map_err(Failure::reject)?;
    let index = profile
        .project_index(input.entry_id)
        .map_err(Failure::reject)?;
    let tx_hash: TxHash = state
        .caller
        .complete_project(input.address, index)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(json!({ "tx_hash": tx_hash, "project_index": index })))
}

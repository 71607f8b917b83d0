use axum::extract::State;

use crate::{
    pkg::{
        internal::{
            adaptors::posts::spec::TABLE,
            failure::Failure,
            store::Query,
        },
        server::state::AppState,
    },
    prelude::Result,
};

pub async fn livez() -> Result<()> {
    tracing::debug!("service is live");
    Ok(())
}

pub async fn healthz(State(state): State<AppState>) -> Result<()> {
    state
        .store
        .select(TABLE, &Query::new().limit(1))
        .await
        .map_err(Failure::reject)?;
    tracing::debug!("service is healthy");
    Ok(())
}

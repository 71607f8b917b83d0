use std::sync::Arc;

use clap::ValueEnum;

use crate::{
    conf::settings,
    pkg::internal::{
        chain::{
            Address,
            abi::{Event, POSTING_COMPLETED, PROFILE_CREATED, PROJECT_COMPLETED},
            events::{EventListener, log_occurrences},
            rpc::RpcClient,
        },
        failure::Failure,
    },
    prelude::Result,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum WatchedEvent {
    ProfileCreated,
    PostingCompleted,
    ProjectCompleted,
}

impl WatchedEvent {
    fn resolve(self) -> Result<(Address, &'static Event)> {
        let contracts = settings.contracts().map_err(Failure::reject)?;
        Ok(match self {
            WatchedEvent::ProfileCreated => (contracts.profile, &PROFILE_CREATED),
            WatchedEvent::PostingCompleted => (contracts.posting, &POSTING_COMPLETED),
            WatchedEvent::ProjectCompleted => (contracts.project, &PROJECT_COMPLETED),
        })
    }
}

/// Logs every decoded occurrence of `event` until interrupted.
pub async fn follow(event: WatchedEvent) -> Result<()> {
    let (address, event) = event.resolve()?;
    let rpc = Arc::new(RpcClient::new(&settings.rpc_url).map_err(Failure::reject)?);
    let listener = EventListener::new(rpc, settings.poll_interval());
    let _subscription = listener.subscribe(address, event, log_occurrences(event));
    tracing::info!("watching {} on {}", event.name, address);
    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl+c interrupt, stopping watcher");
    Ok(())
}

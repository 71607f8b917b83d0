use std::time::Duration;

use config::{Config, ConfigError, Environment};
use lazy_static::lazy_static;
use serde::Deserialize;

use crate::pkg::internal::{
    chain::{Contracts, Fees, parse_ether},
    failure::Outcome,
};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Deserialize, Debug)]
pub struct Settings {
    pub service_name: String,
    pub listen_port: String,
    //backend
    pub store_url: String,
    pub store_key: String,
    pub ephemeral_store: bool,
    //chain
    pub rpc_url: String,
    pub chain_id: u64,
    pub wallet_account: Option<String>,
    pub profile_contract: String,
    pub posting_contract: String,
    pub project_contract: String,
    pub profile_fee: String,
    pub posting_fee: String,
    pub project_fee: String,
    pub poll_interval_ms: u64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let conf = Config::builder()
            .set_default("service_name", "verilearn")?
            .set_default("listen_port", "3000")?
            .set_default("store_url", "http://localhost:54321")?
            .set_default("store_key", "")?
            .set_default("ephemeral_store", false)?
            .set_default("rpc_url", "https://rpc.open-campus-codex.gelato.digital")?
            .set_default("chain_id", 656476_i64)?
            .set_default("profile_contract", ZERO_ADDRESS)?
            .set_default("posting_contract", ZERO_ADDRESS)?
            .set_default("project_contract", ZERO_ADDRESS)?
            .set_default("profile_fee", "0.001")?
            .set_default("posting_fee", "0.00001")?
            .set_default("project_fee", "0.00001")?
            .set_default("poll_interval_ms", 4000_i64)?
            .add_source(Environment::default())
            .build()?;
        conf.try_deserialize()
    }

    pub fn contracts(&self) -> Outcome<Contracts> {
        Ok(Contracts {
            profile: self.profile_contract.parse()?,
            posting: self.posting_contract.parse()?,
            project: self.project_contract.parse()?,
        })
    }

    pub fn fees(&self) -> Outcome<Fees> {
        Ok(Fees {
            create_profile: parse_ether(&self.profile_fee)?,
            complete_posting: parse_ether(&self.posting_fee)?,
            complete_project: parse_ether(&self.project_fee)?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

lazy_static! {
    pub static ref settings: Settings = Settings::new().expect("improperly configured");
}

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::{Address, H256, HexBytes, TxHash, Wei};
use crate::pkg::internal::failure::{Failure, Outcome};

/// EIP-1193 code for a request the user rejected in the wallet.
const USER_REJECTED: i64 = 4001;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcErrorObject {
    fn into_failure(self) -> Failure {
        if self.code == USER_REJECTED || self.message.to_lowercase().contains("denied") {
            Failure::UserDenied
        } else {
            Failure::Network(format!("rpc error {}: {}", self.code, self.message))
        }
    }
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: HexBytes,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<TxHash>,
}

/// Transaction handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: HexBytes,
    pub value: Wei,
}

pub fn quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

pub fn parse_quantity(raw: &str) -> Outcome<u64> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|e| Failure::Network(format!("bad quantity {:?}: {}", raw, e)))
}

/// JSON-RPC 2.0 client for the configured chain endpoint.
#[derive(Debug)]
pub struct RpcClient {
    endpoint: Url,
    http: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Outcome<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Failure::InvalidArgument(format!("rpc url {}: {}", endpoint, e)))?;
        Ok(Self::with_client(Client::new(), endpoint))
    }

    pub fn with_client(http: Client, endpoint: Url) -> Self {
        RpcClient {
            endpoint,
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Outcome<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        tracing::debug!("rpc -> {}", method);
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| Failure::Network(format!("{} transport: {}", method, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Failure::Network(format!("{} returned http {}", method, status)));
        }
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| Failure::Network(format!("{} response: {}", method, e)))?;
        if let Some(err) = body.error {
            return Err(err.into_failure());
        }
        let result = body
            .result
            .ok_or_else(|| Failure::Network(format!("{} returned no result", method)))?;
        serde_json::from_value(result)
            .map_err(|e| Failure::Network(format!("{} result: {}", method, e)))
    }

    pub async fn chain_id(&self) -> Outcome<u64> {
        let raw: String = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
    }

    pub async fn block_number(&self) -> Outcome<u64> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
    }

    pub async fn accounts(&self) -> Outcome<Vec<Address>> {
        self.call("eth_accounts", json!([])).await
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Outcome<TxHash> {
        self.call(
            "eth_sendTransaction",
            json!([{
                "from": tx.from,
                "to": tx.to,
                "data": tx.data,
                "value": quantity(tx.value),
            }]),
        )
        .await
    }

    pub async fn get_logs(
        &self,
        address: Address,
        topic: H256,
        from_block: u64,
        to_block: u64,
    ) -> Outcome<Vec<Log>> {
        self.call(
            "eth_getLogs",
            json!([{
                "address": address,
                "topics": [topic],
                "fromBlock": quantity(from_block as u128),
                "toBlock": quantity(to_block as u128),
            }]),
        )
        .await
    }
}

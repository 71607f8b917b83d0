use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use super::{Order, Query, TableStore};
use crate::pkg::internal::failure::{Failure, Outcome};

/// Table store client speaking the PostgREST dialect of the hosted backend.
pub struct RestStore {
    base: Url,
    api_key: String,
    http: Client,
}

#[derive(Deserialize)]
struct SessionUser {
    id: String,
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{}", filter_value(value))))
        .collect();
    if let Some((column, order)) = &query.order {
        let dir = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        params.push(("order".into(), format!("{}.{}", column, dir)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    params
}

impl RestStore {
    pub fn new(base: &str, api_key: &str) -> Outcome<Self> {
        let base = Url::parse(base)
            .map_err(|e| Failure::InvalidArgument(format!("store url {}: {}", base, e)))?;
        Ok(RestStore {
            base,
            api_key: api_key.to_string(),
            http: Client::new(),
        })
    }

    fn url(&self, path: &str) -> Outcome<Url> {
        self.base
            .join(path)
            .map_err(|e| Failure::InvalidArgument(format!("store path {}: {}", path, e)))
    }

    fn table(&self, table: &str) -> Outcome<Url> {
        self.url(&format!("rest/v1/{}", table))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(table: &str, builder: RequestBuilder) -> Outcome<Vec<Value>> {
        let response = builder
            .send()
            .await
            .map_err(|e| Failure::Backend(format!("{}: {}", table, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure::Backend(format!("{} returned {}: {}", table, status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| Failure::Backend(format!("{} rows: {}", table, e)))
    }
}

#[async_trait::async_trait]
impl TableStore for RestStore {
    async fn select(&self, table: &str, query: &Query) -> Outcome<Vec<Value>> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(params(query));
        let builder = self.authorized(self.http.get(self.table(table)?).query(&pairs));
        Self::rows(table, builder).await
    }

    async fn insert(&self, table: &str, row: Value) -> Outcome<Value> {
        let builder = self
            .authorized(self.http.post(self.table(table)?))
            .header("Prefer", "return=representation")
            .json(&[row]);
        Self::rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Failure::Backend(format!("{} insert returned no row", table)))
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Outcome<Vec<Value>> {
        let builder = self
            .authorized(self.http.patch(self.table(table)?).query(&params(query)))
            .header("Prefer", "return=representation")
            .json(&patch);
        Self::rows(table, builder).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Outcome<u64> {
        let builder = self
            .authorized(self.http.delete(self.table(table)?).query(&params(query)))
            .header("Prefer", "return=representation");
        Ok(Self::rows(table, builder).await?.len() as u64)
    }

    async fn session_user(&self, token: &str) -> Outcome<Option<String>> {
        let response = self
            .http
            .get(self.url("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Failure::Backend(format!("session lookup: {}", e)))?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let user: SessionUser = response
                    .json()
                    .await
                    .map_err(|e| Failure::Backend(format!("session body: {}", e)))?;
                Ok(Some(user.id))
            }
            s => Err(Failure::Backend(format!("session lookup returned {}", s))),
        }
    }
}

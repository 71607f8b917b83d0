use serde_json::Value;

use crate::pkg::internal::{
    adaptors::posts::spec::{PostEntry, TABLE},
    category::Category,
    failure::{Failure, Outcome},
    store::{Order, Query, TableStore},
};

pub(crate) fn parse_rows(rows: Vec<Value>) -> Outcome<Vec<PostEntry>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| Failure::Backend(format!("post row: {}", e)))
        })
        .collect()
}

pub struct PostSelector<'a> {
    store: &'a dyn TableStore,
}

impl<'a> PostSelector<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        PostSelector { store }
    }

    pub async fn get_by_id(&self, id: &str) -> Outcome<Option<PostEntry>> {
        let rows = self
            .store
            .select(TABLE, &Query::new().eq("id", id).limit(1))
            .await?;
        Ok(parse_rows(rows)?.into_iter().next())
    }

    /// Active posts, newest first, optionally restricted to one category.
    pub async fn get_active(&self, category: Option<Category>) -> Outcome<Vec<PostEntry>> {
        let mut query = Query::new()
            .eq("status", "active")
            .order("created_at", Order::Desc);
        if let Some(category) = category {
            query = query.eq("type", category.as_str());
        }
        parse_rows(self.store.select(TABLE, &query).await?)
    }

    pub async fn get_by_owner(&self, user_id: &str) -> Outcome<Vec<PostEntry>> {
        let rows = self
            .store
            .select(
                TABLE,
                &Query::new()
                    .eq("user_id", user_id)
                    .order("created_at", Order::Desc),
            )
            .await?;
        parse_rows(rows)
    }
}

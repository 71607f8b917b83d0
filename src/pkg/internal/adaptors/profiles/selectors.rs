use serde_json::Value;

use crate::pkg::internal::{
    adaptors::profiles::spec::{parse_row, ProfileEntry, TABLE},
    failure::{Failure, Outcome},
    store::{Query, TableStore},
};

pub struct ProfileSelector<'a> {
    store: &'a dyn TableStore,
}

impl<'a> ProfileSelector<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        ProfileSelector { store }
    }

    /// The stored row as is, before entry ids are filled in.
    pub async fn get_row(&self, user_id: &str) -> Outcome<Option<Value>> {
        let rows = self
            .store
            .select(TABLE, &Query::new().eq("id", user_id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn get(&self, user_id: &str) -> Outcome<Option<ProfileEntry>> {
        self.get_row(user_id).await?.map(parse_row).transpose()
    }

    pub async fn require(&self, user_id: &str) -> Outcome<ProfileEntry> {
        self.get(user_id)
            .await?
            .ok_or_else(|| Failure::NotFound(format!("profile {}", user_id)))
    }
}

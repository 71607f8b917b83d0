use serde_json::json;

use crate::pkg::internal::adaptors::posts::selectors::parse_rows;
use crate::pkg::internal::adaptors::posts::spec::{PostEntry, TABLE};
use crate::pkg::internal::failure::{Failure, Outcome};
use crate::pkg::internal::store::{Query, TableStore};
use crate::pkg::server::handlers::posts::{CreatePostInput, PatchPostInput};

pub struct PostMutator<'a> {
    store: &'a dyn TableStore,
}

impl<'a> PostMutator<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        PostMutator { store }
    }

    pub async fn create(&self, user_id: &str, post: CreatePostInput) -> Outcome<PostEntry> {
        let row = json!({
            "user_id": user_id,
            "title": post.title,
            "organization": post.organization,
            "description": post.description,
            "requirements": post.requirements,
            "location": post.location,
            "type": post.category,
            "work_type": post.work_type,
            "duration": post.duration,
            "compensation": post.compensation,
            "skills": post.skills,
            "status": post.status,
        });
        let row = self.store.insert(TABLE, row).await?;
        serde_json::from_value(row).map_err(|e| Failure::Backend(format!("post row: {}", e)))
    }

    pub async fn update(&self, id: &str, post: PatchPostInput) -> Outcome<Option<PostEntry>> {
        let patch = serde_json::to_value(&post)
            .map_err(|e| Failure::InvalidArgument(format!("post patch: {}", e)))?;
        let rows = self
            .store
            .update(TABLE, &Query::new().eq("id", id), patch)
            .await?;
        Ok(parse_rows(rows)?.into_iter().next())
    }

    pub async fn delete(&self, id: &str) -> Outcome<bool> {
        let removed = self.store.delete(TABLE, &Query::new().eq("id", id)).await?;
        Ok(removed > 0)
    }
}

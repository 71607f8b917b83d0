use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::pkg::internal::adaptors::profiles::{
    selectors::ProfileSelector,
    spec::{ProfileEntry, Section, Skills, TABLE, lacks_entry_ids, parse_row},
};
use crate::pkg::internal::failure::{Failure, Outcome};
use crate::pkg::internal::store::{Query, TableStore};
use crate::pkg::server::handlers::profile::PatchProfileInput;

const EDIT_ATTEMPTS: usize = 3;

fn missing(user_id: &str) -> Failure {
    Failure::NotFound(format!("profile {}", user_id))
}

fn contended(user_id: &str) -> Failure {
    Failure::InvalidTransition {
        action: "edit profile",
        state: format!("profile {} keeps changing", user_id),
    }
}

fn stamp(patch: &mut Map<String, Value>) {
    patch.insert(
        "updated_at".into(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
}

pub struct ProfileMutator<'a> {
    store: &'a dyn TableStore,
}

impl<'a> ProfileMutator<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        ProfileMutator { store }
    }

    /// Reads a profile together with the `updated_at` value it was read at.
    /// A row with entries lacking ids has all four sections written back once
    /// so the ids handed out stay valid.
    async fn load(&self, user_id: &str) -> Outcome<Option<(ProfileEntry, Value)>> {
        for _ in 0..EDIT_ATTEMPTS {
            let Some(row) = ProfileSelector::new(self.store).get_row(user_id).await? else {
                return Ok(None);
            };
            let seen = row.get("updated_at").cloned().unwrap_or(Value::Null);
            let legacy = lacks_entry_ids(&row);
            let profile = parse_row(row)?;
            if !legacy {
                return Ok(Some((profile, seen)));
            }
            let mut patch = Map::new();
            for section in Section::ALL {
                patch.insert(section.column().into(), profile.section_column(section)?);
            }
            if self.write_if_unchanged(user_id, &seen, patch).await? {
                tracing::info!("assigned entry ids to stored profile {}", user_id);
            }
        }
        Err(contended(user_id))
    }

    /// Applies `patch` only if the row still carries `seen` as its `updated_at`.
    async fn write_if_unchanged(
        &self,
        user_id: &str,
        seen: &Value,
        mut patch: Map<String, Value>,
    ) -> Outcome<bool> {
        stamp(&mut patch);
        let query = Query::new().eq("id", user_id).eq("updated_at", seen.clone());
        let updated = self.store.update(TABLE, &query, Value::Object(patch)).await?;
        Ok(!updated.is_empty())
    }

    /// Returns the caller's profile, creating an empty one on first access.
    pub async fn ensure(&self, user_id: &str) -> Outcome<ProfileEntry> {
        if let Some((profile, _)) = self.load(user_id).await? {
            return Ok(profile);
        }
        tracing::info!("creating profile for {}", user_id);
        let row = self
            .store
            .insert(TABLE, json!({"id": user_id, "points": 0, "verified": false}))
            .await?;
        parse_row(row)
    }

    /// Like `ProfileSelector::require`, with entry ids settled first.
    pub async fn current(&self, user_id: &str) -> Outcome<ProfileEntry> {
        self.load(user_id)
            .await?
            .map(|(profile, _)| profile)
            .ok_or_else(|| missing(user_id))
    }

    async fn write(&self, user_id: &str, mut patch: Value) -> Outcome<ProfileEntry> {
        if let Value::Object(fields) = &mut patch {
            stamp(fields);
        }
        let updated = self
            .store
            .update(TABLE, &Query::new().eq("id", user_id), patch)
            .await?;
        if updated.is_empty() {
            return Err(missing(user_id));
        }
        ProfileSelector::new(self.store).require(user_id).await
    }

    pub async fn update(&self, user_id: &str, profile: PatchProfileInput) -> Outcome<ProfileEntry> {
        let patch = serde_json::to_value(&profile)
            .map_err(|e| Failure::InvalidArgument(format!("profile patch: {}", e)))?;
        self.write(user_id, patch).await
    }

    pub async fn update_skills(&self, user_id: &str, skills: Skills) -> Outcome<ProfileEntry> {
        self.write(user_id, json!({ "skills": skills })).await
    }

    /// Read, edit, conditional write. A write that lost a race with another
    /// edit of the same row is redone on a fresh read.
    async fn edit_section(
        &self,
        user_id: &str,
        section: Section,
        edit: impl Fn(&mut ProfileEntry) -> Outcome<()>,
    ) -> Outcome<ProfileEntry> {
        for _ in 0..EDIT_ATTEMPTS {
            let (mut profile, seen) = self.load(user_id).await?.ok_or_else(|| missing(user_id))?;
            edit(&mut profile)?;
            let mut patch = Map::new();
            patch.insert(section.column().into(), profile.section_column(section)?);
            if self.write_if_unchanged(user_id, &seen, patch).await? {
                return ProfileSelector::new(self.store).require(user_id).await;
            }
            tracing::warn!("profile {} changed during {} edit, retrying", user_id, section);
        }
        Err(contended(user_id))
    }

    pub async fn add_entry(
        &self,
        user_id: &str,
        section: Section,
        item: Value,
    ) -> Outcome<ProfileEntry> {
        self.edit_section(user_id, section, |profile| {
            let entry_id = profile.add_entry(section, item.clone())?;
            tracing::info!("added {} entry {} for {}", section, entry_id, user_id);
            Ok(())
        })
        .await
    }

    pub async fn update_entry(
        &self,
        user_id: &str,
        section: Section,
        entry_id: Uuid,
        item: Value,
    ) -> Outcome<ProfileEntry> {
        self.edit_section(user_id, section, |profile| {
            profile.replace_entry(section, entry_id, item.clone())
        })
        .await
    }

    pub async fn remove_entry(
        &self,
        user_id: &str,
        section: Section,
        entry_id: Uuid,
    ) -> Outcome<ProfileEntry> {
        self.edit_section(user_id, section, |profile| {
            profile.remove_entry(section, entry_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_test::traced_test;

    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::pkg::internal::adaptors::profiles::spec::WorkEnvironment;
    use crate::pkg::internal::store::memory::MemoryStore;

    /// Lets another writer append an education entry just before the next
    /// profile update lands.
    struct InterleavedStore {
        inner: MemoryStore,
        armed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl TableStore for InterleavedStore {
        async fn select(&self, table: &str, query: &Query) -> Outcome<Vec<Value>> {
            self.inner.select(table, query).await
        }

        async fn insert(&self, table: &str, row: Value) -> Outcome<Value> {
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: &str, query: &Query, patch: Value) -> Outcome<Vec<Value>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                let by_id = Query::new().eq("id", "u1");
                let rows = self.inner.select(TABLE, &by_id).await?;
                let mut education = rows[0]["education"].as_array().cloned().unwrap_or_default();
                education.push(json!({
                    "entry_id": Uuid::new_v4(),
                    "degree": "MSc",
                    "institution": "Other Institute",
                    "year": "2024",
                    "specialization": "Cryptography",
                    "gpa": null,
                }));
                self.inner
                    .update(TABLE, &by_id, json!({ "education": education }))
                    .await?;
            }
            self.inner.update(table, query, patch).await
        }

        async fn delete(&self, table: &str, query: &Query) -> Outcome<u64> {
            self.inner.delete(table, query).await
        }

        async fn session_user(&self, token: &str) -> Outcome<Option<String>> {
            self.inner.session_user(token).await
        }
    }

    fn education() -> Value {
        json!({
            "degree": "BSc Computer Science",
            "institution": "Open Campus University",
            "year": "2022",
            "specialization": "Distributed Systems",
            "gpa": 3.8,
        })
    }

    #[tokio::test]
    #[traced_test]
    async fn test_education_add_then_remove() {
        let store = MemoryStore::new();
        let mutator = ProfileMutator::new(&store);
        let profile = mutator.ensure("u1").await.unwrap();
        assert_eq!(profile.entry_count(Section::Education), 0);

        let profile = mutator
            .add_entry("u1", Section::Education, education())
            .await
            .unwrap();
        assert_eq!(profile.education.len(), 1);
        assert_eq!(profile.education[0].item.gpa, Some(3.8));

        let entry_id = profile.education[0].entry_id;
        let profile = mutator
            .remove_entry("u1", Section::Education, entry_id)
            .await
            .unwrap();
        assert_eq!(profile.entry_count(Section::Education), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_entry_ids_are_stable_across_reads() {
        let store = MemoryStore::new();
        let mutator = ProfileMutator::new(&store);
        mutator.ensure("u1").await.unwrap();
        let added = mutator
            .add_entry("u1", Section::Education, education())
            .await
            .unwrap();
        let reread = ProfileSelector::new(&store).require("u1").await.unwrap();
        assert_eq!(reread.education[0].entry_id, added.education[0].entry_id);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_update_rereads_profile() {
        let store = MemoryStore::new();
        let mutator = ProfileMutator::new(&store);
        mutator.ensure("u1").await.unwrap();
        let patch = PatchProfileInput {
            name: Some("Ada".into()),
            work_environment: Some(WorkEnvironment::Hybrid),
            ..Default::default()
        };
        let profile = mutator.update("u1", patch).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.work_environment, WorkEnvironment::Hybrid);

        let skills = Skills {
            technical: vec!["rust".into()],
            ..Default::default()
        };
        let profile = mutator.update_skills("u1", skills.clone()).await.unwrap();
        assert_eq!(profile.skills, skills);
        assert_eq!(profile.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_profile_and_entry() {
        let store = MemoryStore::new();
        let mutator = ProfileMutator::new(&store);
        let err = mutator
            .update_skills("ghost", Skills::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Failure::NotFound(_)));

        mutator.ensure("u1").await.unwrap();
        let err = mutator
            .remove_entry("u1", Section::Projects, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Failure::NotFound(_)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stored_entries_without_ids_get_stable_ids() {
        let store = MemoryStore::new();
        store
            .insert(
                TABLE,
                json!({
                    "id": "u1",
                    "education": [{
                        "degree": "BSc",
                        "institution": "Old College",
                        "year": "2019",
                        "specialization": "Networks",
                        "gpa": null,
                    }],
                    "certifications": [{"name": "CKA", "issuer": "CNCF", "year": "2023"}],
                }),
            )
            .await
            .unwrap();
        let mutator = ProfileMutator::new(&store);

        let first = mutator.ensure("u1").await.unwrap();
        let second = mutator.ensure("u1").await.unwrap();
        let entry_id = first.education[0].entry_id;
        assert_eq!(second.education[0].entry_id, entry_id);
        assert_eq!(
            second.certifications[0].entry_id,
            first.certifications[0].entry_id
        );
        let reread = ProfileSelector::new(&store).require("u1").await.unwrap();
        assert_eq!(reread.education[0].entry_id, entry_id);
        assert!(logs_contain("assigned entry ids to stored profile u1"));

        let profile = mutator
            .remove_entry("u1", Section::Education, entry_id)
            .await
            .unwrap();
        assert_eq!(profile.entry_count(Section::Education), 0);
        assert_eq!(profile.entry_count(Section::Certifications), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_section_edit_keeps_concurrent_entry() {
        let store = InterleavedStore {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
        };
        store
            .insert(
                TABLE,
                json!({"id": "u1", "updated_at": "2024-01-01T00:00:00.000000Z"}),
            )
            .await
            .unwrap();
        store.armed.store(true, Ordering::SeqCst);

        let profile = ProfileMutator::new(&store)
            .add_entry("u1", Section::Education, education())
            .await
            .unwrap();
        let degrees: Vec<_> = profile
            .education
            .iter()
            .map(|e| e.item.degree.as_str())
            .collect();
        assert_eq!(degrees, vec!["MSc", "BSc Computer Science"]);
        assert!(logs_contain("changed during education edit, retrying"));
    }
}

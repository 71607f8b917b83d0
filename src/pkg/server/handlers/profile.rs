use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::{
    pkg::{
        internal::{
            adaptors::profiles::{
                mutators::ProfileMutator,
                selectors::ProfileSelector,
                spec::{ProfileEntry, Section, Skills, WorkEnvironment},
            },
            auth::User,
            chain::contract::OnChainProfile,
            failure::{Failure, Outcome},
        },
        server::state::AppState,
    },
    prelude::Result,
};

#[derive(Deserialize, Serialize, Validate, Default)]
pub struct PatchProfileInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 255))]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_environment: Option<WorkEnvironment>,
}

fn section(raw: &str) -> Result<Section> {
    raw.parse().map_err(Failure::reject)
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
) -> Result<Json<ProfileEntry>> {
    let profile = ProfileMutator::new(&*state.store)
        .ensure(&user.user_id)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(profile))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Json(input): Json<PatchProfileInput>,
) -> Result<Json<ProfileEntry>> {
    let input = validated(input)?;
    let mutator = ProfileMutator::new(&*state.store);
    mutator.ensure(&user.user_id).await.map_err(Failure::reject)?;
    let profile = mutator
        .update(&user.user_id, input)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(profile))
}

pub async fn update_skills(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Json(skills): Json<Skills>,
) -> Result<Json<ProfileEntry>> {
    let mutator = ProfileMutator::new(&*state.store);
    mutator.ensure(&user.user_id).await.map_err(Failure::reject)?;
    let profile = mutator
        .update_skills(&user.user_id, skills)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(profile))
}

pub async fn add_entry(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(raw): Path<String>,
    Json(item): Json<Value>,
) -> Result<(StatusCode, Json<ProfileEntry>)> {
    let section = section(&raw)?;
    let mutator = ProfileMutator::new(&*state.store);
    mutator.ensure(&user.user_id).await.map_err(Failure::reject)?;
    let profile = mutator
        .add_entry(&user.user_id, section, item)
        .await
        .map_err(Failure::reject)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path((raw, entry_id)): Path<(String, Uuid)>,
    Json(item): Json<Value>,
) -> Result<Json<ProfileEntry>> {
    let profile = ProfileMutator::new(&*state.store)
        .update_entry(&user.user_id, section(&raw)?, entry_id, item)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(profile))
}

pub async fn remove_entry(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path((raw, entry_id)): Path<(String, Uuid)>,
) -> Result<Json<ProfileEntry>> {
    let profile = ProfileMutator::new(&*state.store)
        .remove_entry(&user.user_id, section(&raw)?, entry_id)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(profile))
}

fn on_chain(profile: &ProfileEntry) -> Outcome<OnChainProfile> {
    let missing = |field: &str| Failure::InvalidArgument(format!("profile {} is not set", field));
    Ok(OnChainProfile {
        name: profile.name.clone().ok_or_else(|| missing("name"))?,
        age: profile.age.ok_or_else(|| missing("age"))?,
        location: profile.location.clone().ok_or_else(|| missing("location"))?,
        gender: profile.gender.clone().ok_or_else(|| missing("gender"))?,
        work_environment: profile.work_environment.on_chain_label().to_string(),
    })
}

/// Records the caller's profile on chain through `createProfile`.
pub async fn register_on_chain(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
) -> Result<Json<Value>> {
    let profile = ProfileSelector::new(&*state.store)
        .require(&user.user_id)
        .await
        .map_err(Failure::reject)?;
    let details = on_chain(&profile).map_err(Failure::reject)?;
    let tx_hash = state
        .caller
        .create_profile(&details)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(json!({ "tx_hash": tx_hash })))
}

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use standard_error::{StandardError, Status};
use validator::Validate;

use super::{CategoryFilter, validated};
use crate::{
    pkg::{
        internal::{
            adaptors::profiles::selectors::ProfileSelector,
            auth::User,
            category::Category,
            failure::Failure,
            postings::{Posting, Request},
        },
        server::state::AppState,
    },
    prelude::Result,
};

#[derive(Deserialize, Validate)]
pub struct CreatePostingInput {
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub organization: String,
    #[serde(rename = "type")]
    pub category: Category,
}

#[derive(Deserialize, Validate)]
pub struct RequestInput {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub message: String,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CategoryFilter>,
) -> Result<Json<Vec<Posting>>> {
    Ok(Json(state.postings.list(filter.category)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Json(input): Json<CreatePostingInput>,
) -> Result<(StatusCode, Json<Posting>)> {
    let input = validated(input)?;
    let posting = state.postings.create(Posting::new(
        &user.user_id,
        input.category,
        &input.title,
        &input.organization,
    ));
    Ok((StatusCode::CREATED, Json(posting)))
}

/// Fails with 403 unless the caller created the posting.
fn owned(state: &AppState, user: &User, id: &str) -> Result<Posting> {
    let posting = state.postings.get(id).map_err(Failure::reject)?;
    if posting.owner_id != user.user_id {
        tracing::warn!(
            "{} tried to act on posting {} owned by {}",
            &user.user_id,
            id,
            &posting.owner_id
        );
        return Err(StandardError::new("ERR-AUTH-002").code(StatusCode::FORBIDDEN));
    }
    Ok(posting)
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
) -> Result<Json<Posting>> {
    owned(&state, &user, &id)?;
    Ok(Json(state.postings.remove_posting(&id).map_err(Failure::reject)?))
}

pub async fn add_request(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
    Json(input): Json<RequestInput>,
) -> Result<(StatusCode, Json<Request>)> {
    let input = validated(input)?;
    let display_name = ProfileSelector::new(&*state.store)
        .get(&user.user_id)
        .await
        .map_err(Failure::reject)?
        .and_then(|p| p.name)
        .unwrap_or_else(|| user.user_id.clone());
    let request = state
        .postings
        .add_request(&id, Request::new(&user.user_id, &display_name, &input.message))
        .map_err(Failure::reject)?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path((id, request_id)): Path<(String, String)>,
) -> Result<Json<Request>> {
    owned(&state, &user, &id)?;
    let request = state
        .postings
        .accept_request(&id, &request_id)
        .map_err(Failure::reject)?;
    Ok(Json(request))
}

pub async fn complete_request(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path((id, request_id)): Path<(String, String)>,
) -> Result<Json<Request>> {
    owned(&state, &user, &id)?;
    let request = state
        .postings
        .complete_request(&id, &request_id)
        .map_err(Failure::reject)?;
    Ok(Json(request))
}

pub async fn remove_request(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path((id, request_id)): Path<(String, String)>,
) -> Result<Json<Request>> {
    owned(&state, &user, &id)?;
    let request = state
        .postings
        .remove_request(&id, &request_id)
        .map_err(Failure::reject)?;
    Ok(Json(request))
}

/// Submits `completePosting`; the posting stays pending until the event arrives.
pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Posting>)> {
    owned(&state, &user, &id)?;
    let posting = state
        .settlement
        .complete_posting(&id)
        .await
        .map_err(Failure::reject)?;
    Ok((StatusCode::ACCEPTED, Json(posting)))
}

pub async fn revert_completion(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
) -> Result<Json<Posting>> {
    owned(&state, &user, &id)?;
    let posting = state
        .postings
        .revert_completion(&id)
        .map_err(Failure::reject)?;
    Ok(Json(posting))
}

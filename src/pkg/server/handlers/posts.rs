use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use standard_error::{StandardError, Status};
use validator::Validate;

use super::{CategoryFilter, validated};
use crate::{
    pkg::{
        internal::{
            adaptors::posts::{
                mutators::PostMutator,
                selectors::PostSelector,
                spec::{PostEntry, PostStatus, WorkType},
            },
            auth::User,
            category::Category,
            failure::Failure,
        },
        server::state::AppState,
    },
    prelude::Result,
};

#[derive(Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub organization: String,
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub description: String,
    pub requirements: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub category: Category,
    pub work_type: Option<WorkType>,
    pub duration: Option<String>,
    pub compensation: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub status: PostStatus,
}

#[derive(Deserialize, Serialize, Validate, Default)]
pub struct PatchPostInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Field cannot be empty"))]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CategoryFilter>,
) -> Result<Json<Vec<PostEntry>>> {
    let posts = PostSelector::new(&*state.store)
        .get_active(filter.category)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(posts))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
) -> Result<Json<Vec<PostEntry>>> {
    let posts = PostSelector::new(&*state.store)
        .get_by_owner(&user.user_id)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(posts))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Json(input): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostEntry>)> {
    let input = validated(input)?;
    let post = PostMutator::new(&*state.store)
        .create(&user.user_id, input)
        .await
        .map_err(Failure::reject)?;
    tracing::info!("{} published {} post {}", &user.user_id, post.category, &post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

async fn owned(state: &AppState, user: &User, id: &str) -> Result<PostEntry> {
    let post = PostSelector::new(&*state.store)
        .get_by_id(id)
        .await
        .map_err(Failure::reject)?
        .ok_or_else(|| Failure::NotFound(format!("post {}", id)).reject())?;
    if post.user_id != user.user_id {
        tracing::warn!("{} tried to modify post {} owned by {}", &user.user_id, id, &post.user_id);
        return Err(StandardError::new("ERR-AUTH-002").code(StatusCode::FORBIDDEN));
    }
    Ok(post)
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
    Json(input): Json<PatchPostInput>,
) -> Result<Json<PostEntry>> {
    let input = validated(input)?;
    owned(&state, &user, &id).await?;
    let post = PostMutator::new(&*state.store)
        .update(&id, input)
        .await
        .map_err(Failure::reject)?
        .ok_or_else(|| Failure::NotFound(format!("post {}", id)).reject())?;
    Ok(Json(post))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<Arc<User>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    owned(&state, &user, &id).await?;
    let deleted = PostMutator::new(&*state.store)
        .delete(&id)
        .await
        .map_err(Failure::reject)?;
    Ok(Json(json!({ "deleted": deleted })))
}

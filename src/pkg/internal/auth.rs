use axum::http::StatusCode;
use standard_error::{StandardError, Status};

use crate::{
    pkg::internal::{failure::Failure, store::TableStore},
    prelude::Result,
};

/// The caller behind a backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
}

impl User {
    pub async fn from_session(store: &dyn TableStore, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(StandardError::new("ERR-AUTH-001").code(StatusCode::UNAUTHORIZED));
        }
        match store.session_user(token).await.map_err(Failure::reject)? {
            Some(user_id) => {
                tracing::debug!("session resolved to {}", &user_id);
                Ok(User { user_id })
            }
            None => Err(StandardError::new("ERR-AUTH-001").code(StatusCode::UNAUTHORIZED)),
        }
    }
}

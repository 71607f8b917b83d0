use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    pkg::{internal::auth::User, server::state::AppState},
    prelude::Result,
};

fn session_token(headers: &HeaderMap) -> String {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return token.to_string();
    }
    CookieJar::from_headers(headers)
        .get("_Host_token")
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = session_token(&headers);
    match User::from_session(&*state.store, &token).await {
        Ok(user) => {
            request.extensions_mut().insert(Arc::new(user));
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!("session missing or expired, authentication denied");
            Err(e)
        }
    }
}

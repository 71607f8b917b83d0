use axum::http::StatusCode;
use serde::Serialize;
use standard_error::{Interpolate, StandardError, Status};
use thiserror::Error;

/// Every way a marketplace or chain operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Failure {
    #[error("signature request denied by the wallet")]
    UserDenied,
    #[error("network failure: {0}")]
    Network(String),
    #[error("no wallet connected")]
    MissingWallet,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("backend query failed: {0}")]
    Backend(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },
}

pub type Outcome<T> = core::result::Result<T, Failure>;

impl Failure {
    pub fn code(&self) -> &'static str {
        match self {
            Failure::UserDenied => "ERR-WALLET-002",
            Failure::Network(_) => "ERR-CHAIN-001",
            Failure::MissingWallet => "ERR-WALLET-001",
            Failure::InvalidArgument(_) => "ERR-ARG-001",
            Failure::Backend(_) => "ERR-STORE-001",
            Failure::NotFound(_) => "ERR-NOTFOUND-001",
            Failure::InvalidTransition { .. } => "ERR-STATE-001",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Failure::UserDenied => StatusCode::FORBIDDEN,
            Failure::Network(_) | Failure::Backend(_) => StatusCode::BAD_GATEWAY,
            Failure::MissingWallet => StatusCode::PRECONDITION_FAILED,
            Failure::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Failure::NotFound(_) => StatusCode::NOT_FOUND,
            Failure::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }

    /// Converts into the service-level error carried by `prelude::Result`.
    pub fn reject(self) -> StandardError {
        tracing::warn!("{}: {}", self.code(), &self);
        StandardError::new(self.code())
            .code(self.status())
            .interpolate_err(self.to_string())
    }
}

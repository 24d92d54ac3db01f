//! Error taxonomy of the dispatch core
//!
//! Each variant implies a different recovery strategy for the caller, so
//! the variants must never be folded into one another.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{models::OrderStatus, store::StoreError};

/// Coarse error classification for callers that branch on recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Forbidden,
    Conflict,
    PreconditionFailed,
    NotFound,
    InvalidTransition,
    Internal,
}

/// Errors returned by [`crate::Marketplace`] operations
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Malformed or missing input; the client must correct and resubmit
    #[error("validation failed: {0}")]
    Validation(String),

    /// The actor lacks the role or ownership required
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Lost a race or broke a uniqueness rule; retry against another target
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor state is insufficient and needs out-of-band correction
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("store failure: {0}")]
    Store(#[source] StoreError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::Validation,
            DispatchError::Forbidden(_) => ErrorKind::Forbidden,
            DispatchError::Conflict(_) => ErrorKind::Conflict,
            DispatchError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DispatchError::NotFound { .. } => ErrorKind::NotFound,
            DispatchError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            DispatchError::Store(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn order_not_found(id: Uuid) -> Self {
        DispatchError::NotFound { entity: "order", id }
    }

    pub(crate) fn user_not_found(id: Uuid) -> Self {
        DispatchError::NotFound { entity: "user", id }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => DispatchError::Conflict(format!("{key} already exists")),
            StoreError::NotFound { entity, id } => DispatchError::NotFound { entity, id },
            other => DispatchError::Store(other),
        }
    }
}

/// Type alias for Result with DispatchError
pub type DispatchResult<T> = Result<T, DispatchError>;

//! Principal extraction from the trusted user header.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;
use crate::state::{AppState, Store};

/// The user making the request, if the gateway identified one.
///
/// A missing or malformed header yields `CurrentUser(None)`. Order placement
/// turns that into its own `Unauthenticated` rejection so the precondition
/// order is kept.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Option<UserId>);

impl CurrentUser {
    /// Returns the user ID or a 401 error.
    pub fn require(self) -> Result<UserId, ApiError> {
        self.0.ok_or(ApiError::Unauthorized)
    }
}

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(state.auth.user_id_header.as_str())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<UserId>().ok());
        Ok(CurrentUser(user_id))
    }
}

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use recipebook_types::api::Claims;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The identity a request acts as. `None` for anonymous requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Requester(pub Option<Uuid>);

impl Requester {
    pub fn id(self) -> Option<Uuid> {
        self.0
    }

    pub fn require(self) -> Result<Uuid, ApiError> {
        self.0.ok_or(ApiError::Unauthorized)
    }
}

/// Resolve the requester from the Authorization header.
///
/// A missing header yields an anonymous requester; a header that is present
/// but not a valid bearer token is rejected outright.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let requester = match req.headers().get(header::AUTHORIZATION) {
        None => Requester(None),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or(ApiError::InvalidToken)?;

            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
                &Validation::default(),
            )
            .map_err(|e| {
                warn!("Rejected bearer token: {}", e);
                ApiError::InvalidToken
            })?;

            Requester(Some(token_data.claims.sub))
        }
    };

    req.extensions_mut().insert(requester);
    Ok(next.run(req).await)
}

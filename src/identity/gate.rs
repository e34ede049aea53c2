use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::principal::Principal;
use super::token::{TokenError, TokenService};
use crate::error::{AppError, AppResult};
use crate::storage::SharedStore;

/// Resolves a bearer token into the `Principal` it was issued for.
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    store: SharedStore,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

impl AuthGate {
    pub fn new(tokens: TokenService, store: SharedStore) -> Self {
        Self { tokens, store }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<Principal> {
        let Some(token) = extract_bearer(headers) else {
            debug!(target: "eventshare::auth", "gate: rejected, no bearer token");
            return Err(AppError::unauthorized("Not authorized, no token provided"));
        };
        let user_id = self.tokens.verify(token).map_err(|e| {
            match &e {
                TokenError::Expired => debug!(target: "eventshare::auth", "gate: rejected, token expired"),
                other => debug!(target: "eventshare::auth", "gate: rejected, {}", other),
            }
            AppError::unauthorized("Not authorized, token failed")
        })?;
        let principal = self.store.0.lock().user(user_id).map(Principal::from);
        match principal {
            Some(p) => {
                debug!(target: "eventshare::auth", "gate: resolved user={}", p.user_id);
                Ok(p)
            }
            None => {
                debug!(target: "eventshare::auth", "gate: rejected, user {} no longer exists", user_id);
                Err(AppError::unauthorized("Not authorized, user not found"))
            }
        }
    }
}

/// Middleware for protected routes. Rejected requests never reach the handler;
/// accepted ones carry the `Principal` as a request extension.
pub async fn require_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let principal = gate.authenticate(req.headers())?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

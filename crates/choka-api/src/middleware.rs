use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Uri, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use choka_types::api::Claims;

use crate::auth::AppState;

pub const LOGIN_PATH: &str = "/accounts/login";

/// Decode a bearer token into claims, `None` when absent or invalid.
fn claims_from_request(req: &Request, secret: &str) -> Option<Claims> {
    let bearer = req.headers().typed_get::<Authorization<Bearer>>()?;

    match decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Protected routes: anonymous requests are sent to the login entry point
/// rather than answered with 403.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match claims_from_request(&req, &state.jwt_secret) {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => Redirect::to(&login_redirect(req.uri())).into_response(),
    }
}

/// `/accounts/login?next=<original path and query>`, form-encoded.
pub fn login_redirect(uri: &Uri) -> String {
    let next = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => format!("{LOGIN_PATH}?{query}"),
        Err(e) => {
            debug!("Could not encode next={}: {}", next, e);
            LOGIN_PATH.to_string()
        }
    }
}

/// Public routes that render differently for a signed-in viewer.
pub async fn attach_viewer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(claims) = claims_from_request(&req, &state.jwt_secret) {
        req.extensions_mut().insert(claims);
    }
    next.run(req).await
}

/// Claims attached by [`attach_viewer`], if any.
pub struct Viewer(pub Option<Claims>);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<Claims>().cloned()))
    }
}

//! Bearer-token caller identification.
//!
//! Tokens are HS256 JWTs issued elsewhere; this side only verifies the
//! signature (and `exp`, when present) and reads the caller id from the
//! `id` claim, falling back to `sub`.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::AppState;
use super::api::json_error;

/// Owner id of the authenticated caller. Every store query is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    sub: Option<String>,
}

/// 401 with the standard JSON error body.
#[derive(Debug)]
pub struct Unauthorized(&'static str);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, json_error("unauthorized", self.0)).into_response()
    }
}

impl FromRequestParts<AppState> for CallerId {
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let secret = state
            .jwt_secret
            .as_deref()
            .ok_or(Unauthorized("token verification is not configured"))?;
        verify(token, secret)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, Unauthorized> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(Unauthorized("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| Unauthorized("invalid Authorization header encoding"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Unauthorized("missing bearer token"))
}

/// Verify `token` against `secret` and extract the caller id.
pub fn verify(token: &str, secret: &str) -> Result<CallerId, Unauthorized> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            Unauthorized("invalid or expired token")
        })?;

    let id = match data.claims.id {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
    .or(data.claims.sub)
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .ok_or(Unauthorized("token carries no caller id"))?;

    Ok(CallerId(id))
}

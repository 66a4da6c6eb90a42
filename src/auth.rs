use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Claims
///
/// The payload expected inside a bearer token. Tokens are HS256-signed with the
/// configured secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the caller's identity, recorded on the request span.
    pub sub: String,
    /// Expiration Time (exp): tokens past this timestamp are rejected.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// AuthUser
///
/// The identity admitted by the gate. `subject` is `None` when the gate runs in
/// pass-through mode (no secret configured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: Option<String>,
}

impl AuthUser {
    pub fn anonymous() -> Self {
        Self { subject: None }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Pass-through: with no `jwt_secret` configured every request is admitted.
/// 2. Token Extraction: `Authorization: Bearer <token>` is required.
/// 3. Token Validation: signature and expiry are checked against the secret.
///
/// Rejection: StatusCode::UNAUTHORIZED (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let Some(secret) = config.jwt_secret.as_deref() else {
            return Ok(AuthUser::anonymous());
        };

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                _ => tracing::debug!(error = %e, "rejected invalid token"),
            }
            StatusCode::UNAUTHORIZED
        })?;

        Ok(AuthUser {
            subject: Some(token_data.claims.sub),
        })
    }
}

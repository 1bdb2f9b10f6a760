use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
};

/// Claims carried by the identity provider's session token. `sub` is the
/// stable external identity key; email and name fields are the provider's
/// latest snapshot of the account.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub emails: Vec<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// The externally authenticated principal attached to a request. Not yet a
/// local user; Identity Sync turns it into one.
#[derive(Debug, Clone)]
pub struct Principal {
    pub clerk_id: String,
    pub emails: Vec<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Principal {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// "{first} {last}", trimmed; None when both parts are absent.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

#[derive(Clone)]
pub struct SessionVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthenticated
            })?;

        let claims = token_data.claims;
        Ok(Principal {
            clerk_id: claims.sub,
            emails: claims.emails,
            first_name: claims.first_name,
            last_name: claims.last_name,
        })
    }

    /// Mints a session token. Used by the upload CLI and by tests; the server
    /// itself only verifies.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: principal.clerk_id.clone(),
            emails: principal.emails.clone(),
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok());

        let token = auth_header
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        state.sessions.verify(token)
    }
}

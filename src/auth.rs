//! Session tokens and the request extractors that enforce them.
//!
//! A token is an HS256 JWT whose claims are the caller's [`UserProfile`]
//! plus issue and expiry times. Every verification failure (expired, bad
//! signature, garbage) is reported the same way, as `Unauthorized`.
//!
//! - [`AuthUser`] accepts any valid token
//! - [`AdminUser`] additionally requires the `admin` role

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::stores::{Role, UserProfile};

pub const TOKEN_TTL_HOURS: i64 = 8;

const MISSING_TOKEN: &str = "Token no proporcionado";
const INVALID_TOKEN: &str = "Token inválido";
const ADMIN_REQUIRED: &str = "Acceso denegado. Se requiere rol de administrador";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub user: UserProfile,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, user: &UserProfile) -> Result<String> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token as if it had been created at `issued_at`.
    pub fn issue_at(&self, user: &UserProfile, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            user: user.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<UserProfile> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.user)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                Error::Unauthorized(INVALID_TOKEN.to_string())
            })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| Error::Unauthorized(MISSING_TOKEN.to_string()))
}

/// Role gate for privileged operations.
pub fn require_admin(user: &UserProfile) -> Result<()> {
    if user.role != Role::Admin {
        return Err(Error::Forbidden(ADMIN_REQUIRED.to_string()));
    }
    Ok(())
}

/// The authenticated caller, as carried by the token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserProfile);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        state.tokens.verify(token).map(AuthUser)
    }
}

/// An authenticated caller with the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserProfile);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_admin(&user)?;
        Ok(AdminUser(user))
    }
}

use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::settings::Settings, error::AppError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_token(user_id: Uuid, secret: &str, ttl_hours: i64) -> Result<String> {
    let now = Utc::now();
    let expires_at = TimeDelta::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} hours is out of range", ttl_hours))?;
    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
    Settings: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Forbidden("Access denied".to_string()))?;

        let settings = Settings::from_ref(state);

        decode_token(bearer.token(), &settings.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::Forbidden("Invalid token".to_string())
        })
    }
}

/// Caller identity on routes that also serve anonymous requests.
///
/// No `Authorization` header yields `OptionalClaims(None)`; a header that is
/// present but does not verify is rejected the same way as on protected routes.
#[derive(Debug)]
pub struct OptionalClaims(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalClaims
where
    S: Send + Sync,
    Settings: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(OptionalClaims(None));
        }

        let claims = Claims::from_request_parts(parts, state).await?;
        Ok(OptionalClaims(Some(claims)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_user_id() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "secret", 1).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_token(Uuid::new_v4(), "secret", 1).unwrap();
        assert!(decode_token(&token, "another").is_err());
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        assert!(create_token(Uuid::new_v4(), "secret", i64::MAX / 1000).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(Uuid::new_v4(), "secret", -2).unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }
}

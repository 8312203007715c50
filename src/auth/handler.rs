use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt, utils, AuthResponse, LoginUser, RegisterUser},
    config::settings::Settings,
    error::AppError,
    extract::AppJson,
    response::ApiResponse,
    store::{NewUser, Store},
    users::UserResponse,
};

fn issue_token(user_id: Uuid, settings: &Settings) -> Result<String, AppError> {
    jwt::create_token(user_id, &settings.jwt_secret, settings.jwt_ttl_hours).map_err(|e| {
        tracing::error!("Token creation failed: {:?}", e);
        AppError::InternalServerError
    })
}

/// Register a new account
/// POST /auth/register
pub async fn register(
    State(store): State<Store>,
    State(settings): State<Settings>,
    AppJson(payload): AppJson<RegisterUser>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("User already exists".to_string()));
    }

    let password_hash = utils::hash_password(&payload.password)?;

    // The unique constraints still catch a concurrent registration
    let user = store
        .create_user(NewUser {
            username,
            email,
            password_hash,
            profile: payload.profile.unwrap_or_default(),
        })
        .await?;

    info!(user_id = %user.id, "user registered");

    let token = issue_token(user.id, &settings)?;

    Ok(ApiResponse::success_with_message(
        "User registered successfully",
        AuthResponse {
            token,
            user: UserResponse::private(user),
        },
    )
    .created())
}

/// POST /auth/login
pub async fn login(
    State(store): State<Store>,
    State(settings): State<Settings>,
    AppJson(payload): AppJson<LoginUser>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = store
        .find_user_by_email(&payload.email.trim().to_lowercase())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !utils::password_matches(&user.password_hash, &payload.password) {
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(user.id, &settings)?;

    Ok(ApiResponse::success(AuthResponse {
        token,
        user: UserResponse::private(user),
    }))
}

/// GET /auth/user/:user_id
pub async fn get_user_by_id(
    State(store): State<Store>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserResponse::from(user)))
}

/// GET /auth/me
pub async fn get_me(
    State(store): State<Store>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .find_user(claims.sub)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserResponse::private(user)))
}

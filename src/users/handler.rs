use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt, utils},
    error::AppError,
    extract::AppJson,
    response::ApiResponse,
    store::{Store, UserUpdate},
    users::{
        ChangePassword, SearchQuery, SearchResponse, UpdateAvatar, UpdateUser, User,
        UserProfileResponse, UserResponse, UserSummary,
    },
};

const SEARCH_LIMIT: i64 = 20;

pub(crate) async fn load_user(store: &Store, id: Uuid) -> Result<User, AppError> {
    store
        .find_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

fn ensure_self(claims: &jwt::Claims, user_id: Uuid) -> Result<(), AppError> {
    if claims.sub != user_id {
        return Err(AppError::Forbidden(
            "You can only modify your own account".to_string(),
        ));
    }
    Ok(())
}

/// GET /users
pub async fn list_users(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let users: Vec<UserResponse> = store
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(ApiResponse::success(users))
}

/// Profile with follow stats; `is_following` is only true for a signed-in caller
/// GET /users/:user_id
pub async fn get_user_profile(
    State(store): State<Store>,
    jwt::OptionalClaims(claims): jwt::OptionalClaims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&store, user_id).await?;

    let caller = claims.map(|c| c.sub);
    let is_following = caller.is_some_and(|id| user.followers.contains(&id));

    let user = if caller == Some(user_id) {
        UserResponse::private(user)
    } else {
        UserResponse::from(user)
    };

    Ok(ApiResponse::success(UserProfileResponse { user, is_following }))
}

/// GET /search?query=
pub async fn search_users(
    State(store): State<Store>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.query.unwrap_or_default();
    let query = query.trim();

    let users = if query.is_empty() {
        Vec::new()
    } else {
        store
            .search_users(query, SEARCH_LIMIT)
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect()
    };

    Ok(ApiResponse::success(SearchResponse { users }))
}

/// PATCH /users/:user_id/avatar
pub async fn update_avatar(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateAvatar>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(&claims, user_id)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Only a bare file name inside the avatar directory
    let avatar = payload.avatar.trim();
    if avatar.contains('/') || avatar.contains('\\') || avatar.starts_with('.') {
        return Err(AppError::BadRequest("Invalid avatar file name".to_string()));
    }

    let user = store
        .set_avatar(user_id, avatar)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success_with_message(
        "Avatar updated",
        UserResponse::private(user),
    ))
}

/// PUT /usersupdate/:user_id
pub async fn update_user(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateUser>,
) -> Result<impl IntoResponse, AppError> {
    ensure_self(&claims, user_id)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let update = UserUpdate {
        username: payload.username.map(|u| u.trim().to_string()),
        email: payload.email.map(|e| e.trim().to_lowercase()),
        profile: payload.profile,
    };

    let user = store
        .update_user(user_id, update)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    info!(user_id = %user_id, "profile updated");

    Ok(ApiResponse::success_with_message(
        "User updated",
        UserResponse::private(user),
    ))
}

/// PUT /change-password
pub async fn change_password(
    State(store): State<Store>,
    claims: jwt::Claims,
    AppJson(payload): AppJson<ChangePassword>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = load_user(&store, claims.sub).await?;

    if !utils::password_matches(&user.password_hash, &payload.current_password) {
        return Err(AppError::Unauthorized);
    }

    let password_hash = utils::hash_password(&payload.new_password)?;
    if !store.set_password_hash(user.id, &password_hash).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!(user_id = %user.id, "password changed");

    Ok(ApiResponse::ok("Password updated successfully"))
}

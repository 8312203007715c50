use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::jwt,
    error::AppError,
    follows::{FollowActionResponse, FollowListResponse, FollowStatusResponse},
    response::ApiResponse,
    store::{FollowChange, Store},
    users::{handler::load_user, UserResponse, UserSummary},
};

/// Applies one follow-edge change between the caller and a target user.
async fn apply(
    store: &Store,
    actor_id: Uuid,
    target_id: Uuid,
    change: FollowChange,
) -> Result<ApiResponse<FollowActionResponse>, AppError> {
    if actor_id == target_id {
        return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
    }

    load_user(store, target_id).await?;
    load_user(store, actor_id).await?;

    let following = store.set_follow(actor_id, target_id, change).await?;

    info!(
        actor = %actor_id,
        target = %target_id,
        following,
        "follow edge updated"
    );

    let user = load_user(store, actor_id).await?;
    let target = load_user(store, target_id).await?;

    let message = if following {
        "User followed"
    } else {
        "User unfollowed"
    };

    Ok(ApiResponse::success_with_message(
        message,
        FollowActionResponse {
            following,
            user: UserResponse::private(user),
            target: UserResponse::from(target),
        },
    ))
}

/// Follow a user (no-op when already following)
/// POST /follow/:user_id
pub async fn follow_user(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    apply(&store, claims.sub, user_id, FollowChange::Follow).await
}

/// Unfollow a user (no-op when not following)
/// POST /unfollow/:user_id
pub async fn unfollow_user(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    apply(&store, claims.sub, user_id, FollowChange::Unfollow).await
}

/// Flip the follow state
/// POST /users/:user_id/follow
pub async fn toggle_follow(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    apply(&store, claims.sub, user_id, FollowChange::Toggle).await
}

/// GET /isFollowing/:user_id
pub async fn is_following(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let following = store.is_following(claims.sub, user_id).await?;

    Ok(ApiResponse::success(FollowStatusResponse { following }))
}

/// GET /users/:user_id/followers
pub async fn get_followers(
    State(store): State<Store>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&store, user_id).await?;
    let users = store.users_by_ids(&user.followers).await?;

    Ok(ApiResponse::success(FollowListResponse {
        total: user.followers_count(),
        users: users.into_iter().map(UserSummary::from).collect(),
    }))
}

/// GET /users/:user_id/following
pub async fn get_following(
    State(store): State<Store>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = load_user(&store, user_id).await?;
    let users = store.users_by_ids(&user.following).await?;

    Ok(ApiResponse::success(FollowListResponse {
        total: user.following_count(),
        users: users.into_iter().map(UserSummary::from).collect(),
    }))
}

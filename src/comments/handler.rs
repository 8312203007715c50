use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    comments::{CommentResponse, CreateComment, CreateReply},
    error::AppError,
    extract::AppJson,
    posts::handler::post_response,
    response::ApiResponse,
    store::{NewComment, Store},
    users::handler::load_user,
};

async fn comment_response(store: &Store, comment_id: Uuid) -> Result<CommentResponse, AppError> {
    store
        .find_comment(comment_id)
        .await?
        .map(CommentResponse::from)
        .ok_or(AppError::NotFound("Comment not found".to_string()))
}

/// Add a comment and return the post with its comments expanded
/// POST /posts/:id/comments
pub async fn add_comment(
    State(store): State<Store>,
    jwt::OptionalClaims(claims): jwt::OptionalClaims,
    Path(post_id): Path<Uuid>,
    AppJson(payload): AppJson<CreateComment>,
) -> Result<impl IntoResponse, AppError> {
    let required = || AppError::BadRequest("User ID and content are required".to_string());

    let author_id = claims.map(|c| c.sub).ok_or_else(required)?;
    let content = payload
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(required)?
        .to_string();

    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    load_user(&store, author_id).await?;

    let comment = store
        .add_comment(NewComment {
            post_id,
            author_id,
            content,
        })
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    info!(comment_id = %comment.id, post_id = %post_id, "comment added");

    Ok(ApiResponse::success(post_response(&store, post_id).await?).created())
}

/// GET /posts/:id/comments
pub async fn get_post_comments(
    State(store): State<Store>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let comments: Vec<CommentResponse> = store
        .comments_for_posts(&[post_id])
        .await?
        .into_iter()
        .map(CommentResponse::from)
        .collect();

    Ok(ApiResponse::success(comments))
}

/// POST /comments/:id/like
pub async fn like_comment(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_user(&store, claims.sub).await?;

    let liked = store
        .toggle_comment_like(comment_id, claims.sub)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let message = if liked {
        "Comment liked"
    } else {
        "Comment unliked"
    };

    Ok(ApiResponse::success_with_message(
        message,
        comment_response(&store, comment_id).await?,
    ))
}

/// POST /comments/:id/replies
pub async fn reply_to_comment(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(comment_id): Path<Uuid>,
    AppJson(payload): AppJson<CreateReply>,
) -> Result<impl IntoResponse, AppError> {
    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("Reply cannot be empty".to_string()));
    }
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    load_user(&store, claims.sub).await?;

    let comment = store
        .add_reply(comment_id, claims.sub, &content)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(ApiResponse::success(CommentResponse::from(comment)).created())
}

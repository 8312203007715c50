use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    comments::CommentResponse,
    error::AppError,
    extract::AppJson,
    posts::{CreatePost, Post, PostFilter, PostResponse},
    response::ApiResponse,
    store::{normalize_tags, NewPost, PostQuery, Store},
    users::handler::load_user,
};

/// Loads the comments of every post in one store call and attaches them.
pub(crate) async fn expand_posts(
    store: &Store,
    posts: Vec<Post>,
) -> Result<Vec<PostResponse>, AppError> {
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    // Store order is oldest first, which each group keeps
    let mut by_post: HashMap<Uuid, Vec<CommentResponse>> = HashMap::new();
    for comment in store.comments_for_posts(&ids).await? {
        by_post
            .entry(comment.post_id)
            .or_default()
            .push(CommentResponse::from(comment));
    }

    Ok(posts
        .into_iter()
        .map(|post| {
            let comments = by_post.remove(&post.id).unwrap_or_default();
            PostResponse::assemble(post, comments)
        })
        .collect())
}

pub(crate) async fn post_response(store: &Store, post_id: Uuid) -> Result<PostResponse, AppError> {
    let post = store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let mut expanded = expand_posts(store, vec![post]).await?;
    expanded.pop().ok_or(AppError::InternalServerError)
}

/// POST /addpost
pub async fn create_post(
    State(store): State<Store>,
    claims: jwt::Claims,
    AppJson(payload): AppJson<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("Content cannot be empty".to_string()));
    }

    load_user(&store, claims.sub).await?;

    let post = store
        .create_post(NewPost {
            author_id: claims.sub,
            content,
            image_url: payload.image_url.filter(|url| !url.trim().is_empty()),
            tags: normalize_tags(&payload.tags),
            category: payload.category.unwrap_or_default(),
        })
        .await?;

    info!(post_id = %post.id, author = %claims.sub, "post created");

    Ok(ApiResponse::success(PostResponse::assemble(post, Vec::new())).created())
}

/// GET /posts
pub async fn get_posts(
    State(store): State<Store>,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let query = PostQuery {
        category: filter.category,
        tag: filter
            .tag
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
        limit: filter.limit.unwrap_or(20).clamp(1, 100),
        offset: filter.offset.unwrap_or(0).max(0),
    };

    let posts = store.list_posts(&query).await?;

    Ok(ApiResponse::success(expand_posts(&store, posts).await?))
}

/// GET /posts/:id
pub async fn get_post(
    State(store): State<Store>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ApiResponse::success(post_response(&store, id).await?))
}

/// GET /users/:user_id/posts
pub async fn get_user_posts(
    State(store): State<Store>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_user(&store, user_id).await?;

    let posts = store.posts_by_author(user_id).await?;

    Ok(ApiResponse::success(expand_posts(&store, posts).await?))
}

/// Like or unlike a post, depending on whether the caller already likes it
/// POST /posts/:id/like
pub async fn like_post(
    State(store): State<Store>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_user(&store, claims.sub).await?;

    let liked = store
        .toggle_post_like(id, claims.sub)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    info!(post_id = %id, user_id = %claims.sub, liked, "post like toggled");

    let message = if liked { "Post liked" } else { "Post unliked" };

    Ok(ApiResponse::success_with_message(
        message,
        post_response(&store, id).await?,
    ))
}

use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use uuid::Uuid;
use validator::Validate;

use crate::comments::CommentResponse;

pub mod handler;

#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub author: AuthorRef,
    pub content: String,
    pub image_url: Option<String>,
    pub liked_by: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    pub tags: Vec<String>,
    pub category: PostCategory,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Post {
    pub fn likes(&self) -> i64 {
        self.liked_by.len() as i64
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "post_category", rename_all = "lowercase")]
pub enum PostCategory {
    #[default]
    Outfit,
    Accessory,
    StylingTips,
}

/// Author info embedded in posts and comments.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorRef {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePost {
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Content must be between 1 and 5000 characters"
    ))]
    pub content: String,
    #[validate(length(max = 2048, message = "Image URL is too long"))]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<PostCategory>,
}

#[derive(Debug, Deserialize)]
pub struct PostFilter {
    pub category: Option<PostCategory>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A post with its comments expanded
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: AuthorRef,
    pub content: String,
    pub image_url: Option<String>,
    pub likes: i64,
    pub liked_by: Vec<Uuid>,
    pub comments: Vec<CommentResponse>,
    pub tags: Vec<String>,
    pub category: PostCategory,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PostResponse {
    /// `comments` must already belong to this post, oldest first.
    pub fn assemble(post: Post, comments: Vec<CommentResponse>) -> Self {
        PostResponse {
            likes: post.likes(),
            id: post.id,
            author: post.author,
            content: post.content,
            image_url: post.image_url,
            liked_by: post.liked_by,
            comments,
            tags: post.tags,
            category: post.category,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

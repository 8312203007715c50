use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::posts::AuthorRef;

pub mod handler;

/// A comment on a post, with its replies in creation order
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorRef,
    pub content: String,
    pub liked_by: Vec<Uuid>,
    pub replies: Vec<Reply>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Comment {
    pub fn likes(&self) -> i64 {
        self.liked_by.len() as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: Uuid,
    pub author: AuthorRef,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for creating a comment
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReply {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Reply must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorRef,
    pub content: String,
    pub likes: i64,
    pub replies: Vec<Reply>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        CommentResponse {
            likes: c.likes(),
            id: c.id,
            post_id: c.post_id,
            author: c.author,
            content: c.content,
            replies: c.replies,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

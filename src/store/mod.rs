//! Storage handle for users, posts, comments and the relations between them.
//!
//! Membership sets (followers, likes) are stored as keyed rows and the
//! counts shown to clients are derived from them on read, so a count can
//! never drift from its set. Every toggle is a single remove-if-present /
//! add-if-absent against the pair key.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    comments::Comment,
    posts::{Post, PostCategory},
    users::{Profile, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field (username, email) is already taken.
    #[error("{0}")]
    Duplicate(String),
    #[error("a user cannot follow themselves")]
    SelfFollow,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle carried in the router state.
pub type Store = Arc<dyn SocialStore>;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

/// Partial account update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub category: PostCategory,
}

#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub category: Option<PostCategory>,
    pub tag: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

/// Requested change to a follow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowChange {
    Follow,
    Unfollow,
    Toggle,
}

#[async_trait]
pub trait SocialStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Users for the given ids, in the order of `ids`. Unknown ids are skipped.
    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn search_users(&self, query: &str, limit: i64) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>>;
    async fn set_avatar(&self, id: Uuid, avatar: &str) -> StoreResult<Option<User>>;
    /// Returns false when the user does not exist.
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;

    /// Applies `change` to the follower -> followee edge and returns whether
    /// the follower follows the followee afterwards.
    async fn set_follow(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
        change: FollowChange,
    ) -> StoreResult<bool>;
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool>;

    async fn create_post(&self, new: NewPost) -> StoreResult<Post>;
    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>>;
    /// Newest first.
    async fn list_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>>;
    async fn posts_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Post>>;
    /// Flips the user's like on a post. `None` when the post does not exist,
    /// otherwise whether the post is liked afterwards.
    async fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<bool>>;

    /// `None` (and nothing written) when the post does not exist.
    async fn add_comment(&self, new: NewComment) -> StoreResult<Option<Comment>>;
    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    /// Comments of the given posts, oldest first within a post.
    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>>;
    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>>;
    async fn add_reply(
        &self,
        comment_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<Comment>>;

    /// Drops every user, post and comment. Only the seeding binary calls this.
    async fn clear_all(&self) -> StoreResult<()>;
}

/// Lower-cases and trims tags, dropping empties and repeats.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let clean = tag.trim().to_lowercase();
        if !clean.is_empty() && !out.contains(&clean) {
            out.push(clean);
        }
    }
    out
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod handler;

/// An account with its follow graph and activity sets.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub profile: Profile,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub posts: Vec<Uuid>,
    pub liked_posts: Vec<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn followers_count(&self) -> i64 {
        self.followers.len() as i64
    }

    pub fn following_count(&self) -> i64 {
        self.following.len() as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Profile {
    #[validate(length(max = 50, message = "First name must be at most 50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Last name must be at most 50 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

/// View of a user; never carries the password hash. The email is only
/// filled in for the account owner.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub profile: Profile,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts: Vec<Uuid>,
    pub liked_posts: Vec<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserResponse {
    /// The owner's own view, email included.
    pub fn private(user: User) -> Self {
        let email = user.email.clone();
        UserResponse {
            email: Some(email),
            ..UserResponse::from(user)
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            followers_count: user.followers_count(),
            following_count: user.following_count(),
            id: user.id,
            username: user.username,
            email: None,
            avatar: user.avatar,
            profile: user.profile,
            followers: user.followers,
            following: user.following,
            posts: user.posts,
            liked_posts: user.liked_posts,
            created_at: user.created_at,
        }
    }
}

/// Compact entry for search results and follow lists
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub followers_count: i64,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            followers_count: user.followers_count(),
            id: user.id,
            username: user.username,
            avatar: user.avatar,
            bio: user.profile.bio,
        }
    }
}

/// Profile page: the user plus whether the caller follows them
#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub is_following: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAvatar {
    #[validate(length(min = 1, max = 255, message = "Avatar must be between 1 and 255 characters"))]
    pub avatar: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(nested)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

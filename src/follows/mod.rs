use serde::Serialize;

use crate::users::{UserResponse, UserSummary};

pub mod handler;

/// Response for follow/unfollow actions: the new state plus both updated profiles
#[derive(Debug, Serialize)]
pub struct FollowActionResponse {
    pub following: bool,
    pub user: UserResponse,
    pub target: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct FollowStatusResponse {
    pub following: bool,
}

/// Followers/following list, in the order the edges were created
#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub users: Vec<UserSummary>,
    pub total: i64,
}

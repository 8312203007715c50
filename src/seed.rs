//! Sample data for local development. Wipes the store first.

use rand::seq::SliceRandom;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::utils::hash_password,
    posts::PostCategory,
    store::{FollowChange, NewComment, NewPost, NewUser, Store, StoreError},
    users::Profile,
};

pub const SEED_PASSWORD: &str = "password123";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub follows: usize,
    pub likes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not hash the seed password")]
    Hash,
}

const USERS: &[(&str, &str, &str, &str)] = &[
    ("anna", "Anna", "Kowalski", "Vintage hunter and thrift lover"),
    ("james", "James", "Okafor", "Streetwear, sneakers, layering"),
    ("maria", "Maria", "Santos", "Minimalist capsule wardrobe"),
    ("leo", "Leo", "Fischer", "Tailoring and classic menswear"),
];

const POSTS: &[(usize, &str, PostCategory, &[&str])] = &[
    (0, "Seventies suede jacket over a white tee", PostCategory::Outfit, &["vintage", "autumn"]),
    (1, "Chunky sneakers with cargo pants", PostCategory::Outfit, &["streetwear"]),
    (2, "One tote bag, every occasion", PostCategory::Accessory, &["minimal"]),
    (3, "How to pick a lapel width", PostCategory::StylingTips, &["tailoring"]),
    (0, "Silk scarf as a belt", PostCategory::StylingTips, &["vintage", "hack"]),
];

const COMMENTS: &[&str] = &[
    "Love this combination!",
    "Where did you find it?",
    "Saving this for later",
];

/// Clears the store and inserts a small, connected sample graph.
pub async fn populate(store: &Store) -> Result<SeedSummary, SeedError> {
    store.clear_all().await?;
    info!("previous data cleared");

    let password_hash = hash_password(SEED_PASSWORD).map_err(|_| SeedError::Hash)?;
    let mut summary = SeedSummary::default();

    let mut user_ids: Vec<Uuid> = Vec::with_capacity(USERS.len());
    for (username, first, last, bio) in USERS {
        let user = store
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@fashionfusion.dev", username),
                password_hash: password_hash.clone(),
                profile: Profile {
                    first_name: Some(first.to_string()),
                    last_name: Some(last.to_string()),
                    bio: Some(bio.to_string()),
                },
            })
            .await?;
        user_ids.push(user.id);
    }
    summary.users = user_ids.len();
    info!(count = summary.users, "users inserted");

    let mut post_ids: Vec<(Uuid, Uuid)> = Vec::with_capacity(POSTS.len());
    for (author, content, category, tags) in POSTS {
        let author_id = user_ids[*author];
        let post = store
            .create_post(NewPost {
                author_id,
                content: content.to_string(),
                image_url: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                category: *category,
            })
            .await?;
        post_ids.push((post.id, author_id));
    }
    summary.posts = post_ids.len();
    info!(count = summary.posts, "posts inserted");

    // Everyone follows the next user round the ring
    for (i, follower) in user_ids.iter().enumerate() {
        let followee = user_ids[(i + 1) % user_ids.len()];
        store
            .set_follow(*follower, followee, FollowChange::Follow)
            .await?;
        summary.follows += 1;
    }

    // Picked up front so the thread-local rng is not held across an await
    let likes: Vec<(Uuid, Uuid)> = {
        let mut rng = rand::thread_rng();
        user_ids
            .iter()
            .flat_map(|user_id| {
                let others: Vec<Uuid> = post_ids
                    .iter()
                    .filter(|(_, author)| author != user_id)
                    .map(|(post, _)| *post)
                    .collect();
                others
                    .choose_multiple(&mut rng, 2)
                    .map(|post_id| (*post_id, *user_id))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    for (post_id, user_id) in likes {
        if store.toggle_post_like(post_id, user_id).await? == Some(true) {
            summary.likes += 1;
        }
    }

    for (i, (post_id, author_id)) in post_ids.iter().enumerate() {
        let commenter = user_ids
            .iter()
            .copied()
            .find(|id| id != author_id)
            .unwrap_or(*author_id);
        let added = store
            .add_comment(NewComment {
                post_id: *post_id,
                author_id: commenter,
                content: COMMENTS[i % COMMENTS.len()].to_string(),
            })
            .await?;
        if added.is_some() {
            summary.comments += 1;
        }
    }

    info!(?summary, "seed complete");

    Ok(summary)
}

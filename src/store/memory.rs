use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    comments::{Comment, Reply},
    posts::{AuthorRef, Post, PostCategory},
    store::{
        FollowChange, NewComment, NewPost, NewUser, PostQuery, SocialStore, StoreError,
        StoreResult, UserUpdate,
    },
    users::{Profile, User},
};

struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    avatar: Option<String>,
    profile: Profile,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct PostRecord {
    id: Uuid,
    author_id: Uuid,
    content: String,
    image_url: Option<String>,
    tags: Vec<String>,
    category: PostCategory,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct CommentRecord {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct ReplyRecord {
    id: Uuid,
    comment_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

/// Relations are kept as (left, right) pairs in insertion order, mirroring
/// the keyed tables of the Postgres schema.
#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    follows: Vec<(Uuid, Uuid)>,
    posts: Vec<PostRecord>,
    post_likes: Vec<(Uuid, Uuid)>,
    comments: Vec<CommentRecord>,
    comment_likes: Vec<(Uuid, Uuid)>,
    replies: Vec<ReplyRecord>,
}

impl State {
    fn user(&self, r: &UserRecord) -> User {
        User {
            id: r.id,
            username: r.username.clone(),
            email: r.email.clone(),
            password_hash: r.password_hash.clone(),
            avatar: r.avatar.clone(),
            profile: r.profile.clone(),
            followers: self
                .follows
                .iter()
                .filter(|(_, followee)| *followee == r.id)
                .map(|(follower, _)| *follower)
                .collect(),
            following: self
                .follows
                .iter()
                .filter(|(follower, _)| *follower == r.id)
                .map(|(_, followee)| *followee)
                .collect(),
            posts: self
                .posts
                .iter()
                .filter(|p| p.author_id == r.id)
                .map(|p| p.id)
                .collect(),
            liked_posts: self
                .post_likes
                .iter()
                .filter(|(_, user)| *user == r.id)
                .map(|(post, _)| *post)
                .collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }

    fn author(&self, id: Uuid) -> AuthorRef {
        let record = self.users.iter().find(|u| u.id == id);
        AuthorRef {
            id,
            username: record.map(|u| u.username.clone()).unwrap_or_default(),
            avatar: record.and_then(|u| u.avatar.clone()),
        }
    }

    fn post(&self, r: &PostRecord) -> Post {
        Post {
            id: r.id,
            author: self.author(r.author_id),
            content: r.content.clone(),
            image_url: r.image_url.clone(),
            liked_by: self
                .post_likes
                .iter()
                .filter(|(post, _)| *post == r.id)
                .map(|(_, user)| *user)
                .collect(),
            comments: self
                .comments
                .iter()
                .filter(|c| c.post_id == r.id)
                .map(|c| c.id)
                .collect(),
            tags: r.tags.clone(),
            category: r.category,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }

    fn comment(&self, r: &CommentRecord) -> Comment {
        Comment {
            id: r.id,
            post_id: r.post_id,
            author: self.author(r.author_id),
            content: r.content.clone(),
            liked_by: self
                .comment_likes
                .iter()
                .filter(|(comment, _)| *comment == r.id)
                .map(|(_, user)| *user)
                .collect(),
            replies: self
                .replies
                .iter()
                .filter(|reply| reply.comment_id == r.id)
                .map(|reply| Reply {
                    id: reply.id,
                    author: self.author(reply.author_id),
                    content: reply.content.clone(),
                    created_at: reply.created_at,
                })
                .collect(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }

    fn find_user(&self, id: Uuid) -> Option<User> {
        self.users.iter().find(|u| u.id == id).map(|u| self.user(u))
    }

    fn check_unique(&self, id: Option<Uuid>, username: &str, email: &str) -> StoreResult<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != id);
        for other in others {
            if other.username == username {
                return Err(StoreError::Duplicate("Username already exists".to_string()));
            }
            if other.email == email {
                return Err(StoreError::Duplicate("Email already exists".to_string()));
            }
        }
        Ok(())
    }

    /// Removes the pair if present, otherwise adds it. Returns true when the
    /// pair is present afterwards.
    fn toggle_pair(pairs: &mut Vec<(Uuid, Uuid)>, pair: (Uuid, Uuid)) -> bool {
        let before = pairs.len();
        pairs.retain(|p| *p != pair);
        if pairs.len() == before {
            pairs.push(pair);
            true
        } else {
            false
        }
    }
}

/// Process-local store used by tests and by `STORE=memory`. Every call holds
/// the lock for its whole read-modify-write.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;
        state.check_unique(None, &new.username, &new.email)?;

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            avatar: None,
            profile: new.profile,
            created_at: now,
            updated_at: now,
        };
        let user = state.user(&record);
        state.users.push(record);
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.find_user(id))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| state.user(u)))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().map(|u| state.user(u)).collect())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.find_user(*id)).collect())
    }

    async fn search_users(&self, query: &str, limit: i64) -> StoreResult<Vec<User>> {
        let needle = query.to_lowercase();
        let matches = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };

        let state = self.state.read().await;
        let mut found: Vec<User> = state
            .users
            .iter()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || matches(&u.profile.first_name)
                    || matches(&u.profile.last_name)
            })
            .map(|u| state.user(u))
            .collect();

        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;

        let Some(current) = state.users.iter().find(|u| u.id == id) else {
            return Ok(None);
        };
        let username = update
            .username
            .unwrap_or_else(|| current.username.clone());
        let email = update.email.unwrap_or_else(|| current.email.clone());
        state.check_unique(Some(id), &username, &email)?;

        if let Some(record) = state.users.iter_mut().find(|u| u.id == id) {
            record.username = username;
            record.email = email;
            if let Some(profile) = update.profile {
                record.profile = profile;
            }
            record.updated_at = Utc::now();
        }

        Ok(state.find_user(id))
    }

    async fn set_avatar(&self, id: Uuid, avatar: &str) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;
        let Some(record) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        record.avatar = Some(avatar.to_string());
        record.updated_at = Utc::now();
        Ok(state.find_user(id))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(record) => {
                record.password_hash = password_hash.to_string();
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_follow(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
        change: FollowChange,
    ) -> StoreResult<bool> {
        if follower_id == followee_id {
            return Err(StoreError::SelfFollow);
        }

        let mut state = self.state.write().await;
        let edge = (follower_id, followee_id);

        let following = match change {
            FollowChange::Toggle => State::toggle_pair(&mut state.follows, edge),
            FollowChange::Follow => {
                if !state.follows.contains(&edge) {
                    state.follows.push(edge);
                }
                true
            }
            FollowChange::Unfollow => {
                state.follows.retain(|e| *e != edge);
                false
            }
        };

        Ok(following)
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.follows.contains(&(follower_id, followee_id)))
    }

    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let record = PostRecord {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            content: new.content,
            image_url: new.image_url,
            tags: new.tags,
            category: new.category,
            created_at: now,
            updated_at: now,
        };
        let post = state.post(&record);
        state.posts.push(record);
        Ok(post)
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| state.post(p)))
    }

    async fn list_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .rev()
            .filter(|p| query.category.map_or(true, |c| p.category == c))
            .filter(|p| query.tag.as_ref().map_or(true, |t| p.tags.contains(t)))
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .map(|p| state.post(p))
            .collect())
    }

    async fn posts_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Post>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .rev()
            .filter(|p| p.author_id == author_id)
            .map(|p| state.post(p))
            .collect())
    }

    async fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<bool>> {
        let mut state = self.state.write().await;
        if !state.posts.iter().any(|p| p.id == post_id) {
            return Ok(None);
        }
        Ok(Some(State::toggle_pair(
            &mut state.post_likes,
            (post_id, user_id),
        )))
    }

    async fn add_comment(&self, new: NewComment) -> StoreResult<Option<Comment>> {
        let mut state = self.state.write().await;
        if !state.posts.iter().any(|p| p.id == new.post_id) {
            return Ok(None);
        }

        let now = Utc::now();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: new.post_id,
            author_id: new.author_id,
            content: new.content,
            created_at: now,
            updated_at: now,
        };
        let comment = state.comment(&record);
        state.comments.push(record);
        Ok(Some(comment))
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| state.comment(c)))
    }

    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| post_ids.contains(&c.post_id))
            .map(|c| state.comment(c))
            .collect())
    }

    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        let mut state = self.state.write().await;
        if !state.comments.iter().any(|c| c.id == comment_id) {
            return Ok(None);
        }
        Ok(Some(State::toggle_pair(
            &mut state.comment_likes,
            (comment_id, user_id),
        )))
    }

    async fn add_reply(
        &self,
        comment_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<Comment>> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let Some(record) = state.comments.iter_mut().find(|c| c.id == comment_id) else {
            return Ok(None);
        };
        record.updated_at = now;

        state.replies.push(ReplyRecord {
            id: Uuid::new_v4(),
            comment_id,
            author_id,
            content: content.to_string(),
            created_at: now,
        });

        Ok(state
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| state.comment(c)))
    }

    async fn clear_all(&self) -> StoreResult<()> {
        *self.state.write().await = State::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "hash".to_string(),
                profile: Profile::default(),
            })
            .await
            .unwrap()
    }

    async fn post(store: &MemoryStore, author: Uuid) -> Post {
        store
            .create_post(NewPost {
                author_id: author,
                content: "Linen shirt with wide trousers".to_string(),
                image_url: None,
                tags: vec!["summer".to_string()],
                category: PostCategory::Outfit,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn follow_updates_both_sides() {
        let store = MemoryStore::new();
        let anna = user(&store, "Anna").await;
        let james = user(&store, "James").await;

        let following = store
            .set_follow(anna.id, james.id, FollowChange::Follow)
            .await
            .unwrap();
        assert!(following);

        let anna = store.find_user(anna.id).await.unwrap().unwrap();
        let james = store.find_user(james.id).await.unwrap().unwrap();
        assert_eq!(anna.following, vec![james.id]);
        assert_eq!(anna.following_count(), 1);
        assert_eq!(james.followers, vec![anna.id]);
        assert_eq!(james.followers_count(), 1);
    }

    #[tokio::test]
    async fn toggling_follow_twice_restores_state() {
        let store = MemoryStore::new();
        let a = user(&store, "alice").await;
        let b = user(&store, "bobby").await;

        assert!(store.set_follow(a.id, b.id, FollowChange::Toggle).await.unwrap());
        assert!(!store.set_follow(a.id, b.id, FollowChange::Toggle).await.unwrap());

        let a = store.find_user(a.id).await.unwrap().unwrap();
        let b = store.find_user(b.id).await.unwrap().unwrap();
        assert!(a.following.is_empty());
        assert_eq!(a.following_count(), 0);
        assert!(b.followers.is_empty());
        assert_eq!(b.followers_count(), 0);
    }

    #[tokio::test]
    async fn repeated_follow_is_idempotent() {
        let store = MemoryStore::new();
        let a = user(&store, "alice").await;
        let b = user(&store, "bobby").await;

        store.set_follow(a.id, b.id, FollowChange::Follow).await.unwrap();
        store.set_follow(a.id, b.id, FollowChange::Follow).await.unwrap();

        let b = store.find_user(b.id).await.unwrap().unwrap();
        assert_eq!(b.followers_count(), 1);

        store.set_follow(a.id, b.id, FollowChange::Unfollow).await.unwrap();
        store.set_follow(a.id, b.id, FollowChange::Unfollow).await.unwrap();
        assert!(!store.is_following(a.id, b.id).await.unwrap());
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let store = MemoryStore::new();
        let a = user(&store, "alice").await;

        let err = store
            .set_follow(a.id, a.id, FollowChange::Toggle)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SelfFollow));
    }

    #[tokio::test]
    async fn like_toggles_and_never_duplicates() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id).await;
        assert_eq!(p.likes(), 0);

        assert_eq!(store.toggle_post_like(p.id, fan.id).await.unwrap(), Some(true));
        let liked = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(liked.likes(), 1);
        assert_eq!(liked.liked_by, vec![fan.id]);

        let fan_now = store.find_user(fan.id).await.unwrap().unwrap();
        assert_eq!(fan_now.liked_posts, vec![p.id]);

        assert_eq!(store.toggle_post_like(p.id, fan.id).await.unwrap(), Some(false));
        let unliked = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(unliked.likes(), 0);
        assert!(unliked.liked_by.is_empty());
    }

    #[tokio::test]
    async fn concurrent_likes_keep_the_set_consistent() {
        let store = Arc::new(MemoryStore::new());
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id).await;

        let (first, second) = tokio::join!(
            store.toggle_post_like(p.id, fan.id),
            store.toggle_post_like(p.id, fan.id)
        );
        assert_ne!(first.unwrap(), second.unwrap());

        let after = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(after.likes(), after.liked_by.len() as i64);
        assert!(after.liked_by.is_empty());
    }

    #[tokio::test]
    async fn like_on_missing_post_is_none() {
        let store = MemoryStore::new();
        let fan = user(&store, "fan").await;
        let result = store.toggle_post_like(Uuid::new_v4(), fan.id).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn comment_on_missing_post_writes_nothing() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let p = post(&store, author.id).await;

        let missing = store
            .add_comment(NewComment {
                post_id: Uuid::new_v4(),
                author_id: author.id,
                content: "Nice".to_string(),
            })
            .await
            .unwrap();
        assert!(missing.is_none());

        let comments = store.comments_for_posts(&[p.id]).await.unwrap();
        assert!(comments.is_empty());
        assert!(store.state.read().await.comments.is_empty());
    }

    #[tokio::test]
    async fn comments_keep_order_and_resolve_authors() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let p = post(&store, author.id).await;

        let first = store
            .add_comment(NewComment {
                post_id: p.id,
                author_id: author.id,
                content: "first".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        let second = store
            .add_comment(NewComment {
                post_id: p.id,
                author_id: author.id,
                content: "second".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let p = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(p.comments, vec![first.id, second.id]);
        assert_eq!(first.author.username, "author");
    }

    #[tokio::test]
    async fn replies_and_comment_likes() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id).await;
        let c = store
            .add_comment(NewComment {
                post_id: p.id,
                author_id: author.id,
                content: "What do you think?".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let with_reply = store
            .add_reply(c.id, fan.id, "Love it")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_reply.replies.len(), 1);
        assert_eq!(with_reply.replies[0].author.username, "fan");

        assert_eq!(store.toggle_comment_like(c.id, fan.id).await.unwrap(), Some(true));
        let liked = store.find_comment(c.id).await.unwrap().unwrap();
        assert_eq!(liked.likes(), 1);

        assert!(store.add_reply(Uuid::new_v4(), fan.id, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        user(&store, "anna").await;

        let err = store
            .create_user(NewUser {
                username: "someone_else".to_string(),
                email: "anna@example.com".to_string(),
                password_hash: "hash".to_string(),
                profile: Profile::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_cannot_take_another_username() {
        let store = MemoryStore::new();
        let anna = user(&store, "anna").await;
        user(&store, "james").await;

        let err = store
            .update_user(
                anna.id,
                UserUpdate {
                    username: Some("james".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let renamed = store
            .update_user(
                anna.id,
                UserUpdate {
                    username: Some("anna_k".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.username, "anna_k");
    }

    #[tokio::test]
    async fn search_matches_names_case_insensitively() {
        let store = MemoryStore::new();
        store
            .create_user(NewUser {
                username: "stylist".to_string(),
                email: "s@example.com".to_string(),
                password_hash: "hash".to_string(),
                profile: Profile {
                    first_name: Some("Marta".to_string()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        user(&store, "james").await;

        let found = store.search_users("MAR", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "stylist");
    }

    #[tokio::test]
    async fn list_posts_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        let author = user(&store, "author").await;
        let older = post(&store, author.id).await;
        let newer = store
            .create_post(NewPost {
                author_id: author.id,
                content: "Gold hoops".to_string(),
                image_url: None,
                tags: vec!["jewelry".to_string()],
                category: PostCategory::Accessory,
            })
            .await
            .unwrap();

        let all = store
            .list_posts(&PostQuery {
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        let accessories = store
            .list_posts(&PostQuery {
                category: Some(PostCategory::Accessory),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(accessories.len(), 1);

        let summer = store
            .list_posts(&PostQuery {
                tag: Some("summer".to_string()),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(summer[0].id, older.id);
    }
}

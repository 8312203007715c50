use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use tracing::info;
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

const USER_SELECT: &str = r#"
    SELECT
        u.id, u.username, u.email, u.password_hash, u.avatar,
        u.first_name, u.last_name, u.bio, u.created_at, u.updated_at,
        ARRAY(SELECT f.follower_id FROM follows f WHERE f.following_id = u.id
              ORDER BY f.created_at, f.follower_id) AS followers,
        ARRAY(SELECT f.following_id FROM follows f WHERE f.follower_id = u.id
              ORDER BY f.created_at, f.following_id) AS following,
        ARRAY(SELECT p.id FROM posts p WHERE p.author_id = u.id
              ORDER BY p.created_at, p.id) AS posts,
        ARRAY(SELECT pl.post_id FROM post_likes pl WHERE pl.user_id = u.id
              ORDER BY pl.created_at, pl.post_id) AS liked_posts
    FROM users u
"#;

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.author_id, u.username AS author_username, u.avatar AS author_avatar,
        p.content, p.image_url, p.tags, p.category, p.created_at, p.updated_at,
        ARRAY(SELECT pl.user_id FROM post_likes pl WHERE pl.post_id = p.id
              ORDER BY pl.created_at, pl.user_id) AS liked_by,
        ARRAY(SELECT c.id FROM comments c WHERE c.post_id = p.id
              ORDER BY c.created_at, c.id) AS comments
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.author_id, u.username AS author_username, u.avatar AS author_avatar,
        c.content, c.created_at, c.updated_at,
        ARRAY(SELECT cl.user_id FROM comment_likes cl WHERE cl.comment_id = c.id
              ORDER BY cl.created_at, cl.user_id) AS liked_by
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    avatar: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    followers: Vec<Uuid>,
    following: Vec<Uuid>,
    posts: Vec<Uuid>,
    liked_posts: Vec<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            avatar: r.avatar,
            profile: Profile {
                first_name: r.first_name,
                last_name: r.last_name,
                bio: r.bio,
            },
            followers: r.followers,
            following: r.following,
            posts: r.posts,
            liked_posts: r.liked_posts,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    author_username: String,
    author_avatar: Option<String>,
    content: String,
    image_url: Option<String>,
    tags: Vec<String>,
    category: PostCategory,
    liked_by: Vec<Uuid>,
    comments: Vec<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Self {
        Post {
            id: r.id,
            author: AuthorRef {
                id: r.author_id,
                username: r.author_username,
                avatar: r.author_avatar,
            },
            content: r.content,
            image_url: r.image_url,
            liked_by: r.liked_by,
            comments: r.comments,
            tags: r.tags,
            category: r.category,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    author_username: String,
    author_avatar: Option<String>,
    content: String,
    liked_by: Vec<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(FromRow)]
struct ReplyRow {
    id: Uuid,
    comment_id: Uuid,
    author_id: Uuid,
    author_username: String,
    author_avatar: Option<String>,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// PostgreSQL-backed store. Migrations run on connect.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("migrations applied");

        Ok(Self { pool })
    }

    #[cfg(test)]
    fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the parent row until the transaction ends. Toggles on the same
    /// parent run one after another and the row cannot be deleted meanwhile;
    /// `NO KEY` leaves plain foreign-key inserts from other sessions unblocked.
    async fn lock_row(
        tx: &mut Transaction<'_, Postgres>,
        table: &'static str,
        id: Uuid,
    ) -> StoreResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = $1 FOR NO KEY UPDATE", table);
        let found = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .is_some();
        Ok(found)
    }

    async fn load_comments(&self, rows: Vec<CommentRow>) -> StoreResult<Vec<Comment>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let replies = sqlx::query_as::<_, ReplyRow>(
            r#"
            SELECT r.id, r.comment_id, r.author_id, u.username AS author_username,
                   u.avatar AS author_avatar, r.content, r.created_at
            FROM comment_replies r
            JOIN users u ON u.id = r.author_id
            WHERE r.comment_id = ANY($1)
            ORDER BY r.created_at, r.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let comments = rows
            .into_iter()
            .map(|c| {
                let replies = replies
                    .iter()
                    .filter(|r| r.comment_id == c.id)
                    .map(|r| Reply {
                        id: r.id,
                        author: AuthorRef {
                            id: r.author_id,
                            username: r.author_username.clone(),
                            avatar: r.author_avatar.clone(),
                        },
                        content: r.content.clone(),
                        created_at: r.created_at,
                    })
                    .collect();

                Comment {
                    id: c.id,
                    post_id: c.post_id,
                    author: AuthorRef {
                        id: c.author_id,
                        username: c.author_username,
                        avatar: c.author_avatar,
                    },
                    content: c.content,
                    liked_by: c.liked_by,
                    replies,
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                }
            })
            .collect();

        Ok(comments)
    }
}

/// Maps constraint violations onto the store's own error kinds.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let msg = match db.constraint() {
                Some("users_username_key") => "Username already exists",
                Some("users_email_key") => "Email already exists",
                _ => "User already exists",
            };
            return StoreError::Duplicate(msg.to_string());
        }
        if db.is_check_violation() && db.constraint() == Some("follows_no_self") {
            return StoreError::SelfFollow;
        }
    }
    StoreError::Database(err)
}

/// Escapes LIKE wildcards so the query is matched literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl SocialStore for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let now = chrono::Utc::now();
        let user_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, bio, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user_id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.profile.first_name)
        .bind(&new.profile.last_name)
        .bind(&new.profile.bio)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.find_user(user_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("{} WHERE u.id = $1", USER_SELECT);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("{} WHERE u.email = $1", USER_SELECT);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("{} ORDER BY u.created_at, u.id", USER_SELECT);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE u.id = ANY($1)", USER_SELECT);
        let mut users: Vec<User> = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::from)
            .collect();

        users.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
        Ok(users)
    }

    async fn search_users(&self, query: &str, limit: i64) -> StoreResult<Vec<User>> {
        let sql = format!(
            r#"{}
            WHERE u.username ILIKE $1 OR u.first_name ILIKE $1 OR u.last_name ILIKE $1
            ORDER BY u.username
            LIMIT $2
            "#,
            USER_SELECT
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(like_pattern(query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let replace_profile = update.profile.is_some();
        let profile = update.profile.unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = CASE WHEN $4 THEN $5 ELSE first_name END,
                last_name = CASE WHEN $4 THEN $6 ELSE last_name END,
                bio = CASE WHEN $4 THEN $7 ELSE bio END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(replace_profile)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.bio)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn set_avatar(&self, id: Uuid, avatar: &str) -> StoreResult<Option<User>> {
        let result = sqlx::query("UPDATE users SET avatar = $1, updated_at = NOW() WHERE id = $2")
            .bind(avatar)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
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

        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, "users", followee_id).await? {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        let removed = if change == FollowChange::Follow {
            false
        } else {
            sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id)
                .bind(followee_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                > 0
        };

        let following = match change {
            FollowChange::Unfollow => false,
            FollowChange::Toggle if removed => false,
            FollowChange::Follow | FollowChange::Toggle => {
                sqlx::query(
                    r#"
                    INSERT INTO follows (follower_id, following_id, created_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (follower_id, following_id) DO NOTHING
                    "#,
                )
                .bind(follower_id)
                .bind(followee_id)
                .bind(chrono::Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
                true
            }
        };

        tx.commit().await?;

        Ok(following)
    }

    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> StoreResult<bool> {
        let found = sqlx::query("SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        Ok(found)
    }

    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let now = chrono::Utc::now();
        let post_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, content, image_url, tags, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(post_id)
        .bind(new.author_id)
        .bind(&new.content)
        .bind(&new.image_url)
        .bind(&new.tags)
        .bind(new.category)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_post(post_id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!("{} WHERE p.id = $1", POST_SELECT);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }

    async fn list_posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let sql = format!(
            r#"{}
            WHERE ($1::post_category IS NULL OR p.category = $1)
              AND ($2::text IS NULL OR $2 = ANY(p.tags))
            ORDER BY p.created_at DESC, p.id
            LIMIT $3 OFFSET $4
            "#,
            POST_SELECT
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(query.category)
            .bind(&query.tag)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn posts_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "{} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id",
            POST_SELECT
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn toggle_post_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, "posts", post_id).await? {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query(
                r#"
                INSERT INTO post_likes (post_id, user_id, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (post_id, user_id) DO NOTHING
                "#,
            )
            .bind(post_id)
            .bind(user_id)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(!removed))
    }

    async fn add_comment(&self, new: NewComment) -> StoreResult<Option<Comment>> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, "posts", new.post_id).await? {
            return Ok(None);
        }

        let now = chrono::Utc::now();
        let comment_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment_id)
        .bind(new.post_id)
        .bind(new.author_id)
        .bind(&new.content)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_comment(comment_id).await
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let sql = format!("{} WHERE c.id = $1", COMMENT_SELECT);
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.load_comments(rows).await?.into_iter().next())
    }

    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE c.post_id = ANY($1) ORDER BY c.created_at, c.id",
            COMMENT_SELECT
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_ids)
            .fetch_all(&self.pool)
            .await?;
        self.load_comments(rows).await
    }

    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, "comments", comment_id).await? {
            return Ok(None);
        }

        let removed =
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
                .bind(comment_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                > 0;

        if !removed {
            sqlx::query(
                r#"
                INSERT INTO comment_likes (comment_id, user_id, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (comment_id, user_id) DO NOTHING
                "#,
            )
            .bind(comment_id)
            .bind(user_id)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(!removed))
    }

    async fn add_reply(
        &self,
        comment_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<Comment>> {
        let mut tx = self.pool.begin().await?;

        if !Self::lock_row(&mut tx, "comments", comment_id).await? {
            return Ok(None);
        }

        sqlx::query(
            r#"
            INSERT INTO comment_replies (id, comment_id, author_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(comment_id)
        .bind(author_id)
        .bind(content)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE comments SET updated_at = NOW() WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.find_comment(comment_id).await
    }

    async fn clear_all(&self) -> StoreResult<()> {
        sqlx::query(
            "TRUNCATE comment_replies, comment_likes, comments, post_likes, posts, follows, users",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The `sqlx::test` cases below need DATABASE_URL pointing at a Postgres
    // server; each one runs in a fresh database with the migrations applied.

    async fn user(store: &PgStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: "hash".to_string(),
                profile: Profile::default(),
            })
            .await
            .unwrap()
    }

    async fn post(store: &PgStore, author: Uuid, category: PostCategory, tags: &[&str]) -> Post {
        store
            .create_post(NewPost {
                author_id: author,
                content: "Camel coat over a grey knit".to_string(),
                image_url: None,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                category,
            })
            .await
            .unwrap()
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("an"), "%an%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn follow_toggled_twice_restores_both_sides(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let anna = user(&store, "anna").await;
        let james = user(&store, "james").await;

        assert!(store
            .set_follow(anna.id, james.id, FollowChange::Toggle)
            .await
            .unwrap());
        let james_now = store.find_user(james.id).await.unwrap().unwrap();
        assert_eq!(james_now.followers, vec![anna.id]);
        let anna_now = store.find_user(anna.id).await.unwrap().unwrap();
        assert_eq!(anna_now.following, vec![james.id]);

        assert!(!store
            .set_follow(anna.id, james.id, FollowChange::Toggle)
            .await
            .unwrap());
        let james_now = store.find_user(james.id).await.unwrap().unwrap();
        assert_eq!(james_now.followers_count(), 0);
        let anna_now = store.find_user(anna.id).await.unwrap().unwrap();
        assert_eq!(anna_now.following_count(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn follow_and_unfollow_are_idempotent(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let a = user(&store, "anna").await;
        let b = user(&store, "james").await;

        store.set_follow(a.id, b.id, FollowChange::Follow).await.unwrap();
        store.set_follow(a.id, b.id, FollowChange::Follow).await.unwrap();
        let b_now = store.find_user(b.id).await.unwrap().unwrap();
        assert_eq!(b_now.followers_count(), 1);

        store.set_follow(a.id, b.id, FollowChange::Unfollow).await.unwrap();
        store.set_follow(a.id, b.id, FollowChange::Unfollow).await.unwrap();
        assert!(!store.is_following(a.id, b.id).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn self_follow_is_rejected(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let anna = user(&store, "anna").await;

        let err = store
            .set_follow(anna.id, anna.id, FollowChange::Toggle)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SelfFollow));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn self_follow_row_violates_the_check(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let anna = user(&store, "anna").await;

        let err = sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES ($1, $1)")
            .bind(anna.id)
            .execute(&store.pool)
            .await
            .unwrap_err();
        assert!(matches!(map_db_error(err), StoreError::SelfFollow));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_email_and_username_are_reported(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        user(&store, "anna").await;

        let err = store
            .create_user(NewUser {
                username: "anna_two".to_string(),
                email: "anna@example.com".to_string(),
                password_hash: "hash".to_string(),
                profile: Profile::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref msg) if msg == "Email already exists"));

        let err = store
            .create_user(NewUser {
                username: "anna".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "hash".to_string(),
                profile: Profile::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref msg) if msg == "Username already exists"));

        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn like_twice_returns_to_unliked(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id, PostCategory::Outfit, &[]).await;

        assert_eq!(store.toggle_post_like(p.id, fan.id).await.unwrap(), Some(true));
        let liked = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(liked.liked_by, vec![fan.id]);

        assert_eq!(store.toggle_post_like(p.id, fan.id).await.unwrap(), Some(false));
        let unliked = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(unliked.likes(), 0);

        assert_eq!(
            store.toggle_post_like(Uuid::new_v4(), fan.id).await.unwrap(),
            None
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_like_toggles_serialize(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id, PostCategory::Outfit, &[]).await;

        let (first, second) = tokio::join!(
            store.toggle_post_like(p.id, fan.id),
            store.toggle_post_like(p.id, fan.id)
        );
        assert_ne!(first.unwrap(), second.unwrap());

        let after = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(after.likes(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn comment_on_missing_post_writes_nothing(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let fan = user(&store, "fan").await;

        let added = store
            .add_comment(NewComment {
                post_id: Uuid::new_v4(),
                author_id: fan.id,
                content: "hello?".to_string(),
            })
            .await
            .unwrap();
        assert!(added.is_none());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn comments_replies_and_likes_round_out(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let author = user(&store, "author").await;
        let fan = user(&store, "fan").await;
        let p = post(&store, author.id, PostCategory::Accessory, &[]).await;

        let comment = store
            .add_comment(NewComment {
                post_id: p.id,
                author_id: fan.id,
                content: "Where is the bag from?".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(comment.author.username, "fan");

        let replied = store
            .add_reply(comment.id, author.id, "A flea market")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replied.replies.len(), 1);
        assert_eq!(replied.replies[0].author.username, "author");

        assert_eq!(
            store.toggle_comment_like(comment.id, author.id).await.unwrap(),
            Some(true)
        );
        let post_now = store.find_post(p.id).await.unwrap().unwrap();
        assert_eq!(post_now.comments, vec![comment.id]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_posts_filters_by_category_and_tag(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let author = user(&store, "author").await;
        post(&store, author.id, PostCategory::Outfit, &["work"]).await;
        post(&store, author.id, PostCategory::StylingTips, &["tailoring"]).await;

        let all = store
            .list_posts(&PostQuery {
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let tips = store
            .list_posts(&PostQuery {
                category: Some(PostCategory::StylingTips),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].category, PostCategory::StylingTips);

        let tagged = store
            .list_posts(&PostQuery {
                tag: Some("work".to_string()),
                limit: 20,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].tags, vec!["work"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn search_matches_names_case_insensitively(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        user(&store, "anna").await;
        user(&store, "james").await;

        let found = store.search_users("AN", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "anna");

        assert!(store.search_users("%", 20).await.unwrap().is_empty());
    }
}

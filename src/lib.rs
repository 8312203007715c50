use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod assets;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod extract;
pub mod follows;
pub mod posts;
pub mod response;
pub mod seed;
pub mod store;
pub mod users;

use config::settings::{Settings, StoreKind};
use store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub settings: Settings,
}

impl FromRef<AppState> for Store {
    fn from_ref(app_state: &AppState) -> Store {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fashion_fusion_backend=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Opens the backend selected by `STORE`.
pub async fn connect_store(settings: &Settings) -> anyhow::Result<Store> {
    let store: Store = match settings.store {
        StoreKind::Postgres => {
            let url = settings
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            Arc::new(PgStore::connect(url, settings.database_max_connections).await?)
        }
        StoreKind::Memory => {
            warn!("using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Credentials cannot be combined with a wildcard origin
    if origins.iter().any(|origin| origin == "*") {
        warn!("CORS_ORIGINS contains `*`; allowing any origin without credentials");
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

pub fn app(state: AppState) -> Router {
    let auth_router = Router::new()
        .route("/register", post(auth::handler::register))
        .route("/login", post(auth::handler::login))
        .route("/me", get(auth::handler::get_me))
        .route("/user/:user_id", get(auth::handler::get_user_by_id));

    let user_router = Router::new()
        .route("/", get(users::handler::list_users))
        .route("/:user_id", get(users::handler::get_user_profile))
        .route("/:user_id/posts", get(posts::handler::get_user_posts))
        .route("/:user_id/follow", post(follows::handler::toggle_follow))
        .route("/:user_id/followers", get(follows::handler::get_followers))
        .route("/:user_id/following", get(follows::handler::get_following))
        .route("/:user_id/avatar", patch(users::handler::update_avatar));

    let post_router = Router::new()
        .route("/", get(posts::handler::get_posts))
        .route("/:id", get(posts::handler::get_post))
        .route("/:id/like", post(posts::handler::like_post))
        .route(
            "/:id/comments",
            post(comments::handler::add_comment).get(comments::handler::get_post_comments),
        );

    let comment_router = Router::new()
        .route("/:id/like", post(comments::handler::like_comment))
        .route("/:id/replies", post(comments::handler::reply_to_comment));

    // Listings first; anything deeper is a file from the same directory
    let outfit_router = Router::new()
        .route("/:try_on_mode", get(assets::handler::list_outfits))
        .fallback_service(ServeDir::new(&state.settings.outfits_dir));

    let model_router = Router::new()
        .route("/", get(assets::handler::list_models))
        .fallback_service(ServeDir::new(&state.settings.models_dir));

    let avatars = ServeDir::new(&state.settings.avatar_dir);
    let item_models = ServeDir::new(&state.settings.model_dir);
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        .route("/", get(|| async { "Fashion Fusion backend is running!" }))
        .route("/addpost", post(posts::handler::create_post))
        .route("/follow/:user_id", post(follows::handler::follow_user))
        .route("/unfollow/:user_id", post(follows::handler::unfollow_user))
        .route("/isFollowing/:user_id", get(follows::handler::is_following))
        .route("/search", get(users::handler::search_users))
        .route("/usersupdate/:user_id", put(users::handler::update_user))
        .route("/change-password", put(users::handler::change_password))
        .route("/glasses", get(assets::handler::list_glasses))
        .nest("/auth", auth_router)
        .nest("/users", user_router)
        .nest("/posts", post_router)
        .nest("/comments", comment_router)
        .nest("/outfits", outfit_router)
        .nest("/models", model_router)
        .nest_service("/avatars", avatars)
        .nest_service("/3dmodel", item_models)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.settings.addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running on http://localhost:{}", state.settings.port);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

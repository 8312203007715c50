use std::env;
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};

/// Which storage backend the server talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub addr: SocketAddr,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub avatar_dir: String,
    /// Per-item 3D assets (eyewear scenes and textures), served at `/3dmodel`.
    pub model_dir: String,
    /// Try-on models listed by `GET /models`.
    pub models_dir: String,
    /// Outfit images, one sub-directory per try-on mode.
    pub outfits_dir: String,
    pub cors_origins: Vec<String>,
}

/// Accepted token lifetime, one hour up to a year.
pub const JWT_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=8760;

impl Settings {
    pub fn from_env() -> Result<Self> {
        let port: u16 = parse_or("PORT", 8080)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let store = match env::var("STORE").ok().as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => bail!("STORE must be `postgres` or `memory`, got `{}`", other),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE=postgres");
        }

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let jwt_ttl_hours = check_ttl(parse_or("JWT_TTL_HOURS", 1)?)?;

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| split_origins(&raw))
            .unwrap_or_else(|_| vec!["http://localhost:5173".to_string()]);

        Ok(Self {
            port,
            addr,
            store,
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            jwt_ttl_hours,
            avatar_dir: env::var("AVATAR_DIR").unwrap_or_else(|_| "avatars".to_string()),
            model_dir: env::var("MODEL_DIR").unwrap_or_else(|_| "3dmodel".to_string()),
            models_dir: env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string()),
            outfits_dir: env::var("OUTFITS_DIR").unwrap_or_else(|_| "outfits".to_string()),
            cors_origins,
        })
    }

    /// In-memory settings with a fixed secret, for tests and local tooling.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            port: 8080,
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store: StoreKind::Memory,
            database_url: None,
            database_max_connections: 5,
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl_hours: 1,
            avatar_dir: "avatars".to_string(),
            model_dir: "3dmodel".to_string(),
            models_dir: "models".to_string(),
            outfits_dir: "outfits".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn check_ttl(hours: i64) -> Result<i64> {
    if !JWT_TTL_RANGE.contains(&hours) {
        bail!(
            "JWT_TTL_HOURS must be between {} and {}, got {}",
            JWT_TTL_RANGE.start(),
            JWT_TTL_RANGE.end(),
            hours
        );
    }
    Ok(hours)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

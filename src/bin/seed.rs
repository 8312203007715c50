use dotenv::dotenv;
use tracing::info;

use fashion_fusion_backend::{config::settings::Settings, connect_store, init_tracing, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let settings = Settings::from_env()?;
    let store = connect_store(&settings).await?;

    let summary = seed::populate(&store).await?;
    info!(
        "seeded {} users, {} posts, {} comments (password: {})",
        summary.users,
        summary.posts,
        summary.comments,
        seed::SEED_PASSWORD
    );

    Ok(())
}

use dotenv::dotenv;

use fashion_fusion_backend::{config::settings::Settings, connect_store, init_tracing, serve, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let settings = Settings::from_env()?;
    let store = connect_store(&settings).await?;

    serve(AppState { store, settings }).await
}

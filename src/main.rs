use studio_api::{app, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::init().await?;
    tracing::info!(store = ?state.config.store, debug = state.config.debug, "state ready");

    app::serve(app::build_app(state)).await
}

pub mod app;
pub mod auth;
pub mod clients;
pub mod config;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod response;
pub mod seed;
pub mod state;
pub mod store;
pub mod users;
pub mod validation;

pub use app::build_app;
pub use state::AppState;

/// Installs the global subscriber; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "studio_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

use std::sync::Arc;

use crate::config::{AppConfig, JwtConfig, StoreBackend};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pg = PgStore::connect(url, config.max_connections).await?;
                pg.migrate().await?;
                Arc::new(pg) as Arc<dyn Store>
            }
            StoreBackend::Memory => {
                tracing::warn!("using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };
        Ok(Self { store, config })
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory state with fixed test JWT settings.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            store: StoreBackend::Memory,
            max_connections: 1,
            debug: false,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
        });
        Self {
            store: Arc::new(MemoryStore::new()),
            config,
        }
    }

    /// Same as [`AppState::fake`] but rendering 500 detail.
    pub fn fake_debug() -> Self {
        let state = Self::fake();
        let mut config = (*state.config).clone();
        config.debug = true;
        Self {
            store: state.store,
            config: Arc::new(config),
        }
    }
}

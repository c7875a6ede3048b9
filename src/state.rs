use std::sync::Arc;

use time::Duration;
use tracing::{info, warn};

use crate::{
    auth::password::CredentialHasher,
    clock::{Clock, SystemClock},
    config::AppConfig,
    db,
    store::{MemoryStore, SqlStore, Store},
};

/// Shared, read-only state. Everything request-scoped lives in the
/// per-request `Context` instead.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub hasher: Arc<CredentialHasher>,
    /// The clock the store was built with. Handlers stamp records from it.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn Store> = match &config.database {
            Some(db_cfg) => {
                let pool = db::connect(db_cfg).await?;
                if let Err(e) = db::migrate(&pool).await {
                    warn!(error = %e, "migration failed; continuing with existing schema");
                }
                info!(max_connections = db_cfg.max_connections, "using postgres store");
                Arc::new(SqlStore::with_clock(pool, &config.auth, clock.clone()))
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                Arc::new(MemoryStore::with_clock(
                    Duration::hours(config.auth.token_ttl_hours),
                    clock.clone(),
                ))
            }
        };
        Ok(Self::from_parts(store, config)?.with_clock(clock))
    }

    pub fn from_parts(store: Arc<dyn Store>, config: AppConfig) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(&config.auth.hasher)?;
        Ok(Self {
            store,
            config: Arc::new(config),
            hasher: Arc::new(hasher),
            clock: Arc::new(SystemClock),
        })
    }

    /// Pass the same clock the store was constructed with.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

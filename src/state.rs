use std::sync::Arc;

use anyhow::Context;
use time::UtcOffset;
use tracing::{info, warn};

use crate::{
    analysis::{gemini::GeminiBridge, AnalysisBridge},
    captures::registry::CaptureRegistry,
    config::{AppConfig, JwtConfig, StoreBackend},
    error::AppError,
    nutrition::DayKey,
    storage::{MemoryStorage, S3Storage, StorageClient},
    store::{
        kv::{FsKeyValueStore, MemoryKeyValueStore},
        local::LocalStore,
        remote::PgStore,
        NutritionStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn NutritionStore>,
    /// `None` until an API key is configured.
    pub analysis: Option<Arc<dyn AnalysisBridge>>,
    /// `None` when no object storage is configured; entries are then logged
    /// without their photo.
    pub storage: Option<Arc<dyn StorageClient>>,
    pub captures: Arc<CaptureRegistry>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn NutritionStore> = match config.store_backend {
            StoreBackend::Local => {
                info!(data_dir = %config.data_dir.display(), "using local store");
                Arc::new(LocalStore::new(Arc::new(FsKeyValueStore::new(
                    config.data_dir.clone(),
                ))))
            }
            StoreBackend::Remote => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the remote store")?;
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let store = PgStore::new(db);
                store.migrate().await?;
                info!("using remote store");
                Arc::new(store)
            }
        };

        let analysis = match &config.analysis {
            Some(cfg) => Some(Arc::new(GeminiBridge::new(
                cfg.api_key.clone(),
                cfg.model.clone(),
                cfg.base_url.clone(),
                cfg.timeout,
            )?) as Arc<dyn AnalysisBridge>),
            None => {
                warn!("no analysis API key configured; photo capture is disabled");
                None
            }
        };

        let storage = match &config.storage {
            Some(cfg) => Some(Arc::new(S3Storage::new(cfg).await?) as Arc<dyn StorageClient>),
            None => None,
        };

        Ok(Self {
            config,
            store,
            analysis,
            storage,
            captures: Arc::new(CaptureRegistry::new()),
        })
    }

    /// Local store over memory, in-memory object storage and no analysis
    /// bridge. Tests swap in what they need.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store_backend: StoreBackend::Local,
            data_dir: "./data".into(),
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
            },
            analysis: None,
            storage: None,
            utc_offset: UtcOffset::UTC,
            host: "127.0.0.1".into(),
            port: 0,
        });

        Self {
            config,
            store: Arc::new(LocalStore::new(Arc::new(MemoryKeyValueStore::new()))),
            analysis: None,
            storage: Some(Arc::new(MemoryStorage::new()) as Arc<dyn StorageClient>),
            captures: Arc::new(CaptureRegistry::new()),
        }
    }

    pub fn today(&self) -> DayKey {
        DayKey::today(self.config.utc_offset)
    }

    pub fn analysis(&self) -> Result<&Arc<dyn AnalysisBridge>, AppError> {
        self.analysis.as_ref().ok_or(AppError::SetupRequired)
    }
}

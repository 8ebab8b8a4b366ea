//! Application state.

use std::sync::Arc;

use transcoder_broker::{BrokerConfig, MessageBusAdapter};
use transcoder_storage::BlobStoreClient;
use transcoder_store::{pool, JobStore, PlaylistStore, PresetStore, StoreConfig};

use crate::config::ApiConfig;
use crate::dispatcher::Dispatcher;
use crate::event_manager::EventManager;
use crate::progress_tracker::ProgressTracker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: JobStore,
    pub presets: PresetStore,
    pub playlists: PlaylistStore,
    pub blob: Arc<BlobStoreClient>,
    pub broker: Arc<MessageBusAdapter>,
    pub events: Arc<EventManager>,
    pub progress: Arc<ProgressTracker>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Create new application state: connect the store pool, run migrations,
    /// connect the broker and declare topology, and construct the blob
    /// client, all before the router starts accepting requests.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store_config = StoreConfig::from_env();
        let pool = pool::create_pool(&store_config).await?;
        pool::run_migrations(&pool).await?;

        let broker = MessageBusAdapter::new(BrokerConfig::from_env());
        broker.connect().await?;
        let broker = Arc::new(broker);

        let blob = Arc::new(BlobStoreClient::from_env().await?);

        let jobs = JobStore::new(pool.clone());
        let presets = PresetStore::new(pool.clone());
        let playlists = PlaylistStore::new(pool);

        let dispatcher = Dispatcher::new(jobs.clone(), presets.clone(), playlists.clone(), Arc::clone(&broker));

        Ok(Self {
            config,
            jobs,
            presets,
            playlists,
            blob,
            broker,
            events: Arc::new(EventManager::new()),
            progress: Arc::new(ProgressTracker::new()),
            dispatcher,
        })
    }
}

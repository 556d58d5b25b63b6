//! Shared state for the HTTP surface

use std::sync::Arc;

use crate::config::Config;
use crate::controller::SessionSettings;
use crate::data_service::{DataService, Subscription};
use crate::defaults::default_characters;
use crate::events::{EventBus, SyncEvent};
use crate::remote::{PgBackend, RemoteBackend};
use crate::storage::{FileStore, LocalStore};

pub struct AppState {
    pub data: Arc<DataService>,
    pub settings: SessionSettings,
    /// Forwards backend change notifications onto `data.events()` as
    /// `CharactersChanged`. The HTTP handlers read the backend directly, so
    /// the forwarded events are for library consumers such as an embedded
    /// `AppController`.
    _realtime: Subscription,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        tracing::info!("Opening local store at {}", config.store_path.display());
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(&config.store_path));

        let remote: Option<Arc<dyn RemoteBackend>> = match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to database...");
                let backend = PgBackend::connect(url, config.realtime_channel.clone()).await?;
                backend.seed_characters(&default_characters()).await?;
                Some(Arc::new(backend))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, running in local-only mode");
                None
            }
        };

        let data = Arc::new(DataService::new(store, remote, EventBus::new()));
        data.set_deadline(config.deadline);

        let events = data.events().clone();
        let realtime = data
            .subscribe_to_votes(move || events.publish(SyncEvent::CharactersChanged))
            .await;

        Ok(Self {
            data,
            settings: config.session_settings(),
            _realtime: realtime,
        })
    }

    pub fn from_parts(data: Arc<DataService>, settings: SessionSettings) -> Self {
        Self {
            data,
            settings,
            _realtime: Subscription::noop(),
        }
    }
}

//! Process composition: one constructor wires the store, cache, client,
//! writer, sweepers and HTTP surface; one `run` drives them until the shared
//! cancellation signal fires.

use crate::{AppState, router};
use eventdb_client::HttpSchedulerClient;
use eventdb_core::{
    Config, EventCache, EventStore, EventWriter, ExpirySweeper, SchedulerClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] eventdb_core::StoreError),

    #[error(transparent)]
    Client(#[from] eventdb_core::ClientError),

    #[error("HTTP server error: {0}")]
    Http(#[from] std::io::Error),
}

/// Owns the components and the single start/stop surface of the service.
pub struct EventService {
    config: Config,
    cache: Arc<EventCache>,
    store: Arc<dyn EventStore>,
    client: Arc<dyn SchedulerClient>,
}

impl EventService {
    /// Connect the store and build every component. Fails fast on an
    /// unreachable database or a malformed upstream authority.
    pub async fn new(config: Config) -> Result<Self, ServiceError> {
        tracing::info!(
            upstream = %config.upstream.host,
            db_host = %config.storage.host,
            db_port = config.storage.effective_port(),
            db_name = %config.storage.name,
            db_user = %config.storage.user,
            "starting event service"
        );
        let store = Arc::new(eventdb_store::DbEventStore::connect(&config.storage).await?);
        let client = Arc::new(HttpSchedulerClient::new(config.upstream.host.clone())?);
        Ok(Self {
            config,
            cache: Arc::new(EventCache::new()),
            store,
            client,
        })
    }

    /// Run the four background loops and serve HTTP until `cancel` fires;
    /// returns once all of them have exited.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let cache_sweep = tokio::spawn(self.cache.clone().run_sweep(
            self.config.period.cache_sweep,
            self.config.retention.completed_app_age,
            cancel.child_token(),
        ));

        let sweeper = ExpirySweeper::new(
            self.store.clone(),
            self.config.period.expiry_sweep,
            self.config.retention.row_age,
        );
        let sweeper_task = tokio::spawn(sweeper.run(cancel.child_token()));

        let writer = EventWriter::new(self.store.clone(), self.client.clone(), self.cache.clone())
            .with_fetch_period(self.config.period.fetch);
        let writer_cancel = cancel.child_token();
        let writer_task = tokio::spawn(async move {
            // a fatal store inconsistency stops the writer but leaves the
            // query surface up; recovery requires operator action
            if let Err(err) = writer.run(writer_cancel).await {
                tracing::error!(error = %err, "event writer terminated");
            }
        });

        let state = AppState {
            cache: self.cache.clone(),
            store: self.store.clone(),
            cancel: cancel.child_token(),
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.rest.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "query service listening");
        let http_cancel = cancel.child_token();
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { http_cancel.cancelled().await })
            .await?;

        let _ = tokio::join!(writer_task, sweeper_task, cache_sweep);
        tracing::info!("event service stopped");
        Ok(())
    }
}

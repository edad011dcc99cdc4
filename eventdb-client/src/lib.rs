//! eventdb-client - HTTP access to the scheduler's event batch endpoint.
//!
//! The client is stateless: it turns one `start` identifier into one decoded
//! [`EventBatch`] or a structured error. Identifier bookkeeping belongs to
//! the writer.

use async_trait::async_trait;
use eventdb_core::{ClientError, EventBatch, SchedulerClient, UpstreamError};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BATCH_PATH: &str = "/ws/v1/events/batch";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the scheduler's `GET /ws/v1/events/batch` endpoint.
pub struct HttpSchedulerClient {
    host: String,
    http: reqwest::Client,
}

impl HttpSchedulerClient {
    /// Build a client against the given `host:port` authority with default
    /// HTTP timeouts.
    pub fn new(host: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeouts(host, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        host: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            host: host.into(),
            http,
        })
    }

    fn batch_url(&self, start_id: u64) -> String {
        format!("http://{}{}?start={}", self.host, BATCH_PATH, start_id)
    }

    async fn fetch(&self, start_id: u64) -> Result<EventBatch, ClientError> {
        let response = self
            .http
            .get(self.batch_url(start_id))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(code = status.as_u16(), "HTTP status from the scheduler was not OK");
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            // attempt to decode the body as a scheduler error object
            return match serde_json::from_slice::<UpstreamError>(&body) {
                Ok(upstream) => Err(ClientError::Upstream(upstream)),
                Err(_) => Err(ClientError::UnexpectedStatus(status.as_u16())),
            };
        }

        response
            .json::<EventBatch>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn recent_events(
        &self,
        start_id: u64,
        cancel: &CancellationToken,
    ) -> Result<EventBatch, ClientError> {
        // racing the whole request drops the in-flight transfer as soon as
        // the shared signal fires
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.fetch(start_id) => result,
        }
    }
}

//! Tests against an ephemeral fixture server playing the scheduler.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use eventdb_client::HttpSchedulerClient;
use eventdb_core::{
    BOUNDS_SENTINEL, ChangeDetail, ChangeType, ClientError, EventBatch, EventRecord, EventType,
    SchedulerClient, UpstreamError,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
struct BatchQuery {
    start: u64,
}

async fn spawn_fixture(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn sample_batch() -> EventBatch {
    EventBatch {
        instance_uuid: "uuid-1".to_string(),
        lowest_id: 3,
        highest_id: 4,
        event_records: vec![
            EventRecord {
                event_type: EventType::App,
                object_id: "app-1".to_string(),
                reference_id: "root.default".to_string(),
                message: "Application added".to_string(),
                timestamp_nano: 1_700_000_000_000_000_000,
                change_type: ChangeType::Add,
                change_detail: ChangeDetail::DetailsNone,
                resource: None,
            },
            EventRecord {
                event_type: EventType::App,
                object_id: "app-1".to_string(),
                reference_id: String::new(),
                message: String::new(),
                timestamp_nano: 1_700_000_000_000_000_001,
                change_type: ChangeType::Set,
                change_detail: ChangeDetail::AppRunning,
                resource: None,
            },
        ],
    }
}

#[tokio::test]
async fn decodes_batch_on_ok() {
    let router = Router::new().route(
        "/ws/v1/events/batch",
        get(|| async { Json(sample_batch()) }),
    );
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let batch = client.recent_events(3, &CancellationToken::new()).await.unwrap();

    assert_eq!(batch, sample_batch());
}

#[tokio::test]
async fn sentinel_start_reaches_the_wire_unchanged() {
    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/ws/v1/events/batch",
            get(
                |State(seen): State<Arc<Mutex<Vec<u64>>>>, Query(query): Query<BatchQuery>| async move {
                    seen.lock().unwrap().push(query.start);
                    Json(EventBatch {
                        instance_uuid: "uuid-1".to_string(),
                        lowest_id: 100,
                        highest_id: 105,
                        event_records: Vec::new(),
                    })
                },
            ),
        )
        .with_state(seen.clone());
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let batch = client.recent_events(BOUNDS_SENTINEL, &CancellationToken::new()).await.unwrap();

    assert_eq!(seen.lock().unwrap().as_slice(), [u64::MAX]);
    assert!(batch.event_records.is_empty());
    assert_eq!(batch.lowest_id, 100);
}

#[tokio::test]
async fn non_ok_with_scheduler_error_body() {
    let router = Router::new().route(
        "/ws/v1/events/batch",
        get(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(UpstreamError {
                    status_code: 400,
                    message: "Event tracking is disabled".to_string(),
                    description: "Event tracking is disabled".to_string(),
                }),
            )
        }),
    );
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let err = client.recent_events(0, &CancellationToken::new()).await.unwrap_err();

    match err {
        ClientError::Upstream(upstream) => {
            assert_eq!(upstream.status_code, 400);
            assert_eq!(upstream.message, "Event tracking is disabled");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_ok_without_decodable_body() {
    let router = Router::new().route(
        "/ws/v1/events/batch",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "busy").into_response() }),
    );
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let err = client.recent_events(0, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ClientError::UnexpectedStatus(500)));
}

#[tokio::test]
async fn malformed_ok_body_is_a_decode_error() {
    let router = Router::new().route(
        "/ws/v1/events/batch",
        get(|| async { "{\"instanceUUID\": " }),
    );
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let err = client.recent_events(0, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn cancellation_aborts_an_in_flight_request() {
    // the fixture never answers; only cancellation can end the call
    let router = Router::new().route(
        "/ws/v1/events/batch",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Json(sample_batch())
        }),
    );
    let addr = spawn_fixture(router).await;

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let cancel = CancellationToken::new();
    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let err = client.recent_events(0, &cancel).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    canceller.await.unwrap();
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    // bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpSchedulerClient::new(addr.to_string()).unwrap();
    let err = client.recent_events(0, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
}

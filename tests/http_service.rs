//! HTTP contract tests -- run the reqwest client against an in-process axum
//! mock of the load test service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use loadctl::client::{HttpLoadTestService, LoadTestService};
use loadctl::error::{RequestError, SubmissionError};
use loadctl::model::{HttpMethod, ProgressSnapshot, TestConfigDraft, TestId, TestStatus};
use loadctl::workflow::{TestWorkflow, WorkflowState};
use reqwest::Url;
use serde_json::{json, Value};

#[derive(Default)]
struct MockState {
    /// Status and body answered by `POST /tests`.
    create_response: Option<(StatusCode, Value)>,
    created: Mutex<Vec<Value>>,
    updates: Mutex<VecDeque<Value>>,
    update_hits: AtomicUsize,
}

impl MockState {
    fn with_updates(updates: Vec<Value>) -> Self {
        Self {
            updates: Mutex::new(updates.into()),
            ..Self::default()
        }
    }

    fn update_hits(&self) -> usize {
        self.update_hits.load(Ordering::SeqCst)
    }
}

async fn create_test(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.created.lock().unwrap().push(body);
    let (status, resp) = state
        .create_response
        .clone()
        .unwrap_or((StatusCode::CREATED, json!({ "id": "abc-123" })));
    (status, Json(resp))
}

async fn get_update(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state.update_hits.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "abc-123" => {
            let next = state.updates.lock().unwrap().pop_front().unwrap_or(Value::Null);
            Ok(Json(json!({ "update": next })))
        }
        "garbled" => Err((StatusCode::OK, "definitely not json".to_string())),
        _ => Err((StatusCode::NOT_FOUND, "test not found".to_string())),
    }
}

fn record_json(id: &str, status: &str) -> Value {
    json!({
        "ID": 1,
        "CreatedAt": "2025-01-12T10:15:30Z",
        "UpdatedAt": "2025-01-12T10:17:30Z",
        "uuid": id,
        "url": "https://example.com",
        "method": "GET",
        "target_users": 100,
        "reach_peak_after_in_minutes": 2,
        "users_to_start_with": 1,
        "status": status,
        "total_requests": 1200,
        "succeeded_requests": 1150,
        "report": {
            "average_response_time": 0.21,
            "peak_response_time": 1.9,
            "error_rate": 4.16,
            "throughput": 9.58,
            "p_50_percentile": 0.18,
            "p_90_percentile": 0.44,
            "p_99_percentile": 1.2
        }
    })
}

async fn list_tests() -> Json<Value> {
    Json(json!([record_json("abc-123", "DONE"), record_json("def-456", "IN_PROGRESS")]))
}

async fn get_test(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id == "abc-123" {
        Ok(Json(record_json("abc-123", "DONE")))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

fn mock_router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/tests", post(create_test).get(list_tests))
        .route("/tests/{id}", get(get_test))
        .route("/tests/{id}/updates", get(get_update))
        .with_state(state)
}

async fn spawn_mock(state: Arc<MockState>) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mock_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn service(base: Url) -> HttpLoadTestService {
    HttpLoadTestService::new(base, Duration::from_secs(5)).unwrap()
}

fn scenario_a() -> TestConfigDraft {
    TestConfigDraft {
        url: "https://example.com".to_string(),
        method: HttpMethod::Get,
        target_users: 100,
        users_to_start_with: 1,
        reach_peak_after_minutes: 2,
        ..TestConfigDraft::default()
    }
}

#[tokio::test]
async fn test_submit_sends_wire_body_and_returns_id() {
    let state = Arc::new(MockState::default());
    let svc = service(spawn_mock(state.clone()).await);

    let config = scenario_a().validate().unwrap();
    let id = svc.submit(&config).await.unwrap();
    assert_eq!(id, TestId::new("abc-123"));

    let created = state.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0],
        json!({
            "url": "https://example.com",
            "method": "GET",
            "target_users": 100,
            "users_to_start_with": 1,
            "reach_peak_afer_in_minutes": 2
        })
    );
}

#[tokio::test]
async fn test_submit_server_error() {
    let state = Arc::new(MockState {
        create_response: Some((StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "db down" }))),
        ..MockState::default()
    });
    let svc = service(spawn_mock(state.clone()).await);

    let err = svc.submit(&scenario_a().validate().unwrap()).await.unwrap_err();
    assert_eq!(
        err,
        SubmissionError::Request(RequestError::Status {
            code: 500,
            reason: "Internal Server Error".to_string(),
        })
    );
    assert_eq!(err.to_string(), "Error: 500 - Internal Server Error");
    // Exactly one request, no retries.
    assert_eq!(state.created.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_without_id_is_rejected() {
    let state = Arc::new(MockState {
        create_response: Some((StatusCode::CREATED, json!({ "status": "ok" }))),
        ..MockState::default()
    });
    let svc = service(spawn_mock(state).await);

    let err = svc.submit(&scenario_a().validate().unwrap()).await.unwrap_err();
    assert_eq!(err, SubmissionError::MissingId);
}

#[tokio::test]
async fn test_fetch_update_snapshot_then_sentinel() {
    let state = Arc::new(MockState::with_updates(vec![json!({
        "total_numberof_requests": 50,
        "succeeded_requests": 48,
        "failed_requests": 2,
        "target_users": 100
    })]));
    let svc = service(spawn_mock(state.clone()).await);
    let id = TestId::new("abc-123");

    let first = svc.fetch_update(&id).await.unwrap();
    assert_eq!(
        first,
        Some(ProgressSnapshot {
            total_requests: 50,
            succeeded_requests: 48,
            failed_requests: 2,
            target_users: 100,
        })
    );
    assert_eq!(svc.fetch_update(&id).await.unwrap(), None);
    assert_eq!(state.update_hits(), 2);
}

#[tokio::test]
async fn test_fetch_update_errors() {
    let svc = service(spawn_mock(Arc::new(MockState::default())).await);

    let err = svc.fetch_update(&TestId::new("garbled")).await.unwrap_err();
    assert_eq!(err.id, TestId::new("garbled"));
    assert!(matches!(err.cause, RequestError::Decode(_)));

    let err = svc.fetch_update(&TestId::new("missing")).await.unwrap_err();
    assert!(matches!(err.cause, RequestError::Status { code: 404, .. }));
}

#[tokio::test]
async fn test_list_and_get_tests() {
    let svc = service(spawn_mock(Arc::new(MockState::default())).await);

    let tests = svc.list_tests().await.unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0].uuid, "abc-123");
    assert_eq!(tests[1].status, TestStatus::InProgress);

    let record = svc.get_test(&TestId::new("abc-123")).await.unwrap();
    assert_eq!(record.status, TestStatus::Done);
    assert_eq!(record.failed_requests(), 50);
    assert_eq!(record.report.unwrap().p90, 0.44);

    let err = svc.get_test(&TestId::new("nope")).await.unwrap_err();
    assert_eq!(err.operation, "get test");
    assert!(matches!(err.cause, RequestError::Status { code: 404, .. }));
}

#[tokio::test]
async fn test_ping() {
    let svc = service(spawn_mock(Arc::new(MockState::default())).await);
    svc.ping().await.unwrap();

    // Nothing listens on a port we just released.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dead = service(Url::parse(&format!("http://{}", addr)).unwrap());
    let err = dead.ping().await.unwrap_err();
    assert!(matches!(err.cause, RequestError::Transport(_)));
}

#[tokio::test]
async fn test_workflow_end_to_end() {
    let state = Arc::new(MockState::with_updates(vec![
        json!({ "total_numberof_requests": 10, "succeeded_requests": 10, "failed_requests": 0, "target_users": 100 }),
        json!({ "total_numberof_requests": 25, "succeeded_requests": 24, "failed_requests": 1, "target_users": 100 }),
        Value::Null,
    ]));
    let svc = Arc::new(service(spawn_mock(state.clone()).await));

    let mut workflow = TestWorkflow::with_poll_interval(svc, Duration::from_millis(20));
    let id = workflow.submit(scenario_a()).await.unwrap();
    assert_eq!(id, TestId::new("abc-123"));

    let end = tokio::time::timeout(Duration::from_secs(5), workflow.wait_terminal())
        .await
        .expect("workflow did not finish");
    assert_eq!(
        end,
        WorkflowState::Completed {
            id: TestId::new("abc-123"),
            last: Some(ProgressSnapshot {
                total_requests: 25,
                succeeded_requests: 24,
                failed_requests: 1,
                target_users: 100,
            }),
        }
    );

    // No further polling after the sentinel.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(state.update_hits(), 3);
}

#[tokio::test]
async fn test_workflow_submission_failure_starts_no_polling() {
    let state = Arc::new(MockState {
        create_response: Some((StatusCode::INTERNAL_SERVER_ERROR, json!({}))),
        ..MockState::default()
    });
    let svc = Arc::new(service(spawn_mock(state.clone()).await));

    let mut workflow = TestWorkflow::with_poll_interval(svc, Duration::from_millis(20));
    assert!(workflow.submit(scenario_a()).await.is_err());
    match workflow.state() {
        WorkflowState::Failed { message, .. } => assert!(message.contains("500")),
        other => panic!("expected Failed, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.update_hits(), 0);
}

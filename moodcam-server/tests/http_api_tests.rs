use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use moodcam_archive::{Archive, ArchiveError, MemoryArchive};
use moodcam_core::{ArchivedRecord, DetectionConfig, LatestSlot, LatestState, LogEntry, RawDetection};
use moodcam_eye::{spawn_detection_loop, Detector, DetectionLoop, EyeError, Frame, FrameSource};
use moodcam_server::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn record(emotion: &str, second: u32) -> ArchivedRecord {
    ArchivedRecord {
        emotion: emotion.to_string(),
        confidence: 0.9,
        timestamp: format!("2024-03-01 10:{:02}:{:02}", second / 60, second % 60),
        image_url: format!("https://store.example/emotions/{}.jpg", second),
    }
}

fn test_router(latest: LatestSlot, archive: Arc<dyn Archive>) -> Router {
    create_router(AppState::new(latest, archive))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_emotion_before_any_detection() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));

    let response = app
        .oneshot(Request::builder().uri("/emotion").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        r#"{"emotion":"None","confidence":0.0,"time":"00:00:00","image_url":""}"#
    );
}

#[tokio::test]
async fn test_emotion_after_publish() {
    let latest = LatestSlot::new();
    latest.publish(LatestState::from(&record("happy", 5)));
    let app = test_router(latest, Arc::new(MemoryArchive::new()));

    let (status, json) = get_json(app, "/emotion").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["emotion"], "happy");
    assert_eq!(json["confidence"], 0.9);
    assert_eq!(json["timestamp"], "2024-03-01 10:00:05");
    assert_eq!(json["image_url"], "https://store.example/emotions/5.jpg");
}

#[tokio::test]
async fn test_logs_newest_first_and_capped() {
    let records: Vec<_> = (0..150).map(|i| record("neutral", i)).collect();
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::with_records(records)));

    let (status, json) = get_json(app.clone(), "/emotion-logs").await;
    assert_eq!(status, StatusCode::OK);
    let logs = json.as_array().unwrap();
    assert_eq!(logs.len(), 100);
    assert_eq!(logs[0]["timestamp"], "2024-03-01 10:02:29");
    for pair in logs.windows(2) {
        assert!(pair[0]["timestamp"].as_str().unwrap() >= pair[1]["timestamp"].as_str().unwrap());
    }

    let (_, json) = get_json(app.clone(), "/emotion-logs?limit=500").await;
    assert_eq!(json.as_array().unwrap().len(), 100);

    let (_, json) = get_json(app.clone(), "/emotion-logs?limit=0").await;
    assert_eq!(json.as_array().unwrap().len(), 100);

    let (_, json) = get_json(app, "/emotion-logs?limit=3").await;
    let logs = json.as_array().unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[2]["timestamp"], "2024-03-01 10:02:27");
}

/// Log store whose query hands back fixed rows, in whatever order it likes.
struct FixedRows(Vec<Value>);

#[async_trait]
impl Archive for FixedRows {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn upload_image(&self, _local_path: &std::path::Path) -> Result<String, ArchiveError> {
        Err(ArchiveError::Storage("read-only".to_string()))
    }

    async fn insert_record(&self, _record: &ArchivedRecord) -> Result<(), ArchiveError> {
        Err(ArchiveError::Storage("read-only".to_string()))
    }

    async fn recent_records(&self, _limit: usize) -> Result<Vec<LogEntry>, ArchiveError> {
        Ok(self
            .0
            .iter()
            .map(|row| serde_json::from_value(row.clone()).unwrap())
            .collect())
    }
}

#[tokio::test]
async fn test_logs_pass_store_rows_through() {
    let older = serde_json::json!({
        "id": 6,
        "created_at": "2024-03-01T10:00:01+00:00",
        "emotion": "sad",
        "confidence": 0.88,
        "timestamp": "2024-03-01 10:00:01",
        "image_url": null
    });
    let newer = serde_json::json!({
        "id": 7,
        "created_at": "2024-03-01T10:00:09+00:00",
        "emotion": "happy",
        "confidence": 0.91,
        "timestamp": "2024-03-01 10:00:09",
        "image_url": "https://store.example/emotions/7.jpg"
    });
    let archive = Arc::new(FixedRows(vec![older.clone(), newer.clone()]));
    let app = test_router(LatestSlot::new(), archive);

    let (status, json) = get_json(app.clone(), "/emotion-logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([newer, older]));

    let (_, json) = get_json(app, "/emotion-logs?limit=1").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], 7);
}

#[tokio::test]
async fn test_logs_empty_store() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));
    let (status, json) = get_json(app, "/emotion-logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_logs_respect_configured_limit() {
    let records: Vec<_> = (0..20).map(|i| record("sad", i)).collect();
    let state = AppState::new(LatestSlot::new(), Arc::new(MemoryArchive::with_records(records)))
        .with_log_limit(5);
    let (_, json) = get_json(create_router(state), "/emotion-logs?limit=50").await;
    assert_eq!(json.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_logs_store_failure() {
    let archive = Arc::new(MemoryArchive::new());
    archive.set_fail_queries(true);
    let app = test_router(LatestSlot::new(), archive);

    let (status, json) = get_json(app, "/emotion-logs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("log store unavailable"));
}

#[tokio::test]
async fn test_logs_invalid_limit_rejected() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));
    let (status, _) = get_json(app, "/emotion-logs?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/emotion")
                .header("origin", "http://dashboard.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));
    let response = app
        .oneshot(Request::builder().uri("/emotions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_without_loop() {
    let app = test_router(LatestSlot::new(), Arc::new(MemoryArchive::new()));
    let (status, json) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"status": "ok", "detection_loop": "stopped"}));
}

struct IdleCamera;

impl FrameSource for IdleCamera {
    fn read_frame(&mut self) -> Result<Frame, EyeError> {
        std::thread::sleep(Duration::from_millis(2));
        Ok(Frame::solid(4, 4, [0, 0, 0]))
    }
}

struct BlindDetector;

impl Detector for BlindDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>, EyeError> {
        Ok(Vec::new())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_tracks_loop() {
    let scratch = tempfile::tempdir().unwrap();
    let config = DetectionConfig {
        scratch_dir: scratch.path().to_path_buf(),
        ..DetectionConfig::default()
    };
    let latest = LatestSlot::new();
    let archive: Arc<dyn Archive> = Arc::new(MemoryArchive::new());
    let detection = DetectionLoop::new(
        IdleCamera,
        BlindDetector,
        archive.clone(),
        latest.clone(),
        tokio::runtime::Handle::current(),
        &config,
    );
    let handle = spawn_detection_loop(detection).unwrap();

    let app = create_router(AppState::new(latest, archive).with_loop_status(handle.status()));

    let (_, json) = get_json(app.clone(), "/health").await;
    assert_eq!(json["detection_loop"], "running");

    handle.stop();
    tokio::task::spawn_blocking(move || handle.join())
        .await
        .unwrap()
        .unwrap();

    let (_, json) = get_json(app, "/health").await;
    assert_eq!(json["detection_loop"], "stopped");
}

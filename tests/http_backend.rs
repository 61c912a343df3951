//! HTTP backend against a mock extraction service.

use std::time::Duration;

use media_downloader::downloader::errors::ArtifactError;
use media_downloader::downloader::traits::InfoExtractor;
use media_downloader::{
    ClientConfig, ExtractionError, FailureReason, HttpBackend, JobState, Session,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_inactivity_timeout(Duration::from_secs(5))
}

fn extract_body() -> serde_json::Value {
    json!({
        "id": "x",
        "title": "Sample clip",
        "thumbnail": "https://img/x.jpg",
        "duration": 29.6,
        "formats": [],
        "download_options": [
            {
                "label": "1280x720 MP4",
                "resolution": "1280x720",
                "ext": "mp4",
                "format_id": "f2",
                "filesize": 5242880
            },
            {
                "label": "1920x1080 MP4",
                "resolution": "1920x1080",
                "ext": "mp4",
                "format_id": "f1",
                "fps": 30.0
            },
            {"label": "1920x1080 WEBM", "resolution": "1920x1080", "ext": "webm", "format_id": "f3"}
        ]
    })
}

async fn mount_extract(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/extract"))
        .and(body_json(json!({"url": "https://video/x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(extract_body()))
        .mount(server)
        .await;
}

async fn mount_progress(server: &MockServer, format_id: &str, events: &[&str]) {
    let body: String = events
        .iter()
        .map(|event| format!("data: {}\n\n", event))
        .collect();

    Mock::given(method("GET"))
        .and(path("/download/progress"))
        .and(query_param("url", "https://video/x"))
        .and(query_param("format_id", format_id))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn extract_returns_ranked_metadata() {
    init_tracing();
    let server = MockServer::start().await;
    mount_extract(&server).await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let metadata = backend.extract("  https://video/x ").await.unwrap();

    assert_eq!(metadata.title, "Sample clip");
    assert_eq!(metadata.duration_seconds, Some(30));
    assert_eq!(metadata.thumbnail_url.as_deref(), Some("https://img/x.jpg"));

    let ids: Vec<&str> = metadata.renditions.iter().map(|r| r.format_id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f3", "f2"]);
    assert_eq!(metadata.renditions[2].size_label().as_deref(), Some("5.0 MB"));
}

#[tokio::test]
async fn extract_surfaces_server_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Unsupported URL"})),
        )
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let err = backend.extract("https://video/x").await.unwrap_err();

    match err {
        ExtractionError::Rejected { status, detail, .. } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Unsupported URL");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn extract_rejects_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "no options"})))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let err = backend.extract("https://video/x").await.unwrap_err();

    assert!(matches!(err, ExtractionError::MalformedPayload { .. }));
}

#[tokio::test]
async fn empty_url_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(extract_body()))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = Session::with_http(&config_for(&server)).unwrap();
    session.set_url("   ");

    assert!(session.run_extraction().await.unwrap().is_none());
    assert!(session.metadata().is_none());
}

#[tokio::test]
async fn session_downloads_through_progress_stream() {
    init_tracing();
    let server = MockServer::start().await;
    mount_extract(&server).await;
    mount_progress(&server, "f1", &["started", "12.5", "47.0", "done:job-9"]).await;

    let mut session = Session::with_http(&config_for(&server)).unwrap();
    session.set_url("https://video/x");
    session.run_extraction().await.unwrap();

    let catalog = session.catalog();
    let containers: Vec<&str> = catalog.containers().collect();
    assert_eq!(containers, vec!["mp4", "webm"]);
    assert_eq!(catalog.group("mp4").unwrap().best().unwrap().format_id, "f1");

    session.start_download("f1").await.unwrap();
    let job = session.wait_for_download().await.unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.progress_percent, 47.0);
    assert_eq!(
        session.artifact_location().unwrap().as_str(),
        format!("{}/download/job-9", server.uri())
    );
}

#[tokio::test]
async fn stream_ending_early_is_connection_lost() {
    let server = MockServer::start().await;
    mount_extract(&server).await;
    mount_progress(&server, "f2", &["started", "80"]).await;

    let mut session = Session::with_http(&config_for(&server)).unwrap();
    session.set_url("https://video/x");
    session.run_extraction().await.unwrap();

    session.start_download("f2").await.unwrap();
    let job = session.wait_for_download().await.unwrap();

    assert_eq!(job.failure(), Some(&FailureReason::ConnectionLost));
    assert_eq!(job.progress_percent, 80.0);
    assert!(session.artifact_location().is_none());
}

#[tokio::test]
async fn server_error_payload_fails_job() {
    let server = MockServer::start().await;
    mount_extract(&server).await;
    mount_progress(&server, "f3", &["started", "error: ffmpeg exited"]).await;

    let mut session = Session::with_http(&config_for(&server)).unwrap();
    session.set_url("https://video/x");
    session.run_extraction().await.unwrap();

    session.start_download("f3").await.unwrap();
    let job = session.wait_for_download().await.unwrap();

    assert_eq!(
        job.failure(),
        Some(&FailureReason::ServerError {
            detail: Some("ffmpeg exited".to_string())
        })
    );
}

#[tokio::test]
async fn slow_progress_stream_times_out() {
    let server = MockServer::start().await;
    mount_extract(&server).await;
    Mock::given(method("GET"))
        .and(path("/download/progress"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("data: started\n\n")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server).with_inactivity_timeout(Duration::from_millis(200));
    let mut session = Session::with_http(&config).unwrap();
    session.set_url("https://video/x");
    session.run_extraction().await.unwrap();

    session.start_download("f1").await.unwrap();
    let job = session.wait_for_download().await.unwrap();

    assert_eq!(job.failure(), Some(&FailureReason::InactivityTimeout));
}

#[tokio::test]
async fn save_artifact_uses_content_disposition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/job-9"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"Sample clip.mp4\"")
                .set_body_bytes(b"fake video bytes".to_vec()),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let saved = backend.save_artifact_to("job-9", dir.path()).await.unwrap();

    assert_eq!(saved, dir.path().join("Sample clip.mp4"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"fake video bytes");
}

#[tokio::test]
async fn save_artifact_keeps_earlier_files() {
    let server = MockServer::start().await;
    for (job_id, body) in [("job-a", &b"AAAA"[..]), ("job-b", &b"BB"[..])] {
        Mock::given(method("GET"))
            .and(path(format!("/download/{}", job_id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"clip.mp4\"")
                    .set_body_bytes(body.to_vec()),
            )
            .mount(&server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let first = backend.save_artifact_to("job-a", dir.path()).await.unwrap();
    let second = backend.save_artifact_to("job-b", dir.path()).await.unwrap();

    assert_eq!(first, dir.path().join("clip.mp4"));
    assert_eq!(second, dir.path().join("clip (1).mp4"));
    assert_eq!(std::fs::read(&first).unwrap(), b"AAAA");
    assert_eq!(std::fs::read(&second).unwrap(), b"BB");
}

#[tokio::test]
async fn save_artifact_falls_back_to_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server).with_output_dir(dir.path().join("nested"));
    let backend = HttpBackend::new(&config).unwrap();
    let saved = backend.save_artifact("job-7").await.unwrap();

    assert_eq!(saved, dir.path().join("nested").join("job-7"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"abc");
}

#[tokio::test]
async fn save_artifact_reports_missing_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let err = backend.save_artifact_to("gone", dir.path()).await.unwrap_err();

    assert!(matches!(err, ArtifactError::Status { status: 404, .. }));
}

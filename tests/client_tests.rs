use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use transcribe_runner::error::ClientError;
use transcribe_runner::job::{JobHandle, JobInput, JobStatus};
use transcribe_runner::{EndpointClient, PollOptions};

const ENDPOINT: &str = "abc123";

fn client(server: &MockServer) -> EndpointClient {
    EndpointClient::new(ENDPOINT, "platform-key").with_base_url(server.uri())
}

fn quick() -> PollOptions {
    PollOptions {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(2),
    }
}

fn url_input() -> JobInput {
    JobInput {
        audio_url: Some("https://example.com/StarWars60.wav".to_string()),
        language: Some("en".to_string()),
        ..JobInput::default()
    }
}

#[tokio::test]
async fn submit_wraps_the_input_and_sends_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/abc123/run"))
        .and(header("authorization", "Bearer platform-key"))
        .and(body_partial_json(json!({
            "input": {"audio_url": "https://example.com/StarWars60.wav", "language": "en"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "job-1", "status": "IN_QUEUE"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server).submit(&url_input()).await.unwrap();
    assert_eq!(id, JobHandle::from("job-1"));
}

#[tokio::test]
async fn empty_handles_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/abc123/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "", "status": "IN_QUEUE"})))
        .mount(&server)
        .await;

    let err = client(&server).submit(&url_input()).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyHandle));
}

#[tokio::test]
async fn wait_returns_the_output_of_a_completed_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-1",
            "status": "IN_PROGRESS"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-1",
            "status": "COMPLETED",
            "delayTime": 12,
            "executionTime": 3400,
            "output": {
                "status": "success",
                "transcription": {"text": "hello there", "language": "en"},
                "processing_time": 3.4
            }
        })))
        .mount(&server)
        .await;

    let output = client(&server)
        .wait(&JobHandle::from("job-1"), quick())
        .await
        .unwrap();

    assert_eq!(output.transcription.text, "hello there");
    assert!(output.transcription.segments.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn failed_jobs_carry_the_platform_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-2",
            "status": "FAILED",
            "error": "Audio is 4000.0s long, above the 3600s limit"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .wait(&JobHandle::from("job-2"), quick())
        .await
        .unwrap_err();

    assert!(err.is_job_failure());
    match err {
        ClientError::JobFailed { id, error } => {
            assert_eq!(id, "job-2");
            assert_eq!(error, "Audio is 4000.0s long, above the 3600s limit");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn platform_side_terminal_states_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "job-3", "status": "TIMED_OUT"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .wait(&JobHandle::from("job-3"), quick())
        .await
        .unwrap_err();

    match err {
        ClientError::JobFailed { error, .. } => assert_eq!(error, "job ended as TIMED_OUT"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn wait_gives_up_after_the_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "job-4", "status": "IN_QUEUE"})),
        )
        .mount(&server)
        .await;

    let options = PollOptions {
        interval: Duration::from_millis(50),
        timeout: Duration::from_millis(200),
    };
    let err = client(&server)
        .wait(&JobHandle::from("job-4"), options)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout { .. }));
    let polls = server.received_requests().await.unwrap().len();
    assert!((2..=5).contains(&polls), "polled {polls} times");
}

#[tokio::test]
async fn api_errors_keep_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-5"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .status(&JobHandle::from("job-5"))
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn status_reads_do_not_require_a_terminal_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-6"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "job-6", "status": "IN_QUEUE"})),
        )
        .mount(&server)
        .await;

    let status = client(&server)
        .status(&JobHandle::from("job-6"))
        .await
        .unwrap();
    assert_eq!(status.status, JobStatus::InQueue);
    assert!(status.output.is_none());
}

#[tokio::test]
async fn outputs_with_only_a_transcription_are_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-7",
            "status": "COMPLETED",
            "output": {"status": "success", "transcription": {"text": "hello"}}
        })))
        .mount(&server)
        .await;

    let output = client(&server)
        .wait(&JobHandle::from("job-7"), quick())
        .await
        .unwrap();

    assert_eq!(output.transcription.text, "hello");
    assert_eq!(output.processing_time, None);
}

#[tokio::test]
async fn handler_errors_inside_completed_jobs_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-8",
            "status": "COMPLETED",
            "output": {"status": "error", "error": "Failed to download audio from URL"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .wait(&JobHandle::from("job-8"), quick())
        .await
        .unwrap_err();

    match err {
        ClientError::JobFailed { id, error } => {
            assert_eq!(id, "job-8");
            assert_eq!(error, "Failed to download audio from URL");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn unrecognised_states_keep_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-9",
            "status": "IN_PROGRESS_RETRYING"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/abc123/status/job-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job-9",
            "status": "COMPLETED",
            "output": {"status": "success", "transcription": {"text": "made it"}}
        })))
        .mount(&server)
        .await;

    let output = client(&server)
        .wait(&JobHandle::from("job-9"), quick())
        .await
        .unwrap();

    assert_eq!(output.transcription.text, "made it");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

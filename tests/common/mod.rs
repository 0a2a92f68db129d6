#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::net::TcpListener;

use transcribe_runner::auth::{generate_api_key, GeneratedKey};
use transcribe_runner::config::Config;
use transcribe_runner::handler::{TranscribeOptions, Transcriber};
use transcribe_runner::job::{Segment, Transcription};
use transcribe_runner::routes::router;
use transcribe_runner::state::AppState;
use transcribe_runner::{EndpointClient, PollOptions};

pub const ENDPOINT_ID: &str = "test-endpoint";

/// Transcriber that waits for `delay` and echoes the audio size back.
pub struct FakeTranscriber {
    pub delay: Duration,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, options: &TranscribeOptions) -> Result<Transcription> {
        tokio::time::sleep(self.delay).await;
        if audio.starts_with(b"FAIL") {
            anyhow::bail!("Whisper service rejected the audio");
        }
        Ok(Transcription {
            text: format!("{} bytes transcribed ({})", audio.len(), options.task),
            segments: vec![Segment {
                id: 0,
                start: 0.0,
                end: 1.0,
                text: "segment".to_string(),
                words: vec![],
            }],
            language: Some("en".to_string()),
        })
    }
}

pub fn test_config(api_key_hash: Option<&str>) -> Config {
    Config {
        endpoint_id: ENDPOINT_ID.to_string(),
        api_key_hashes: api_key_hash.map(|h| vec![h.to_string()]).unwrap_or_default(),
        local_debug: api_key_hash.is_none(),
        processing_threads: 2,
        runsync_wait_sec: 5,
        ..Config::default()
    }
}

pub async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub key: GeneratedKey,
}

impl TestServer {
    pub async fn start(delay: Duration) -> Self {
        let key = generate_api_key().unwrap();
        let state = AppState::with_transcriber(
            test_config(Some(&key.hash)),
            Arc::new(FakeTranscriber { delay }),
        )
        .unwrap();
        let addr = serve(state).await;
        TestServer { addr, key }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> EndpointClient {
        EndpointClient::new(ENDPOINT_ID, self.key.key.clone()).with_base_url(self.base_url())
    }
}

pub fn fast_polling() -> PollOptions {
    PollOptions {
        interval: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;

use crate::auth::ApiKeys;
use crate::config::Config;
use crate::handler::audio::AudioFetcher;
use crate::handler::{Handler, Transcriber, WhisperServiceTranscriber};
use crate::job::{Dispatcher, ResultForwarder};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub api_keys: ApiKeys,
}

impl AppState {
    /// Builds the state for a deployment, with the Whisper service as backend.
    pub fn from_config(config: Config) -> Result<Self> {
        let Some(whisper_url) = config.whisper_service_url() else {
            bail!("No transcription backend configured, set WHISPER_SERVICE_URL");
        };
        let transcriber = WhisperServiceTranscriber::new(
            Client::new(),
            whisper_url,
            config.whisper_api_token(),
        )
        .with_timeout(Duration::from_secs(config.whisper_timeout_sec))
        .with_chunking(config.audio_chunk_duration_sec, config.segment_size_sec);

        Self::with_transcriber(config, Arc::new(transcriber))
    }

    pub fn with_transcriber(config: Config, transcriber: Arc<dyn Transcriber>) -> Result<Self> {
        let api_keys = ApiKeys::from_hashes(config.api_key_hashes.as_slice())
            .context("Failed to load API_KEY_HASHES")?;
        if api_keys.is_open() {
            if !config.local_debug {
                bail!("No API keys configured, set API_KEY_HASHES or enable LOCAL_DEBUG");
            }
            tracing::warn!("No API keys configured, authentication is disabled");
        }

        let http = Client::new();
        let fetcher = AudioFetcher::new(
            http.clone(),
            Duration::from_secs(config.audio_download_timeout_sec),
            config.max_audio_bytes,
        );
        let handler = Handler::new(transcriber, fetcher, config.max_audio_length_sec);

        let mut dispatcher = Dispatcher::new(
            handler,
            config.processing_threads,
            config.execution_timeout(),
        );
        if let Some(url) = config.engine_api_url() {
            tracing::info!("Forwarding job results to {}", url);
            dispatcher =
                dispatcher.with_forwarder(ResultForwarder::new(http, url, config.engine_api_token()));
        }

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            api_keys,
        })
    }
}

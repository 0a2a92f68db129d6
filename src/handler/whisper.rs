use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::handler::audio::AudioFormat;
use crate::handler::{TranscribeOptions, Transcriber};
use crate::job::model::Transcription;

/// Delegates transcription to an external Whisper service exposing
/// `POST {base_url}/transcribe` with a multipart form.
#[derive(Clone, Debug)]
pub struct WhisperServiceTranscriber {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    timeout: Duration,
    chunk_duration_sec: u32,
    segment_size_sec: u32,
}

impl WhisperServiceTranscriber {
    pub fn new(client: Client, base_url: &str, api_token: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.map(str::to_string),
            timeout: Duration::from_secs(300),
            chunk_duration_sec: 30,
            segment_size_sec: 30,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chunking(mut self, chunk_duration_sec: u32, segment_size_sec: u32) -> Self {
        self.chunk_duration_sec = chunk_duration_sec;
        self.segment_size_sec = segment_size_sec;
        self
    }

    fn build_form(&self, audio: Vec<u8>, options: &TranscribeOptions) -> Result<Form> {
        let format = AudioFormat::sniff(&audio);
        let part = Part::bytes(audio)
            .file_name(format.file_name())
            .mime_str(format.mime_type())?;

        let mut form = Form::new()
            .text("task", options.task.to_string())
            .text("return_timestamps", options.return_timestamps.to_string())
            .text("chunk_duration_sec", self.chunk_duration_sec.to_string())
            .text("segment_size_sec", self.segment_size_sec.to_string())
            .part("audio", part);
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }
        if let Some(model) = &options.model {
            form = form.text("model", model.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for WhisperServiceTranscriber {
    #[tracing::instrument(level = "info", skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(&self, audio: Vec<u8>, options: &TranscribeOptions) -> Result<Transcription> {
        let url = format!("{}/transcribe", self.base_url);
        tracing::info!("Calling Whisper service at {}", url);

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .multipart(self.build_form(audio, options)?);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to call Whisper service")?;
        response
            .json::<Transcription>()
            .await
            .context("Whisper service returned an unexpected payload")
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use clap_serde_derive::ClapSerde;

pub const DEFAULT_CONFIG_FILE: &str = "TranscribeRunner.toml";

#[derive(ClapSerde, Debug, Clone)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub address: String,

    /// The port the listener binds to
    #[default(8000)]
    #[arg(short, long, env)]
    pub port: u16,

    /// Endpoint id accepted in `/v2/{endpoint_id}/...` routes
    #[default("local".to_string())]
    #[arg(long, env)]
    pub endpoint_id: String,

    /// Argon2 hashes of the API keys allowed to use the endpoint
    #[arg(long, env, value_delimiter = ',')]
    pub api_key_hashes: Vec<String>,

    /// Mount the unprefixed `/run`, `/runsync` and `/status` routes for offline testing
    #[default(false)]
    #[arg(long, env)]
    pub local_debug: bool,

    /// Base URL of the Whisper transcription service
    #[arg(long, env)]
    pub whisper_service_url: String,

    /// Bearer token sent to the Whisper transcription service
    #[arg(long, env)]
    pub whisper_api_token: String,

    /// Request timeout for the Whisper transcription service in seconds
    #[default(300)]
    #[arg(long, env)]
    pub whisper_timeout_sec: u64,

    /// Audio chunk duration forwarded to the transcription service
    #[default(30)]
    #[arg(long, env)]
    pub audio_chunk_duration_sec: u32,

    /// Segment size forwarded to the transcription service
    #[default(30)]
    #[arg(long, env)]
    pub segment_size_sec: u32,

    /// Longest accepted audio in seconds, checked for WAV input
    #[default(3600)]
    #[arg(long, env)]
    pub max_audio_length_sec: u64,

    /// Largest accepted audio payload in bytes after decoding or download
    #[default(100 * 1024 * 1024)]
    #[arg(long, env)]
    pub max_audio_bytes: usize,

    /// Largest accepted HTTP request body in bytes
    #[default(150 * 1024 * 1024)]
    #[arg(long, env)]
    pub max_request_bytes: usize,

    /// Timeout for downloading `audio_url` inputs in seconds
    #[default(60)]
    #[arg(long, env)]
    pub audio_download_timeout_sec: u64,

    /// Number of jobs processed concurrently
    #[default(1)]
    #[arg(long, env)]
    pub processing_threads: usize,

    /// Upper bound on a single job's execution in seconds
    #[default(600)]
    #[arg(long, env)]
    pub execution_timeout_sec: u64,

    /// How long finished jobs stay queryable in seconds
    #[default(1800)]
    #[arg(long, env)]
    pub job_retention_sec: u64,

    /// How long `/runsync` waits for a result in seconds
    #[default(90)]
    #[arg(long, env)]
    pub runsync_wait_sec: u64,

    /// URL that finished job results are forwarded to
    #[arg(long, env)]
    pub engine_api_url: String,

    /// Bearer token sent along with forwarded results
    #[arg(long, env)]
    pub engine_api_token: String,

    /// Default log filter, overridden by RUST_LOG
    #[default("info".to_string())]
    #[arg(long, env)]
    pub log_level: String,

    /// OpenTelemetry collector endpoint, export is disabled when empty
    #[arg(long, env)]
    pub otlp_endpoint: String,

    /// Keep console logging enabled while exporting to a collector
    #[default(false)]
    #[arg(long, env)]
    pub log_console: bool,
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl Config {
    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)?;
        let opt: <Config as ClapSerde>::Opt =
            toml::from_str(&str).with_context(|| format!("Invalid configuration in {path}"))?;
        Ok(Config::from(opt))
    }

    pub fn whisper_service_url(&self) -> Option<&str> {
        non_empty(&self.whisper_service_url)
    }

    pub fn whisper_api_token(&self) -> Option<&str> {
        non_empty(&self.whisper_api_token)
    }

    pub fn engine_api_url(&self) -> Option<&str> {
        non_empty(&self.engine_api_url)
    }

    pub fn engine_api_token(&self) -> Option<&str> {
        non_empty(&self.engine_api_token)
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_empty(&self.otlp_endpoint)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_sec)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_sec)
    }

    pub fn runsync_wait(&self) -> Duration {
        Duration::from_secs(self.runsync_wait_sec)
    }
}

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of a job submission: `{"input": {...}}`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RunRequest {
    pub input: JobInput,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct JobInput {
    /// Base64 encoded audio, optionally prefixed with a `data:` URL header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    /// URL the handler downloads the audio from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Language hint such as "en"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub task: Task,

    #[serde(default)]
    pub return_timestamps: bool,

    /// Model requested from the transcription service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Transcribe => write!(f, "transcribe"),
            Task::Translate => write!(f, "translate"),
        }
    }
}

/// Opaque identifier handed out at submission.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub(crate) fn generate() -> Self {
        JobHandle(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobHandle {
    fn from(value: String) -> Self {
        JobHandle(value)
    }
}

impl From<&str> for JobHandle {
    fn from(value: &str) -> Self {
        JobHandle(value.to_string())
    }
}

impl Display for JobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    /// Reported by hosted platforms, never produced by this server.
    Cancelled,
    /// Reported by hosted platforms, never produced by this server.
    TimedOut,
    /// Any other state a platform reports. Callers keep polling.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::TimedOut => "TIMED_OUT",
            JobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunResponse {
    pub id: JobHandle,
    pub status: JobStatus,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: JobHandle,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds spent waiting for a worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<u64>,
    /// Milliseconds spent executing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

/// Payload produced by the handler for a completed job.
///
/// Hosted handlers may omit everything but `transcription.text`, or report a
/// failure inside a completed job as `{"status": "error", "error": "..."}`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct JobOutput {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub transcription: Transcription,
    /// Seconds spent resolving and transcribing the audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutput {
    pub const SUCCESS: &'static str = "success";
    pub const ERROR: &'static str = "error";

    /// The handler's own error, if it reported one instead of a transcription.
    pub fn handler_error(&self) -> Option<String> {
        match &self.error {
            Some(error) => Some(error.clone()),
            None if self.status == Self::ERROR => Some("handler reported an error".to_string()),
            None => None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Transcription {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Segment {
    #[serde(default)]
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

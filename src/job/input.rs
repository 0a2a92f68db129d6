use base64ct::{Base64, Encoding};
use url::Url;

use crate::job::model::{JobInput, Task};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputError {
    #[error("No audio input provided. Use 'audio' (base64) or 'audio_url'")]
    MissingAudio,
    #[error("Provide either 'audio' or 'audio_url', not both")]
    ConflictingAudio,
    #[error("Invalid base64 audio data: {0}")]
    InvalidBase64(String),
    #[error("Audio data is empty")]
    EmptyAudio,
    #[error("Invalid audio_url: {0}")]
    InvalidUrl(String),
    #[error("Unsupported audio_url scheme {0}, expected http or https")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Inline(Vec<u8>),
    Remote(Url),
}

/// A submission that passed validation and is ready for the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub source: AudioSource,
    pub language: Option<String>,
    pub task: Task,
    pub return_timestamps: bool,
    pub model: Option<String>,
}

impl TryFrom<JobInput> for TranscriptionRequest {
    type Error = InputError;

    fn try_from(input: JobInput) -> Result<Self, Self::Error> {
        let source = match (input.audio, input.audio_url) {
            (Some(_), Some(_)) => return Err(InputError::ConflictingAudio),
            (Some(audio), None) => AudioSource::Inline(decode_audio(&audio)?),
            (None, Some(url)) => AudioSource::Remote(parse_audio_url(&url)?),
            (None, None) => return Err(InputError::MissingAudio),
        };

        Ok(TranscriptionRequest {
            source,
            language: blank_to_none(input.language),
            task: input.task,
            return_timestamps: input.return_timestamps,
            model: blank_to_none(input.model),
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts plain base64 as well as `data:audio/webm;base64,...` URLs.
fn decode_audio(encoded: &str) -> Result<Vec<u8>, InputError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(data_url) => data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| InputError::InvalidBase64("data URL without payload".to_string()))?,
        None => encoded,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes =
        Base64::decode_vec(&cleaned).map_err(|e| InputError::InvalidBase64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(InputError::EmptyAudio);
    }
    Ok(bytes)
}

fn parse_audio_url(raw: &str) -> Result<Url, InputError> {
    let url = Url::parse(raw.trim()).map_err(|e| InputError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(InputError::UnsupportedScheme(other.to_string())),
    }
}

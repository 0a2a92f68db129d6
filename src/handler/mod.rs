use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::handler::audio::{AudioFetcher, AudioFormat};
use crate::job::input::{AudioSource, TranscriptionRequest};
use crate::job::model::{JobOutput, Task, Transcription};

pub mod audio;
pub mod whisper;

pub use whisper::WhisperServiceTranscriber;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub task: Task,
    pub return_timestamps: bool,
    pub model: Option<String>,
}

/// Backend that turns audio bytes into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, options: &TranscribeOptions) -> Result<Transcription>;
}

/// Per-job entry point: resolves the audio, enforces limits and calls the
/// transcriber.
pub struct Handler {
    transcriber: Arc<dyn Transcriber>,
    fetcher: AudioFetcher,
    max_audio_length_sec: f64,
}

impl Handler {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        fetcher: AudioFetcher,
        max_audio_length_sec: u64,
    ) -> Self {
        Self {
            transcriber,
            fetcher,
            max_audio_length_sec: max_audio_length_sec as f64,
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(task = %request.task, language = ?request.language))]
    pub async fn handle(&self, request: TranscriptionRequest) -> Result<JobOutput> {
        let start = Instant::now();

        let audio = match request.source {
            AudioSource::Inline(bytes) => {
                self.fetcher.check_size(bytes.len())?;
                bytes
            }
            AudioSource::Remote(url) => self.fetcher.fetch(&url).await?,
        };
        tracing::info!("Processed audio input: {} bytes", audio.len());

        if AudioFormat::sniff(&audio) == AudioFormat::Wav {
            match audio::wav_duration(&audio) {
                Ok(seconds) if seconds > self.max_audio_length_sec => bail!(
                    "Audio is {:.1}s long, above the {}s limit",
                    seconds,
                    self.max_audio_length_sec
                ),
                Ok(_) => {}
                Err(e) => tracing::debug!("Could not read WAV duration: {}", e),
            }
        }

        let options = TranscribeOptions {
            language: request.language,
            task: request.task,
            return_timestamps: request.return_timestamps,
            model: request.model,
        };
        let mut transcription = self.transcriber.transcribe(audio, &options).await?;

        if !options.return_timestamps {
            transcription.segments.clear();
        }
        if transcription.language.is_none() {
            transcription.language = options.language;
        }

        let processing_time = start.elapsed().as_secs_f64();
        tracing::info!("Transcription completed in {:.2}s", processing_time);

        Ok(JobOutput {
            status: JobOutput::SUCCESS.to_string(),
            transcription,
            processing_time: Some(processing_time),
            error: None,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use reqwest::Client;

    use super::*;
    use crate::handler::audio::tests::silent_wav;
    use crate::job::model::Segment;

    /// Answers with a fixed transcription and records what it was asked.
    #[derive(Default)]
    pub(crate) struct RecordingTranscriber {
        pub(crate) calls: Mutex<Vec<(usize, TranscribeOptions)>>,
    }

    #[async_trait]
    impl Transcriber for RecordingTranscriber {
        async fn transcribe(
            &self,
            audio: Vec<u8>,
            options: &TranscribeOptions,
        ) -> Result<Transcription> {
            self.calls
                .lock()
                .unwrap()
                .push((audio.len(), options.clone()));
            Ok(Transcription {
                text: "May the force be with you.".to_string(),
                segments: vec![Segment {
                    id: 0,
                    start: 0.0,
                    end: 2.0,
                    text: "May the force be with you.".to_string(),
                    words: vec![],
                }],
                language: None,
            })
        }
    }

    fn handler(transcriber: Arc<RecordingTranscriber>, max_bytes: usize) -> Handler {
        let fetcher = AudioFetcher::new(Client::new(), Duration::from_secs(5), max_bytes);
        Handler::new(transcriber, fetcher, 10)
    }

    fn request(audio: Vec<u8>, return_timestamps: bool) -> TranscriptionRequest {
        TranscriptionRequest {
            source: AudioSource::Inline(audio),
            language: Some("en".to_string()),
            task: Task::Transcribe,
            return_timestamps,
            model: None,
        }
    }

    #[tokio::test]
    async fn inline_audio_is_transcribed() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let wav = silent_wav(1, 8_000, 1);
        let wav_len = wav.len();

        let output = handler(transcriber.clone(), 1 << 20)
            .handle(request(wav, true))
            .await
            .unwrap();

        assert_eq!(output.status, "success");
        assert_eq!(output.transcription.text, "May the force be with you.");
        assert_eq!(output.transcription.segments.len(), 1);
        assert_eq!(output.transcription.language.as_deref(), Some("en"));

        let calls = transcriber.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, wav_len);
        assert!(calls[0].1.return_timestamps);
    }

    #[tokio::test]
    async fn segments_are_dropped_without_timestamps() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let output = handler(transcriber, 1 << 20)
            .handle(request(b"ID3 mp3 bytes".to_vec(), false))
            .await
            .unwrap();

        assert!(output.transcription.segments.is_empty());
    }

    #[tokio::test]
    async fn long_wav_audio_is_rejected() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let err = handler(transcriber.clone(), 1 << 20)
            .handle(request(silent_wav(11, 8_000, 1), false))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("above the 10s limit"));
        assert!(transcriber.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn streaming_wav_without_length_is_transcribed() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let mut wav = silent_wav(1, 8_000, 1);
        wav[40..44].copy_from_slice(&u32::MAX.to_le_bytes());

        let output = handler(transcriber.clone(), 1 << 20)
            .handle(request(wav, false))
            .await
            .unwrap();

        assert_eq!(output.transcription.text, "May the force be with you.");
        assert_eq!(transcriber.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let err = handler(transcriber, 4)
            .handle(request(b"too many bytes".to_vec(), false))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("byte limit"));
    }
}

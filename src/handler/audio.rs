use std::io::{Cursor, Read, Seek, SeekFrom};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use reqwest::Client;
use url::Url;

/// Downloads `audio_url` inputs.
#[derive(Clone, Debug)]
pub struct AudioFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: usize,
}

impl AudioFetcher {
    pub fn new(client: Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to download audio from URL")?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                bail!(
                    "Audio at URL is {} bytes, above the {} byte limit",
                    length,
                    self.max_bytes
                );
            }
        }

        // Chunked responses carry no length, so the cap is checked per chunk
        let mut audio = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to download audio from URL")?
        {
            self.check_size(audio.len() + chunk.len())?;
            audio.extend_from_slice(&chunk);
        }
        Ok(audio)
    }

    pub fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_bytes {
            bail!(
                "Audio is {} bytes, above the {} byte limit",
                len,
                self.max_bytes
            );
        }
        Ok(())
    }
}

/// Container formats recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
    Flac,
    Webm,
    Mp4,
    Unknown,
}

impl AudioFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => AudioFormat::Wav,
            [b'I', b'D', b'3', ..] => AudioFormat::Mp3,
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => AudioFormat::Mp3,
            [b'O', b'g', b'g', b'S', ..] => AudioFormat::Ogg,
            [b'f', b'L', b'a', b'C', ..] => AudioFormat::Flac,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => AudioFormat::Webm,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => AudioFormat::Mp4,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Mp4 => "audio/mp4",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio.wav",
            AudioFormat::Mp3 => "audio.mp3",
            AudioFormat::Ogg => "audio.ogg",
            AudioFormat::Flac => "audio.flac",
            AudioFormat::Webm => "audio.webm",
            AudioFormat::Mp4 => "audio.m4a",
            AudioFormat::Unknown => "audio.bin",
        }
    }
}

/// Duration in seconds of a RIFF/WAVE file, read from its `fmt ` and `data` chunks.
pub fn wav_duration(bytes: &[u8]) -> Result<f64> {
    let mut cursor = Cursor::new(bytes);
    let mut tag = [0u8; 4];

    cursor.read_exact(&mut tag)?;
    if &tag != b"RIFF" {
        bail!("Missing RIFF header");
    }
    cursor.read_u32::<LittleEndian>()?;
    cursor.read_exact(&mut tag)?;
    if &tag != b"WAVE" {
        bail!("Missing WAVE header");
    }

    let mut byte_rate = None;
    loop {
        if cursor.read_exact(&mut tag).is_err() {
            bail!("WAV file has no data chunk");
        }
        let chunk_len = cursor.read_u32::<LittleEndian>()?;
        match &tag {
            b"fmt " => {
                if chunk_len < 16 {
                    bail!("WAV fmt chunk is only {} bytes", chunk_len);
                }
                // audio format, channels and sample rate precede the byte rate
                cursor.seek(SeekFrom::Current(8))?;
                byte_rate = Some(cursor.read_u32::<LittleEndian>()?);
                let rest = i64::from(chunk_len) - 12 + i64::from(chunk_len & 1);
                cursor.seek(SeekFrom::Current(rest))?;
            }
            b"data" => {
                let byte_rate = match byte_rate {
                    Some(rate) if rate > 0 => rate,
                    _ => bail!("WAV data chunk precedes a valid fmt chunk"),
                };
                // streaming writers leave the length at u32::MAX or past the end
                let available = (bytes.len() as u64).saturating_sub(cursor.position());
                if chunk_len == u32::MAX || u64::from(chunk_len) > available {
                    bail!("WAV data chunk has no usable length");
                }
                return Ok(f64::from(chunk_len) / f64::from(byte_rate));
            }
            _ => {
                // chunks are padded to an even length
                let skip = i64::from(chunk_len) + i64::from(chunk_len & 1);
                cursor.seek(SeekFrom::Current(skip))?;
            }
        }
    }
}

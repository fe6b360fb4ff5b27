// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audio Transcription (spec §4.10): speech-to-text for inbound voice and
//! audio messages, behind a provider split auto-detected from the
//! configured key's prefix (`sk-` selects OpenAI-compatible; anything
//! else, Google-compatible).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fleet_common::error::TranscriptionError;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

/// Transcribes one audio file to text. Implementations map every failure
/// onto the closed [`TranscriptionError`] set rather than surfacing a raw
/// transport error, so the dispatcher can reply with a single templated
/// message (spec §7).
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;
}

fn map_status(status: reqwest::StatusCode) -> TranscriptionError {
    match status.as_u16() {
        401 | 403 => TranscriptionError::InvalidKey,
        413 => TranscriptionError::FileTooLarge,
        415 => TranscriptionError::UnsupportedFormat,
        429 => TranscriptionError::RateLimited,
        402 => TranscriptionError::QuotaExceeded,
        _ => TranscriptionError::Generic,
    }
}

async fn read_audio(path: &Path) -> Result<Vec<u8>, TranscriptionError> {
    tokio::fs::read(path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "failed to read audio file for transcription");
        TranscriptionError::DownloadFailed
    })
}

/// `POST /v1/audio/transcriptions`, OpenAI's Whisper-compatible endpoint.
pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder().timeout(Duration::from_secs(30)).build().unwrap_or_default();
        Self { client, api_key, base_url }
    }
}

#[derive(Deserialize)]
struct OpenAiTranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        if self.api_key.is_empty() {
            return Err(TranscriptionError::NoKey);
        }
        let bytes = read_audio(audio_path).await?;
        let filename = audio_path.file_name().and_then(|n| n.to_str()).unwrap_or("audio.ogg").to_string();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part).text("model", "whisper-1");

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "openai transcription request failed");
                TranscriptionError::Generic
            })?;

        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }

        let parsed: OpenAiTranscriptionResponse = response.json().await.map_err(|_| TranscriptionError::Generic)?;
        Ok(parsed.text)
    }
}

/// Google Cloud Speech-to-Text's synchronous `speech:recognize` endpoint.
pub struct GoogleTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleTranscriber {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://speech.googleapis.com".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder().timeout(Duration::from_secs(30)).build().unwrap_or_default();
        Self { client, api_key, base_url }
    }
}

#[derive(serde::Serialize)]
struct RecognizeConfig {
    #[serde(rename = "languageCode")]
    language_code: &'static str,
}

#[derive(serde::Serialize)]
struct RecognizeAudio {
    content: String,
}

#[derive(serde::Serialize)]
struct RecognizeRequest {
    config: RecognizeConfig,
    audio: RecognizeAudio,
}

#[derive(Deserialize)]
struct RecognizeAlternative {
    transcript: String,
}

#[derive(Deserialize)]
struct RecognizeResult {
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[async_trait]
impl Transcriber for GoogleTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        if self.api_key.is_empty() {
            return Err(TranscriptionError::NoKey);
        }
        let bytes = read_audio(audio_path).await?;
        let content = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(bytes)
        };

        let body = RecognizeRequest { config: RecognizeConfig { language_code: "en-US" }, audio: RecognizeAudio { content } };

        let response = self
            .client
            .post(format!("{}/v1/speech:recognize?key={}", self.base_url, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "google transcription request failed");
                TranscriptionError::Generic
            })?;

        if !response.status().is_success() {
            return Err(map_status(response.status()));
        }

        let parsed: RecognizeResponse = response.json().await.map_err(|_| TranscriptionError::Generic)?;
        let transcript = parsed
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .ok_or(TranscriptionError::Generic)?;
        Ok(transcript)
    }
}

#[cfg(test)]
#[path = "transcribe_tests.rs"]
mod tests;

//! Client side of the analysis contract
//!
//! Sends one clip per call and hands back the decoded result. Failures are
//! deliberately opaque: the caller learns that processing failed, not why.
//! Cancellation is reported separately and never as a failure.

mod cancel;

pub use cancel::CancellationToken;

use cancel::CancellableReader;
use crate::model::{AnalysisResult, ANALYZE_PATH, AUDIO_FIELD};
use crate::multipart;
use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use ureq::{Agent, SendBody};

/// Filename sent with every clip unless the caller picks one
pub const DEFAULT_FILENAME: &str = "sample.webm";

/// How often a waiting call checks its cancellation token
const CANCEL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// Non-2xx status, transport failure or unreadable body
    #[error("Processing failed")]
    ProcessingFailed,

    #[error("Request cancelled")]
    Cancelled,
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the analysis endpoint
    pub endpoint: String,

    /// Upper bound on a whole call, connect to last response byte. None
    /// leaves calls unbounded apart from cancellation.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: None,
        }
    }

    /// Bound every call, including one abandoned after cancellation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Endpoint on a server at `base` (e.g., http://127.0.0.1:3000)
    pub fn for_base_url(base: &str) -> Self {
        Self::new(format!("{}{}", base.trim_end_matches('/'), ANALYZE_PATH))
    }
}

/// Blocking analysis client
#[derive(Clone)]
pub struct AnalysisClient {
    agent: Agent,
    config: ClientConfig,
}

impl AnalysisClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(config.timeout)
            .build()
            .into();
        Self { agent, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Analyze a clip under the default filename
    pub fn analyze(
        &self,
        audio: &[u8],
        cancel: Option<&CancellationToken>,
    ) -> Result<AnalysisResult, ClientError> {
        self.analyze_named(audio, DEFAULT_FILENAME, cancel)
    }

    /// Analyze a clip under a caller-chosen filename
    pub fn analyze_named(
        &self,
        audio: &[u8],
        filename: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<AnalysisResult, ClientError> {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(ClientError::Cancelled);
        }

        let (content_type, body) =
            multipart::encode_file(AUDIO_FIELD, filename, mime_for(filename), audio);

        let agent = self.agent.clone();
        let url = self.config.endpoint.clone();
        let token = cancel.cloned();
        let (tx, rx) = mpsc::channel();

        log::debug!("POST {} ({} bytes as {:?})", url, audio.len(), filename);

        thread::Builder::new()
            .name("analysis-request".to_string())
            .spawn(move || {
                // The receiver is gone if the caller cancelled first
                let _ = tx.send(send_request(&agent, &url, &content_type, body, token));
            })
            .map_err(|e| {
                log::warn!("Failed to spawn request thread: {}", e);
                ClientError::ProcessingFailed
            })?;

        let Some(token) = cancel else {
            return rx.recv().unwrap_or(Err(ClientError::ProcessingFailed));
        };

        loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(outcome) => return outcome,
                Err(RecvTimeoutError::Timeout) => {
                    if token.is_cancelled() {
                        // The request thread sees the token on its next body
                        // read; a pending response wait ends at the timeout
                        log::debug!("Analysis request cancelled");
                        return Err(ClientError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::ProcessingFailed),
            }
        }
    }
}

fn send_request(
    agent: &Agent,
    url: &str,
    content_type: &str,
    body: Vec<u8>,
    cancel: Option<CancellationToken>,
) -> Result<AnalysisResult, ClientError> {
    let length = body.len();
    let reader = CancellableReader::new(Cursor::new(body), cancel);

    let mut response = agent
        .post(url)
        .header("Content-Type", content_type)
        .header("Content-Length", length.to_string())
        .send(SendBody::from_owned_reader(reader))
        .map_err(|e| {
            log::debug!("Analysis request failed: {}", e);
            ClientError::ProcessingFailed
        })?;

    response
        .body_mut()
        .read_json::<AnalysisResult>()
        .map_err(|e| {
            log::debug!("Unreadable analysis response: {}", e);
            ClientError::ProcessingFailed
        })
}

/// Content type for the file part, guessed from the extension
fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_base() {
        assert_eq!(
            ClientConfig::for_base_url("http://127.0.0.1:3000/").endpoint,
            "http://127.0.0.1:3000/api/process-audio"
        );
    }

    #[test]
    fn test_timeout_setting() {
        let config = ClientConfig::new("http://127.0.0.1:3000/api/process-audio");
        assert_eq!(config.timeout, None);

        let config = config.with_timeout(Duration::from_secs(30));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_for("sample.webm"), "audio/webm");
        assert_eq!(mime_for("Take.WAV"), "audio/wav");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_cancelled_before_send() {
        let client = AnalysisClient::new(ClientConfig::new("http://127.0.0.1:1/never"));
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(client.analyze(b"abc", Some(&token)), Err(ClientError::Cancelled));
    }

    #[test]
    fn test_unreachable_server_is_processing_failure() {
        // Grab a free port, then close it so the connection is refused
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = AnalysisClient::new(ClientConfig::for_base_url(&format!(
            "http://127.0.0.1:{}",
            port
        )));
        assert_eq!(client.analyze(b"abc", None), Err(ClientError::ProcessingFailed));
    }
}

//! Request routing and the upload contract, independent of the HTTP crate

use crate::analysis::{Analyzer, AudioClip};
use crate::model::{ErrorBody, ANALYZE_PATH, AUDIO_FIELD};
use crate::multipart::{self, MultipartError};
use thiserror::Error;

/// Request rejected before any analysis ran
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Missing audio file.")]
    MissingAudio,

    #[error("Malformed multipart body.")]
    Malformed(#[source] MultipartError),

    #[error("Unable to read request body.")]
    BodyRead(#[source] std::io::Error),

    #[error("Audio file too large.")]
    TooLarge { limit: usize },

    #[error("Not found.")]
    NotFound,

    #[error("Method not allowed.")]
    MethodNotAllowed,
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::MissingAudio
            | RequestError::Malformed(_)
            | RequestError::BodyRead(_) => 400,
            RequestError::TooLarge { .. } => 413,
            RequestError::NotFound => 404,
            RequestError::MethodNotAllowed => 405,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string())
    }
}

impl From<MultipartError> for RequestError {
    fn from(err: MultipartError) -> Self {
        RequestError::Malformed(err)
    }
}

/// Response to send back: status plus optional JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Option<String>,
}

impl Reply {
    fn json<T: serde::Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                body: Some(body),
            },
            Err(e) => {
                log::error!("Failed to serialize response: {}", e);
                Self {
                    status: 500,
                    body: Some(r#"{"message":"Internal error."}"#.to_string()),
                }
            }
        }
    }

    fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn error(err: &RequestError) -> Self {
        Self::json(err.status(), &err.body())
    }
}

/// Incoming request, already read off the wire
#[derive(Debug, Clone, Copy)]
pub struct IncomingRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Route a request and produce its reply
pub fn handle(analyzer: &Analyzer, request: &IncomingRequest<'_>) -> Reply {
    let path = request.url.split('?').next().unwrap_or("");

    if path != ANALYZE_PATH {
        return Reply::error(&RequestError::NotFound);
    }

    match request.method {
        "POST" => {}
        "OPTIONS" => return Reply::empty(204),
        _ => return Reply::error(&RequestError::MethodNotAllowed),
    }

    match extract_audio(request) {
        Ok((filename, bytes)) => {
            let result = analyzer.analyze(&AudioClip::new(&bytes, &filename));
            log::info!(
                "Analyzed {:?} ({} bytes): {} risk, probability {}",
                filename,
                bytes.len(),
                result.bucket.name(),
                result.probability
            );
            Reply::json(200, &result)
        }
        Err(err) => {
            match &err {
                RequestError::Malformed(cause) => log::warn!("Rejected upload: {} ({})", err, cause),
                _ => log::warn!("Rejected upload: {}", err),
            }
            Reply::error(&err)
        }
    }
}

/// Pull the `audio` file part out of a multipart request
fn extract_audio(request: &IncomingRequest<'_>) -> Result<(String, Vec<u8>), RequestError> {
    let content_type = request
        .content_type
        .ok_or(RequestError::Malformed(MultipartError::NotMultipart))?;
    let boundary = multipart::boundary_from_content_type(content_type)?;
    let parts = multipart::parse(request.body, &boundary)?;

    let part = parts
        .into_iter()
        .find(|p| p.name == AUDIO_FIELD)
        .ok_or(RequestError::MissingAudio)?;

    match part.filename {
        Some(filename) => Ok((filename, part.data)),
        None => Err(RequestError::MissingAudio),
    }
}

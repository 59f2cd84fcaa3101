//! Microphone capture lifecycle
//!
//! The capture itself happens elsewhere; this models the states a
//! recorder moves through and guarantees the device stream is released on
//! every exit path (stop, failure, or dropping the session mid-capture).

use thiserror::Error;

/// MIME type of a recorded clip
pub const RECORDED_MIME: &str = "audio/webm";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Cannot {action} while {phase:?}")]
    InvalidTransition {
        action: &'static str,
        phase: CapturePhase,
    },

    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Open input stream. Dropping it releases the device.
pub trait CaptureStream: Send {}

/// Source of input streams
pub trait CaptureDevice {
    fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Capturing,
    Finalizing,
    Ready,
    Failed,
}

/// Finished recording, ready for preview and upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClip {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

pub struct CaptureSession {
    phase: CapturePhase,
    stream: Option<Box<dyn CaptureStream>>,
    chunks: Vec<Vec<u8>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("phase", &self.phase)
            .field("stream_open", &self.stream.is_some())
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            phase: CapturePhase::Idle,
            stream: None,
            chunks: Vec::new(),
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream.is_some()
    }

    fn expect_phase(&self, action: &'static str, allowed: &[CapturePhase]) -> Result<(), CaptureError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(CaptureError::InvalidTransition {
                action,
                phase: self.phase,
            })
        }
    }

    /// Open the device and begin collecting chunks.
    /// Allowed from any state other than Capturing or Finalizing.
    pub fn start(&mut self, device: &dyn CaptureDevice) -> Result<(), CaptureError> {
        self.expect_phase(
            "start",
            &[CapturePhase::Idle, CapturePhase::Ready, CapturePhase::Failed],
        )?;

        self.chunks.clear();
        match device.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.phase = CapturePhase::Capturing;
                log::debug!("Capture started");
                Ok(())
            }
            Err(e) => {
                log::warn!("Capture failed to start: {}", e);
                self.phase = CapturePhase::Failed;
                Err(e)
            }
        }
    }

    /// Append a chunk; empty chunks are ignored. Recorders flush their last
    /// chunk after being stopped, so chunks are accepted until `finalize`.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), CaptureError> {
        self.expect_phase(
            "push a chunk",
            &[CapturePhase::Capturing, CapturePhase::Finalizing],
        )?;
        if !chunk.is_empty() {
            self.chunks.push(chunk.to_vec());
        }
        Ok(())
    }

    /// Stop capturing and release the device right away
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.expect_phase("stop", &[CapturePhase::Capturing])?;
        self.stream = None;
        self.phase = CapturePhase::Finalizing;
        log::debug!("Capture stopped, {} chunk(s) collected", self.chunks.len());
        Ok(())
    }

    /// Join the collected chunks into a clip
    pub fn finalize(&mut self) -> Result<RecordedClip, CaptureError> {
        self.expect_phase("finalize", &[CapturePhase::Finalizing])?;
        let bytes = std::mem::take(&mut self.chunks).concat();
        self.phase = CapturePhase::Ready;
        Ok(RecordedClip {
            bytes,
            mime_type: RECORDED_MIME,
        })
    }

    /// Abort the capture, releasing the device if still open
    pub fn fail(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Capture aborted, device released");
        }
        self.chunks.clear();
        self.phase = CapturePhase::Failed;
    }
}

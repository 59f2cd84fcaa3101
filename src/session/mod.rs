//! Client-side session state
//!
//! Mirrors what a screening front end keeps between interactions: which
//! clip is selected, its preview, the last result or error. Opening a
//! session requires the disclaimer to have been accepted.

pub mod capture;
mod gate;
pub mod preview;
mod source;

pub use capture::{CaptureDevice, CaptureError, CapturePhase, CaptureSession, CaptureStream, RecordedClip};
pub use gate::{GateError, SessionConfig, DISCLAIMER};
pub use preview::{PreviewHandle, PreviewRegistry, PreviewSlot};
pub use source::{ClipSource, DemoClip};

use crate::client::{AnalysisClient, CancellationToken, ClientError, DEFAULT_FILENAME};
use crate::model::AnalysisResult;
use std::path::Path;

/// Shown when the analysis call fails
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Unable to analyse audio. Wire this client to your backend API.";

/// Shown when a demo clip cannot be loaded
pub const DEMO_MISSING_MESSAGE: &str = "Demo clip not found. Add audio files under public/demo.";

#[derive(Debug)]
pub struct Session {
    registry: PreviewRegistry,
    preview: PreviewSlot,
    source: Option<ClipSource>,
    clip: Vec<u8>,
    result: Option<AnalysisResult>,
    error: Option<&'static str>,
    hint_visible: bool,
}

impl Session {
    /// Open a session; refused until the disclaimer is accepted
    pub fn new(config: &SessionConfig, registry: PreviewRegistry) -> Result<Self, GateError> {
        config.check()?;
        Ok(Self {
            registry,
            preview: PreviewSlot::new(),
            source: None,
            clip: Vec::new(),
            result: None,
            error: None,
            hint_visible: true,
        })
    }

    fn select(&mut self, source: ClipSource, bytes: Vec<u8>, mime_type: &str) {
        self.result = None;
        self.error = None;
        self.hint_visible = source.shows_recorder_hint();
        self.preview.replace(self.registry.create(mime_type));
        log::debug!("Selected {} ({} bytes)", source.label(), bytes.len());
        self.source = Some(source);
        self.clip = bytes;
    }

    pub fn select_recording(&mut self, clip: RecordedClip) {
        self.select(ClipSource::Recorded, clip.bytes, clip.mime_type);
    }

    pub fn select_upload(&mut self, name: &str, bytes: Vec<u8>, mime_type: &str) {
        self.select(ClipSource::Upload(name.to_string()), bytes, mime_type);
    }

    /// Load a demo clip from `demo_dir`. On failure the previous selection
    /// is dropped and the demo error is shown.
    pub fn select_demo(&mut self, demo: DemoClip, demo_dir: &Path) -> bool {
        let file_name = demo.asset_path().trim_start_matches("/demo/");
        let path = demo_dir.join(file_name);

        match std::fs::read(&path) {
            Ok(bytes) => {
                self.select(ClipSource::Demo(demo), bytes, "audio/wav");
                true
            }
            Err(e) => {
                log::warn!("Failed to load demo clip {}: {}", path.display(), e);
                self.preview.clear();
                self.source = None;
                self.clip.clear();
                self.result = None;
                self.error = Some(DEMO_MISSING_MESSAGE);
                false
            }
        }
    }

    /// Filename the selected clip is uploaded under.
    ///
    /// Demo clips go up under their demo filename (`demo_higherrisk.wav`,
    /// `demo_healthy.wav`) so the server's filename overrides apply to
    /// them. The web front end this mirrors sent every clip, demos
    /// included, as `sample.webm`, so its demos were scored by length
    /// alone. Recorded and uploaded clips still use `sample.webm`.
    pub fn upload_filename(&self) -> &str {
        match &self.source {
            Some(ClipSource::Demo(demo)) => demo.filename(),
            _ => DEFAULT_FILENAME,
        }
    }

    /// Send the selected clip and record the outcome
    pub fn analyze(
        &mut self,
        client: &AnalysisClient,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ClientError> {
        self.error = None;
        let outcome = client.analyze_named(&self.clip, self.upload_filename(), cancel);
        self.record_result(outcome)
    }

    /// Apply the outcome of an analysis call. Cancellation leaves the
    /// session untouched.
    pub fn record_result(
        &mut self,
        outcome: Result<AnalysisResult, ClientError>,
    ) -> Result<(), ClientError> {
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                Ok(())
            }
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(ClientError::ProcessingFailed) => {
                self.error = Some(ANALYSIS_FAILED_MESSAGE);
                Err(ClientError::ProcessingFailed)
            }
        }
    }

    pub fn source(&self) -> Option<&ClipSource> {
        self.source.as_ref()
    }

    pub fn explanation(&self) -> Option<&'static str> {
        self.source.as_ref().map(|s| s.explanation())
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview.url()
    }

    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    pub fn clip(&self) -> &[u8] {
        &self.clip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::model::RiskBucket;
    use tempfile::TempDir;

    fn open() -> (Session, PreviewRegistry) {
        let registry = PreviewRegistry::new();
        let config = SessionConfig::new().with_disclaimer_accepted(true);
        (Session::new(&config, registry.clone()).unwrap(), registry)
    }

    #[test]
    fn test_gate() {
        let err = Session::new(&SessionConfig::new(), PreviewRegistry::new()).unwrap_err();
        assert_eq!(err, GateError::DisclaimerPending);
    }

    #[test]
    fn test_selection_replaces_preview() {
        let (mut session, registry) = open();

        session.select_upload("take.wav", vec![1, 2, 3], "audio/wav");
        assert!(!session.hint_visible());
        assert_eq!(session.source().unwrap().label(), "take.wav");

        session.select_recording(RecordedClip {
            bytes: vec![4, 5],
            mime_type: "audio/webm",
        });
        assert_eq!(registry.live_count(), 1);
        assert!(session.hint_visible());
        assert_eq!(session.clip(), &[4, 5]);
        assert_eq!(session.upload_filename(), "sample.webm");

        drop(session);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_demo_selection() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("higher-risk.wav"), b"RIFF").unwrap();
        let (mut session, registry) = open();

        assert!(session.select_demo(DemoClip::HigherRisk, dir.path()));
        assert_eq!(session.upload_filename(), "demo_higherrisk.wav");
        assert!(session.explanation().unwrap().contains("elevated risk"));

        assert!(!session.select_demo(DemoClip::Healthy, dir.path()));
        assert_eq!(session.error(), Some(DEMO_MISSING_MESSAGE));
        assert_eq!(session.source(), None);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_record_result() {
        let (mut session, _registry) = open();
        session.select_upload("take.wav", vec![0; 10], "audio/wav");

        let result = AnalysisResult::from_probability(0.5, Vec::new(), Vec::new());
        session.record_result(Ok(result)).unwrap();
        assert_eq!(session.result().unwrap().bucket, RiskBucket::Medium);

        assert_eq!(
            session.record_result(Err(ClientError::Cancelled)),
            Err(ClientError::Cancelled)
        );
        assert_eq!(session.error(), None);
        assert!(session.result().is_some());

        assert!(session.record_result(Err(ClientError::ProcessingFailed)).is_err());
        assert_eq!(session.error(), Some(ANALYSIS_FAILED_MESSAGE));
    }

    #[test]
    fn test_analyze_against_unreachable_server() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = AnalysisClient::new(ClientConfig::for_base_url(&format!(
            "http://127.0.0.1:{}",
            port
        )));
        let (mut session, _registry) = open();
        session.select_upload("take.wav", vec![0; 10], "audio/wav");

        assert_eq!(
            session.analyze(&client, None),
            Err(ClientError::ProcessingFailed)
        );
        assert_eq!(session.error(), Some(ANALYSIS_FAILED_MESSAGE));
    }
}

//! Where a clip came from, and what the front end says about it

/// Bundled demonstration clips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoClip {
    HigherRisk,
    Healthy,
}

impl DemoClip {
    pub fn label(&self) -> &'static str {
        match self {
            DemoClip::HigherRisk => "Demo: higher risk",
            DemoClip::Healthy => "Demo: healthy voice",
        }
    }

    /// Asset path the clip is served from
    pub fn asset_path(&self) -> &'static str {
        match self {
            DemoClip::HigherRisk => "/demo/higher-risk.wav",
            DemoClip::Healthy => "/demo/healthy.wav",
        }
    }

    /// Filename the clip is uploaded under; it triggers the matching override
    pub fn filename(&self) -> &'static str {
        match self {
            DemoClip::HigherRisk => "demo_higherrisk.wav",
            DemoClip::Healthy => "demo_healthy.wav",
        }
    }
}

/// Origin of the clip currently selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// Captured through the recorder
    Recorded,
    /// Picked from disk, with its original name
    Upload(String),
    Demo(DemoClip),
}

impl ClipSource {
    /// Heading shown above the preview
    pub fn label(&self) -> &str {
        match self {
            ClipSource::Recorded => "Recorded sample",
            ClipSource::Upload(name) => name,
            ClipSource::Demo(demo) => demo.label(),
        }
    }

    /// Caveat shown next to the result
    pub fn explanation(&self) -> &'static str {
        match self {
            ClipSource::Recorded => {
                "AI estimation based on simple acoustic patterns. Results are illustrative and not diagnostic."
            }
            ClipSource::Upload(_) => {
                "AI estimation based on uploaded audio. Use in a quiet space for clearer results."
            }
            ClipSource::Demo(DemoClip::HigherRisk) => {
                "AI detected voice-energy and articulation patterns often seen in our Alzheimer's training samples, so it flags an elevated risk (demo)."
            }
            ClipSource::Demo(DemoClip::Healthy) => {
                "AI compared this voice to healthy training samples and found the patterns typical, so risk stays low (demo)."
            }
        }
    }

    /// Whether the recorder hint should stay visible for this source
    pub fn shows_recorder_hint(&self) -> bool {
        matches!(self, ClipSource::Recorded)
    }
}

//! Extraction and classification seams

/// Uploaded clip as received: raw bytes plus the client-supplied filename
#[derive(Debug, Clone, Copy)]
pub struct AudioClip<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
}

impl<'a> AudioClip<'a> {
    pub fn new(bytes: &'a [u8], filename: &'a str) -> Self {
        Self { bytes, filename }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First byte of the payload, if any
    pub fn first_byte(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Filename lowercased for case-insensitive matching
    pub fn filename_lower(&self) -> String {
        self.filename.to_lowercase()
    }

    /// Extension of the filename, used as a decoder hint
    pub fn extension(&self) -> Option<&'a str> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }
}

/// Measurements taken from a clip, independent of how they were obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Payload size in bytes
    pub byte_len: usize,

    /// First payload byte, `None` for an empty upload
    pub first_byte: Option<u8>,

    /// Estimated clip duration in whole seconds
    pub duration_secs: u64,

    /// Estimated signal-to-noise ratio in dB
    pub snr_db: u32,

    /// Unitless loudness score
    pub energy: u32,

    /// Estimated fundamental frequency in Hz
    pub pitch_hz: u32,
}

/// Turns a clip into a feature vector. Implementations must be total:
/// every byte sequence, empty included, yields a vector.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, clip: &AudioClip<'_>) -> FeatureVector;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Maps a clip and its features to a risk probability
pub trait RiskClassifier: Send + Sync {
    fn classify(&self, clip: &AudioClip<'_>, features: &FeatureVector) -> f64;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_extension() {
        assert_eq!(AudioClip::new(&[], "sample.webm").extension(), Some("webm"));
        assert_eq!(AudioClip::new(&[], "a.b.wav").extension(), Some("wav"));
        assert_eq!(AudioClip::new(&[], "noext").extension(), None);
        assert_eq!(AudioClip::new(&[], ".hidden").extension(), None);
        assert_eq!(AudioClip::new(&[], "trailing.").extension(), None);
    }

    #[test]
    fn test_clip_first_byte() {
        assert_eq!(AudioClip::new(&[], "x").first_byte(), None);
        assert_eq!(AudioClip::new(&[7, 8], "x").first_byte(), Some(7));
    }
}

//! Byte-arithmetic stand-in for real analysis
//!
//! Nothing here listens to the audio. Durations, SNR, energy and pitch come
//! from the payload length and its first byte, and the probability comes
//! from the length or from a demo filename. The numbers are arbitrary but
//! stable, which is what contract tests against this service rely on.

use super::traits::{AudioClip, FeatureExtractor, FeatureVector, RiskClassifier};

/// Bytes per estimated second of audio
const BYTES_PER_SECOND: f64 = 3200.0;
/// Shortest duration ever reported
const MIN_DURATION_SECS: u64 = 5;
/// SNR floor in dB
const SNR_BASE_DB: u32 = 15;
/// Pitch floor in Hz
const PITCH_BASE_HZ: u32 = 150;
/// First byte assumed by the pitch estimate when the upload is empty.
/// Differs from the SNR default (0); both are kept as observed.
const PITCH_EMPTY_DEFAULT: u8 = 30;

/// Forced probability for "higher risk" demo clips
pub const HIGHER_RISK_PROBABILITY: f64 = 0.98;
/// Forced probability for "healthy" demo clips
pub const HEALTHY_PROBABILITY: f64 = 0.065;
/// Ceiling of the length-derived probability
pub const MAX_BASE_PROBABILITY: f64 = 0.95;

pub fn duration_estimate(byte_len: usize) -> u64 {
    let secs = (byte_len as f64 / BYTES_PER_SECOND).round() as u64;
    secs.max(MIN_DURATION_SECS)
}

pub fn snr_estimate(first_byte: Option<u8>) -> u32 {
    SNR_BASE_DB + u32::from(first_byte.unwrap_or(0)) % 10
}

pub fn energy_estimate(byte_len: usize) -> u32 {
    (byte_len % 120) as u32 + 60
}

pub fn pitch_estimate(first_byte: Option<u8>) -> u32 {
    PITCH_BASE_HZ + u32::from(first_byte.unwrap_or(PITCH_EMPTY_DEFAULT))
}

/// Probability forced by a demo filename, if the name matches one
pub fn filename_override(filename: &str) -> Option<f64> {
    let name = filename.to_lowercase();
    if name.contains("higher") || name.contains("alz") {
        Some(HIGHER_RISK_PROBABILITY)
    } else if name.contains("healthy") {
        Some(HEALTHY_PROBABILITY)
    } else {
        None
    }
}

pub fn base_probability(byte_len: usize) -> f64 {
    ((byte_len % 1000) as f64 / 1000.0 + 0.2).clamp(0.0, MAX_BASE_PROBABILITY)
}

/// Extractor deriving every feature from the payload length and first byte
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteHeuristicExtractor;

impl ByteHeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureExtractor for ByteHeuristicExtractor {
    fn extract(&self, clip: &AudioClip<'_>) -> FeatureVector {
        let byte_len = clip.len();
        let first_byte = clip.first_byte();

        FeatureVector {
            byte_len,
            first_byte,
            duration_secs: duration_estimate(byte_len),
            snr_db: snr_estimate(first_byte),
            energy: energy_estimate(byte_len),
            pitch_hz: pitch_estimate(first_byte),
        }
    }

    fn name(&self) -> &'static str {
        "bytes"
    }
}

/// Classifier applying the demo filename overrides, else the length rule
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl RiskClassifier for RuleBasedClassifier {
    fn classify(&self, clip: &AudioClip<'_>, features: &FeatureVector) -> f64 {
        match filename_override(clip.filename) {
            Some(probability) => {
                log::debug!(
                    "Filename override for {:?}: probability {}",
                    clip.filename,
                    probability
                );
                probability
            }
            None => base_probability(features.byte_len),
        }
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

//! Clip analysis layer
//!
//! Analysis is split into feature extraction and risk classification behind
//! two traits so either half can be swapped without touching the result
//! contract. The default pairing (byte heuristic + filename rules) is the
//! demo stand-in; the decoded extractor and linear classifier are the
//! measured and trained variants.

mod analyzer;
mod decoded;
mod linear;
mod stub;
mod traits;

pub use analyzer::{
    Analyzer, ARTICULATION_NAME, DURATION_LABEL, ENERGY_NAME, PITCH_NAME, SNR_LABEL,
};
pub use decoded::DecodedExtractor;
pub use linear::{LinearClassifier, LinearWeights};
pub use stub::{
    base_probability, duration_estimate, filename_override, snr_estimate, ByteHeuristicExtractor,
    RuleBasedClassifier, HEALTHY_PROBABILITY, HIGHER_RISK_PROBABILITY,
};
pub use traits::{AudioClip, FeatureExtractor, FeatureVector, RiskClassifier};

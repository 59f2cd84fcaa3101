//! Assembles the result contract from an extractor and a classifier

use super::stub::{ByteHeuristicExtractor, RuleBasedClassifier};
use super::traits::{AudioClip, FeatureExtractor, FeatureVector, RiskClassifier};
use crate::model::{AnalysisResult, Feature, QcMetric, QcStatus};

pub const DURATION_LABEL: &str = "Duration";
pub const SNR_LABEL: &str = "Estimated SNR";
pub const ENERGY_NAME: &str = "Energy";
pub const PITCH_NAME: &str = "Pitch estimate";
pub const ARTICULATION_NAME: &str = "Articulation clarity";

const DURATION_HINT: &str = "Aim for at least 10 seconds for reliable results.";
const SNR_HINT: &str = "Higher numbers indicate cleaner recordings.";

/// Shortest clip that passes the duration check
const GOOD_DURATION_SECS: u64 = 10;
/// Lowest SNR that passes the noise check
const GOOD_SNR_DB: u32 = 18;
/// Articulation percentage per unit of probability
const ARTICULATION_SCALE: f64 = 80.0;

/// Clip analyzer. The default pairing is the byte-exact demo derivation;
/// other pairings keep the same output shape.
pub struct Analyzer {
    extractor: Box<dyn FeatureExtractor>,
    classifier: Box<dyn RiskClassifier>,
}

impl Analyzer {
    pub fn new<E, C>(extractor: E, classifier: C) -> Self
    where
        E: FeatureExtractor + 'static,
        C: RiskClassifier + 'static,
    {
        Self {
            extractor: Box::new(extractor),
            classifier: Box::new(classifier),
        }
    }

    /// Swap the feature extractor
    pub fn with_extractor<E: FeatureExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Swap the classifier
    pub fn with_classifier<C: RiskClassifier + 'static>(mut self, classifier: C) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// "extractor+classifier", for logs
    pub fn describe(&self) -> String {
        format!("{}+{}", self.extractor.name(), self.classifier.name())
    }

    /// Analyze one clip. Total over every input, empty uploads included.
    pub fn analyze(&self, clip: &AudioClip<'_>) -> AnalysisResult {
        let features = self.extractor.extract(clip);
        let probability = self.classifier.classify(clip, &features);

        log::debug!(
            "Analyzed {:?} ({} bytes) with {}: probability {}",
            clip.filename,
            clip.len(),
            self.describe(),
            probability
        );

        build_result(&features, probability)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(ByteHeuristicExtractor::new(), RuleBasedClassifier::new())
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("pipeline", &self.describe())
            .finish()
    }
}

fn build_result(features: &FeatureVector, probability: f64) -> AnalysisResult {
    let qc = vec![
        QcMetric::new(
            DURATION_LABEL,
            format!("{}s", features.duration_secs),
            QcStatus::at_least(features.duration_secs, GOOD_DURATION_SECS),
        )
        .with_hint(DURATION_HINT),
        QcMetric::new(
            SNR_LABEL,
            format!("{} dB", features.snr_db),
            QcStatus::at_least(features.snr_db, GOOD_SNR_DB),
        )
        .with_hint(SNR_HINT),
    ];

    let articulation = (probability * ARTICULATION_SCALE).round() as i64;
    let features = vec![
        Feature::new(ENERGY_NAME, features.energy.to_string()),
        Feature::new(PITCH_NAME, format!("{} Hz", features.pitch_hz)),
        Feature::new(ARTICULATION_NAME, format!("{}%", articulation)),
    ];

    AnalysisResult::from_probability(probability, qc, features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decoded::tests::sine_wav;
    use crate::analysis::{DecodedExtractor, LinearClassifier, LinearWeights};
    use crate::model::RiskBucket;

    fn analyze(bytes: &[u8], filename: &str) -> AnalysisResult {
        Analyzer::default().analyze(&AudioClip::new(bytes, filename))
    }

    #[test]
    fn test_empty_clip() {
        let result = analyze(&[], "clip.wav");

        assert_eq!(result.probability, 0.2);
        assert_eq!(result.bucket, RiskBucket::Low);
        assert_eq!(
            result.suggestion,
            "Baseline looks healthy. Retest periodically for comparison."
        );

        let duration = result.qc_metric(DURATION_LABEL).unwrap();
        assert_eq!(duration.value, "5s");
        assert_eq!(duration.status, QcStatus::Warn);
        assert_eq!(duration.hint.as_deref(), Some(DURATION_HINT));

        let snr = result.qc_metric(SNR_LABEL).unwrap();
        assert_eq!(snr.value, "15 dB");
        assert_eq!(snr.status, QcStatus::Warn);

        assert_eq!(result.feature(ENERGY_NAME), Some("60"));
        assert_eq!(result.feature(PITCH_NAME), Some("180 Hz"));
        assert_eq!(result.feature(ARTICULATION_NAME), Some("16%"));
    }

    #[test]
    fn test_higher_risk_demo() {
        let mut bytes = vec![0u8; 10_000];
        bytes[0] = 200;
        let result = analyze(&bytes, "demo_higherrisk.wav");

        assert_eq!(result.probability, 0.98);
        assert_eq!(result.bucket, RiskBucket::High);
        assert_eq!(result.suggestion, "Consider following up with a clinician.");
        assert_eq!(result.qc[0].value, "5s");
        assert_eq!(result.qc[1].value, "15 dB");
        assert_eq!(result.feature(ENERGY_NAME), Some("100")); // 10000 % 120 = 40
        assert_eq!(result.feature(PITCH_NAME), Some("350 Hz"));
        assert_eq!(result.feature(ARTICULATION_NAME), Some("78%"));
    }

    #[test]
    fn test_healthy_demo() {
        let result = analyze(&[3u8; 500], "Demo_Healthy.wav");

        assert_eq!(result.probability, 0.065);
        assert_eq!(result.bucket, RiskBucket::Low);
        assert_eq!(result.feature(ARTICULATION_NAME), Some("5%")); // 5.2 rounds down
    }

    #[test]
    fn test_qc_passes_on_long_clean_clip() {
        let mut bytes = vec![0u8; 40_000];
        bytes[0] = 9;
        let result = analyze(&bytes, "long.webm");

        assert_eq!(result.qc[0].value, "13s");
        assert_eq!(result.qc[0].status, QcStatus::Good);
        assert_eq!(result.qc[1].value, "24 dB");
        assert_eq!(result.qc[1].status, QcStatus::Good);
        assert_eq!(result.probability, 0.2); // 40000 % 1000 = 0
    }

    #[test]
    fn test_fixed_order_and_length() {
        let result = analyze(&[1, 2, 3], "sample.webm");

        let labels: Vec<_> = result.qc.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec![DURATION_LABEL, SNR_LABEL]);

        let names: Vec<_> = result.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![ENERGY_NAME, PITCH_NAME, ARTICULATION_NAME]);
    }

    #[test]
    fn test_bucket_follows_probability() {
        for len in 0..1000usize {
            let result = analyze(&vec![0u8; len], "x.wav");
            assert_eq!(result.bucket, RiskBucket::from_probability(result.probability));
            assert_eq!(result.suggestion, result.bucket.suggestion());
        }
    }

    #[test]
    fn test_swapped_pipeline_keeps_shape() {
        let analyzer = Analyzer::default()
            .with_extractor(DecodedExtractor::new())
            .with_classifier(LinearClassifier::new(LinearWeights {
                bias: -2.0,
                duration: 0.1,
                snr: 0.0,
                energy: 0.0,
                pitch: 0.0,
            }));
        assert_eq!(analyzer.describe(), "decoded+linear");

        let wav = sine_wav(220.0, 8000, 12.0, 0.5);
        let result = analyzer.analyze(&AudioClip::new(&wav, "take.wav"));

        assert_eq!(result.qc.len(), 2);
        assert_eq!(result.features.len(), 3);
        assert_eq!(result.qc[0].value, "12s");
        assert_eq!(result.qc[0].status, QcStatus::Good);
        // sigmoid(-2 + 1.2) ~ 0.31
        assert_eq!(result.bucket, RiskBucket::Low);
    }
}

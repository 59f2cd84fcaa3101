use serde::{Deserialize, Serialize};

/// Coarse risk category derived from the probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBucket {
    Low,
    Medium,
    High,
}

impl RiskBucket {
    /// Lower bound (inclusive) of the Medium bucket
    pub const MEDIUM_FROM: f64 = 0.33;
    /// Lower bound (inclusive) of the High bucket
    pub const HIGH_FROM: f64 = 0.66;

    /// Classify a probability. Boundary values belong to the upper bucket.
    pub fn from_probability(probability: f64) -> Self {
        if probability < Self::MEDIUM_FROM {
            RiskBucket::Low
        } else if probability < Self::HIGH_FROM {
            RiskBucket::Medium
        } else {
            RiskBucket::High
        }
    }

    /// Advisory text shown next to the bucket
    pub fn suggestion(&self) -> &'static str {
        match self {
            RiskBucket::High => "Consider following up with a clinician.",
            RiskBucket::Medium => "Retest in a quieter space or upload another sample.",
            RiskBucket::Low => "Baseline looks healthy. Retest periodically for comparison.",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskBucket::Low => "Low",
            RiskBucket::Medium => "Medium",
            RiskBucket::High => "High",
        }
    }
}

/// Pass/warn status of a quality check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QcStatus {
    Good,
    Warn,
}

impl QcStatus {
    /// `Good` when the measured value reaches the threshold
    pub fn at_least<T: PartialOrd>(value: T, threshold: T) -> Self {
        if value >= threshold {
            QcStatus::Good
        } else {
            QcStatus::Warn
        }
    }
}

/// One quality-control measurement of the input clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcMetric {
    pub label: String,

    /// Display text, unit included
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    pub status: QcStatus,
}

impl QcMetric {
    pub fn new(label: impl Into<String>, value: impl Into<String>, status: QcStatus) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            hint: None,
            status,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Named feature value, already formatted for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: String,
}

impl Feature {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Complete analysis returned for one uploaded clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub probability: f64,
    pub bucket: RiskBucket,
    pub suggestion: String,
    pub qc: Vec<QcMetric>,
    pub features: Vec<Feature>,
}

impl AnalysisResult {
    /// Build a result whose bucket and suggestion follow from `probability`
    pub fn from_probability(probability: f64, qc: Vec<QcMetric>, features: Vec<Feature>) -> Self {
        let bucket = RiskBucket::from_probability(probability);
        Self {
            probability,
            bucket,
            suggestion: bucket.suggestion().to_string(),
            qc,
            features,
        }
    }

    /// Look up a feature value by name
    pub fn feature(&self, name: &str) -> Option<&str> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Look up a quality check by label
    pub fn qc_metric(&self, label: &str) -> Option<&QcMetric> {
        self.qc.iter().find(|m| m.label == label)
    }
}

/// JSON body of every failure response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(RiskBucket::from_probability(0.0), RiskBucket::Low);
        assert_eq!(RiskBucket::from_probability(0.3299), RiskBucket::Low);
        assert_eq!(RiskBucket::from_probability(0.33), RiskBucket::Medium);
        assert_eq!(RiskBucket::from_probability(0.6599), RiskBucket::Medium);
        assert_eq!(RiskBucket::from_probability(0.66), RiskBucket::High);
        assert_eq!(RiskBucket::from_probability(0.98), RiskBucket::High);
    }

    #[test]
    fn test_json_shape() {
        let result = AnalysisResult::from_probability(
            0.065,
            vec![
                QcMetric::new("Duration", "5s", QcStatus::Warn).with_hint("hint"),
                QcMetric::new("Estimated SNR", "15 dB", QcStatus::Good),
            ],
            vec![Feature::new("Energy", "60")],
        );

        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["probability"], 0.065);
        assert_eq!(json["bucket"], "Low");
        assert_eq!(
            json["suggestion"],
            "Baseline looks healthy. Retest periodically for comparison."
        );
        assert_eq!(json["qc"][0]["status"], "warn");
        assert_eq!(json["qc"][0]["hint"], "hint");
        // Absent hints are omitted, not null
        assert!(json["qc"][1].get("hint").is_none());
        assert_eq!(json["features"][0]["name"], "Energy");
        assert_eq!(json["features"][0]["value"], "60");
    }

    #[test]
    fn test_deserialize_without_hint() {
        let raw = r#"{
            "probability": 0.7,
            "bucket": "High",
            "suggestion": "Consider following up with a clinician.",
            "qc": [{"label": "Duration", "value": "12s", "status": "good"}],
            "features": []
        }"#;
        let result: AnalysisResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.bucket, RiskBucket::High);
        assert_eq!(result.qc[0].hint, None);
        assert_eq!(result.qc[0].status, QcStatus::Good);
    }

    #[test]
    fn test_status_threshold() {
        assert_eq!(QcStatus::at_least(10, 10), QcStatus::Good);
        assert_eq!(QcStatus::at_least(9, 10), QcStatus::Warn);
    }
}

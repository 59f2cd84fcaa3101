//! Result contract shared by the analysis service and its callers
//!
//! These types are the only thing the client and the server agree on.
//! Their JSON shape is fixed; everything behind them is replaceable.

mod result;

/// Path of the analysis endpoint
pub const ANALYZE_PATH: &str = "/api/process-audio";
/// Form field carrying the clip
pub const AUDIO_FIELD: &str = "audio";

pub use result::{AnalysisResult, ErrorBody, Feature, QcMetric, QcStatus, RiskBucket};

//! Attempt-level statistical features from raw keystroke events.

mod extractor;

pub use extractor::{Extraction, FeatureExtractor, MalformedGroupPolicy, SkippedGroup};

use serde::{Deserialize, Serialize};

/// Number of scalar statistics per attempt
pub const FEATURE_DIM: usize = 7;

/// Column order of [`AttemptFeatures::to_vector`], fixed across training and
/// prediction.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "dwell_mean",
    "dwell_std",
    "flight_ud_mean",
    "flight_ud_std",
    "flight_dd_mean",
    "flight_dd_std",
    "attempt_duration",
];

/// One feature row per (user_id, attempt_id) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFeatures {
    pub user_id: String,
    pub attempt_id: u32,
    pub dwell_mean: f64,
    pub dwell_std: f64,
    pub flight_ud_mean: f64,
    pub flight_ud_std: f64,
    pub flight_dd_mean: f64,
    pub flight_dd_std: f64,
    pub attempt_duration: f64,
}

impl AttemptFeatures {
    /// Fixed-order numeric vector for model input
    pub fn to_vector(&self) -> [f64; FEATURE_DIM] {
        [
            self.dwell_mean,
            self.dwell_std,
            self.flight_ud_mean,
            self.flight_ud_std,
            self.flight_dd_mean,
            self.flight_dd_std,
            self.attempt_duration,
        ]
    }
}

//! keydyn — biometric user identification from keystroke dynamics.
//!
//! Raw per-keystroke timing events, captured while enrolled users repeatedly
//! type a fixed phrase, are reduced to one statistical feature vector per
//! attempt and fed to a gradient-boosted multiclass classifier that predicts
//! which user produced a given attempt.
//!
//! Modular structure:
//! - [`events`] — Raw event model and per-user CSV loading
//! - [`features`] — Attempt-level statistical feature extraction
//! - [`labels`] — user_id ↔ dense label bijection
//! - [`split`] — Stratified train/test partitioning
//! - [`model`] — Gradient-boosted ensemble and model persistence
//! - [`eval`] — Held-out accuracy and ROC-AUC
//! - [`logging`] — Structured logging setup

pub mod config;
pub mod error;
pub mod eval;
pub mod events;
pub mod features;
pub mod labels;
pub mod logging;
pub mod model;
pub mod split;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use eval::Evaluation;
pub use events::{EventLoader, RawEvent};
pub use features::{AttemptFeatures, FeatureExtractor, FEATURE_DIM};
pub use labels::LabelEncoder;
pub use logging::StructuredLogger;
pub use model::TrainedModel;
pub use split::{stratified_split, TrainTestSplit};

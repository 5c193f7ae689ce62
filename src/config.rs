//! Pipeline configuration. Every knob the run depends on — input directory,
//! split fraction, seed, ensemble hyperparameters — is explicit here, never
//! hardcoded in a stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding `{user_id}_keystrokes.csv` files
    pub data_dir: PathBuf,
    /// Where the trained model artifact is written
    pub model_path: PathBuf,
    /// Train/test split parameters
    pub split: SplitConfig,
    /// Ensemble hyperparameters
    pub trainer: TrainerConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Held-out fraction per class, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the stratified shuffle
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Boosting rounds (one tree per class per round)
    pub rounds: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Shrinkage applied to each tree's output
    pub learning_rate: f64,
    /// Minimum samples a leaf may hold
    pub min_leaf: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("keystroke_data"),
            model_path: PathBuf::from("keydyn_model.json"),
            split: SplitConfig::default(),
            trainer: TrainerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 9,
        }
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        // Many shallow, low-rate trees, full data per tree: small per-user
        // sample counts leave no room for subsampling.
        Self {
            rounds: 600,
            max_depth: 6,
            learning_rate: 0.03,
            min_leaf: 1,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<PipelineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}

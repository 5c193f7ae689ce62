//! Trained classifier artifact: the boosted ensemble together with the label
//! mapping needed to decode predictions back to user ids.

mod gbdt;

pub use gbdt::{GradientBoostedTrees, Objective};

use crate::config::TrainerConfig;
use crate::error::PipelineError;
use crate::features::{AttemptFeatures, FEATURE_DIM, FEATURE_NAMES};
use crate::labels::LabelEncoder;
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Fitted classifier plus everything needed to apply and inspect it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub booster: GradientBoostedTrees,
    pub labels: LabelEncoder,
    pub feature_names: Vec<String>,
    pub trainer: TrainerConfig,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Fit the ensemble on the selected training rows
    pub fn train(
        x_train: ArrayView2<'_, f64>,
        y_train: &[u32],
        labels: LabelEncoder,
        config: &TrainerConfig,
    ) -> Result<Self, PipelineError> {
        let num_classes = labels.num_classes();
        let booster = GradientBoostedTrees::fit(x_train, y_train, num_classes, config)?;
        info!(
            rounds = booster.rounds(),
            classes = num_classes,
            objective = ?booster.objective(),
            "model trained"
        );
        Ok(Self {
            booster,
            labels,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            trainer: *config,
            trained_at: Utc::now(),
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<u32> {
        self.booster.predict(x)
    }

    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.booster.predict_proba(x)
    }

    /// Predicted user ids, decoded through the stored label mapping
    pub fn predict_user_ids(&self, x: ArrayView2<'_, f64>) -> Result<Vec<String>, PipelineError> {
        self.predict(x)
            .into_iter()
            .map(|label| self.labels.decode(label).map(str::to_string))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let data = serde_json::to_vec(self).map_err(|e| PipelineError::Persist {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, data).map_err(|e| PipelineError::io(path, e))?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut model: TrainedModel =
            serde_json::from_str(&data).map_err(|e| PipelineError::Persist {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        model.labels.rebuild_index();
        Ok(model)
    }
}

/// Stack feature rows into an `n × FEATURE_DIM` design matrix
pub fn design_matrix(features: &[AttemptFeatures]) -> Array2<f64> {
    let mut x = Array2::<f64>::zeros((features.len(), FEATURE_DIM));
    for (i, row) in features.iter().enumerate() {
        let v = row.to_vector();
        for (j, value) in v.iter().enumerate() {
            x[[i, j]] = *value;
        }
    }
    x
}

/// Select rows of a design matrix by index, preserving order
pub fn select_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((indices.len(), x.ncols()));
    for (row, &idx) in indices.iter().enumerate() {
        out.row_mut(row).assign(&x.row(idx));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_row(user: &str, attempt: u32, dwell: f64) -> AttemptFeatures {
        AttemptFeatures {
            user_id: user.to_string(),
            attempt_id: attempt,
            dwell_mean: dwell,
            dwell_std: 4.0,
            flight_ud_mean: dwell / 2.0,
            flight_ud_std: 3.0,
            flight_dd_mean: dwell,
            flight_dd_std: 2.0,
            attempt_duration: dwell * 10.0,
        }
    }

    fn tiny_dataset() -> (Vec<AttemptFeatures>, Vec<u32>, LabelEncoder) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for a in 0..6 {
            rows.push(feature_row("alice", a, 60.0 + a as f64));
            y.push(0);
            rows.push(feature_row("bob", a, 120.0 + a as f64));
            y.push(1);
        }
        let enc = LabelEncoder::fit(rows.iter().map(|r| r.user_id.as_str()));
        (rows, y, enc)
    }

    fn quick_config() -> TrainerConfig {
        TrainerConfig {
            rounds: 30,
            max_depth: 3,
            learning_rate: 0.3,
            min_leaf: 1,
        }
    }

    #[test]
    fn design_matrix_preserves_feature_order() {
        let rows = vec![feature_row("alice", 1, 60.0)];
        let x = design_matrix(&rows);
        assert_eq!(x.shape(), &[1, FEATURE_DIM]);
        assert_eq!(x[[0, 0]], 60.0);
        assert_eq!(x[[0, 6]], 600.0);
    }

    #[test]
    fn predictions_decode_to_user_ids() {
        let (rows, y, enc) = tiny_dataset();
        let x = design_matrix(&rows);
        let model = TrainedModel::train(x.view(), &y, enc, &quick_config()).unwrap();
        let ids = model.predict_user_ids(x.view()).unwrap();
        let expected: Vec<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn save_load_round_trip() {
        let (rows, y, enc) = tiny_dataset();
        let x = design_matrix(&rows);
        let model = TrainedModel::train(x.view(), &y, enc, &quick_config()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        let back = TrainedModel::load(&path).unwrap();

        assert_eq!(model.predict(x.view()), back.predict(x.view()));
        assert_eq!(back.labels.decode(0).unwrap(), "alice");
    }

    #[test]
    fn select_rows_picks_in_order() {
        let (rows, _, _) = tiny_dataset();
        let x = design_matrix(&rows);
        let sub = select_rows(&x, &[3, 0]);
        assert_eq!(sub.row(0), x.row(3));
        assert_eq!(sub.row(1), x.row(0));
    }
}

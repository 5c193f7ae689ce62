//! Held-out evaluation: top-1 accuracy, one-vs-rest ROC-AUC, and a short
//! table of true vs predicted user ids for eyeballing.

use crate::error::PipelineError;
use crate::model::TrainedModel;
use ndarray::ArrayView2;
use serde::Serialize;
use tracing::info;

/// Rows kept in the human-readable sample table
const SAMPLE_ROWS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSample {
    pub true_user: String,
    pub predicted_user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub samples: Vec<PredictionSample>,
}

impl Evaluation {
    /// Score the model on the held-out partition
    pub fn compute(
        model: &TrainedModel,
        x_test: ArrayView2<'_, f64>,
        y_test: &[u32],
    ) -> Result<Self, PipelineError> {
        let y_pred = model.predict(x_test);
        let proba = model.predict_proba(x_test);

        let accuracy = accuracy(y_test, &y_pred);
        let roc_auc = roc_auc(y_test, proba.view(), model.labels.num_classes());

        let mut samples = Vec::with_capacity(SAMPLE_ROWS.min(y_test.len()));
        for (&truth, &pred) in y_test.iter().zip(&y_pred).take(SAMPLE_ROWS) {
            samples.push(PredictionSample {
                true_user: model.labels.decode(truth)?.to_string(),
                predicted_user: model.labels.decode(pred)?.to_string(),
            });
        }

        info!(
            accuracy = %format!("{accuracy:.3}"),
            roc_auc = %format!("{roc_auc:.3}"),
            test_rows = y_test.len(),
            "evaluation"
        );
        Ok(Self {
            accuracy,
            roc_auc,
            samples,
        })
    }
}

/// Fraction of exact label matches
pub fn accuracy(y_true: &[u32], y_pred: &[u32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / y_true.len() as f64
}

/// ROC-AUC over class-probability columns. Two classes: plain binary AUC on
/// the positive-class column. More: macro average of one-vs-rest AUCs over
/// the classes present in `y_true`.
pub fn roc_auc(y_true: &[u32], proba: ArrayView2<'_, f64>, num_classes: usize) -> f64 {
    if num_classes == 2 {
        let scores: Vec<f64> = proba.column(1).to_vec();
        let positives: Vec<bool> = y_true.iter().map(|&y| y == 1).collect();
        return binary_auc(&scores, &positives);
    }

    let mut sum = 0.0;
    let mut counted = 0;
    for class in 0..num_classes as u32 {
        let positives: Vec<bool> = y_true.iter().map(|&y| y == class).collect();
        let pos = positives.iter().filter(|&&p| p).count();
        if pos == 0 || pos == positives.len() {
            continue;
        }
        let scores: Vec<f64> = proba.column(class as usize).to_vec();
        sum += binary_auc(&scores, &positives);
        counted += 1;
    }
    if counted == 0 {
        return 0.0;
    }
    sum / counted as f64
}

/// Mann–Whitney formulation with midranks for tied scores
fn binary_auc(scores: &[f64], positives: &[bool]) -> f64 {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Assign midranks to ties, accumulate rank sum of positives
    let mut rank_sum = 0.0;
    let mut at = 0;
    while at < order.len() {
        let mut end = at + 1;
        while end < order.len() && scores[order[end]] == scores[order[at]] {
            end += 1;
        }
        // ranks are 1-based; tied block [at, end) shares the mean rank
        let midrank = (at + 1 + end) as f64 / 2.0;
        for &i in &order[at..end] {
            if positives[i] {
                rank_sum += midrank;
            }
        }
        at = end;
    }

    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

//! Feature extraction: raw events → sort → group by (user, attempt) →
//! per-group timing statistics.

use super::AttemptFeatures;
use crate::error::PipelineError;
use crate::events::RawEvent;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What to do with an attempt group whose timing data is inconsistent
/// (non-finite values, or a negative dwell from clock skew).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedGroupPolicy {
    /// Skip the group, log it, and record it in [`Extraction::skipped`]
    #[default]
    ExcludeAndReport,
    /// Abort extraction with [`PipelineError::MalformedGroup`]
    Fail,
}

/// An attempt group excluded under [`MalformedGroupPolicy::ExcludeAndReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    pub user_id: String,
    pub attempt_id: u32,
    pub detail: String,
}

/// Extraction outcome: one feature row per well-formed attempt group, plus
/// the groups that were excluded.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub features: Vec<AttemptFeatures>,
    pub skipped: Vec<SkippedGroup>,
}

impl Extraction {
    /// Attempt counts per user, in id order
    pub fn attempts_per_user(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for row in &self.features {
            *counts.entry(row.user_id.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

pub struct FeatureExtractor {
    policy: MalformedGroupPolicy,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            policy: MalformedGroupPolicy::default(),
        }
    }

    pub fn with_policy(policy: MalformedGroupPolicy) -> Self {
        Self { policy }
    }

    /// Reduce the unified event collection to one feature row per distinct
    /// (user_id, attempt_id) pair. Sentinel rows never contribute; a group
    /// left empty by the sentinel filter is not emitted at all.
    pub fn extract(&self, events: &[RawEvent]) -> Result<Extraction, PipelineError> {
        let mut rows: Vec<&RawEvent> = events.iter().filter(|e| !e.is_sentinel()).collect();

        // Deterministic within-group ordering regardless of input order
        rows.sort_by(|a, b| {
            (a.user_id.as_str(), a.attempt_id, a.event_idx)
                .cmp(&(b.user_id.as_str(), b.attempt_id, b.event_idx))
        });

        let mut features = Vec::new();
        let mut skipped = Vec::new();

        let mut start = 0;
        while start < rows.len() {
            let key = (rows[start].user_id.as_str(), rows[start].attempt_id);
            let mut end = start + 1;
            while end < rows.len()
                && (rows[end].user_id.as_str(), rows[end].attempt_id) == key
            {
                end += 1;
            }
            let group = &rows[start..end];

            match check_group(group) {
                Ok(()) => features.push(summarize_group(group)),
                Err(detail) => match self.policy {
                    MalformedGroupPolicy::ExcludeAndReport => {
                        warn!(
                            user_id = key.0,
                            attempt_id = key.1,
                            detail = %detail,
                            "excluding malformed attempt group"
                        );
                        skipped.push(SkippedGroup {
                            user_id: key.0.to_string(),
                            attempt_id: key.1,
                            detail,
                        });
                    }
                    MalformedGroupPolicy::Fail => {
                        return Err(PipelineError::MalformedGroup {
                            user_id: key.0.to_string(),
                            attempt_id: key.1,
                            detail,
                        });
                    }
                },
            }
            start = end;
        }

        info!(
            attempts = features.len(),
            skipped = skipped.len(),
            "extracted attempt features"
        );
        Ok(Extraction { features, skipped })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn check_group(group: &[&RawEvent]) -> Result<(), String> {
    for e in group {
        let timings = [
            e.dwell_ms,
            e.flight_ud_ms,
            e.flight_dd_ms,
            e.press_rel_ms,
            e.release_rel_ms,
        ];
        if timings.iter().any(|t| !t.is_finite()) {
            return Err(format!("non-finite timing value at event_idx {}", e.event_idx));
        }
        if e.dwell_ms < 0.0 {
            return Err(format!(
                "negative dwell ({:.3} ms) at event_idx {}",
                e.dwell_ms, e.event_idx
            ));
        }
    }
    Ok(())
}

fn summarize_group(group: &[&RawEvent]) -> AttemptFeatures {
    let dwells: Vec<f64> = group.iter().map(|e| e.dwell_ms).collect();
    let flights_ud: Vec<f64> = group.iter().map(|e| e.flight_ud_ms).collect();
    let flights_dd: Vec<f64> = group.iter().map(|e| e.flight_dd_ms).collect();

    let (dwell_mean, dwell_std) = mean_std(&dwells);
    // First event of an attempt has no defined flight; stats cover the rest
    let (flight_ud_mean, flight_ud_std) = flight_stats(&flights_ud);
    let (flight_dd_mean, flight_dd_std) = flight_stats(&flights_dd);

    let start = group
        .iter()
        .map(|e| e.press_rel_ms)
        .fold(f64::INFINITY, f64::min);
    let end = group
        .iter()
        .map(|e| e.release_rel_ms)
        .fold(f64::NEG_INFINITY, f64::max);

    AttemptFeatures {
        user_id: group[0].user_id.clone(),
        attempt_id: group[0].attempt_id,
        dwell_mean,
        dwell_std,
        flight_ud_mean,
        flight_ud_std,
        flight_dd_mean,
        flight_dd_std,
        attempt_duration: end - start,
    }
}

/// Population mean and standard deviation (divisor N)
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Flight statistics skip the first event of the group. Zero-default policy:
/// a group of size <= 1 has no flight observations, and its stats are pinned
/// to 0.0 so the feature vector stays well-formed.
fn flight_stats(values: &[f64]) -> (f64, f64) {
    if values.len() <= 1 {
        return (0.0, 0.0);
    }
    mean_std(&values[1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user: &str, attempt: u32, idx: u32, ch: &str, dwell: f64) -> RawEvent {
        RawEvent {
            user_id: user.to_string(),
            attempt_id: attempt,
            event_idx: idx,
            key_char: ch.to_string(),
            dwell_ms: dwell,
            flight_ud_ms: if idx == 1 { 0.0 } else { 40.0 },
            flight_dd_ms: if idx == 1 { 0.0 } else { 90.0 },
            press_rel_ms: (idx as f64 - 1.0) * 100.0,
            release_rel_ms: (idx as f64 - 1.0) * 100.0 + dwell,
        }
    }

    #[test]
    fn population_std_uses_divisor_n() {
        let events = vec![event("a", 1, 1, "x", 10.0), event("a", 1, 2, "y", 20.0)];
        let out = FeatureExtractor::new().extract(&events).unwrap();
        let row = &out.features[0];
        assert_eq!(row.dwell_mean, 15.0);
        assert_eq!(row.dwell_std, 5.0);
    }

    #[test]
    fn single_event_group_gets_zero_flight_stats() {
        let events = vec![event("a", 1, 1, "x", 80.0)];
        let out = FeatureExtractor::new().extract(&events).unwrap();
        let row = &out.features[0];
        assert_eq!(row.flight_ud_mean, 0.0);
        assert_eq!(row.flight_ud_std, 0.0);
        assert_eq!(row.flight_dd_mean, 0.0);
        assert_eq!(row.flight_dd_std, 0.0);
        assert_eq!(row.dwell_std, 0.0);
        assert_eq!(row.dwell_mean, 80.0);
    }

    #[test]
    fn all_sentinel_group_is_not_emitted() {
        let mut events = vec![event("a", 1, 1, "x", 50.0), event("a", 1, 2, "y", 60.0)];
        events.push(event("a", 2, 1, "-", 50.0));
        events.push(event("a", 2, 2, "-", 60.0));
        let out = FeatureExtractor::new().extract(&events).unwrap();
        assert_eq!(out.features.len(), 1);
        assert_eq!(out.features[0].attempt_id, 1);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn extraction_is_order_insensitive() {
        let forward = vec![
            event("a", 1, 1, "x", 50.0),
            event("a", 1, 2, "y", 60.0),
            event("b", 3, 1, "x", 70.0),
            event("b", 3, 2, "y", 75.0),
        ];
        let mut shuffled = forward.clone();
        shuffled.reverse();

        let ex = FeatureExtractor::new();
        let a = ex.extract(&forward).unwrap();
        let b = ex.extract(&shuffled).unwrap();
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn negative_dwell_group_is_skipped_and_reported() {
        let events = vec![
            event("a", 1, 1, "x", 50.0),
            event("a", 1, 2, "y", -3.0),
            event("a", 2, 1, "x", 55.0),
        ];
        let out = FeatureExtractor::new().extract(&events).unwrap();
        assert_eq!(out.features.len(), 1);
        assert_eq!(out.features[0].attempt_id, 2);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].attempt_id, 1);
    }

    #[test]
    fn fail_policy_surfaces_malformed_group() {
        let events = vec![event("a", 1, 1, "x", f64::NAN)];
        let err = FeatureExtractor::with_policy(MalformedGroupPolicy::Fail)
            .extract(&events)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedGroup { .. }));
    }

    #[test]
    fn attempts_per_user_counts_rows() {
        let events = vec![
            event("a", 1, 1, "x", 50.0),
            event("a", 2, 1, "x", 51.0),
            event("b", 1, 1, "x", 52.0),
        ];
        let out = FeatureExtractor::new().extract(&events).unwrap();
        let counts = out.attempts_per_user();
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["b"], 1);
    }
}

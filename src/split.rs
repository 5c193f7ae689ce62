//! Stratified train/test partitioning: per-class proportions in each subset
//! match the full set within rounding, reproducibly for a fixed seed.

use crate::config::SplitConfig;
use crate::error::PipelineError;
use crate::labels::LabelEncoder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::info;

/// Disjoint, exhaustive index partition over the feature rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `labels` indices into train and test, stratified by class.
/// Per class, `round(count × test_fraction)` indices go to test, clamped so
/// both partitions keep at least one member of every class. A class with
/// fewer than 2 samples cannot appear in both partitions and is rejected
/// rather than silently degrading the evaluation.
pub fn stratified_split(
    labels: &[u32],
    encoder: &LabelEncoder,
    config: SplitConfig,
) -> Result<TrainTestSplit, PipelineError> {
    let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    for (&label, indices) in &by_class {
        if indices.len() < 2 {
            let user_id = encoder
                .decode(label)
                .map(str::to_string)
                .unwrap_or_else(|_| format!("label {label}"));
            return Err(PipelineError::InsufficientSamples {
                user_id,
                count: indices.len(),
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    // BTreeMap order keeps the class visit order, and with it the RNG
    // stream, independent of input order
    for indices in by_class.values() {
        let mut pool = indices.clone();
        pool.shuffle(&mut rng);

        let count = pool.len();
        let quota = (count as f64 * config.test_fraction).round() as usize;
        let quota = quota.clamp(1, count - 1);

        test.extend(pool.drain(..quota));
        train.extend(pool);
    }

    train.sort_unstable();
    test.sort_unstable();

    info!(
        train = train.len(),
        test = test.len(),
        classes = by_class.len(),
        "stratified split"
    );
    Ok(TrainTestSplit { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(class_counts: &[(u32, usize)]) -> Vec<u32> {
        class_counts
            .iter()
            .flat_map(|&(label, n)| std::iter::repeat(label).take(n))
            .collect()
    }

    fn config(test_fraction: f64, seed: u64) -> SplitConfig {
        SplitConfig {
            test_fraction,
            seed,
        }
    }

    #[test]
    fn partitions_are_disjoint_and_exhaustive() {
        let y = labels(&[(0, 10), (1, 10)]);
        let enc = LabelEncoder::fit(["alice", "bob"]);
        let split = stratified_split(&y, &enc, config(0.3, 9)).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn per_class_quota_matches_fraction() {
        let y = labels(&[(0, 10), (1, 10)]);
        let enc = LabelEncoder::fit(["alice", "bob"]);
        let split = stratified_split(&y, &enc, config(0.3, 9)).unwrap();

        assert_eq!(split.test.len(), 6);
        assert_eq!(split.train.len(), 14);
        for class in 0..2u32 {
            let in_test = split.test.iter().filter(|&&i| y[i] == class).count();
            assert_eq!(in_test, 3);
        }
    }

    #[test]
    fn split_is_reproducible_for_fixed_seed() {
        let y = labels(&[(0, 7), (1, 9), (2, 5)]);
        let enc = LabelEncoder::fit(["a", "b", "c"]);
        let first = stratified_split(&y, &enc, config(0.3, 42)).unwrap();
        let second = stratified_split(&y, &enc, config(0.3, 42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn singleton_class_is_rejected() {
        let y = labels(&[(0, 5), (1, 1)]);
        let enc = LabelEncoder::fit(["alice", "bob"]);
        let err = stratified_split(&y, &enc, config(0.3, 9)).unwrap_err();
        match err {
            PipelineError::InsufficientSamples { user_id, count } => {
                assert_eq!(user_id, "bob");
                assert_eq!(count, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn every_class_kept_in_both_partitions() {
        // Tiny classes where rounding would otherwise empty a partition
        let y = labels(&[(0, 2), (1, 3)]);
        let enc = LabelEncoder::fit(["a", "b"]);
        let split = stratified_split(&y, &enc, config(0.5, 1)).unwrap();
        for class in 0..2u32 {
            assert!(split.train.iter().any(|&i| y[i] == class));
            assert!(split.test.iter().any(|&i| y[i] == class));
        }
    }
}

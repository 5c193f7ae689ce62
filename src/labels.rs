//! Bidirectional mapping between user-id strings and dense integer class
//! labels. Labels are assigned in alphabetical id order, so the mapping is
//! independent of directory iteration order.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Distinct ids, sorted; index is the label
    classes: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl LabelEncoder {
    /// Build the bijection over the distinct ids observed
    pub fn fit<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = user_ids
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        classes.sort();
        classes.dedup();
        let index = build_index(&classes);
        Self { classes, index }
    }

    pub fn encode(&self, user_id: &str) -> Result<u32, PipelineError> {
        self.index
            .get(user_id)
            .copied()
            .ok_or_else(|| PipelineError::UnknownLabel {
                user_id: user_id.to_string(),
            })
    }

    pub fn decode(&self, label: u32) -> Result<&str, PipelineError> {
        self.classes
            .get(label as usize)
            .map(String::as_str)
            .ok_or(PipelineError::LabelOutOfRange {
                label,
                num_classes: self.classes.len(),
            })
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Rebuild the lookup index after deserialization (it is not persisted)
    pub fn rebuild_index(&mut self) {
        self.index = build_index(&self.classes);
    }
}

fn build_index(classes: &[String]) -> HashMap<String, u32> {
    classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i as u32))
        .collect()
}

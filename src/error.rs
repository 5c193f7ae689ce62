//! Pipeline error taxonomy. Every failure is fatal to the run except
//! malformed attempt groups, which the extractor excludes and reports.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema error in {}: {detail}", file.display())]
    Schema { file: PathBuf, detail: String },

    #[error("malformed timing data in attempt group ({user_id}, {attempt_id}): {detail}")]
    MalformedGroup {
        user_id: String,
        attempt_id: u32,
        detail: String,
    },

    #[error("user id {user_id:?} was not seen during label fit")]
    UnknownLabel { user_id: String },

    #[error("label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: u32, num_classes: usize },

    #[error("class {user_id:?} has {count} sample(s); at least 2 are required to stratify")]
    InsufficientSamples { user_id: String, count: usize },

    #[error("training failed: {0}")]
    Training(String),

    #[error("model persistence failed at {}: {detail}", path.display())]
    Persist { path: PathBuf, detail: String },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn schema(file: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Schema {
            file: file.into(),
            detail: detail.into(),
        }
    }
}

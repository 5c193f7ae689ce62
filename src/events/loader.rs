//! Loads every `{user_id}_keystrokes.csv` under a directory into one unified
//! event collection, deriving `user_id` from each file name.

use super::RawEvent;
use crate::error::PipelineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FILE_SUFFIX: &str = "_keystrokes.csv";

const REQUIRED_COLUMNS: &[&str] = &[
    "attempt_id",
    "event_idx",
    "ch",
    "dwell_ms",
    "flight_ud_ms",
    "flight_dd_ms",
    "press_rel_ms",
    "release_rel_ms",
];

/// On-disk row shape. `user_id` may be present in the file but is always
/// overridden by the id derived from the file name.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(default)]
    #[allow(dead_code)]
    user_id: Option<String>,
    attempt_id: u32,
    event_idx: u32,
    ch: String,
    dwell_ms: f64,
    flight_ud_ms: f64,
    flight_dd_ms: f64,
    press_rel_ms: f64,
    release_rel_ms: f64,
}

pub struct EventLoader;

impl EventLoader {
    /// Read all matching files under `dir` and return the union of their
    /// rows. Files are visited in name order, so repeated runs over
    /// unchanged input yield an identical collection.
    pub fn load_dir(dir: &Path) -> Result<Vec<RawEvent>, PipelineError> {
        let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(FILE_SUFFIX) && name.len() > FILE_SUFFIX.len() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::schema(
                dir,
                format!("no *{FILE_SUFFIX} files found"),
            ));
        }

        let mut events = Vec::new();
        for path in &files {
            let user_id = derive_user_id(path);
            let before = events.len();
            Self::load_file(path, &user_id, &mut events)?;
            debug!(
                user_id = %user_id,
                rows = events.len() - before,
                file = %path.display(),
                "loaded keystroke file"
            );
        }

        info!(files = files.len(), rows = events.len(), "combined raw events");
        Ok(events)
    }

    fn load_file(
        path: &Path,
        user_id: &str,
        out: &mut Vec<RawEvent>,
    ) -> Result<(), PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::schema(path, e.to_string()))?
            .clone();
        for col in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *col) {
                return Err(PipelineError::schema(
                    path,
                    format!("missing required column {col:?}"),
                ));
            }
        }

        for result in reader.deserialize() {
            let record: CsvRecord =
                result.map_err(|e| PipelineError::schema(path, e.to_string()))?;
            out.push(RawEvent {
                user_id: user_id.to_string(),
                attempt_id: record.attempt_id,
                event_idx: record.event_idx,
                key_char: record.ch,
                dwell_ms: record.dwell_ms,
                flight_ud_ms: record.flight_ud_ms,
                flight_dd_ms: record.flight_dd_ms,
                press_rel_ms: record.press_rel_ms,
                release_rel_ms: record.release_rel_ms,
            });
        }
        Ok(())
    }
}

fn derive_user_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(FILE_SUFFIX).unwrap_or(&name).to_string()
}

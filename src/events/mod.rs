//! Raw keystroke events as produced by the capture collaborator: one CSV per
//! user, one row per press/release pair.

mod loader;

pub use loader::EventLoader;

use serde::{Deserialize, Serialize};

/// `key_char` value marking a control/non-character row. Such rows carry no
/// usable timing signal and are excluded from feature computation.
pub const SENTINEL_CHAR: &str = "-";

/// One observed press/release pair, stamped with its source user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user_id: String,
    /// One phrase-typing trial, unique within a user
    pub attempt_id: u32,
    /// 1-based position of this key within the attempt, in press order
    pub event_idx: u32,
    pub key_char: String,
    /// Hold duration (release − press)
    pub dwell_ms: f64,
    /// Previous release → this press
    pub flight_ud_ms: f64,
    /// Previous press → this press
    pub flight_dd_ms: f64,
    /// Press time relative to attempt start
    pub press_rel_ms: f64,
    /// Release time relative to attempt start
    pub release_rel_ms: f64,
}

impl RawEvent {
    pub fn is_sentinel(&self) -> bool {
        self.key_char == SENTINEL_CHAR
    }
}

use crate::difficulty::{Difficulty, Plan};
use crate::metrics::MetricSnapshot;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Completed,
}

/// Durable record of one finished session.
///
/// Serialized with the field names the result service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingResult {
    pub participant: String,
    pub plan: Plan,
    pub difficulty: Difficulty,
    pub wpm: u32,
    pub accuracy: u8,
    pub elapsed_seconds: u64,
    pub status: ResultStatus,
    pub created_at: DateTime<Local>,
}

impl TypingResult {
    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            wpm: self.wpm,
            accuracy: self.accuracy,
        }
    }

    pub fn legacy_payload(&self) -> LegacyPayload {
        LegacyPayload {
            wpm: self.wpm,
            accuracy: self.accuracy,
            elapsed_seconds: self.elapsed_seconds,
        }
    }
}

/// Reduced body accepted by the older save endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPayload {
    pub wpm: u32,
    pub accuracy: u8,
    pub elapsed_seconds: u64,
}

/// A result the remote store acknowledged; kept locally for display only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: TypingResult,
    pub synced_at: DateTime<Local>,
}

/// Per-difficulty high-water mark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestStats {
    pub wpm: u32,
    pub accuracy: u8,
}

impl BestStats {
    /// `(wpm, accuracy)` relative to this best; positive means better
    pub fn delta(&self, snap: MetricSnapshot) -> (i64, i64) {
        (
            snap.wpm as i64 - self.wpm as i64,
            snap.accuracy as i64 - self.accuracy as i64,
        )
    }

    pub fn is_improved_by(&self, snap: MetricSnapshot) -> bool {
        snap.wpm > self.wpm || snap.accuracy > self.accuracy
    }

    /// Raise each field independently. Returns true if anything changed.
    pub fn raise(&mut self, snap: MetricSnapshot) -> bool {
        if !self.is_improved_by(snap) {
            return false;
        }
        self.wpm = self.wpm.max(snap.wpm);
        self.accuracy = self.accuracy.max(snap.accuracy);
        true
    }
}

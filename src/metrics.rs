//! Pure words-per-minute and accuracy calculations.
//!
//! Accuracy is word-level everywhere: the typed buffer is compared with the
//! target word by word at the same position, both for live feedback and for
//! the final result.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor applied to elapsed time so WPM does not explode right after the first key
pub const MIN_ELAPSED: Duration = Duration::from_millis(1000);

/// Live or final performance figures for a typed buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub wpm: u32,
    pub accuracy: u8,
}

impl MetricSnapshot {
    pub fn compute(target: &str, typed: &str, elapsed: Duration) -> Self {
        Self {
            wpm: compute_wpm(typed, elapsed),
            accuracy: compute_accuracy(target, typed),
        }
    }
}

/// Per-character feedback for rendering the target sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharState {
    Correct,
    Incorrect,
    Pending,
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Percentage of target words reproduced at the same position, rounded.
pub fn compute_accuracy(target: &str, typed: &str) -> u8 {
    let target_words: Vec<&str> = target.split_whitespace().collect();
    if target_words.is_empty() {
        return 0;
    }

    let matches = target_words
        .iter()
        .zip(typed.split_whitespace())
        .filter(|(expected, actual)| *expected == actual)
        .count();

    ((matches as f64 / target_words.len() as f64) * 100.0).round() as u8
}

/// Whitespace-delimited words per minute, rounded and never negative.
pub fn compute_wpm(typed: &str, elapsed: Duration) -> u32 {
    let words = word_count(typed.trim());
    if words == 0 {
        return 0;
    }

    let minutes = elapsed.max(MIN_ELAPSED).as_millis() as f64 / 60_000.0;
    (words as f64 / minutes).round().max(0.0) as u32
}

/// Compare the typed buffer to the target character by character.
///
/// Returns one entry per target character; characters typed past the end of
/// the target are ignored.
pub fn char_states(target: &str, typed: &str) -> Vec<CharState> {
    let mut typed_chars = typed.chars();
    target
        .chars()
        .map(|expected| match typed_chars.next() {
            Some(c) if c == expected => CharState::Correct,
            Some(_) => CharState::Incorrect,
            None => CharState::Pending,
        })
        .collect()
}

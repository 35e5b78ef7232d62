//! Error types shared across the crate

use crate::difficulty::{Difficulty, Plan};
use crate::session::Status;
use thiserror::Error;

/// Failure to obtain a target sentence
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("sentence request failed: {0}")]
    Transport(String),

    #[error("sentence service returned status {0}")]
    Status(u16),

    #[error("no sentences available for {0}")]
    Empty(Difficulty),
}

/// Errors surfaced by the session state machine
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("cannot {action} while session is {status:?}")]
    InvalidTransition { action: &'static str, status: Status },

    #[error("{plan} plan cannot use {difficulty} sentences")]
    PlanRestricted { plan: Plan, difficulty: Difficulty },

    #[error("could not load sentence: {0}")]
    Provider(#[from] ProviderError),
}

impl SessionError {
    pub fn invalid(action: &'static str, status: Status) -> Self {
        Self::InvalidTransition { action, status }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

/// Local durable store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt record {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Only a sync cycle removes queue entries, so the queue can never be
    /// shorter at the end of a cycle than the snapshot it started from.
    #[error("pending queue shrank during a sync cycle: expected at least {expected} entries, found {found}")]
    QueueShrank { expected: usize, found: usize },
}

/// Remote result store failures, before classification
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("result service unreachable: {0}")]
    Unreachable(String),

    #[error("result service rejected submission: {0}")]
    Rejected(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

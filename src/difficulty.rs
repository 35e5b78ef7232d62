use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named tier selecting both the sentence pool and the countdown length
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// Default countdown for the tier, in seconds
    pub fn default_secs(&self) -> u64 {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Medium => 45,
            Difficulty::Hard => 60,
            Difficulty::Expert => 70,
        }
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_secs(self.default_secs())
    }

    pub fn next(&self) -> Difficulty {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Expert,
            Difficulty::Expert => Difficulty::Easy,
        }
    }
}

/// Subscription tier of the participant
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Premium,
    PremiumPlus,
}

impl Plan {
    /// Expert sentences are reserved for paying plans
    pub fn allows(&self, difficulty: Difficulty) -> bool {
        !(matches!(self, Plan::Free) && difficulty == Difficulty::Expert)
    }
}

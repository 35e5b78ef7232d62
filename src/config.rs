use crate::app_dirs::AppDirs;
use crate::difficulty::{Difficulty, Plan};
use crate::exercise::Profile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Session length per difficulty, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Durations {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
    pub expert: u64,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            easy: Difficulty::Easy.default_secs(),
            medium: Difficulty::Medium.default_secs(),
            hard: Difficulty::Hard.default_secs(),
            expert: Difficulty::Expert.default_secs(),
        }
    }
}

impl Durations {
    pub fn secs(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
            Difficulty::Expert => self.expert,
        }
    }

    pub fn duration(&self, difficulty: Difficulty) -> Duration {
        Duration::from_secs(self.secs(difficulty).max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub participant: String,
    pub plan: Plan,
    pub difficulty: Difficulty,
    /// Base URL of the sentence and result service. Without it sentences
    /// come from the embedded corpus and results stay queued locally.
    pub api_base_url: Option<String>,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub durations: Durations,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            participant: "Guest".to_string(),
            plan: Plan::Free,
            difficulty: Difficulty::Easy,
            api_base_url: None,
            sync_interval_secs: 15,
            request_timeout_secs: 5,
            durations: Durations::default(),
        }
    }
}

impl Config {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn profile(&self) -> Profile {
        Profile {
            participant: self.participant.clone(),
            plan: self.plan,
            durations: self.durations,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("typeforge_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

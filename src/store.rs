use crate::app_dirs::AppDirs;
use crate::difficulty::Difficulty;
use crate::error::{StoreError, StoreResult};
use crate::record::{BestStats, HistoryEntry, TypingResult};
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

pub const PENDING_KEY: &str = "pendingResults";
pub const HISTORY_KEY: &str = "history";

pub fn best_stats_key(difficulty: Difficulty) -> String {
    format!("bestStats_{difficulty}")
}

pub fn last_sentence_key(difficulty: Difficulty) -> String {
    format!("lastSentence_{difficulty}")
}

/// Key/value persistence that survives restarts.
///
/// Values are JSON documents. Typed accessors for the records the crate
/// uses are provided on top of the raw methods.
pub trait LocalStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    fn put_raw(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write several records so that either all or none become visible
    fn put_many_raw(&self, entries: &[(&str, String)]) -> StoreResult<()>;

    fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.put_raw(key, &serde_json::to_string(value)?)
    }

    fn pending(&self) -> StoreResult<Vec<TypingResult>>
    where
        Self: Sized,
    {
        Ok(self.load(PENDING_KEY)?.unwrap_or_default())
    }

    fn save_pending(&self, pending: &[TypingResult]) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.save(PENDING_KEY, pending)
    }

    fn history(&self) -> StoreResult<Vec<HistoryEntry>>
    where
        Self: Sized,
    {
        Ok(self.load(HISTORY_KEY)?.unwrap_or_default())
    }

    /// Persist the queue and the synced history together
    fn save_pending_and_history(
        &self,
        pending: &[TypingResult],
        history: &[HistoryEntry],
    ) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.put_many_raw(&[
            (PENDING_KEY, serde_json::to_string(pending)?),
            (HISTORY_KEY, serde_json::to_string(history)?),
        ])
    }

    fn best_stats(&self, difficulty: Difficulty) -> StoreResult<BestStats>
    where
        Self: Sized,
    {
        Ok(self.load(&best_stats_key(difficulty))?.unwrap_or_default())
    }

    fn save_best_stats(&self, difficulty: Difficulty, best: &BestStats) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.save(&best_stats_key(difficulty), best)
    }

    fn last_sentence(&self, difficulty: Difficulty) -> StoreResult<Option<String>>
    where
        Self: Sized,
    {
        self.load(&last_sentence_key(difficulty))
    }

    fn save_last_sentence(&self, difficulty: Difficulty, sentence: &str) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.save(&last_sentence_key(difficulty), sentence)
    }
}

impl<T: LocalStore + ?Sized> LocalStore for &T {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_raw(key)
    }

    fn put_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).put_raw(key, value)
    }

    fn put_many_raw(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        (**self).put_many_raw(entries)
    }
}

/// SQLite-backed local store, one row per key
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store at the default state location
    pub fn open_default() -> StoreResult<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("typeforge.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    /// Remove every record (for resets and tests)
    pub fn clear(&self) -> StoreResult<()> {
        self.conn.execute("DELETE FROM records", [])?;
        Ok(())
    }
}

const UPSERT: &str = r#"
    INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

impl LocalStore for SqliteStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM records WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn
            .execute(UPSERT, params![key, value, Local::now().to_rfc3339()])?;
        Ok(())
    }

    fn put_many_raw(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let now = Local::now().to_rfc3339();
        for (key, value) in entries {
            tx.execute(UPSERT, params![key, value, now])?;
        }
        tx.commit()?;
        Ok(())
    }
}

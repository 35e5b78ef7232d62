use crate::difficulty::{Difficulty, Plan};
use crate::error::StoreResult;
use crate::sync::HistoryRow;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    participant: &'a str,
    plan: Plan,
    difficulty: Difficulty,
    wpm: u32,
    accuracy: u8,
    elapsed_seconds: u64,
    created_at: String,
    synced: bool,
    synced_at: Option<String>,
}

impl<'a> From<&'a HistoryRow> for CsvRow<'a> {
    fn from(row: &'a HistoryRow) -> Self {
        Self {
            participant: &row.result.participant,
            plan: row.result.plan,
            difficulty: row.result.difficulty,
            wpm: row.result.wpm,
            accuracy: row.result.accuracy,
            elapsed_seconds: row.result.elapsed_seconds,
            created_at: row.result.created_at.to_rfc3339(),
            synced: row.is_synced(),
            synced_at: row.synced_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Write rows as CSV with a header line
pub fn write_csv<W: Write>(rows: &[HistoryRow], writer: W) -> StoreResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CsvRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv<P: AsRef<Path>>(rows: &[HistoryRow], path: P) -> StoreResult<usize> {
    let file = std::fs::File::create(path)?;
    write_csv(rows, file)?;
    Ok(rows.len())
}

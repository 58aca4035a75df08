use crate::error::SessionError;
use crate::trade::Trade;
use indexmap::IndexMap;
use kite_graph::ExecutionEvent;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One line of `node_events.jsonl` (§4.8 Persistence): `{exec_id, event,
/// timestamp}`. `event` embeds the whole [`ExecutionEvent`] so a reload needs
/// no side-channel lookups.
#[derive(Serialize)]
struct PersistedEvent<'a> {
    exec_id: &'a str,
    event: &'a ExecutionEvent,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// `<root>/<date>/<user_id>/<strategy_id>/` (§4.8, §6 "Persisted state layout").
pub fn session_dir(root: &Path, date: chrono::NaiveDate, user_id: &str, strategy_id: &str) -> PathBuf {
    root.join(date.format("%Y-%m-%d").to_string()).join(user_id).join(strategy_id)
}

/// Append-only writer for `node_events.jsonl`. Truncated on fresh session
/// start (§6: "Files are truncated on fresh session start"); every subsequent
/// emitted event is appended as one line.
#[derive(Debug)]
pub struct EventLogWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl EventLogWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("node_events.jsonl"),
            file: None,
        }
    }

    /// Truncates and (re)opens the file for append, creating `dir` if needed.
    pub fn open_fresh(&mut self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SessionError::Persistence {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| SessionError::Persistence {
                path: self.path.display().to_string(),
                source,
            })?;
        self.file = Some(BufWriter::new(file));
        Ok(())
    }

    pub fn append(&mut self, event: &ExecutionEvent) -> Result<(), SessionError> {
        let Some(writer) = self.file.as_mut() else {
            return Ok(());
        };
        let line = serde_json::to_string(&PersistedEvent {
            exec_id: &event.execution_id,
            event,
            timestamp: event.timestamp,
        })?;
        writeln!(writer, "{line}").map_err(|source| SessionError::Persistence {
            path: self.path.display().to_string(),
            source,
        })?;
        writer.flush().map_err(|source| SessionError::Persistence {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rewrite-on-every-update writer for `trades.jsonl` (§4.8: "upsert file
/// (rewritten on every update) capturing the final state of each trade").
/// Keeps the full trade map in memory and re-serializes it wholesale on every
/// upsert — correct and simple for the per-second emission cadence (§4.7),
/// trading a little I/O for never needing seek-and-rewrite-in-place logic.
#[derive(Debug, Default)]
pub struct TradeLogWriter {
    path: PathBuf,
}

impl TradeLogWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("trades.jsonl"),
        }
    }

    pub fn rewrite(&self, trades: &IndexMap<String, Trade>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SessionError::Persistence {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| SessionError::Persistence {
                path: self.path.display().to_string(),
                source,
            })?;
        let mut writer = BufWriter::new(file);
        for trade in trades.values() {
            let line = serde_json::to_string(trade)?;
            writeln!(writer, "{line}").map_err(|source| SessionError::Persistence {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        writer.flush().map_err(|source| SessionError::Persistence {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_dir_layout_matches_spec() {
        let root = Path::new("/data/kite");
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let dir = session_dir(root, date, "user-1", "strategy-1");
        assert_eq!(dir, PathBuf::from("/data/kite/2026-07-28/user-1/strategy-1"));
    }
}

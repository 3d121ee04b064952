//! Append-only JSONL journal of published events, one file per UTC day.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::json;
use tracing::warn;

pub struct EventJournal {
    root: PathBuf,
    day: NaiveDate,
    file: File,
}

fn day_file(root: &Path, day: NaiveDate) -> PathBuf {
    root.join(format!("events-{}.jsonl", day.format("%Y-%m-%d")))
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl EventJournal {
    /// Creates `root` if needed and opens today's file.
    pub fn open(root: PathBuf) -> io::Result<Self> {
        create_dir_all(&root)?;
        let day = Utc::now().date_naive();
        let file = append_to(&day_file(&root, day))?;
        Ok(Self { root, day, file })
    }

    /// Appends one `{ts, topic, message}` line. Write failures are logged
    /// and reported as `false`.
    pub fn record(&mut self, topic: &str, message: &str) -> bool {
        match self.append_at(Utc::now(), topic, message) {
            Ok(()) => true,
            Err(e) => {
                warn!("Event journal write failed: {}", e);
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn current_path(&self) -> PathBuf {
        day_file(&self.root, self.day)
    }

    fn append_at(&mut self, at: DateTime<Utc>, topic: &str, message: &str) -> io::Result<()> {
        let day = at.date_naive();
        if day != self.day {
            self.file = append_to(&day_file(&self.root, day))?;
            self.day = day;
        }

        let line = json!({
            "ts": at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "topic": topic,
            "message": message,
        });
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }
}

use chrono::Local;
use directories::ProjectDirs;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use crate::stats::SessionStats;

/// Append-only CSV log, one row per finished attempt. The log is
/// advisory; callers ignore failures.
#[derive(Debug, Clone)]
pub struct AttemptLog {
    path: PathBuf,
}

impl AttemptLog {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "codetap") {
            pd.config_dir().join("results.csv")
        } else {
            PathBuf::from("codetap_results.csv")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(
        &self,
        task_id: &str,
        stats: &SessionStats,
        best_streak: u32,
    ) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let as_io = |e: csv::Error| io::Error::new(io::ErrorKind::Other, e);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer
                .write_record([
                    "date",
                    "task_id",
                    "elapsed_secs",
                    "cpm",
                    "accuracy_pct",
                    "errors",
                    "best_streak",
                ])
                .map_err(as_io)?;
        }

        writer
            .write_record(&[
                Local::now().format("%c").to_string(),
                task_id.to_string(),
                format!("{:.2}", stats.elapsed_ms as f64 / 1000.0),
                stats.cpm.to_string(),
                stats.accuracy_pct().to_string(),
                stats.wrong.to_string(),
                best_streak.to_string(),
            ])
            .map_err(as_io)?;
        writer.flush()?;

        Ok(())
    }
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stats() -> SessionStats {
        SessionStats {
            total: 10,
            entered: 10,
            correct: 10,
            correct_not_fixed: 9,
            wrong: 0,
            cpm: 180,
            accuracy: 0.9,
            elapsed_ms: 12_340,
            finished: true,
            cursor: 10,
        }
    }

    #[test]
    fn first_append_writes_header_and_row() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::with_path(dir.path().join("results.csv"));
        log.append("1:1:1", &stats(), 7).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
        let mut lines = raw.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,task_id,elapsed_secs,cpm,accuracy_pct,errors,best_streak"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("1:1:1"));
        assert!(row.contains("12.34"));
        assert!(row.contains("180"));
        assert!(row.ends_with(",7"));
    }

    #[test]
    fn later_appends_skip_the_header() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::with_path(dir.path().join("results.csv"));
        log.append("1:1:1", &stats(), 3).unwrap();
        log.append("2:1:1", &stats(), 4).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert_eq!(raw.matches("date,task_id").count(), 1);
    }
}

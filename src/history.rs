//! Legacy flat history of generated cues.
//!
//! One `time|channel|fileName|text` line per entry, kept sorted by the time
//! field. The sort compares that field as text so files written by earlier
//! servers keep their order (`"10"` sorts before `"2"`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::ChannelId;
use crate::project::{atomic_write, ProjectError};

/// Build one history line.
pub fn format_entry(time: &str, channel: &ChannelId, file_name: &str, text: &str) -> String {
    format!("{time}|{channel}|{file_name}|{text}")
}

fn time_field(entry: &str) -> &str {
    entry.split('|').next().unwrap_or_default()
}

pub struct HistoryLog {
    path: PathBuf,
    entries: Vec<String>,
}

impl HistoryLog {
    /// Read existing entries; a missing file yields an empty log.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(data) => data
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToString::to_string)
                .collect(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to read {}: {e}", path.display());
                }
                Vec::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append `entry` unless an identical line is already present, then
    /// re-sort and persist. Returns false for duplicates, which leave the
    /// file untouched. The entry is kept in memory only once it is on disk.
    pub fn append(&mut self, entry: String) -> Result<bool, ProjectError> {
        if self.entries.contains(&entry) {
            log::debug!("History entry already present, skipping: {entry}");
            return Ok(false);
        }
        let mut next = self.entries.clone();
        next.push(entry);
        // Stable, so entries sharing a time keep insertion order.
        next.sort_by(|a, b| time_field(a).cmp(time_field(b)));
        atomic_write(&self.path, render(&next).as_bytes())?;
        self.entries = next;
        Ok(true)
    }
}

fn render(entries: &[String]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn format_entry_layout() {
        let line = format_entry("12", &ChannelId::new("3"), "intro.mp3", "Welcome");
        assert_eq!(line, "12|3|intro.mp3|Welcome");
    }

    #[test]
    fn duplicate_lines_are_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.txt");
        let mut log = HistoryLog::load(&path);

        assert!(log.append("5|1|a.mp3|hello".into()).unwrap());
        assert!(!log.append("5|1|a.mp3|hello".into()).unwrap());
        assert_eq!(log.entries().len(), 1);

        let on_disk = fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "5|1|a.mp3|hello\n");
    }

    #[test]
    fn time_field_sorts_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.txt");
        let mut log = HistoryLog::load(&path);

        log.append("10|1|a.mp3|a".into()).unwrap();
        log.append("2|1|b.mp3|b".into()).unwrap();
        log.append("1|1|c.mp3|c".into()).unwrap();

        assert_eq!(
            log.entries(),
            &["1|1|c.mp3|c", "10|1|a.mp3|a", "2|1|b.mp3|b"]
        );
        let reloaded = HistoryLog::load(&path);
        assert_eq!(reloaded.entries(), log.entries());
    }

    #[test]
    fn load_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.txt");
        fs::write(&path, "1|0|a.mp3|x\n\n  \n2|0|b.mp3|y\n").unwrap();
        assert_eq!(HistoryLog::load(&path).entries().len(), 2);
    }
    #[test]
    fn failed_write_is_not_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("events.txt");
        let mut log = HistoryLog::load(&path);

        assert!(log.append("5|1|a.mp3|hello".into()).is_err());
        assert!(log.entries().is_empty());

        fs::remove_file(&blocker).unwrap();
        assert!(log.append("5|1|a.mp3|hello".into()).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "5|1|a.mp3|hello\n");
    }
}

//! Centralized path definitions for all data files and directories.
//!
//! This module is the single source of truth for leaf filenames, directory names,
//! and path-building functions. No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_PROJECT_FILE: &str = "solaris.json";
pub const HISTORY_FILE: &str = "events.txt";
pub const GENERATOR_SCRIPT: &str = "generator.py";

pub const PROJECT_EXTENSION: &str = "json";
pub const AUDIO_EXTENSION: &str = "mp3";

// ── Directory names ──────────────────────────────────────────────

pub const AUDIO_DIR: &str = "audio";

// ── Data-dir functions ───────────────────────────────────────────

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

pub fn generator_script(audio_dir: &Path) -> PathBuf {
    audio_dir.join(GENERATOR_SCRIPT)
}

// ── Project functions ────────────────────────────────────────────

/// File name for a project called `name`: `name.json` unless it already
/// carries the extension.
pub fn project_file_name(name: &str) -> String {
    let suffix = format!(".{PROJECT_EXTENSION}");
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Human-readable project name: the file stem of its path.
pub fn project_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where an unreadable project file is kept before it can be overwritten:
/// `show.json` → `show.json.bak`.
pub fn unreadable_backup(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

// ── Audio functions (take audio_dir) ─────────────────────────────

/// Directory holding rendered audio for one namespace (a channel label or a
/// project name).
pub fn namespace_dir(audio_dir: &Path, namespace: &str) -> PathBuf {
    audio_dir.join(namespace)
}

/// Where the generator leaves `<base_name>.mp3` for `namespace`.
pub fn rendered_audio(audio_dir: &Path, namespace: &str, base_name: &str) -> PathBuf {
    namespace_dir(audio_dir, namespace).join(format!("{base_name}.{AUDIO_EXTENSION}"))
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths;
use crate::project::read_json;

/// Server configuration, stored as `settings.json` in the data directory.
///
/// Every field has a default so a partial (or absent) file works. Relative
/// paths are resolved against the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    pub tick_interval_ms: u64,
    /// Clock value after a stop or reset.
    pub start_tick: i64,
    /// The clock stops once it advances past this value.
    pub end_tick: i64,
    /// Broadcast `stop` when the clock runs past `end_tick`, not only on a
    /// manual stop.
    pub stop_on_end: bool,
    /// Project loaded at startup, relative to `projects_dir`.
    pub project_file: String,
    pub history_file: PathBuf,
    pub projects_dir: PathBuf,
    pub audio_dir: PathBuf,
    /// Speech generator program; `None` runs `python3 <audio_dir>/generator.py`.
    pub tts_program: Option<String>,
    pub tts_args: Vec<String>,
    pub tts_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 1234,
            tick_interval_ms: 1000,
            start_tick: -4,
            end_tick: 1200,
            stop_on_end: true,
            project_file: paths::DEFAULT_PROJECT_FILE.to_string(),
            history_file: PathBuf::from(paths::HISTORY_FILE),
            projects_dir: PathBuf::from("."),
            audio_dir: PathBuf::from(paths::AUDIO_DIR),
            tts_program: None,
            tts_args: Vec::new(),
            tts_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout_secs)
    }

    /// Make every path absolute with respect to `data_dir`.
    pub fn resolve_paths(&mut self, data_dir: &Path) {
        for path in [
            &mut self.history_file,
            &mut self.projects_dir,
            &mut self.audio_dir,
        ] {
            if path.is_relative() {
                *path = data_dir.join(&*path);
            }
        }
    }

    /// Program and leading arguments for the speech generator.
    pub fn tts_command(&self) -> (String, Vec<String>) {
        match &self.tts_program {
            Some(program) => (program.clone(), self.tts_args.clone()),
            None => {
                let mut args = vec![paths::generator_script(&self.audio_dir)
                    .to_string_lossy()
                    .into_owned()];
                args.extend(self.tts_args.iter().cloned());
                ("python3".to_string(), args)
            }
        }
    }
}

/// Load settings from the data directory. A missing file yields defaults;
/// an unreadable one is logged and also yields defaults.
pub fn load_settings(data_dir: &Path) -> ServerSettings {
    let path = paths::settings_path(data_dir);
    if !path.exists() {
        return ServerSettings::default();
    }
    match read_json::<ServerSettings>(&path) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Ignoring unreadable {}: {e}", path.display());
            ServerSettings::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings {
            port: 4321,
            end_tick: 90,
            ..ServerSettings::default()
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(paths::settings_path(dir.path()), json).unwrap();
        assert_eq!(load_settings(dir.path()), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(paths::settings_path(dir.path()), r#"{"port": 9000}"#).unwrap();
        let loaded = load_settings(dir.path());
        assert_eq!(loaded.port, 9000);
        assert_eq!(loaded.start_tick, -4);
        assert_eq!(loaded.end_tick, 1200);
        assert_eq!(loaded.tts_timeout_secs, 30);
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings(dir.path()), ServerSettings::default());
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut s = ServerSettings {
            audio_dir: PathBuf::from("/srv/audio"),
            ..ServerSettings::default()
        };
        s.resolve_paths(Path::new("/data"));
        assert_eq!(s.audio_dir, PathBuf::from("/srv/audio"));
        assert_eq!(s.history_file, PathBuf::from("/data/events.txt"));
        assert_eq!(s.projects_dir, PathBuf::from("/data/."));
    }

    #[test]
    fn test_default_tts_command_runs_generator_script() {
        let mut s = ServerSettings::default();
        s.resolve_paths(Path::new("/data"));
        let (program, args) = s.tts_command();
        assert_eq!(program, "python3");
        assert_eq!(args, vec!["/data/audio/generator.py".to_string()]);
    }
}

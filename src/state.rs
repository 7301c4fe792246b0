use std::sync::Arc;

use parking_lot::Mutex;

use crate::clients::{ClientId, ClientRegistry};
use crate::history::HistoryLog;
use crate::project::ProjectStore;
use crate::protocol::Frame;
use crate::settings::ServerSettings;
use crate::timeline::Timeline;
use crate::tts::{ScriptSynth, SpeechSynth};

// ── Application State ──────────────────────────────────────────────

/// Server state shared by the clock driver and every connection task.
///
/// Lock order is `clock` → `project` → `history`. No lock is held across an
/// `.await`.
pub struct AppState {
    pub clock: Mutex<Timeline>,
    pub project: Mutex<ProjectStore>,
    pub history: Mutex<HistoryLog>,
    pub clients: ClientRegistry,
    pub synth: Arc<dyn SpeechSynth>,
    pub settings: ServerSettings,
}

impl AppState {
    /// Build state from resolved settings, loading the startup project and
    /// the history log from disk.
    pub fn new(settings: ServerSettings, synth: Arc<dyn SpeechSynth>) -> Self {
        let project = ProjectStore::open(
            settings.projects_dir.clone(),
            settings.audio_dir.clone(),
            &settings.project_file,
        );
        let history = HistoryLog::load(&settings.history_file);
        Self {
            clock: Mutex::new(Timeline::new(settings.start_tick, settings.end_tick)),
            project: Mutex::new(project),
            history: Mutex::new(history),
            clients: ClientRegistry::new(),
            synth,
            settings,
        }
    }

    /// State whose speech generator is the configured external program.
    pub fn with_script_synth(settings: ServerSettings) -> Self {
        let (program, args) = settings.tts_command();
        let synth = ScriptSynth::new(
            program,
            args,
            settings.audio_dir.clone(),
            settings.tts_timeout(),
        );
        Self::new(settings, Arc::new(synth))
    }

    /// Read-only access to the project store. Locks the mutex for the duration of `f`.
    pub fn with_project<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ProjectStore) -> R,
    {
        let guard = self.project.lock();
        f(&guard)
    }

    /// Mutating access to the project store. Locks the mutex for the duration of `f`.
    pub fn with_project_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ProjectStore) -> R,
    {
        let mut guard = self.project.lock();
        f(&mut guard)
    }

    /// Mutating access to the history log.
    pub fn with_history_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HistoryLog) -> R,
    {
        let mut guard = self.history.lock();
        f(&mut guard)
    }

    pub fn broadcast(&self, frame: &Frame) {
        self.clients.broadcast(&frame.to_string());
    }

    pub fn send_to(&self, client: ClientId, frame: &Frame) {
        if !self.clients.send_to(client, &frame.to_string()) {
            log::debug!("Reply to departed client {client} dropped");
        }
    }

    /// Frames a newly connected client needs to show the current state.
    pub fn greeting(&self) -> Vec<Frame> {
        self.with_project(|project| {
            vec![
                Frame::CurrentProject(project.current_project_name()),
                Frame::SendToAll(project.send_to_all()),
            ]
        })
    }
}

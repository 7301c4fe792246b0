//! The show clock.
//!
//! [`Timeline`] is the pure state machine; the free functions below apply
//! it to the shared [`AppState`] and fan the resulting frames out to every
//! client. All frames for tick N are broadcast, under the clock lock, before
//! tick N+1 is computed.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::cue_index;
use crate::model::ProjectDocument;
use crate::protocol::Frame;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

pub struct Timeline {
    counter: i64,
    state: ClockState,
    start_tick: i64,
    end_tick: i64,
}

impl Timeline {
    pub fn new(start_tick: i64, end_tick: i64) -> Self {
        Self {
            counter: start_tick,
            state: ClockState::Stopped,
            start_tick,
            end_tick,
        }
    }

    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Run, optionally jumping to `at` first. Starting a running clock only
    /// applies the jump.
    pub fn start(&mut self, at: Option<i64>) {
        if let Some(tick) = at {
            self.counter = tick;
        }
        self.state = ClockState::Running;
    }

    /// Stop and rewind to the start tick, whatever the current state.
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.counter = self.start_tick;
    }

    pub fn seek(&mut self, tick: i64) {
        self.counter = tick;
    }

    /// Evaluate the current tick against `doc` and advance.
    ///
    /// Returns the frames to broadcast, in order: `time|T`, then one `play`
    /// per due cue and channel, then `stop` if the clock ran past its end and
    /// `stop_on_end` is set. A stopped clock yields nothing.
    pub fn tick(&mut self, doc: &ProjectDocument, stop_on_end: bool) -> Vec<Frame> {
        if !self.is_running() {
            return Vec::new();
        }

        let now = self.counter;
        let mut frames = vec![Frame::Time(now)];
        frames.extend(cue_index::play_frames(doc, now));

        // A counter that cannot advance has run past any end bound.
        let next = now.checked_add(1).filter(|n| *n <= self.end_tick);
        if let Some(next) = next {
            self.counter = next;
        } else {
            log::info!("Show clock passed {}, stopping", self.end_tick);
            self.stop();
            if stop_on_end {
                frames.push(Frame::Stop);
            }
        }
        frames
    }
}

// ── Operations on shared state ──────────────────────────────────────

pub fn start(state: &AppState, at: Option<i64>) {
    let mut clock = state.clock.lock();
    clock.start(at);
    log::info!("Show clock running from {}", clock.counter());
}

/// Stop, rewind and tell every client to clear its display.
pub fn stop(state: &AppState) {
    let mut clock = state.clock.lock();
    clock.stop();
    state.broadcast(&Frame::Stop);
    log::info!("Show clock stopped");
}

pub fn seek(state: &AppState, tick: i64) {
    state.clock.lock().seek(tick);
    log::info!("Show clock set to {tick}");
}

/// Set the project's `sendToAll` flag, persist it and announce it.
pub fn set_broadcast_override(state: &AppState, enabled: bool) {
    let saved = state.with_project_mut(|project| {
        project.set_send_to_all(enabled);
        project.save()
    });
    state.broadcast(&Frame::SendToAll(enabled));
    match saved {
        Ok(()) => state.broadcast(&Frame::DataUpdated),
        Err(e) => log::warn!("Failed to persist sendToAll={enabled}: {e}"),
    }
}

/// Evaluate one tick and broadcast its frames.
pub fn tick(state: &AppState) {
    let mut clock = state.clock.lock();
    if !clock.is_running() {
        return;
    }
    let frames = {
        let project = state.project.lock();
        clock.tick(project.document(), state.settings.stop_on_end)
    };
    for frame in &frames {
        state.broadcast(frame);
    }
}

/// Drive the clock at the configured rate until the runtime shuts down.
pub async fn run_clock(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(state.settings.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        tick(&state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{ChannelId, Command, Event};

    fn show() -> ProjectDocument {
        let mut doc = ProjectDocument::empty();
        doc.commands.push(Command {
            name: "cueA".into(),
            file_name: Some("a.mp3".into()),
            text: "hi".into(),
        });
        doc.events.push(Event::new(5, "cueA", vec![ChannelId::new("0")]));
        doc
    }

    fn render(frames: &[Frame]) -> Vec<String> {
        frames.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn new_clock_is_stopped_at_start() {
        let clock = Timeline::new(-4, 1200);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.counter(), -4);
    }

    #[test]
    fn stopped_clock_emits_nothing() {
        let mut clock = Timeline::new(-4, 1200);
        assert!(clock.tick(&show(), true).is_empty());
        assert_eq!(clock.counter(), -4);
    }

    #[test]
    fn time_frame_precedes_play_frames() {
        let mut clock = Timeline::new(-4, 1200);
        clock.start(Some(5));
        let frames = clock.tick(&show(), true);
        assert_eq!(render(&frames), vec!["time|5", "play|0|a.mp3|hi"]);
        assert_eq!(clock.counter(), 6);
    }

    #[test]
    fn advancing_to_cue_tick_fires_once() {
        let mut clock = Timeline::new(-4, 1200);
        clock.start(Some(3));
        let mut all = Vec::new();
        for _ in 0..4 {
            all.extend(render(&clock.tick(&show(), true)));
        }
        let plays: Vec<&String> = all.iter().filter(|f| f.starts_with("play|")).collect();
        assert_eq!(plays, vec!["play|0|a.mp3|hi"]);
        assert_eq!(all[0], "time|3");
    }

    #[test]
    fn start_is_idempotent_and_seek_keeps_state() {
        let mut clock = Timeline::new(0, 10);
        clock.start(None);
        clock.start(None);
        assert!(clock.is_running());
        clock.seek(7);
        assert!(clock.is_running());
        assert_eq!(clock.counter(), 7);

        clock.stop();
        clock.seek(3);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.counter(), 3);
    }

    #[test]
    fn stop_always_rewinds() {
        let mut clock = Timeline::new(-4, 1200);
        clock.stop();
        assert_eq!(clock.counter(), -4);
        clock.start(Some(100));
        clock.stop();
        clock.stop();
        assert_eq!(clock.counter(), -4);
        assert!(!clock.is_running());
    }

    #[test]
    fn passing_the_end_stops_and_resets() {
        let mut clock = Timeline::new(-4, 6);
        clock.start(Some(6));
        let frames = clock.tick(&ProjectDocument::empty(), true);
        assert_eq!(render(&frames), vec!["time|6", "stop"]);
        assert!(!clock.is_running());
        assert_eq!(clock.counter(), -4);
    }

    #[test]
    fn max_tick_ends_the_show_without_overflow() {
        let mut clock = Timeline::new(-4, i64::MAX);
        clock.start(Some(i64::MAX));
        let frames = clock.tick(&ProjectDocument::empty(), true);
        assert_eq!(render(&frames), vec![format!("time|{}", i64::MAX), "stop".to_string()]);
        assert!(!clock.is_running());
        assert_eq!(clock.counter(), -4);
    }

    #[test]
    fn natural_end_can_stay_silent() {
        let mut clock = Timeline::new(-4, 6);
        clock.start(Some(6));
        let frames = clock.tick(&ProjectDocument::empty(), false);
        assert_eq!(render(&frames), vec!["time|6"]);
        assert!(!clock.is_running());
    }
}

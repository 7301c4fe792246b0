use crate::model::cue::default_file_name;
use crate::model::{ChannelId, ProjectDocument};
use crate::protocol::Frame;

/// An event due at some tick, joined with its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCue {
    pub name: String,
    pub channels: Vec<ChannelId>,
    pub file_name: String,
    pub text: String,
}

/// Every event scheduled at `tick`, in document order.
///
/// When `send_to_all` is set each cue is routed to `"0"` only. Events naming
/// an unknown command still fire, with empty text and `<name>.mp3`.
pub fn resolve(doc: &ProjectDocument, tick: i64) -> Vec<ResolvedCue> {
    doc.events
        .iter()
        .filter(|ev| ev.time == tick)
        .map(|ev| {
            let (file_name, text) = match doc.find_command(&ev.name) {
                Some(cmd) => (cmd.file_name(), cmd.text.clone()),
                None => {
                    log::debug!("Event at {tick} references unknown command '{}'", ev.name);
                    (default_file_name(&ev.name), String::new())
                }
            };
            let channels = if doc.send_to_all {
                vec![ChannelId::all()]
            } else {
                ev.routing()
            };
            ResolvedCue {
                name: ev.name.clone(),
                channels,
                file_name,
                text,
            }
        })
        .collect()
}

/// The `play` frames to send for `tick`, one per effective channel.
pub fn play_frames(doc: &ProjectDocument, tick: i64) -> Vec<Frame> {
    resolve(doc, tick)
        .into_iter()
        .flat_map(|cue| {
            let ResolvedCue {
                channels,
                file_name,
                text,
                ..
            } = cue;
            channels.into_iter().map(move |channel| Frame::Play {
                channel,
                file_name: file_name.clone(),
                text: text.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{Command, Event};

    fn ch(s: &str) -> ChannelId {
        ChannelId::new(s)
    }

    fn doc_with(events: Vec<Event>) -> ProjectDocument {
        let mut doc = ProjectDocument::empty();
        doc.commands.push(Command {
            name: "cueA".into(),
            file_name: Some("a.mp3".into()),
            text: "hi".into(),
        });
        doc.events = events;
        doc
    }

    #[test]
    fn all_channels_event_plays_once() {
        let doc = doc_with(vec![Event::new(5, "cueA", vec![ch("0")])]);
        let frames: Vec<String> = play_frames(&doc, 5).iter().map(ToString::to_string).collect();
        assert_eq!(frames, vec!["play|0|a.mp3|hi"]);
    }

    #[test]
    fn override_forces_channel_zero() {
        let mut doc = doc_with(vec![Event::new(7, "cueA", vec![ch("3")])]);
        doc.send_to_all = true;
        let frames: Vec<String> = play_frames(&doc, 7).iter().map(ToString::to_string).collect();
        assert_eq!(frames, vec!["play|0|a.mp3|hi"]);
    }

    #[test]
    fn one_frame_per_listed_channel() {
        let doc = doc_with(vec![Event::new(2, "cueA", vec![ch("1"), ch("4")])]);
        let frames: Vec<String> = play_frames(&doc, 2).iter().map(ToString::to_string).collect();
        assert_eq!(frames, vec!["play|1|a.mp3|hi", "play|4|a.mp3|hi"]);
    }

    #[test]
    fn unknown_command_degrades() {
        let doc = doc_with(vec![Event::new(1, "ghost", vec![ch("2")])]);
        let cues = resolve(&doc, 1);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].file_name, "ghost.mp3");
        assert_eq!(cues[0].text, "");
    }

    #[test]
    fn other_ticks_resolve_nothing() {
        let doc = doc_with(vec![Event::new(5, "cueA", vec![ch("0")])]);
        assert!(resolve(&doc, 4).is_empty());
        assert!(play_frames(&doc, 6).is_empty());
    }
}

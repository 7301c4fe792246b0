use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::paths::AUDIO_EXTENSION;

/// Channel label reserved for "every output".
pub const ALL_CHANNELS: &str = "0";

/// An output routing label. Project files written by older tools store
/// channels as integers, newer ones as strings; both normalise to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(label: impl Into<String>) -> Self {
        ChannelId(label.into())
    }

    pub fn all() -> Self {
        ChannelId(ALL_CHANNELS.to_string())
    }

    pub fn is_all(&self) -> bool {
        self.0 == ALL_CHANNELS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a label stored as a string or a number. `1` and `1.0` both
    /// become `"1"`; anything else is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(ChannelId(s.trim().to_string())),
            Value::Number(_) => lenient_int(value).map(|n| ChannelId(n.to_string())),
            _ => None,
        }
    }
}

/// Read an integer the way loosely typed project files store it: a JSON
/// integer, an integral float, or a numeric string.
pub fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    // Bounds are exclusive: i64::MAX as f64 rounds up to 2^63.
    if f.is_finite() && f.fract() == 0.0 && f > i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn lenient_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, reusable cue definition. `name` is unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub text: String,
}

impl Command {
    /// A command whose audio lives at `<name>.mp3`, as the generator writes it.
    pub fn rendered(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            file_name: Some(default_file_name(&name)),
            name,
            text: text.into(),
        }
    }

    /// Read one stored command. Only a non-empty `name` is required; a
    /// missing or oddly typed `text` reads as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = lenient_text(obj.get("name")).filter(|n| !n.trim().is_empty())?;
        Some(Self {
            name,
            file_name: lenient_text(obj.get("fileName")).filter(|f| !f.trim().is_empty()),
            text: lenient_text(obj.get("text")).unwrap_or_default(),
        })
    }

    /// The explicit file name, or `name.mp3` when none was stored.
    pub fn file_name(&self) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| default_file_name(&self.name))
    }
}

pub(crate) fn default_file_name(name: &str) -> String {
    format!("{name}.{AUDIO_EXTENSION}")
}

/// A scheduled trigger referencing a [`Command`] by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub time: i64,
    pub name: String,
    /// Legacy single-channel routing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelId>,
}

impl Event {
    pub fn new(time: i64, name: impl Into<String>, channels: Vec<ChannelId>) -> Self {
        Self {
            time,
            name: name.into(),
            channel: None,
            channels,
        }
    }

    /// Read one stored event. `name` and a readable `time` are required.
    /// Unreadable channel labels are dropped individually; a scalar
    /// `channels` value is read as a one-element list.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = lenient_text(obj.get("name")).filter(|n| !n.trim().is_empty())?;
        let time = obj.get("time").and_then(lenient_int)?;
        let channels = match obj.get("channels") {
            Some(Value::Array(items)) => items.iter().filter_map(ChannelId::from_value).collect(),
            Some(other) => ChannelId::from_value(other).into_iter().collect(),
            None => Vec::new(),
        };
        Some(Self {
            time,
            name,
            channel: obj.get("channel").and_then(ChannelId::from_value),
            channels,
        })
    }

    /// Channels this event is routed to, before any override is applied.
    ///
    /// The `channels` list wins over the legacy `channel` field. An event
    /// without routing goes to every output. When `"0"` appears anywhere the
    /// result collapses to just `"0"`. Duplicates are dropped, order kept.
    pub fn routing(&self) -> Vec<ChannelId> {
        let declared: Vec<&ChannelId> = if self.channels.is_empty() {
            self.channel.iter().filter(|c| !c.as_str().is_empty()).collect()
        } else {
            self.channels.iter().collect()
        };

        if declared.is_empty() || declared.iter().any(|c| c.is_all()) {
            return vec![ChannelId::all()];
        }

        let mut out: Vec<ChannelId> = Vec::with_capacity(declared.len());
        for ch in declared {
            if !out.contains(ch) {
                out.push(ch.clone());
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ch(s: &str) -> ChannelId {
        ChannelId::new(s)
    }

    #[test]
    fn command_file_name_defaults_to_mp3() {
        let cmd = Command::from_value(&json!({"name": "intro", "text": "Hi"})).unwrap();
        assert_eq!(cmd.file_name(), "intro.mp3");

        let explicit =
            Command::from_value(&json!({"name": "intro", "fileName": "x.mp3", "text": "Hi"}))
                .unwrap();
        assert_eq!(explicit.file_name(), "x.mp3");
    }

    #[test]
    fn command_without_name_is_unreadable() {
        assert!(Command::from_value(&json!({"text": "Hi"})).is_none());
        assert!(Command::from_value(&json!({"name": "", "text": "Hi"})).is_none());
        assert!(Command::from_value(&json!("intro")).is_none());
    }

    #[test]
    fn command_text_is_read_loosely() {
        let cmd = Command::from_value(&json!({"name": 7, "text": 12})).unwrap();
        assert_eq!(cmd.name, "7");
        assert_eq!(cmd.text, "12");
        let quiet = Command::from_value(&json!({"name": "a", "text": null})).unwrap();
        assert_eq!(quiet.text, "");
    }

    #[test]
    fn command_serializes_camel_case() {
        let json = serde_json::to_value(Command::rendered("cueA", "hello")).unwrap();
        assert_eq!(json["fileName"], "cueA.mp3");
        assert_eq!(json["name"], "cueA");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn channels_accept_numbers_and_strings() {
        let ev = Event::from_value(&json!({"time": 3, "name": "a", "channels": [1, "2", 3.0]}))
            .unwrap();
        assert_eq!(ev.channels, vec![ch("1"), ch("2"), ch("3")]);
    }

    #[test]
    fn unreadable_channels_are_dropped_one_by_one() {
        let ev = Event::from_value(&json!({"time": 3, "name": "a", "channels": [true, 1.5, "4"]}))
            .unwrap();
        assert_eq!(ev.channels, vec![ch("4")]);
    }

    #[test]
    fn time_accepts_strings_and_integral_floats() {
        for time in [json!(5), json!(5.0), json!("5"), json!(" 5 ")] {
            let ev = Event::from_value(&json!({"time": time, "name": "a"})).unwrap();
            assert_eq!(ev.time, 5);
        }
        assert!(Event::from_value(&json!({"time": "soon", "name": "a"})).is_none());
        assert!(Event::from_value(&json!({"time": 5.5, "name": "a"})).is_none());
        assert!(Event::from_value(&json!({"name": "a"})).is_none());
        assert!(Event::from_value(&json!({"time": 1e300, "name": "a"})).is_none());
    }

    #[test]
    fn legacy_channel_field_is_used() {
        let ev = Event::from_value(&json!({"time": 3, "name": "a", "channel": "4"})).unwrap();
        assert_eq!(ev.routing(), vec![ch("4")]);
        let scalar = Event::from_value(&json!({"time": 3, "name": "a", "channels": 2})).unwrap();
        assert_eq!(scalar.routing(), vec![ch("2")]);
    }

    #[test]
    fn zero_short_circuits_other_channels() {
        let ev = Event::new(1, "a", vec![ch("2"), ch("0"), ch("3")]);
        assert_eq!(ev.routing(), vec![ChannelId::all()]);
    }

    #[test]
    fn missing_routing_goes_everywhere() {
        let ev = Event::from_value(&json!({"time": 3, "name": "a"})).unwrap();
        assert_eq!(ev.routing(), vec![ChannelId::all()]);
    }

    #[test]
    fn duplicate_channels_are_sent_once() {
        let ev = Event::new(1, "a", vec![ch("2"), ch("3"), ch("2")]);
        assert_eq!(ev.routing(), vec![ch("2"), ch("3")]);
    }
}

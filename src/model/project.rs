use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cue::{Command, Event};

const COMMANDS_KEY: &str = "commands";
const EVENTS_KEY: &str = "events";
const SEND_TO_ALL_KEY: &str = "sendToAll";

/// The persisted unit: reusable commands, time-indexed events and the
/// broadcast override flag.
///
/// Reading is lenient: project files are hand-edited and written by several
/// tools, so a loosely typed field never discards the document. Entries
/// that cannot be read at all are skipped one at a time with a warning.
/// Top-level keys this server does not know about are carried in `extra`
/// so that editors storing their own metadata do not lose it on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct ProjectDocument {
    pub commands: Vec<Command>,
    pub events: Vec<Event>,
    pub send_to_all: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Value> for ProjectDocument {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn read_list<T>(key: &str, value: Option<Value>, read: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let parsed = read(item);
                if parsed.is_none() {
                    log::warn!("Skipping unreadable {key}[{i}]: {item}");
                }
                parsed
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            log::warn!("Ignoring '{key}': expected a list, found {other}");
            Vec::new()
        }
    }
}

fn read_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim() == "true",
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

impl ProjectDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a project document. Only a non-object payload is an error.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(mut map) = value else {
            return Err("project payload must be a JSON object".to_string());
        };
        let send_to_all = read_flag(map.get(SEND_TO_ALL_KEY));
        map.remove(SEND_TO_ALL_KEY);
        let commands = read_list(COMMANDS_KEY, map.remove(COMMANDS_KEY), Command::from_value);
        let events = read_list(EVENTS_KEY, map.remove(EVENTS_KEY), Event::from_value);
        Ok(Self {
            commands,
            events,
            send_to_all,
            extra: map,
        })
    }

    pub fn find_command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Insert `cmd`, or replace the command with the same name in place.
    /// Returns true when an existing entry was replaced.
    pub fn upsert_command(&mut self, cmd: Command) -> bool {
        if let Some(existing) = self.commands.iter_mut().find(|c| c.name == cmd.name) {
            *existing = cmd;
            true
        } else {
            self.commands.push(cmd);
            false
        }
    }
}

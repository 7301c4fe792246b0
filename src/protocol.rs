//! Pipe-delimited text protocol spoken over each WebSocket.
//!
//! Inbound frames are `keyword|field|field...`; the keyword is field 0,
//! trimmed. Anything with an unknown keyword is echoed to every client.

use std::fmt;

use crate::error::AppError;
use crate::model::ChannelId;

pub const DELIMITER: char = '|';

/// Play instruction sent by the `test` keyword.
pub const TEST_FILE: &str = "test.mp3";
pub const TEST_TEXT: &str = "Test. Test? Test!";

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Resume the clock, seeking first when `at` is given.
    Start { at: Option<i64> },
    Stop,
    Seek { tick: i64 },
    SetSendToAll { enabled: bool },
    Test,
    /// Render speech and record it in the legacy history.
    Generate {
        text: String,
        file_name: String,
        channel: ChannelId,
        time: String,
    },
    /// Render speech into the active project's namespace and upsert a command.
    GenerateCommand { text: String, name: String },
    /// Wholesale replacement of the active project document.
    UpdateJson { payload: String },
    NewProject { name: String },
    ListProjects,
    LoadProject { name: String },
    SaveAs { name: String },
    GetCurrentProject,
    /// Unrecognized keyword; the raw frame is rebroadcast verbatim.
    Echo { raw: String },
}

impl Request {
    /// The keyword as it appears on the wire, for logging.
    pub fn keyword(&self) -> &'static str {
        match self {
            Request::Start { .. } => "start",
            Request::Stop => "stop",
            Request::Seek { .. } => "seek",
            Request::SetSendToAll { .. } => "setSendToAll",
            Request::Test => "test",
            Request::Generate { .. } => "generate",
            Request::GenerateCommand { .. } => "generateCommand",
            Request::UpdateJson { .. } => "updateJSON",
            Request::NewProject { .. } => "newProject",
            Request::ListProjects => "listProjects",
            Request::LoadProject { .. } => "loadProject",
            Request::SaveAs { .. } => "saveAs",
            Request::GetCurrentProject => "getCurrentProject",
            Request::Echo { .. } => "echo",
        }
    }

    /// Parse one inbound text frame.
    ///
    /// Errors are validation failures (wrong arity, unparsable tick, empty
    /// required field); callers log and drop them.
    pub fn parse(raw: &str) -> Result<Request, AppError> {
        let fields: Vec<&str> = raw.split(DELIMITER).map(str::trim).collect();
        let (keyword, args) = match fields.split_first() {
            Some((k, rest)) => (*k, rest),
            None => ("", &[][..]),
        };

        let request = match keyword {
            "start" => Request::Start {
                at: args.first().and_then(|s| parse_optional_tick(s)),
            },
            "stop" => Request::Stop,
            "seek" => {
                // `seek|T`, or the legacy `seek|<label>|T`.
                let field = args
                    .last()
                    .ok_or_else(|| AppError::validation("seek: missing tick"))?;
                Request::Seek {
                    tick: parse_tick(field)?,
                }
            }
            "setSendToAll" => Request::SetSendToAll {
                enabled: args.first().is_some_and(|s| *s == "true"),
            },
            "test" => Request::Test,
            "generate" => match args {
                [text, file_name, channel, time, ..] => Request::Generate {
                    text: required("generate", "text", text)?,
                    file_name: required("generate", "filename", file_name)?,
                    channel: ChannelId::new(required("generate", "channel", channel)?),
                    time: required("generate", "time", time)?,
                },
                _ => return Err(arity("generate", 5, fields.len())),
            },
            "generateCommand" => match args {
                [text, name, ..] => Request::GenerateCommand {
                    text: required("generateCommand", "text", text)?,
                    name: required("generateCommand", "commandName", name)?,
                },
                _ => return Err(arity("generateCommand", 3, fields.len())),
            },
            "updateJSON" => {
                let payload = raw
                    .split_once(DELIMITER)
                    .map(|(_, rest)| rest.trim())
                    .unwrap_or_default();
                if payload.is_empty() {
                    return Err(AppError::validation("updateJSON: missing payload"));
                }
                Request::UpdateJson {
                    payload: payload.to_string(),
                }
            }
            "newProject" => Request::NewProject {
                name: first_required("newProject", "name", args)?,
            },
            "listProjects" => Request::ListProjects,
            "loadProject" => Request::LoadProject {
                name: first_required("loadProject", "filename", args)?,
            },
            "saveAs" => Request::SaveAs {
                name: first_required("saveAs", "filename", args)?,
            },
            "getCurrentProject" => Request::GetCurrentProject,
            _ => Request::Echo {
                raw: raw.to_string(),
            },
        };
        Ok(request)
    }
}

fn parse_tick(field: &str) -> Result<i64, AppError> {
    field
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("'{field}' is not a valid tick")))
}

fn parse_optional_tick(field: &str) -> Option<i64> {
    if field.is_empty() {
        return None;
    }
    match parse_tick(field) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("start: {e}, ignoring");
            None
        }
    }
}

fn required(keyword: &str, name: &str, value: &str) -> Result<String, AppError> {
    if value.is_empty() {
        Err(AppError::validation(format!("{keyword}: empty {name}")))
    } else {
        Ok(value.to_string())
    }
}

fn first_required(keyword: &str, name: &str, args: &[&str]) -> Result<String, AppError> {
    let value = args
        .first()
        .ok_or_else(|| AppError::validation(format!("{keyword}: missing {name}")))?;
    required(keyword, name, value)
}

fn arity(keyword: &str, expected: usize, got: usize) -> AppError {
    AppError::validation(format!(
        "{keyword}: expected {expected} fields, got {got}"
    ))
}

/// A server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    CurrentProject(String),
    ProjectCreated(String),
    ProjectError(String),
    ProjectLoaded(String),
    ProjectSaved(String),
    ProjectList(Vec<String>),
    DataUpdated,
    SendToAll(bool),
    Time(i64),
    Play {
        channel: ChannelId,
        file_name: String,
        text: String,
    },
    Stop,
    GenerateError(String),
}

impl Frame {
    pub fn test_play() -> Self {
        Frame::Play {
            channel: ChannelId::all(),
            file_name: TEST_FILE.to_string(),
            text: TEST_TEXT.to_string(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::CurrentProject(name) => write!(f, "currentProject|{name}"),
            Frame::ProjectCreated(name) => write!(f, "projectCreated|{name}"),
            Frame::ProjectError(reason) => write!(f, "projectError|{reason}"),
            Frame::ProjectLoaded(name) => write!(f, "projectLoaded|{name}"),
            Frame::ProjectSaved(name) => write!(f, "projectSaved|{name}"),
            Frame::ProjectList(files) => {
                f.write_str("projectList")?;
                for file in files {
                    write!(f, "|{file}")?;
                }
                Ok(())
            }
            Frame::DataUpdated => f.write_str("dataUpdated"),
            Frame::SendToAll(enabled) => write!(f, "sendToAll|{enabled}"),
            Frame::Time(tick) => write!(f, "time|{tick}"),
            Frame::Play {
                channel,
                file_name,
                text,
            } => write!(f, "play|{channel}|{file_name}|{text}"),
            Frame::Stop => f.write_str("stop"),
            Frame::GenerateError(reason) => write!(f, "generateError|{reason}"),
        }
    }
}

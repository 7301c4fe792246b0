pub mod clients;
pub mod cue_index;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod model;
pub mod paths;
pub mod project;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod state;
pub mod timeline;
pub mod tts;

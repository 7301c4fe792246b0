pub mod cue;
pub mod project;

// Re-export commonly used types at the model level.
pub use cue::{ChannelId, Command, Event, ALL_CHANNELS};
pub use project::ProjectDocument;

pub mod audio;
pub mod error;
pub mod library;
pub mod ui;

pub use audio::{EngineConfig, EngineEvent, TransportEngine};
pub use error::{Result, SoundboardError};
pub use library::{Library, Settings, Sound};
pub use ui::TerminalUI;

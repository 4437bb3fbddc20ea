pub mod keymap;
pub mod terminal;

pub use keymap::{Action, action_for};
pub use terminal::TerminalUI;

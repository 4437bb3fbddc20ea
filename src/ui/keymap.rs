// src/ui/keymap.rs
// Board shortcuts, independent of any terminal state

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Move(Direction),
    /// Select the nth visible card (zero based)
    Select(usize),
    TogglePlay,
    Stop,
    StopAll,
    Remove,
    ToggleFavorite,
    ToggleLoop,
    VolumeUp,
    VolumeDown,
    SeekBack,
    SeekForward,
    CycleColor,
    MoveEarlier,
    MoveLater,
    Import,
    Search,
    Rename,
    ToggleTheme,
    OpenSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

pub fn action_for(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }

    let action = match key.code {
        KeyCode::Char(' ') | KeyCode::Enter => Action::TogglePlay,
        KeyCode::Delete | KeyCode::Backspace => Action::Remove,
        KeyCode::Char(c @ '1'..='9') => Action::Select(c as usize - '1' as usize),
        KeyCode::Up => Action::Move(Direction::Up),
        KeyCode::Down => Action::Move(Direction::Down),
        KeyCode::Left => Action::Move(Direction::Left),
        KeyCode::Right => Action::Move(Direction::Right),
        KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        KeyCode::Char('s') | KeyCode::Char('S') => Action::Stop,
        KeyCode::Char('x') | KeyCode::Char('X') => Action::StopAll,
        KeyCode::Char('f') | KeyCode::Char('F') => Action::ToggleFavorite,
        KeyCode::Char('l') | KeyCode::Char('L') => Action::ToggleLoop,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::VolumeUp,
        KeyCode::Char('-') | KeyCode::Char('_') => Action::VolumeDown,
        KeyCode::Char(',') => Action::SeekBack,
        KeyCode::Char('.') => Action::SeekForward,
        KeyCode::Char('c') | KeyCode::Char('C') => Action::CycleColor,
        KeyCode::Char('[') => Action::MoveEarlier,
        KeyCode::Char(']') => Action::MoveLater,
        KeyCode::Char('i') | KeyCode::Char('I') => Action::Import,
        KeyCode::Char('/') => Action::Search,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Rename,
        KeyCode::Char('t') | KeyCode::Char('T') => Action::ToggleTheme,
        KeyCode::Char('o') | KeyCode::Char('O') => Action::OpenSettings,
        _ => return None,
    };
    Some(action)
}

/// New selection after moving through a grid of `len` cards laid out in
/// `columns` columns. Stays put at the edges.
pub fn navigate(selected: usize, len: usize, columns: usize, direction: Direction) -> usize {
    if len == 0 {
        return 0;
    }
    let columns = columns.max(1);
    let selected = selected.min(len - 1);

    match direction {
        Direction::Left => selected.saturating_sub(1),
        Direction::Right => (selected + 1).min(len - 1),
        Direction::Up => selected.checked_sub(columns).unwrap_or(selected),
        Direction::Down => {
            if selected + columns < len {
                selected + columns
            } else {
                selected
            }
        }
    }
}

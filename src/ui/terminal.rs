use crossbeam::channel::Receiver;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph},
};
use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{info, warn};

use super::keymap::{self, Action};
use crate::audio::{EngineEvent, LoadState, PlaybackSnapshot, SoundId, TransportEngine};
use crate::error::Result;
use crate::library::{
    ButtonShape, ButtonSize, Library, MAX_GRID_COLUMNS, MIN_GRID_COLUMNS, Settings, Sound, Theme,
};

const VOLUME_STEP: f32 = 0.1;
const SEEK_STEP: f64 = 5.0;
const FADE_STEP: f64 = 0.05;
const MAX_FADE: f64 = 2.0;
const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const IDLE_POLL: Duration = Duration::from_millis(250);
const PULSE_PERIOD_MS: u128 = 400;
const VISIBLE_ITEMS: usize = 15;
const SETTINGS_ROWS: usize = 7;
const AUDIO_EXTENSIONS: [&str; 6] = ["wav", "mp3", "ogg", "flac", "m4a", "aac"];

#[derive(Debug, Clone, PartialEq)]
enum InputMode {
    FilePicker {
        current_dir: String,
        entries: Vec<FileEntry>,
        selected_index: usize,
        scroll_offset: usize,
    },
    Search,
    Rename {
        id: SoundId,
    },
    Settings {
        selected_index: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum FileEntry {
    Directory(String),
    AudioFile(String),
}

#[derive(Debug, Clone, PartialEq)]
enum HeaderStatus {
    InputPrompt(String, String), // (prompt, current_input)
    Success(String),
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
enum CardState {
    Unloaded,
    Loading,
    Pending,
    Failed,
    Ready { duration: f64 },
    Playing { current: f64, duration: f64 },
}

/// What one card needs to draw itself, copied out of the library and engine.
#[derive(Debug, Clone)]
struct CardView {
    name: String,
    favorite: bool,
    looping: bool,
    volume: f32,
    color: Option<Color>,
    state: CardState,
}

impl CardView {
    fn new(sound: &Sound, engine: &TransportEngine, positions: &PlaybackSnapshot) -> Self {
        let state = if engine.is_playing(&sound.id) {
            let info = positions.get(&sound.id).copied().unwrap_or_default();
            CardState::Playing {
                current: info.current_time,
                duration: info.duration,
            }
        } else if engine.is_pending(&sound.id) {
            CardState::Pending
        } else {
            match engine.load_state(&sound.id) {
                LoadState::Unloaded => CardState::Unloaded,
                LoadState::Loading => CardState::Loading,
                LoadState::Failed(_) => CardState::Failed,
                LoadState::Ready { duration } => CardState::Ready { duration },
            }
        };

        Self {
            name: sound.name.clone(),
            favorite: sound.favorite,
            looping: sound.looping,
            volume: sound.volume,
            color: sound.color.as_deref().and_then(|hex| hex.parse::<Color>().ok()),
            state,
        }
    }
}

pub struct TerminalUI {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    engine: TransportEngine,
    events: Receiver<EngineEvent>,
    /// Positions as last published by the engine
    positions: PlaybackSnapshot,
    library: Library,
    library_path: PathBuf,
    device_name: String,
    selected: usize,
    query: String,
    is_running: bool,
    last_update: Instant,
    started_at: Instant,
    input_mode: Option<InputMode>,
    input_buffer: String,
    header_status: Option<HeaderStatus>,
    status_timer: Option<Instant>,
}

impl TerminalUI {
    /// Takes over the terminal and starts loading every sound in the library.
    pub fn new(
        mut engine: TransportEngine,
        library: Library,
        library_path: PathBuf,
        device_name: &str,
    ) -> Result<Self> {
        for sound in &library.sounds {
            engine.load(sound);
        }
        let events = engine.events();

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            engine,
            events,
            positions: PlaybackSnapshot::new(),
            library,
            library_path,
            device_name: device_name.to_string(),
            selected: 0,
            query: String::new(),
            is_running: true,
            last_update: Instant::now(),
            started_at: Instant::now(),
            input_mode: None,
            input_buffer: String::new(),
            header_status: None,
            status_timer: None,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        while self.is_running {
            let busy = self.engine.tick();

            self.process_events(if busy { FRAME_INTERVAL } else { IDLE_POLL })?;
            self.check_status_timer();

            if self.last_update.elapsed() >= FRAME_INTERVAL {
                self.draw()?;
                self.last_update = Instant::now();
            }
        }

        self.engine.dispose();
        self.persist();
        info!("board closed");
        Ok(())
    }

    fn process_events(&mut self, timeout: Duration) -> Result<()> {
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key_event(key);
            self.draw()?;
            self.last_update = Instant::now();
        }

        while let Ok(event) = self.events.try_recv() {
            self.handle_engine_event(event);
        }

        Ok(())
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        track_positions(&mut self.positions, &event);
        if let EngineEvent::LoadFailed { id, reason } = event {
            let name = self
                .library
                .get(&id)
                .map(|sound| sound.name.clone())
                .unwrap_or(id);
            self.show_error(&format!("Could not load {}: {}", name, reason));
        }
    }

    // ---------------------------------------------------------------
    // Board actions
    // ---------------------------------------------------------------

    fn visible_ids(&self) -> Vec<SoundId> {
        self.library
            .filtered(&self.query)
            .into_iter()
            .map(|sound| sound.id.clone())
            .collect()
    }

    fn selected_sound(&self) -> Option<Sound> {
        let ids = self.visible_ids();
        let id = ids.get(self.selected)?;
        self.library.get(id).cloned()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_ids().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if let Some(mode) = self.input_mode.clone() {
            self.handle_input_key(key, mode);
            return;
        }

        let Some(action) = keymap::action_for(key) else {
            return;
        };

        match action {
            Action::Quit => self.is_running = false,
            Action::Move(direction) => {
                let len = self.visible_ids().len();
                let columns = self.library.settings.grid_columns;
                self.selected = keymap::navigate(self.selected, len, columns, direction);
            }
            Action::Select(index) => {
                if index < self.visible_ids().len() {
                    self.selected = index;
                }
            }
            Action::TogglePlay => {
                if let Some(sound) = self.selected_sound() {
                    self.engine.play(&sound);
                }
            }
            Action::Stop => {
                if let Some(sound) = self.selected_sound() {
                    self.engine.stop(&sound.id);
                }
            }
            Action::StopAll => {
                self.engine.stop_all();
                self.show_success("Stopped all sounds");
            }
            Action::Remove => self.remove_selected(),
            Action::ToggleFavorite => {
                if let Some(sound) = self.selected_sound()
                    && self.library.toggle_favorite(&sound.id).is_some()
                {
                    self.persist();
                }
            }
            Action::ToggleLoop => {
                if let Some(sound) = self.selected_sound()
                    && let Some(looping) = self.library.toggle_loop(&sound.id)
                {
                    self.persist();
                    self.show_success(if looping { "Loop ON" } else { "Loop OFF" });
                }
            }
            Action::VolumeUp => self.adjust_volume(VOLUME_STEP),
            Action::VolumeDown => self.adjust_volume(-VOLUME_STEP),
            Action::SeekBack => self.seek_relative(-SEEK_STEP),
            Action::SeekForward => self.seek_relative(SEEK_STEP),
            Action::CycleColor => {
                if let Some(sound) = self.selected_sound()
                    && self.library.cycle_color(&sound.id).is_some()
                {
                    self.persist();
                }
            }
            Action::MoveEarlier => self.reorder_selected(-1),
            Action::MoveLater => self.reorder_selected(1),
            Action::Import => {
                if let Err(e) = self.start_file_picker() {
                    self.show_error(&format!("Error: {}", e));
                }
            }
            Action::Search => {
                let query = self.query.clone();
                self.start_input_mode(InputMode::Search, "Search:", &query);
            }
            Action::Rename => {
                if let Some(sound) = self.selected_sound() {
                    self.start_input_mode(InputMode::Rename { id: sound.id }, "Rename:", &sound.name);
                }
            }
            Action::ToggleTheme => {
                self.library.settings.theme = self.library.settings.theme.toggled();
                self.persist();
            }
            Action::OpenSettings => {
                self.input_mode = Some(InputMode::Settings { selected_index: 0 });
            }
        }
    }

    fn adjust_volume(&mut self, delta: f32) {
        let Some(sound) = self.selected_sound() else {
            return;
        };
        if let Some(volume) = self.library.set_volume(&sound.id, sound.volume + delta) {
            self.engine.set_volume(&sound.id, volume);
            self.persist();
            self.show_success(&format!("{} volume {:.0}%", sound.name, volume * 100.0));
        }
    }

    fn seek_relative(&mut self, delta: f64) {
        let Some(sound) = self.selected_sound() else {
            return;
        };
        let current = self
            .engine
            .position(&sound.id)
            .map(|info| info.current_time)
            .unwrap_or(0.0);
        self.engine.seek(&sound.id, current + delta);
    }

    /// Reordering only applies to the unfiltered board.
    fn reorder_selected(&mut self, offset: isize) {
        if !self.query.is_empty() {
            self.show_error("Clear the search to reorder");
            return;
        }
        let Some(sound) = self.selected_sound() else {
            return;
        };
        let Some(from) = self.library.index_of(&sound.id) else {
            return;
        };
        let Some(to) = from.checked_add_signed(offset) else {
            return;
        };
        if self.library.move_sound(from, to) {
            self.selected = to;
            self.persist();
        }
    }

    fn remove_selected(&mut self) {
        let Some(sound) = self.selected_sound() else {
            return;
        };
        self.engine.remove_sound(&sound.id);
        self.library.remove(&sound.id);
        self.clamp_selection();
        self.persist();
        self.show_success(&format!("Removed {}", sound.name));
    }

    fn import_file(&mut self, path: &Path) {
        match self.library.import(path) {
            Ok(sound) => {
                let sound = sound.clone();
                self.engine.load(&sound);
                self.persist();
                if let Some(index) = self.visible_ids().iter().position(|id| *id == sound.id) {
                    self.selected = index;
                }
                self.show_success(&format!("Imported {}", sound.name));
            }
            Err(e) => self.show_error(&format!("Import failed: {}", e)),
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.library.save(&self.library_path) {
            warn!(error = %e, path = %self.library_path.display(), "could not save library");
            self.show_error(&format!("Save failed: {}", e));
        }
    }

    // ---------------------------------------------------------------
    // Prompts and overlays
    // ---------------------------------------------------------------

    fn handle_input_key(&mut self, key: KeyEvent, input_mode: InputMode) {
        match input_mode {
            InputMode::FilePicker {
                current_dir,
                entries,
                selected_index,
                scroll_offset,
            } => self.handle_file_picker_key(key, current_dir, entries, selected_index, scroll_offset),
            InputMode::Settings { selected_index } => self.handle_settings_key(key, selected_index),
            InputMode::Search => match key.code {
                KeyCode::Enter => {
                    self.exit_input_mode();
                    self.header_status = None;
                }
                KeyCode::Esc => {
                    self.query.clear();
                    self.exit_input_mode();
                    self.show_cancelled();
                }
                KeyCode::Backspace => {
                    self.input_buffer.pop();
                    self.apply_search();
                }
                KeyCode::Char(c) => {
                    self.input_buffer.push(c);
                    self.apply_search();
                }
                _ => {}
            },
            InputMode::Rename { id } => match key.code {
                KeyCode::Enter => {
                    let name = self.input_buffer.clone();
                    self.exit_input_mode();
                    if self.library.rename(&id, &name) {
                        self.persist();
                        self.show_success(&format!("Renamed to {}", name.trim()));
                    } else {
                        self.show_error("Name cannot be empty");
                    }
                }
                KeyCode::Esc => {
                    self.exit_input_mode();
                    self.show_cancelled();
                }
                KeyCode::Backspace => {
                    self.input_buffer.pop();
                    self.update_input_display();
                }
                KeyCode::Char(c) => {
                    self.input_buffer.push(c);
                    self.update_input_display();
                }
                _ => {}
            },
        }
    }

    fn apply_search(&mut self) {
        self.query = self.input_buffer.clone();
        self.selected = 0;
        self.update_input_display();
    }

    fn handle_file_picker_key(
        &mut self,
        key: KeyEvent,
        current_dir: String,
        entries: Vec<FileEntry>,
        selected_index: usize,
        scroll_offset: usize,
    ) {
        match key.code {
            KeyCode::Up | KeyCode::Down => {
                let selected_index = if key.code == KeyCode::Up {
                    selected_index.saturating_sub(1)
                } else {
                    (selected_index + 1).min(entries.len().saturating_sub(1))
                };
                let scroll_offset = calculate_scroll_offset(selected_index, scroll_offset, entries.len());
                self.input_mode = Some(InputMode::FilePicker {
                    current_dir,
                    entries,
                    selected_index,
                    scroll_offset,
                });
            }
            KeyCode::Enter => {
                let Some(entry) = entries.get(selected_index) else {
                    return;
                };
                let current = Path::new(&current_dir);
                match entry {
                    FileEntry::Directory(name) => {
                        let target = if name == ".." {
                            current.parent().map(Path::to_path_buf).unwrap_or_else(|| current.to_path_buf())
                        } else {
                            current.join(name)
                        };
                        if let Err(e) = self.navigate_to_directory(target.to_string_lossy().to_string()) {
                            self.show_error(&format!("Error: {}", e));
                        }
                    }
                    FileEntry::AudioFile(name) => {
                        let path = current.join(name);
                        self.exit_input_mode();
                        self.import_file(&path);
                    }
                }
            }
            KeyCode::Esc => {
                self.exit_input_mode();
                self.show_cancelled();
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent, selected_index: usize) {
        match key.code {
            KeyCode::Up => {
                self.input_mode = Some(InputMode::Settings {
                    selected_index: selected_index.saturating_sub(1),
                });
            }
            KeyCode::Down => {
                self.input_mode = Some(InputMode::Settings {
                    selected_index: (selected_index + 1).min(SETTINGS_ROWS - 1),
                });
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                let forward = key.code != KeyCode::Left;
                adjust_setting(&mut self.library.settings, selected_index, forward);
                self.engine.set_fade_in(self.library.settings.fade_in_duration);
                self.engine.set_fade_out(self.library.settings.fade_out_duration);
                self.clamp_selection();
            }
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('o') => {
                self.exit_input_mode();
                self.persist();
            }
            _ => {}
        }
    }

    fn start_input_mode(&mut self, mode: InputMode, prompt: &str, initial: &str) {
        self.input_mode = Some(mode);
        self.input_buffer = initial.to_string();
        self.header_status = Some(HeaderStatus::InputPrompt(
            prompt.to_string(),
            initial.to_string(),
        ));
    }

    fn update_input_display(&mut self) {
        if let Some(HeaderStatus::InputPrompt(ref prompt, _)) = self.header_status {
            self.header_status = Some(HeaderStatus::InputPrompt(
                prompt.clone(),
                self.input_buffer.clone(),
            ));
        }
    }

    fn exit_input_mode(&mut self) {
        self.input_mode = None;
        self.input_buffer.clear();
    }

    fn start_file_picker(&mut self) -> Result<()> {
        let start = std::env::current_dir()
            .map(|dir| dir.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());
        self.navigate_to_directory(start)
    }

    fn navigate_to_directory(&mut self, dir_path: String) -> Result<()> {
        let mut entries = Vec::new();
        if Path::new(&dir_path).parent().is_some() {
            entries.push(FileEntry::Directory("..".to_string()));
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir_path)? {
            let path = entry?.path();
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if path.is_dir() {
                    dirs.push(filename.to_string());
                } else if is_audio_file(filename) {
                    files.push(filename.to_string());
                }
            }
        }
        dirs.sort();
        files.sort();
        entries.extend(dirs.into_iter().map(FileEntry::Directory));
        entries.extend(files.into_iter().map(FileEntry::AudioFile));

        if entries.is_empty() {
            self.show_error("No directories or audio files found");
            return Ok(());
        }

        self.input_mode = Some(InputMode::FilePicker {
            current_dir: dir_path,
            entries,
            selected_index: 0,
            scroll_offset: 0,
        });
        Ok(())
    }

    fn show_success(&mut self, message: &str) {
        self.header_status = Some(HeaderStatus::Success(message.to_string()));
        self.status_timer = Some(Instant::now());
    }

    fn show_error(&mut self, message: &str) {
        self.header_status = Some(HeaderStatus::Error(message.to_string()));
        self.status_timer = Some(Instant::now());
    }

    fn show_cancelled(&mut self) {
        self.header_status = Some(HeaderStatus::Cancelled);
        self.status_timer = Some(Instant::now());
    }

    fn check_status_timer(&mut self) {
        if let Some(timer) = self.status_timer
            && timer.elapsed() >= Duration::from_secs(3)
        {
            self.header_status = None;
            self.status_timer = None;
        }
    }

    // ---------------------------------------------------------------
    // Drawing
    // ---------------------------------------------------------------

    fn draw(&mut self) -> Result<()> {
        let cards: Vec<CardView> = self
            .library
            .filtered(&self.query)
            .into_iter()
            .map(|sound| CardView::new(sound, &self.engine, &self.positions))
            .collect();
        let playing = self.engine.playing_ids().len();
        let settings = self.library.settings.clone();
        let total = self.library.sounds.len();
        let selected = self.selected;
        let query = self.query.clone();
        let device_name = self.device_name.clone();
        let header_status = self.header_status.clone();
        let input_mode = self.input_mode.clone();
        let pulse_on = (self.started_at.elapsed().as_millis() / PULSE_PERIOD_MS) % 2 == 0;

        self.terminal.draw(|f| {
            let area = f.area();
            let (bg, fg, _) = theme_colors(settings.theme);
            f.render_widget(Block::default().style(Style::default().bg(bg).fg(fg)), area);

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3), // Header
                    Constraint::Min(0),    // Board
                    Constraint::Length(5), // Footer
                ])
                .split(area);

            let summary = format!(
                "Output: {} | {} sounds | {} playing",
                device_name, total, playing
            );
            draw_header(f, chunks[0], &summary, &header_status);
            draw_board(f, chunks[1], &cards, selected, &settings, &query, pulse_on);
            draw_footer(f, chunks[2], settings.theme);

            match &input_mode {
                Some(InputMode::FilePicker { .. }) => draw_file_picker_overlay(f, area, &input_mode),
                Some(InputMode::Settings { selected_index }) => {
                    draw_settings_overlay(f, area, &settings, *selected_index)
                }
                _ => {}
            }
        })?;
        Ok(())
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
    }
}

// -------------------------------------------------------------------
// Pure helpers
// -------------------------------------------------------------------

fn is_audio_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn calculate_scroll_offset(selected_index: usize, current_scroll_offset: usize, total_entries: usize) -> usize {
    if total_entries <= VISIBLE_ITEMS {
        return 0;
    }
    if selected_index < current_scroll_offset {
        return selected_index;
    }
    if selected_index >= current_scroll_offset + VISIBLE_ITEMS {
        return selected_index.saturating_sub(VISIBLE_ITEMS - 1);
    }
    current_scroll_offset
}

fn adjust_setting(settings: &mut Settings, row: usize, forward: bool) {
    let step = |value: f64| {
        let next = if forward { value + FADE_STEP } else { value - FADE_STEP };
        (next.clamp(0.0, MAX_FADE) * 100.0).round() / 100.0
    };

    match row {
        0 => settings.theme = settings.theme.toggled(),
        1 => {
            settings.grid_columns = if forward {
                settings.grid_columns + 1
            } else {
                settings.grid_columns.saturating_sub(1)
            }
            .clamp(MIN_GRID_COLUMNS, MAX_GRID_COLUMNS);
        }
        2 => settings.button_shape = settings.button_shape.next(),
        3 => settings.button_size = settings.button_size.next(),
        4 => settings.fade_in_duration = step(settings.fade_in_duration),
        5 => settings.fade_out_duration = step(settings.fade_out_duration),
        6 => settings.show_pulse_animation = !settings.show_pulse_animation,
        _ => {}
    }
}

fn settings_rows(settings: &Settings) -> [(&'static str, String); SETTINGS_ROWS] {
    [
        ("Theme", format!("{:?}", settings.theme)),
        ("Columns", settings.grid_columns.to_string()),
        ("Button shape", format!("{:?}", settings.button_shape)),
        ("Button size", format!("{:?}", settings.button_size)),
        ("Fade in", format!("{:.2}s", settings.fade_in_duration)),
        ("Fade out", format!("{:.2}s", settings.fade_out_duration)),
        (
            "Pulse animation",
            if settings.show_pulse_animation { "On" } else { "Off" }.to_string(),
        ),
    ]
}

fn card_height(size: ButtonSize) -> u16 {
    match size {
        ButtonSize::Small => 3,
        ButtonSize::Medium => 5,
        ButtonSize::Large => 6,
    }
}

/// First grid row to draw so the selected row stays on screen.
fn first_visible_row(selected_row: usize, visible_rows: usize) -> usize {
    let visible_rows = visible_rows.max(1);
    (selected_row + 1).saturating_sub(visible_rows)
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn progress_bar(current: f64, duration: f64, width: usize) -> String {
    let ratio = if duration > 0.0 {
        (current / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// (background, foreground, muted)
fn theme_colors(theme: Theme) -> (Color, Color, Color) {
    match theme {
        Theme::Dark => (Color::Black, Color::White, Color::DarkGray),
        Theme::Light => (Color::White, Color::Black, Color::Gray),
    }
}

fn overlay_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn draw_header(f: &mut Frame, area: Rect, summary: &str, header_status: &Option<HeaderStatus>) {
    let (text, color) = match header_status {
        Some(HeaderStatus::InputPrompt(prompt, current_input)) => {
            (format!("{} {}▏", prompt, current_input), Color::Cyan)
        }
        Some(HeaderStatus::Success(message)) => (format!("✓ {}", message), Color::Green),
        Some(HeaderStatus::Error(message)) => (format!("✗ {}", message), Color::Red),
        Some(HeaderStatus::Cancelled) => ("✗ Cancelled".to_string(), Color::Yellow),
        None => (summary.to_string(), Color::Reset),
    };

    let header = Paragraph::new(text)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Soundboard"));
    f.render_widget(header, area);
}

fn draw_board(
    f: &mut Frame,
    area: Rect,
    cards: &[CardView],
    selected: usize,
    settings: &Settings,
    query: &str,
    pulse_on: bool,
) {
    let title = if query.is_empty() {
        "Sounds".to_string()
    } else {
        format!("Sounds (filter: {})", query)
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if cards.is_empty() {
        let hint = if query.is_empty() {
            "No sounds yet. Press I to import an audio file."
        } else {
            "No sounds match the search."
        };
        let empty = Paragraph::new(hint)
            .style(Style::default().fg(theme_colors(settings.theme).2))
            .alignment(Alignment::Center);
        f.render_widget(empty, inner);
        return;
    }

    let columns = settings.grid_columns.clamp(MIN_GRID_COLUMNS, MAX_GRID_COLUMNS);
    let height = card_height(settings.button_size);
    let visible_rows = (inner.height / height).max(1) as usize;
    let first_row = first_visible_row(selected / columns, visible_rows);

    for (row, chunk) in cards.chunks(columns).enumerate().skip(first_row).take(visible_rows) {
        let y = inner.y + (row - first_row) as u16 * height;
        let row_area = Rect::new(inner.x, y, inner.width, height.min(inner.bottom() - y));
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
            .split(row_area);

        for (col, card) in chunk.iter().enumerate() {
            let index = row * columns + col;
            draw_card(f, cells[col], card, index, index == selected, settings, pulse_on);
        }
    }
}

fn draw_card(
    f: &mut Frame,
    area: Rect,
    card: &CardView,
    index: usize,
    is_selected: bool,
    settings: &Settings,
    pulse_on: bool,
) {
    let (_, fg, muted) = theme_colors(settings.theme);
    let accent = card.color.unwrap_or(fg);
    let playing = matches!(card.state, CardState::Playing { .. });

    let mut border_style = Style::default().fg(if playing { Color::Green } else { accent });
    if is_selected {
        border_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    }
    if playing && settings.show_pulse_animation && pulse_on {
        border_style = border_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }

    let border_type = match settings.button_shape {
        ButtonShape::Rounded => BorderType::Rounded,
        ButtonShape::Square => BorderType::Plain,
    };

    let (symbol, status) = match &card.state {
        CardState::Playing { current, duration } => (
            "▶",
            format!("{} / {}", format_time(*current), format_time(*duration)),
        ),
        CardState::Pending => ("…", "Starting".to_string()),
        CardState::Loading => ("…", "Loading".to_string()),
        CardState::Failed => ("✗", "Failed to load".to_string()),
        CardState::Ready { duration } => ("■", format_time(*duration)),
        CardState::Unloaded => ("·", "Not loaded".to_string()),
    };

    let mut title = vec![
        Span::styled(format!("{} ", symbol), Style::default().fg(accent)),
        Span::styled(
            card.name.clone(),
            Style::default().fg(fg).add_modifier(Modifier::BOLD),
        ),
    ];
    if card.favorite {
        title.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
    }
    if card.looping {
        title.push(Span::styled(" ⟳", Style::default().fg(Color::Cyan)));
    }

    let mut lines = vec![Line::from(title)];
    if settings.button_size != ButtonSize::Small {
        lines.push(Line::styled(status, Style::default().fg(muted)));

        let width = area.width.saturating_sub(2) as usize;
        let (current, duration) = match card.state {
            CardState::Playing { current, duration } => (current, duration),
            _ => (0.0, 0.0),
        };
        lines.push(Line::styled(
            progress_bar(current, duration, width),
            Style::default().fg(accent),
        ));
    }
    if settings.button_size == ButtonSize::Large {
        lines.push(Line::styled(
            format!("Vol {:.0}%", card.volume * 100.0),
            Style::default().fg(muted),
        ));
    }

    let number = if index < 9 {
        format!(" {} ", index + 1)
    } else {
        String::new()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(number);

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(f: &mut Frame, area: Rect, theme: Theme) {
    let (_, desc_color, sep_color) = theme_colors(theme);
    let key_color = Color::Yellow;

    let key_desc = |key: &str, desc: &str| -> Vec<Span> {
        vec![
            Span::styled(
                key.to_string(),
                Style::default().fg(key_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled("=".to_string(), Style::default().fg(sep_color)),
            Span::styled(desc.to_string(), Style::default().fg(desc_color)),
        ]
    };
    let separator = || Span::styled(" | ".to_string(), Style::default().fg(sep_color));

    let rows: [&[(&str, &str)]; 3] = [
        &[
            ("←↑↓→", "Select"),
            ("1-9", "Jump"),
            ("Space/Enter", "Play/Stop"),
            ("S", "Stop"),
            ("X", "Stop All"),
        ],
        &[
            ("+/-", "Volume"),
            (",/.", "Seek"),
            ("L", "Loop"),
            ("F", "Favorite"),
            ("C", "Color"),
            ("[/]", "Reorder"),
            ("R", "Rename"),
        ],
        &[
            ("I", "Import"),
            ("Del", "Remove"),
            ("/", "Search"),
            ("T", "Theme"),
            ("O", "Settings"),
            ("Q", "Quit"),
        ],
    ];

    let help_text: Vec<Line> = rows
        .iter()
        .map(|row| {
            let mut spans = Vec::new();
            for (i, (key, desc)) in row.iter().enumerate() {
                if i > 0 {
                    spans.push(separator());
                }
                spans.extend(key_desc(*key, *desc));
            }
            Line::from(spans)
        })
        .collect();

    let footer =
        Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Controls"));
    f.render_widget(footer, area);
}

fn draw_file_picker_overlay(f: &mut Frame, area: Rect, input_mode: &Option<InputMode>) {
    let Some(InputMode::FilePicker {
        current_dir,
        entries,
        selected_index,
        scroll_offset,
    }) = input_mode
    else {
        return;
    };

    let overlay_height = ((entries.len() + 4).min(VISIBLE_ITEMS + 4)) as u16;
    let overlay_area = overlay_rect(area, 64, overlay_height);
    f.render_widget(Clear, overlay_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Import Sound")
        .style(Style::default().bg(Color::Black).fg(Color::White));
    let inner = block.inner(overlay_area);
    f.render_widget(block, overlay_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(inner);

    let path = Paragraph::new(format!("Path: {}", current_dir)).style(Style::default().fg(Color::Cyan));
    f.render_widget(path, chunks[0]);

    let items: Vec<ListItem> = entries
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(VISIBLE_ITEMS)
        .map(|(i, entry)| {
            let (text, color) = match entry {
                FileEntry::Directory(name) if name == ".." => ("⬆️  ..".to_string(), Color::Cyan),
                FileEntry::Directory(name) => (format!("📁 {}", name), Color::Yellow),
                FileEntry::AudioFile(name) => (format!("🎵 {}", name), Color::White),
            };
            let style = if i == *selected_index {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else {
                Style::default().fg(color)
            };
            ListItem::new(text).style(style)
        })
        .collect();
    f.render_widget(List::new(items), chunks[1]);

    let instructions = Paragraph::new("↑↓: Navigate | Enter: Open/Import | Esc: Cancel")
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);
    f.render_widget(instructions, chunks[2]);
}

fn draw_settings_overlay(f: &mut Frame, area: Rect, settings: &Settings, selected_index: usize) {
    let overlay_area = overlay_rect(area, 44, SETTINGS_ROWS as u16 + 4);
    f.render_widget(Clear, overlay_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Settings")
        .style(Style::default().bg(Color::Black).fg(Color::White));
    let inner = block.inner(overlay_area);
    f.render_widget(block, overlay_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(inner);

    let items: Vec<ListItem> = settings_rows(settings)
        .into_iter()
        .enumerate()
        .map(|(i, (label, value))| {
            let style = if i == selected_index {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(format!("{:<18}◀ {} ▶", label, value)).style(style)
        })
        .collect();
    f.render_widget(List::new(items), chunks[0]);

    let instructions = Paragraph::new("↑↓: Select | ←→: Change | Esc: Close")
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);
    f.render_widget(instructions, chunks[1]);
}

/// Fold an engine event into the UI's copy of the playback positions.
fn track_positions(positions: &mut PlaybackSnapshot, event: &EngineEvent) {
    match event {
        EngineEvent::Positions(snapshot) => positions.clone_from(snapshot),
        EngineEvent::Stopped(id) | EngineEvent::Finished(id) | EngineEvent::Removed(id) => {
            positions.remove(id);
        }
        _ => {}
    }
}

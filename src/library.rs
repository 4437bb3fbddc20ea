// src/library.rs
// Sound list and user settings, persisted as TOML

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::SoundId;
use crate::error::{Result, SoundboardError};

/// Card colors offered by the color cycler.
pub const PALETTE: [&str; 10] = [
    "#EF4444", "#F97316", "#F59E0B", "#84CC16", "#10B981", "#06B6D4", "#3B82F6", "#6366F1",
    "#8B5CF6", "#EC4899",
];

pub const MIN_GRID_COLUMNS: usize = 1;
pub const MAX_GRID_COLUMNS: usize = 8;

fn new_sound_id() -> SoundId {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sound {
    /// Left empty when absent from the file; `Library::load` assigns one
    #[serde(default)]
    pub id: SoundId,
    pub name: String,
    /// Path or `file://` URI of the audio data
    pub source: String,
    pub volume: f32,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Sound {
    pub fn new(id: impl Into<SoundId>, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl Default for Sound {
    fn default() -> Self {
        Self {
            id: new_sound_id(),
            name: String::new(),
            source: String::new(),
            volume: 1.0,
            looping: false,
            favorite: false,
            color: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonShape {
    #[default]
    Rounded,
    Square,
}

impl ButtonShape {
    pub fn next(self) -> Self {
        match self {
            ButtonShape::Rounded => ButtonShape::Square,
            ButtonShape::Square => ButtonShape::Rounded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl ButtonSize {
    pub fn next(self) -> Self {
        match self {
            ButtonSize::Small => ButtonSize::Medium,
            ButtonSize::Medium => ButtonSize::Large,
            ButtonSize::Large => ButtonSize::Small,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub grid_columns: usize,
    pub button_shape: ButtonShape,
    pub button_size: ButtonSize,
    /// Seconds
    pub fade_in_duration: f64,
    /// Seconds
    pub fade_out_duration: f64,
    pub show_pulse_animation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            grid_columns: 4,
            button_shape: ButtonShape::default(),
            button_size: ButtonSize::default(),
            fade_in_duration: 0.1,
            fade_out_duration: 0.1,
            show_pulse_animation: true,
        }
    }
}

impl Settings {
    /// Clamp values a hand-edited file may have pushed out of range.
    pub fn sanitized(mut self) -> Self {
        self.grid_columns = self.grid_columns.clamp(MIN_GRID_COLUMNS, MAX_GRID_COLUMNS);
        self.fade_in_duration = self.fade_in_duration.clamp(0.0, 10.0);
        self.fade_out_duration = self.fade_out_duration.clamp(0.0, 10.0);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub settings: Settings,
    pub sounds: Vec<Sound>,
}

impl Library {
    /// Missing file yields an empty library with default settings.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no library file, starting empty");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let mut library: Library = toml::from_str(&text)?;
        library.settings = library.settings.sanitized();
        let mut seen = HashSet::new();
        let mut repaired = false;
        for sound in &mut library.sounds {
            sound.volume = sound.volume.clamp(0.0, 1.0);
            if sound.id.is_empty() || !seen.insert(sound.id.clone()) {
                let fresh = new_sound_id();
                warn!(
                    name = %sound.name,
                    old = %sound.id,
                    new = %fresh,
                    "reassigning missing or duplicate sound id"
                );
                sound.id = fresh;
                seen.insert(sound.id.clone());
                repaired = true;
            }
        }
        if repaired {
            library.save(path)?;
        }

        info!(path = %path.display(), sounds = library.sounds.len(), "library loaded");
        Ok(library)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;

        // Write next to the target then rename, so a crash never leaves half a file
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), sounds = self.sounds.len(), "library saved");
        Ok(())
    }

    /// Adds a sound for an audio file; the name is the file stem.
    pub fn import<P: AsRef<Path>>(&mut self, path: P) -> Result<&Sound> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| SoundboardError::Library(format!("not a file: {}", path.display())))?;

        let sound = Sound::new(
            new_sound_id(),
            name,
            path.to_string_lossy(),
        );
        self.sounds.push(sound);

        Ok(&self.sounds[self.sounds.len() - 1])
    }

    pub fn add(&mut self, sound: Sound) {
        self.sounds.push(sound);
    }

    pub fn remove(&mut self, id: &str) -> Option<Sound> {
        let index = self.index_of(id)?;
        Some(self.sounds.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Sound> {
        self.sounds.iter().find(|sound| sound.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.sounds.iter().position(|sound| sound.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Sound> {
        self.sounds.iter_mut().find(|sound| sound.id == id)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let sound = self.get_mut(id)?;
        sound.favorite = !sound.favorite;
        Some(sound.favorite)
    }

    pub fn toggle_loop(&mut self, id: &str) -> Option<bool> {
        let sound = self.get_mut(id)?;
        sound.looping = !sound.looping;
        Some(sound.looping)
    }

    /// Stores the preferred volume, clamped to [0, 1].
    pub fn set_volume(&mut self, id: &str, volume: f32) -> Option<f32> {
        let sound = self.get_mut(id)?;
        sound.volume = volume.clamp(0.0, 1.0);
        Some(sound.volume)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        match self.get_mut(id) {
            Some(sound) if !name.is_empty() => {
                sound.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn set_color(&mut self, id: &str, color: Option<String>) -> bool {
        match self.get_mut(id) {
            Some(sound) => {
                sound.color = color;
                true
            }
            None => false,
        }
    }

    /// Advance the sound's color to the next palette entry.
    pub fn cycle_color(&mut self, id: &str) -> Option<&'static str> {
        let sound = self.get_mut(id)?;
        let next = match sound
            .color
            .as_deref()
            .and_then(|current| PALETTE.iter().position(|c| c.eq_ignore_ascii_case(current)))
        {
            Some(index) => PALETTE[(index + 1) % PALETTE.len()],
            None => PALETTE[0],
        };
        sound.color = Some(next.to_string());
        Some(next)
    }

    /// Reorder: move the sound at `from` so it ends up at `to`.
    pub fn move_sound(&mut self, from: usize, to: usize) -> bool {
        if from >= self.sounds.len() || to >= self.sounds.len() {
            return false;
        }
        let sound = self.sounds.remove(from);
        self.sounds.insert(to, sound);
        true
    }

    /// Sounds whose name contains `query`, case-insensitively, in board order.
    pub fn filtered(&self, query: &str) -> Vec<&Sound> {
        let query = query.to_lowercase();
        self.sounds
            .iter()
            .filter(|sound| sound.name.to_lowercase().contains(&query))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Library {
        let mut library = Library::default();
        library.add(Sound::new("a", "Airhorn", "a.wav"));
        library.add(Sound::new("b", "Applause", "b.wav"));
        library.add(Sound::new("c", "Drumroll", "c.wav"));
        library
    }

    #[test]
    fn test_import_uses_file_stem() {
        let mut library = Library::default();
        let sound = library.import("/tmp/sounds/rimshot.final.wav").unwrap().clone();

        assert_eq!(sound.name, "rimshot.final");
        assert_eq!(sound.volume, 1.0);
        assert!(!sound.looping && !sound.favorite);
        assert_eq!(sound.id.len(), 32);
        assert!(library.import("/").is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut library = Library::default();
        let a = library.import("x.wav").unwrap().id.clone();
        let b = library.import("x.wav").unwrap().id.clone();
        assert_ne!(a, b);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let library = board();
        let names: Vec<_> = library.filtered("AP").iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["Applause"]);
        assert_eq!(library.filtered("").len(), 3);
    }

    #[test]
    fn test_move_sound_reorders() {
        let mut library = board();
        assert!(library.move_sound(0, 2));
        let ids: Vec<_> = library.sounds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(!library.move_sound(0, 3));
    }

    #[test]
    fn test_toggles_and_metadata() {
        let mut library = board();
        assert_eq!(library.toggle_favorite("a"), Some(true));
        assert_eq!(library.toggle_loop("a"), Some(true));
        assert_eq!(library.set_volume("a", 1.7), Some(1.0));
        assert!(library.rename("a", "  Horn "));
        assert!(!library.rename("a", "   "));
        assert_eq!(library.get("a").unwrap().name, "Horn");
        assert_eq!(library.toggle_favorite("zzz"), None);
    }

    #[test]
    fn test_cycle_color_wraps_palette() {
        let mut library = board();
        assert_eq!(library.cycle_color("a"), Some(PALETTE[0]));
        library.set_color("a", Some(PALETTE[9].to_lowercase()));
        assert_eq!(library.cycle_color("a"), Some(PALETTE[0]));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");

        let mut library = board();
        library.settings.theme = Theme::Light;
        library.settings.grid_columns = 5;
        library.toggle_loop("b");
        library.cycle_color("c");
        library.save(&path).unwrap();

        let reloaded = Library::load(&path).unwrap();
        assert_eq!(reloaded, library);
    }

    #[test]
    fn test_missing_file_is_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::load(dir.path().join("nope.toml")).unwrap();
        assert!(library.sounds.is_empty());
        assert_eq!(library.settings, Settings::default());
    }

    #[test]
    fn test_out_of_range_settings_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(
            &path,
            "[settings]\ngrid_columns = 40\ntheme = \"light\"\n\n[[sounds]]\nid = \"x\"\nname = \"X\"\nsource = \"x.wav\"\nvolume = 3.0\nloop = true\n",
        )
        .unwrap();

        let library = Library::load(&path).unwrap();
        assert_eq!(library.settings.grid_columns, MAX_GRID_COLUMNS);
        assert_eq!(library.settings.theme, Theme::Light);
        assert_eq!(library.sounds[0].volume, 1.0);
        assert!(library.sounds[0].looping);
        assert!(library.settings.show_pulse_animation);
    }

    #[test]
    fn test_missing_and_duplicate_ids_are_reassigned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(
            &path,
            r#"
[[sounds]]
name = "Airhorn"
source = "a.wav"

[[sounds]]
name = "Applause"
source = "b.wav"

[[sounds]]
id = "kick"
name = "Kick"
source = "kick.wav"

[[sounds]]
id = "kick"
name = "Kick copy"
source = "kick.wav"

[[sounds]]
id = ""
name = "Snare"
source = "snare.wav"
"#,
        )
        .unwrap();

        let library = Library::load(&path).unwrap();
        let ids: HashSet<&str> = library.sounds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
        assert!(library.sounds.iter().all(|s| !s.id.is_empty()));
        assert_eq!(library.sounds[2].id, "kick");
        assert_ne!(library.sounds[3].id, "kick");

        // Repaired ids are written back, so they stay stable across loads
        let reloaded = Library::load(&path).unwrap();
        assert_eq!(reloaded, library);
    }

    #[test]
    fn test_sounds_without_ids_keep_their_new_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(
            &path,
            "[[sounds]]\nname = \"Airhorn\"\nsource = \"a.wav\"\n\n[[sounds]]\nname = \"Applause\"\nsource = \"b.wav\"\n",
        )
        .unwrap();

        let first = Library::load(&path).unwrap();
        assert!(!first.sounds[0].id.is_empty());
        assert_ne!(first.sounds[0].id, first.sounds[1].id);
        assert_eq!(Library::load(&path).unwrap(), first);
    }

    #[test]
    fn test_default_sound_has_an_id() {
        let a = Sound::default();
        let b = Sound::default();
        assert_eq!(a.id.len(), 32);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(&path, "sounds = 12 = 3").unwrap();
        assert!(matches!(Library::load(&path), Err(SoundboardError::Parse(_))));
    }
}

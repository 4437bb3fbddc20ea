use thiserror::Error;

/// Result type alias for soundboard operations
pub type Result<T> = std::result::Result<T, SoundboardError>;

#[derive(Debug, Error)]
pub enum SoundboardError {
    #[error("Failed to fetch {locator}: {source}")]
    Fetch {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to spawn loader thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Library error: {0}")]
    Library(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid library file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize library: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<hound::Error> for SoundboardError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => SoundboardError::Io(e),
            other => SoundboardError::Decode(other.to_string()),
        }
    }
}

impl From<symphonia::core::errors::Error> for SoundboardError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::Unsupported(what) => SoundboardError::UnsupportedFormat(what.to_string()),
            other => SoundboardError::Decode(other.to_string()),
        }
    }
}

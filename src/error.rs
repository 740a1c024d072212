//! Error types for EchoBot

use thiserror::Error;

/// Main error type for EchoBot
#[derive(Error, Debug)]
pub enum EchoBotError {
    #[error("OBS error: {0}")]
    Obs(#[from] ObsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("AMA error: {0}")]
    Ama(#[from] AmaError),

    #[error("Cycler error: {0}")]
    Cycler(#[from] CyclerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cycler configuration errors
#[derive(Error, Debug)]
pub enum CyclerError {
    #[error("{0} list must not be empty")]
    EmptyList(&'static str),
}

/// OBS facade errors
#[derive(Error, Debug)]
pub enum ObsError {
    #[error("OBS connection failed: {0}")]
    Connection(String),

    #[error("OBS scene not found: {0}")]
    SceneNotFound(String),

    #[error("OBS source not found: {0}")]
    SourceNotFound(String),

    #[error("OBS request failed: {0}")]
    Request(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Media resolution errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    #[error("Failed to probe audio file {path}: {message}")]
    Probe { path: String, message: String },
}

/// Playlist loading errors
#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Failed to read playlist: {0}")]
    ReadFile(String),

    #[error("Failed to parse playlist: {0}")]
    Parse(String),

    #[error("Unknown playlist variable: ${0}")]
    UnknownVariable(String),

    #[error("Playlist is empty")]
    Empty,
}

/// Schedule loading/saving errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Failed to read schedule: {0}")]
    ReadFile(String),

    #[error("Failed to parse schedule: {0}")]
    Parse(String),

    #[error("Failed to save schedule: {0}")]
    Save(String),

    #[error("Unknown scene in schedule: {0}")]
    UnknownScene(String),
}

/// AMA reply generation errors
#[derive(Error, Debug)]
pub enum AmaError {
    #[error("Chat model request failed: {0}")]
    Model(String),

    #[error("Malformed model reply: {0}")]
    MalformedReply(String),

    #[error("Voice synthesis failed: {0}")]
    Synthesis(String),
}

/// Result type alias for EchoBot operations
pub type Result<T> = std::result::Result<T, EchoBotError>;

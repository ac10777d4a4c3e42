use std::fmt;
use std::io;

/// Error type for room loading and export
#[derive(Debug)]
pub enum RoomError {
    /// I/O error
    Io(io::Error),
    /// JSON (palette, overrides, index) error
    Json(serde_json::Error),
    /// Image encoding error
    Image(String),
    /// Input that cannot be used at all (not raised for malformed level text)
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, RoomError>;

impl From<io::Error> for RoomError {
    fn from(err: io::Error) -> Self {
        RoomError::Io(err)
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        RoomError::Json(err)
    }
}

impl From<image::ImageError> for RoomError {
    fn from(err: image::ImageError) -> Self {
        RoomError::Image(err.to_string())
    }
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::Io(err) => write!(f, "I/O error: {}", err),
            RoomError::Json(err) => write!(f, "JSON error: {}", err),
            RoomError::Image(msg) => write!(f, "Image error: {}", msg),
            RoomError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl std::error::Error for RoomError {}

//! Error taxonomy
//!
//! Pool exhaustion is not an error (oldest bullet is evicted), and
//! out-of-bounds / expired / collided bullets are normal terminal states
//! reported through pop records. Only bad configuration and unusable
//! path resources surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DanmakuError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Bezier path has no curve assigned")]
    MissingCurve,
    #[error("Curve needs at least 2 points, has {0}")]
    EmptyCurve(usize),
    #[error("Cannot resize the bullet pool while the server is running")]
    PoolLocked,
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("Failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl DanmakuError {
    /// True for the errors that mean "this path/config cannot be used"
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            DanmakuError::InvalidConfiguration(_)
                | DanmakuError::MissingCurve
                | DanmakuError::EmptyCurve(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DanmakuError>;

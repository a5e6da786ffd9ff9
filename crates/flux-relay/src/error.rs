use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid resolution '{0}', expected WIDTHxHEIGHT")]
    InvalidResolution(String),

    #[error("Invalid framerate {0}, expected 1-120")]
    InvalidFramerate(u32),

    #[error("Invalid {field} bitrate '{value}', expected digits followed by 'k'")]
    InvalidBitrate { field: &'static str, value: String },

    #[error("Invalid {0} codec: must not be empty")]
    InvalidCodec(&'static str),

    #[error("Placeholder media not found: {0}")]
    PlaceholderMissing(PathBuf),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Engine builder missing {0}")]
    MissingComponent(&'static str),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// 是否属于配置校验错误
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidResolution(_)
                | RelayError::InvalidFramerate(_)
                | RelayError::InvalidBitrate { .. }
                | RelayError::InvalidCodec(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

//! Crate error type

use thiserror::Error;

/// Errors surfaced by the sky renderer, its data tables and the demo host
#[derive(Debug, Error)]
pub enum SkyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SDL reports its failures as plain strings
    #[error("display error: {0}")]
    Display(String),

    #[error("weather feed error: {0}")]
    Feed(String),

    #[error("unsupported renderer configuration: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, SkyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_converts() {
        let err: SkyError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SkyError::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_unsupported_message() {
        let err = SkyError::Unsupported("render scale 0".into());
        assert_eq!(
            err.to_string(),
            "unsupported renderer configuration: render scale 0"
        );
    }
}

use ordo_runtime::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown item: {id}")]
    UnknownItem { id: String },

    #[error("unknown container: {id}")]
    UnknownContainer { id: String },

    #[error("background work did not finish within {seconds}s")]
    Timeout { seconds: u64 },
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

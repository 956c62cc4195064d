use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Detected before any job is launched; the process exits non-zero.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dump, restore or listing call against the database engine failed.
    #[error("Engine failure: {0}")]
    Engine(String),

    /// An upload or download against remote storage failed.
    #[error("Transfer failure: {0}")]
    Transfer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

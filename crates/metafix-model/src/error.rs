use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetafixError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("store error: {0}")]
    Store(String),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, MetafixError>;

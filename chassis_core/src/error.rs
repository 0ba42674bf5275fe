use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ChassisError {
    #[error("cache snapshot error: {0}")]
    Snapshot(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("break actions require a breaker")]
    BreakActionsWithoutBreaker,
    #[error("invalid action: {0}")]
    InvalidAction(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;

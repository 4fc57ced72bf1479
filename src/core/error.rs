use crate::driver::Operation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EwfsError {
    #[error("Disk error: invalid or unmounted disk id {disk_id}")]
    DiskError { disk_id: u8 },

    #[error("Disk error: block read of {len} bytes at {address:#010x} failed")]
    DiskRead { address: u32, len: usize },

    #[error("No such file: {0}")]
    NoFile(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("Seek by {offset} is outside the file (size {size})")]
    SeekOutOfRange { offset: i64, size: u32 },

    #[error("Operation not supported by a read-only image: {0:?}")]
    Unsupported(Operation),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Driver-level result codes handed to a mounting host
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    DiskError = 1,
    NoFile = 2,
    InvalidParameter = 3,
}

impl EwfsError {
    /// Collapse the error into the four codes a host understands
    pub fn code(&self) -> ResultCode {
        match self {
            EwfsError::DiskError { .. }
            | EwfsError::DiskRead { .. }
            | EwfsError::Io(_) => ResultCode::DiskError,
            EwfsError::NoFile(_) => ResultCode::NoFile,
            EwfsError::InvalidParameter(_)
            | EwfsError::SeekOutOfRange { .. }
            | EwfsError::Unsupported(_)
            | EwfsError::Config(_)
            | EwfsError::Toml(_) => ResultCode::InvalidParameter,
        }
    }
}

impl ResultCode {
    /// Code for an operation outcome
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EwfsError>;

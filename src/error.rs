use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Port missing or could not be opened. Fatal at construction.
    #[error("connection error: {0}")]
    Connection(String),
    /// Rejected before anything reached the wire; the session stays usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("session closed")]
    SessionClosed,
    #[error("no completion from device within {0:?}")]
    Timeout(Duration),
    /// Read or write failure mid-session. The session stays faulted.
    #[error("transport fault: {0}")]
    TransportFault(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DeviceError::InvalidArgument(msg.into())
    }
}

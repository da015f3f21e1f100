//! Error types
//!
//! Transport failures surface as [`ProtocolError::Connection`] carrying the
//! driver's [`ErrorCode`]; an exhausted retry budget surfaces as
//! [`ProtocolError::ProtocolTimeout`].

use std::fmt;
use thiserror::Error;

/// Error codes reported by the device transport.
///
/// The numeric values match the codes of the vendor communication driver so
/// they can be logged and compared against its documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No error (0)
    Ok,
    /// Driver/firmware version mismatch
    InvalidVersion,
    /// An argument was rejected
    InvalidParameter,
    /// Malformed data from the device
    InvalidData,
    /// Checksum mismatch on the link
    InvalidChecksum,
    /// The link could not be established
    ConnectionError,
    /// Unexpected message identifier
    InvalidMessageId,
    /// Timed out waiting for a driver lock
    MutexTimeout,
    /// Read from the driver pipe failed
    PipeReadFailed,
    /// Write to the driver pipe failed
    PipeWriteFailed,
    /// USB read failed
    UsbReadFailed,
    /// USB write failed
    UsbWriteFailed,
    /// The data-ready signal could not be acquired
    InvalidEventObject,
    /// The link stopped making progress
    ConnectionStalling,
    /// Operation not supported by this device or transport
    NotSupported,
    /// The physical interface reported an error
    InterfaceError,
    /// Sending failed
    TransmitError,
    /// Receiving failed
    ReceiveError,
    /// No open handle (closed session)
    InvalidHandle,
    /// Caller buffer too small
    InsufficientSpace,
    /// The device went away underneath an open handle
    Disconnected,
    /// Unclassified failure
    General,
    /// Enumeration exhausted
    NoMoreItems,
}

impl ErrorCode {
    const ALL: [ErrorCode; 23] = [
        ErrorCode::Ok,
        ErrorCode::InvalidVersion,
        ErrorCode::InvalidParameter,
        ErrorCode::InvalidData,
        ErrorCode::InvalidChecksum,
        ErrorCode::ConnectionError,
        ErrorCode::InvalidMessageId,
        ErrorCode::MutexTimeout,
        ErrorCode::PipeReadFailed,
        ErrorCode::PipeWriteFailed,
        ErrorCode::UsbReadFailed,
        ErrorCode::UsbWriteFailed,
        ErrorCode::InvalidEventObject,
        ErrorCode::ConnectionStalling,
        ErrorCode::NotSupported,
        ErrorCode::InterfaceError,
        ErrorCode::TransmitError,
        ErrorCode::ReceiveError,
        ErrorCode::InvalidHandle,
        ErrorCode::InsufficientSpace,
        ErrorCode::Disconnected,
        ErrorCode::General,
        ErrorCode::NoMoreItems,
    ];

    /// Raw driver value (`0` for success, negative for failures)
    pub fn code(self) -> i32 {
        -(self as i32)
    }

    /// Map a raw driver value back to a code. Unknown values become `General`.
    pub fn from_raw(raw: i32) -> Self {
        if raw > 0 {
            return ErrorCode::General;
        }
        Self::ALL
            .get(raw.unsigned_abs() as usize)
            .copied()
            .unwrap_or(ErrorCode::General)
    }

    /// Whether this code means the device went away underneath an open handle
    pub fn is_disconnect(self) -> bool {
        self == ErrorCode::Disconnected
    }

    fn description(self) -> &'static str {
        match self {
            ErrorCode::Ok => "no error",
            ErrorCode::InvalidVersion => "invalid version",
            ErrorCode::InvalidParameter => "invalid parameter",
            ErrorCode::InvalidData => "invalid data",
            ErrorCode::InvalidChecksum => "invalid checksum",
            ErrorCode::ConnectionError => "connection error",
            ErrorCode::InvalidMessageId => "invalid message id",
            ErrorCode::MutexTimeout => "mutex timeout",
            ErrorCode::PipeReadFailed => "pipe read failed",
            ErrorCode::PipeWriteFailed => "pipe write failed",
            ErrorCode::UsbReadFailed => "USB read failed",
            ErrorCode::UsbWriteFailed => "USB write failed",
            ErrorCode::InvalidEventObject => "invalid event object",
            ErrorCode::ConnectionStalling => "connection stalling",
            ErrorCode::NotSupported => "not supported",
            ErrorCode::InterfaceError => "interface error",
            ErrorCode::TransmitError => "transmit error",
            ErrorCode::ReceiveError => "receive error",
            ErrorCode::InvalidHandle => "invalid handle",
            ErrorCode::InsufficientSpace => "insufficient space",
            ErrorCode::Disconnected => "device disconnected",
            ErrorCode::General => "general error",
            ErrorCode::NoMoreItems => "no more items",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Errors that can occur while talking to a device
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Transport-level failure (open, send, receive, device queries)
    #[error("{context} failed w/err: {code}")]
    Connection {
        /// The failing operation
        context: String,
        /// Code reported by the transport
        code: ErrorCode,
    },

    /// No correlated reply arrived within the retry budget
    #[error("Timeout waiting for response")]
    ProtocolTimeout,

    /// A correlated reply carried content a typed command could not interpret
    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub(crate) fn connection(context: impl Into<String>, code: ErrorCode) -> Self {
        ProtocolError::Connection {
            context: context.into(),
            code,
        }
    }

    /// True for transport-level failures; callers usually close the session
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ProtocolError::Connection { .. })
    }

    /// Transport error code, if this is a connection error
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ProtocolError::Connection { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProtocolError>;

use std::net::SocketAddr;
use std::time::Duration;

use gtpv2_dict::Cause;
use thiserror::Error;

/// Main error type for the GTPv2-C engine
#[derive(Error, Debug)]
pub enum GtpError {
    // ========================================
    // Decode Errors
    // ========================================
    #[error("Too short to decode: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    #[error("Invalid length: declared {declared} bytes, {available} available")]
    InvalidLength { declared: usize, available: usize },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // ========================================
    // Encode Errors
    // ========================================
    #[error("Encoded length {length} exceeds the {max}-byte length field")]
    Oversized { length: usize, max: usize },

    // ========================================
    // Protocol Errors
    // ========================================
    #[error("Required IE missing: {name} (type {ie_type}, instance {instance})")]
    RequiredIeMissing {
        name: &'static str,
        ie_type: u8,
        instance: u8,
    },

    #[error("Invalid value in IE type {ie_type}: {reason}")]
    InvalidValue { ie_type: u8, reason: String },

    #[error("Cause not accepted: {0}")]
    CauseNotAccepted(u8),

    #[error("Unexpected message type: got {got}, want {want}")]
    UnexpectedType { got: u8, want: u8 },

    #[error("Unknown IMSI: {0}")]
    UnknownImsi(String),

    #[error("Unknown TEID: {0:#010x}")]
    UnknownTeid(u32),

    #[error("TEID {teid:#010x} is not bound to peer {peer}")]
    InvalidTeid { teid: u32, peer: SocketAddr },

    #[error("No TEID for interface type {0}")]
    TeidNotFound(u8),

    #[error("Bearer not found: {0}")]
    BearerNotFound(String),

    #[error("Session is not active: {0}")]
    InactiveSession(String),

    // ========================================
    // Timeout Errors
    // ========================================
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // ========================================
    // Transport Errors
    // ========================================
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Connection is not bound")]
    NotBound,

    #[error("Could not reserve a TEID after {0} attempts")]
    TeidExhausted(usize),
}

impl GtpError {
    /// Cause value a handler should put in a failure response for this error
    pub fn to_cause(&self) -> u8 {
        let cause = match self {
            Self::TooShort { .. } | Self::InvalidMessage(_) => Cause::InvalidMessageFormat,
            Self::InvalidLength { .. } => Cause::InvalidLength,
            Self::RequiredIeMissing { .. } => Cause::MandatoryIeMissing,
            Self::InvalidValue { .. } => Cause::MandatoryIeIncorrect,
            Self::UnknownImsi(_)
            | Self::UnknownTeid(_)
            | Self::InvalidTeid { .. }
            | Self::TeidNotFound(_)
            | Self::BearerNotFound(_)
            | Self::InactiveSession(_) => Cause::ContextNotFound,
            Self::Timeout(_) => Cause::RequestRejectedForAPeerNotResponding,
            Self::TeidExhausted(_) => Cause::NoResourcesAvailable,
            _ => Cause::SystemFailure,
        };
        cause as u8
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TooShort { .. }
            | Self::InvalidLength { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidValue { .. } => ErrorSeverity::Warning,
            Self::RequiredIeMissing { .. }
            | Self::CauseNotAccepted(_)
            | Self::UnexpectedType { .. } => ErrorSeverity::Warning,
            Self::UnknownImsi(_) | Self::UnknownTeid(_) | Self::InvalidTeid { .. } => {
                ErrorSeverity::Info
            }
            Self::Transport(_) | Self::NotBound => ErrorSeverity::Error,
            Self::TeidExhausted(_) => ErrorSeverity::Critical,
            Self::Oversized { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Check if the error came from a malformed packet
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::TooShort { .. } | Self::InvalidLength { .. } | Self::InvalidMessage(_)
        )
    }

    /// Check if the error is a correlation or dial timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GtpError>;

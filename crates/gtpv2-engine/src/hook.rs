use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use gtpv2_core::GtpError;
use gtpv2_dict::describe_message;

/// A receive-path failure the dispatch loop swallowed
#[derive(Debug)]
pub enum DispatchFailure {
    /// Datagram could not be decoded
    Decode { peer: SocketAddr, error: GtpError },
    /// Message version is not 2; a Version Not Supported Indication was sent
    UnsupportedVersion { peer: SocketAddr, version: u8 },
    /// Header TEID does not resolve to a Session of this peer; dispatch went ahead
    InvalidTeid {
        peer: SocketAddr,
        teid: u32,
        error: GtpError,
    },
    /// No handler registered for the message type
    NoHandler { peer: SocketAddr, message_type: u8 },
    /// The handler returned an error
    Handler {
        peer: SocketAddr,
        message_type: u8,
        error: GtpError,
    },
}

impl DispatchFailure {
    pub fn peer(&self) -> SocketAddr {
        match self {
            Self::Decode { peer, .. }
            | Self::UnsupportedVersion { peer, .. }
            | Self::InvalidTeid { peer, .. }
            | Self::NoHandler { peer, .. }
            | Self::Handler { peer, .. } => *peer,
        }
    }

    /// Underlying engine error, when there is one
    pub fn error(&self) -> Option<&GtpError> {
        match self {
            Self::Decode { error, .. }
            | Self::InvalidTeid { error, .. }
            | Self::Handler { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { peer, error } => write!(f, "decode failure from {peer}: {error}"),
            Self::UnsupportedVersion { peer, version } => {
                write!(f, "version {version} from {peer} not supported")
            }
            Self::InvalidTeid { peer, teid, error } => {
                write!(f, "invalid TEID {teid:#010x} from {peer}: {error}")
            }
            Self::NoHandler { peer, message_type } => write!(
                f,
                "no handler for {} from {peer}",
                describe_message(*message_type)
            ),
            Self::Handler {
                peer,
                message_type,
                error,
            } => write!(
                f,
                "{} handler failed for {peer}: {error}",
                describe_message(*message_type)
            ),
        }
    }
}

/// Callback observing every [`DispatchFailure`]
pub type ErrorHook = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

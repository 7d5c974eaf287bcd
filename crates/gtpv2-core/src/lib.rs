// Error types module
pub mod error;

// GTPv2-C wire format
pub mod header;
pub mod ie;
pub mod message;
pub mod values;

// Packet transport abstraction
pub mod transport;

// Re-export commonly used types
pub use error::{ErrorSeverity, GtpError, Result};
pub use header::{Header, GTP_VERSION_2, MAX_SEQUENCE};
pub use ie::{Ie, MAX_IE_PAYLOAD};
pub use message::{Message, MessageKind, MAX_MESSAGE_LENGTH};
pub use transport::PacketConn;
pub use values::{BearerQos, FTeid};

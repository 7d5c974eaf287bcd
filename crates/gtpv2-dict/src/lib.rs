//! GTPv2-C protocol catalog.
//!
//! Type codes and the per-message field tables the codec is driven by.
//! Supporting another message type means adding its code and table here.

pub mod cause;
pub mod fields;
pub mod ie_type;
pub mod interface;
pub mod lookup;
pub mod message_type;

// Re-export commonly used types
pub use cause::{is_accepted, Cause};
pub use fields::{field_table, slot_of, FieldSpec, Presence};
pub use ie_type::{is_grouped, IeType, GROUPED_IE_TYPES};
pub use interface::InterfaceType;
pub use lookup::{describe_ie, describe_message, ie_info, IeInfo};
pub use message_type::MessageType;

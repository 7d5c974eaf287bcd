use crate::ie_type::{is_grouped, IeType};
use crate::message_type::MessageType;

/// IE catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IeInfo {
    pub code: u8,
    pub name: &'static str,
    pub grouped: bool,
}

/// Lookup IE information by code
pub fn ie_info(code: u8) -> Option<IeInfo> {
    IeType::from_u8(code).map(|t| IeInfo {
        code,
        name: t.name(),
        grouped: is_grouped(code),
    })
}

/// Human readable message name for logs, including unmodelled codes
pub fn describe_message(code: u8) -> String {
    match MessageType::from_u8(code) {
        Some(mt) => mt.name().to_string(),
        None => format!("Unknown({code})"),
    }
}

/// Human readable IE name for logs
pub fn describe_ie(code: u8) -> String {
    match ie_info(code) {
        Some(info) => info.name.to_string(),
        None => format!("IE({code})"),
    }
}

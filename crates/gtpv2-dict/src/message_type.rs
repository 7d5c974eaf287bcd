/// GTPv2-C message type codes modelled by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    // ========================================
    // Path management
    // ========================================
    EchoRequest = 1,
    EchoResponse = 2,
    VersionNotSupportedIndication = 3,

    // ========================================
    // Tunnel management
    // ========================================
    CreateSessionRequest = 32,
    CreateSessionResponse = 33,
    ModifyBearerRequest = 34,
    ModifyBearerResponse = 35,
    DeleteSessionRequest = 36,
    DeleteSessionResponse = 37,
    CreateBearerRequest = 95,
    CreateBearerResponse = 96,
    DeleteBearerRequest = 99,
    DeleteBearerResponse = 100,
    ReleaseAccessBearersRequest = 170,
    ReleaseAccessBearersResponse = 171,
}

impl MessageType {
    /// Convert a wire code to MessageType
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::EchoRequest),
            2 => Some(Self::EchoResponse),
            3 => Some(Self::VersionNotSupportedIndication),
            32 => Some(Self::CreateSessionRequest),
            33 => Some(Self::CreateSessionResponse),
            34 => Some(Self::ModifyBearerRequest),
            35 => Some(Self::ModifyBearerResponse),
            36 => Some(Self::DeleteSessionRequest),
            37 => Some(Self::DeleteSessionResponse),
            95 => Some(Self::CreateBearerRequest),
            96 => Some(Self::CreateBearerResponse),
            99 => Some(Self::DeleteBearerRequest),
            100 => Some(Self::DeleteBearerResponse),
            170 => Some(Self::ReleaseAccessBearersRequest),
            171 => Some(Self::ReleaseAccessBearersResponse),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EchoRequest => "Echo Request",
            Self::EchoResponse => "Echo Response",
            Self::VersionNotSupportedIndication => "Version Not Supported Indication",
            Self::CreateSessionRequest => "Create Session Request",
            Self::CreateSessionResponse => "Create Session Response",
            Self::ModifyBearerRequest => "Modify Bearer Request",
            Self::ModifyBearerResponse => "Modify Bearer Response",
            Self::DeleteSessionRequest => "Delete Session Request",
            Self::DeleteSessionResponse => "Delete Session Response",
            Self::CreateBearerRequest => "Create Bearer Request",
            Self::CreateBearerResponse => "Create Bearer Response",
            Self::DeleteBearerRequest => "Delete Bearer Request",
            Self::DeleteBearerResponse => "Delete Bearer Response",
            Self::ReleaseAccessBearersRequest => "Release Access Bearers Request",
            Self::ReleaseAccessBearersResponse => "Release Access Bearers Response",
        }
    }

    /// Path management messages are sent without a TEID in the header
    pub fn has_teid(&self) -> bool {
        !matches!(
            self,
            Self::EchoRequest | Self::EchoResponse | Self::VersionNotSupportedIndication
        )
    }

    /// Check if this message initiates a transaction
    pub fn is_request(&self) -> bool {
        self.response_type().is_some()
    }

    /// The message type that answers this request
    pub fn response_type(&self) -> Option<Self> {
        match self {
            Self::EchoRequest => Some(Self::EchoResponse),
            Self::CreateSessionRequest => Some(Self::CreateSessionResponse),
            Self::ModifyBearerRequest => Some(Self::ModifyBearerResponse),
            Self::DeleteSessionRequest => Some(Self::DeleteSessionResponse),
            Self::CreateBearerRequest => Some(Self::CreateBearerResponse),
            Self::DeleteBearerRequest => Some(Self::DeleteBearerResponse),
            Self::ReleaseAccessBearersRequest => Some(Self::ReleaseAccessBearersResponse),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrip() {
        for code in 0..=255u8 {
            if let Some(mt) = MessageType::from_u8(code) {
                assert_eq!(mt as u8, code);
            }
        }
        assert_eq!(MessageType::from_u8(250), None);
    }

    #[test]
    fn test_request_response_pairs() {
        assert_eq!(
            MessageType::CreateSessionRequest.response_type(),
            Some(MessageType::CreateSessionResponse)
        );
        assert!(MessageType::EchoRequest.is_request());
        assert!(!MessageType::EchoResponse.is_request());
        assert!(!MessageType::VersionNotSupportedIndication.is_request());
    }

    #[test]
    fn test_teid_presence() {
        assert!(!MessageType::EchoRequest.has_teid());
        assert!(MessageType::DeleteSessionRequest.has_teid());
    }
}

/// GTPv2 Cause values (TS 29.274 Section 8.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cause {
    LocalDetach = 2,
    CompleteDetach = 3,
    RatChangedFrom3gppToNon3gpp = 4,
    IsrDeactivation = 5,
    ErrorIndicationReceived = 6,
    ImsiDetachOnly = 7,
    ReactivationRequested = 8,
    PgwNotResponding = 12,
    NetworkFailure = 13,
    QosParameterMismatch = 14,
    RequestAccepted = 16,
    RequestAcceptedPartially = 17,
    NewPdnTypeDueToNetworkPreference = 18,
    NewPdnTypeDueToSingleAddressBearerOnly = 19,
    ContextNotFound = 64,
    InvalidMessageFormat = 65,
    VersionNotSupportedByNextPeer = 66,
    InvalidLength = 67,
    ServiceNotSupported = 68,
    MandatoryIeIncorrect = 69,
    MandatoryIeMissing = 70,
    SystemFailure = 72,
    NoResourcesAvailable = 73,
    MissingOrUnknownApn = 78,
    UnexpectedRepeatedIe = 79,
    PreferredPdnTypeNotSupported = 83,
    AllDynamicAddressesAreOccupied = 84,
    RequestRejected = 94,
    ImsiImeiNotKnown = 96,
    InvalidPeer = 109,
    TemporarilyRejectedDueToHandoverProcedureInProgress = 110,
    RequestRejectedForAPeerNotResponding = 112,
    ApnCongestion = 113,
    MultiplePdnConnectionsForAGivenApnAndPdnTypeNotAllowed = 116,
    TimedOutRequest = 122,
}

impl Cause {
    pub fn from_u8(value: u8) -> Option<Self> {
        let cause = match value {
            2 => Self::LocalDetach,
            3 => Self::CompleteDetach,
            4 => Self::RatChangedFrom3gppToNon3gpp,
            5 => Self::IsrDeactivation,
            6 => Self::ErrorIndicationReceived,
            7 => Self::ImsiDetachOnly,
            8 => Self::ReactivationRequested,
            12 => Self::PgwNotResponding,
            13 => Self::NetworkFailure,
            14 => Self::QosParameterMismatch,
            16 => Self::RequestAccepted,
            17 => Self::RequestAcceptedPartially,
            18 => Self::NewPdnTypeDueToNetworkPreference,
            19 => Self::NewPdnTypeDueToSingleAddressBearerOnly,
            64 => Self::ContextNotFound,
            65 => Self::InvalidMessageFormat,
            66 => Self::VersionNotSupportedByNextPeer,
            67 => Self::InvalidLength,
            68 => Self::ServiceNotSupported,
            69 => Self::MandatoryIeIncorrect,
            70 => Self::MandatoryIeMissing,
            72 => Self::SystemFailure,
            73 => Self::NoResourcesAvailable,
            78 => Self::MissingOrUnknownApn,
            79 => Self::UnexpectedRepeatedIe,
            83 => Self::PreferredPdnTypeNotSupported,
            84 => Self::AllDynamicAddressesAreOccupied,
            94 => Self::RequestRejected,
            96 => Self::ImsiImeiNotKnown,
            109 => Self::InvalidPeer,
            110 => Self::TemporarilyRejectedDueToHandoverProcedureInProgress,
            112 => Self::RequestRejectedForAPeerNotResponding,
            113 => Self::ApnCongestion,
            116 => Self::MultiplePdnConnectionsForAGivenApnAndPdnTypeNotAllowed,
            122 => Self::TimedOutRequest,
            _ => return None,
        };
        Some(cause)
    }
}

/// Values 16..=63 signal acceptance in a response message
pub fn is_accepted(value: u8) -> bool {
    (16..=63).contains(&value)
}

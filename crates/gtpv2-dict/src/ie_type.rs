/// GTPv2-C Information Element type codes (3GPP TS 29.274, Table 8.1-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IeType {
    // ========================================
    // Subscriber identity and result
    // ========================================
    Imsi = 1,
    Cause = 2,
    Recovery = 3,
    Apn = 71,
    Ambr = 72,
    Ebi = 73,
    IpAddress = 74,
    Mei = 75,
    Msisdn = 76,
    Indication = 77,
    Pco = 78,
    Paa = 79,

    // ========================================
    // Bearer and tunnel description
    // ========================================
    BearerQos = 80,
    FlowQos = 81,
    RatType = 82,
    ServingNetwork = 83,
    BearerTft = 84,
    Tad = 85,
    Uli = 86,
    FTeid = 87,
    DelayValue = 92,
    BearerContext = 93,
    ChargingId = 94,
    ChargingCharacteristics = 95,
    BearerFlags = 97,
    PdnType = 99,
    Pti = 100,
    PdnConnection = 109,
    UeTimeZone = 114,
    ApnRestriction = 127,
    SelectionMode = 128,
    ChangeReportingAction = 131,
    FqCsid = 132,
    NodeType = 135,
    Fqdn = 136,
    Arp = 155,
    NodeFeatures = 152,

    // ========================================
    // Node level control
    // ========================================
    OverloadControlInformation = 180,
    LoadControlInformation = 181,
    RemoteUeContext = 191,
    ScefPdnConnection = 195,
    PrivateExtension = 255,
}

/// IE types whose value is a sequence of child IEs rather than opaque bytes.
///
/// Adding a grouped type from the protocol catalog is a matter of listing
/// its code here; the codec consults this table at decode time.
pub const GROUPED_IE_TYPES: &[u8] = &[
    IeType::BearerContext as u8,
    IeType::PdnConnection as u8,
    IeType::OverloadControlInformation as u8,
    IeType::LoadControlInformation as u8,
    IeType::RemoteUeContext as u8,
    IeType::ScefPdnConnection as u8,
];

/// Check whether an IE type code is registered as grouped
pub fn is_grouped(code: u8) -> bool {
    GROUPED_IE_TYPES.contains(&code)
}

impl IeType {
    /// Convert a wire code to IeType
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Imsi),
            2 => Some(Self::Cause),
            3 => Some(Self::Recovery),
            71 => Some(Self::Apn),
            72 => Some(Self::Ambr),
            73 => Some(Self::Ebi),
            74 => Some(Self::IpAddress),
            75 => Some(Self::Mei),
            76 => Some(Self::Msisdn),
            77 => Some(Self::Indication),
            78 => Some(Self::Pco),
            79 => Some(Self::Paa),
            80 => Some(Self::BearerQos),
            81 => Some(Self::FlowQos),
            82 => Some(Self::RatType),
            83 => Some(Self::ServingNetwork),
            84 => Some(Self::BearerTft),
            85 => Some(Self::Tad),
            86 => Some(Self::Uli),
            87 => Some(Self::FTeid),
            92 => Some(Self::DelayValue),
            93 => Some(Self::BearerContext),
            94 => Some(Self::ChargingId),
            95 => Some(Self::ChargingCharacteristics),
            97 => Some(Self::BearerFlags),
            99 => Some(Self::PdnType),
            100 => Some(Self::Pti),
            109 => Some(Self::PdnConnection),
            114 => Some(Self::UeTimeZone),
            127 => Some(Self::ApnRestriction),
            128 => Some(Self::SelectionMode),
            131 => Some(Self::ChangeReportingAction),
            132 => Some(Self::FqCsid),
            135 => Some(Self::NodeType),
            136 => Some(Self::Fqdn),
            152 => Some(Self::NodeFeatures),
            155 => Some(Self::Arp),
            180 => Some(Self::OverloadControlInformation),
            181 => Some(Self::LoadControlInformation),
            191 => Some(Self::RemoteUeContext),
            195 => Some(Self::ScefPdnConnection),
            255 => Some(Self::PrivateExtension),
            _ => None,
        }
    }

    /// Get IE name as written in TS 29.274
    pub fn name(&self) -> &'static str {
        match self {
            Self::Imsi => "IMSI",
            Self::Cause => "Cause",
            Self::Recovery => "Recovery",
            Self::Apn => "APN",
            Self::Ambr => "AMBR",
            Self::Ebi => "EBI",
            Self::IpAddress => "IP Address",
            Self::Mei => "MEI",
            Self::Msisdn => "MSISDN",
            Self::Indication => "Indication",
            Self::Pco => "PCO",
            Self::Paa => "PAA",
            Self::BearerQos => "Bearer QoS",
            Self::FlowQos => "Flow QoS",
            Self::RatType => "RAT Type",
            Self::ServingNetwork => "Serving Network",
            Self::BearerTft => "Bearer TFT",
            Self::Tad => "TAD",
            Self::Uli => "ULI",
            Self::FTeid => "F-TEID",
            Self::DelayValue => "Delay Value",
            Self::BearerContext => "Bearer Context",
            Self::ChargingId => "Charging ID",
            Self::ChargingCharacteristics => "Charging Characteristics",
            Self::BearerFlags => "Bearer Flags",
            Self::PdnType => "PDN Type",
            Self::Pti => "PTI",
            Self::PdnConnection => "PDN Connection",
            Self::UeTimeZone => "UE Time Zone",
            Self::ApnRestriction => "APN Restriction",
            Self::SelectionMode => "Selection Mode",
            Self::ChangeReportingAction => "Change Reporting Action",
            Self::FqCsid => "FQ-CSID",
            Self::NodeType => "Node Type",
            Self::Fqdn => "FQDN",
            Self::NodeFeatures => "Node Features",
            Self::Arp => "ARP",
            Self::OverloadControlInformation => "Overload Control Information",
            Self::LoadControlInformation => "Load Control Information",
            Self::RemoteUeContext => "Remote UE Context",
            Self::ScefPdnConnection => "SCEF PDN Connection",
            Self::PrivateExtension => "Private Extension",
        }
    }

    /// Check if this type carries child IEs
    pub fn is_grouped(&self) -> bool {
        is_grouped(*self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(IeType::from_u8(87), Some(IeType::FTeid));
        assert_eq!(IeType::from_u8(93), Some(IeType::BearerContext));
        assert_eq!(IeType::from_u8(200), None);
    }

    #[test]
    fn test_grouped_registry() {
        assert!(IeType::BearerContext.is_grouped());
        assert!(IeType::PdnConnection.is_grouped());
        assert!(is_grouped(180));
        assert!(!IeType::FTeid.is_grouped());
        assert!(!is_grouped(IeType::Imsi as u8));
    }

    #[test]
    fn test_names() {
        assert_eq!(IeType::FTeid.name(), "F-TEID");
        assert_eq!(IeType::Imsi.name(), "IMSI");
    }
}

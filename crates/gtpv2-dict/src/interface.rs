use serde::{Deserialize, Serialize};

/// F-TEID interface types (TS 29.274 Section 8.22)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum InterfaceType {
    S1uEnodebGtpU = 0,
    S1uSgwGtpU = 1,
    S12RncGtpU = 2,
    S12SgwGtpU = 3,
    S5S8SgwGtpU = 4,
    S5S8PgwGtpU = 5,
    S5S8SgwGtpC = 6,
    S5S8PgwGtpC = 7,
    S5S8SgwPmipv6 = 8,
    S5S8PgwPmipv6 = 9,
    S11MmeGtpC = 10,
    S11S4SgwGtpC = 11,
    S10MmeGtpC = 12,
    S3MmeGtpC = 13,
    S3SgsnGtpC = 14,
    S4SgsnGtpU = 15,
    S4SgwGtpU = 16,
    S4SgsnGtpC = 17,
    S16SgsnGtpC = 18,
    EnodebGtpUDlDataForwarding = 19,
    EnodebGtpUUlDataForwarding = 20,
    RncGtpUDataForwarding = 21,
    SgsnGtpUDataForwarding = 22,
    SgwGtpUDlDataForwarding = 23,
}

impl InterfaceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let it = match value {
            0 => Self::S1uEnodebGtpU,
            1 => Self::S1uSgwGtpU,
            2 => Self::S12RncGtpU,
            3 => Self::S12SgwGtpU,
            4 => Self::S5S8SgwGtpU,
            5 => Self::S5S8PgwGtpU,
            6 => Self::S5S8SgwGtpC,
            7 => Self::S5S8PgwGtpC,
            8 => Self::S5S8SgwPmipv6,
            9 => Self::S5S8PgwPmipv6,
            10 => Self::S11MmeGtpC,
            11 => Self::S11S4SgwGtpC,
            12 => Self::S10MmeGtpC,
            13 => Self::S3MmeGtpC,
            14 => Self::S3SgsnGtpC,
            15 => Self::S4SgsnGtpU,
            16 => Self::S4SgwGtpU,
            17 => Self::S4SgsnGtpC,
            18 => Self::S16SgsnGtpC,
            19 => Self::EnodebGtpUDlDataForwarding,
            20 => Self::EnodebGtpUUlDataForwarding,
            21 => Self::RncGtpUDataForwarding,
            22 => Self::SgsnGtpUDataForwarding,
            23 => Self::SgwGtpUDlDataForwarding,
            _ => return None,
        };
        Some(it)
    }

    /// The interface type the answering node uses on the same reference point.
    ///
    /// An S-GW receiving a request on S11 answers with its own S11/S4 F-TEID,
    /// a P-GW answering an S-GW on S5/S8 uses the PGW side, and so on.
    /// Types without a counterpart map to themselves.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::S1uEnodebGtpU => Self::S1uSgwGtpU,
            Self::S1uSgwGtpU => Self::S1uEnodebGtpU,
            Self::S12RncGtpU => Self::S12SgwGtpU,
            Self::S12SgwGtpU => Self::S12RncGtpU,
            Self::S5S8SgwGtpU => Self::S5S8PgwGtpU,
            Self::S5S8PgwGtpU => Self::S5S8SgwGtpU,
            Self::S5S8SgwGtpC => Self::S5S8PgwGtpC,
            Self::S5S8PgwGtpC => Self::S5S8SgwGtpC,
            Self::S5S8SgwPmipv6 => Self::S5S8PgwPmipv6,
            Self::S5S8PgwPmipv6 => Self::S5S8SgwPmipv6,
            Self::S11MmeGtpC => Self::S11S4SgwGtpC,
            Self::S11S4SgwGtpC => Self::S11MmeGtpC,
            Self::S4SgsnGtpU => Self::S4SgwGtpU,
            Self::S4SgwGtpU => Self::S4SgsnGtpU,
            Self::S4SgsnGtpC => Self::S11S4SgwGtpC,
            other => *other,
        }
    }

    /// Control-plane interfaces carry GTP-C, the rest GTP-U or PMIP
    pub fn is_control_plane(&self) -> bool {
        matches!(
            self,
            Self::S5S8SgwGtpC
                | Self::S5S8PgwGtpC
                | Self::S11MmeGtpC
                | Self::S11S4SgwGtpC
                | Self::S10MmeGtpC
                | Self::S3MmeGtpC
                | Self::S3SgsnGtpC
                | Self::S4SgsnGtpC
                | Self::S16SgsnGtpC
        )
    }
}

impl TryFrom<u8> for InterfaceType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("unknown interface type: {value}"))
    }
}

impl From<InterfaceType> for u8 {
    fn from(value: InterfaceType) -> Self {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_is_symmetric_for_gtpc() {
        let pairs = [
            (InterfaceType::S11MmeGtpC, InterfaceType::S11S4SgwGtpC),
            (InterfaceType::S5S8SgwGtpC, InterfaceType::S5S8PgwGtpC),
        ];
        for (a, b) in pairs {
            assert_eq!(a.counterpart(), b);
            assert_eq!(b.counterpart(), a);
        }
        assert_eq!(InterfaceType::S10MmeGtpC.counterpart(), InterfaceType::S10MmeGtpC);
    }

    #[test]
    fn test_try_from() {
        assert_eq!(InterfaceType::try_from(10), Ok(InterfaceType::S11MmeGtpC));
        assert!(InterfaceType::try_from(63).is_err());
        assert_eq!(u8::from(InterfaceType::S1uSgwGtpU), 1);
    }

    #[test]
    fn test_plane() {
        assert!(InterfaceType::S11MmeGtpC.is_control_plane());
        assert!(!InterfaceType::S1uEnodebGtpU.is_control_plane());
    }
}

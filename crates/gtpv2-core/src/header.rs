use bytes::{BufMut, BytesMut};

use crate::error::{GtpError, Result};

/// Flags(1) + Type(1) + Length(2) + Sequence(3) + Spare(1)
pub const HEADER_LEN_NO_TEID: usize = 8;

/// Header length when the TEID is present
pub const HEADER_LEN: usize = 12;

/// Bytes not covered by the length field
pub const MANDATORY_PREFIX_LEN: usize = 4;

pub const GTP_VERSION_2: u8 = 2;

/// Sequence numbers are 24 bits wide
pub const MAX_SEQUENCE: u32 = 0x00FF_FFFF;

const FLAG_PIGGYBACKED: u8 = 0x10;
const FLAG_TEID: u8 = 0x08;

/// GTPv2-C header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub piggybacked: bool,
    pub message_type: u8,
    /// Octets after the first four, as carried on the wire
    pub length: u16,
    pub teid: Option<u32>,
    pub sequence: u32,
}

impl Header {
    pub fn new(message_type: u8, teid: Option<u32>, sequence: u32) -> Self {
        let mut header = Self {
            version: GTP_VERSION_2,
            piggybacked: false,
            message_type,
            length: 0,
            teid,
            sequence: sequence & MAX_SEQUENCE,
        };
        header.length = (header.header_len() - MANDATORY_PREFIX_LEN) as u16;
        header
    }

    pub fn flags(&self) -> u8 {
        let mut flags = (self.version & 0x07) << 5;
        if self.piggybacked {
            flags |= FLAG_PIGGYBACKED;
        }
        if self.teid.is_some() {
            flags |= FLAG_TEID;
        }
        flags
    }

    pub fn header_len(&self) -> usize {
        if self.teid.is_some() {
            HEADER_LEN
        } else {
            HEADER_LEN_NO_TEID
        }
    }

    /// Parse header from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN_NO_TEID {
            return Err(GtpError::TooShort {
                needed: HEADER_LEN_NO_TEID,
                available: data.len(),
            });
        }

        let flags = data[0];
        let version = flags >> 5;
        let piggybacked = flags & FLAG_PIGGYBACKED != 0;
        let has_teid = flags & FLAG_TEID != 0;
        let message_type = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]);

        let header_len = if has_teid {
            HEADER_LEN
        } else {
            HEADER_LEN_NO_TEID
        };
        if data.len() < header_len {
            return Err(GtpError::TooShort {
                needed: header_len,
                available: data.len(),
            });
        }
        if (length as usize) < header_len - MANDATORY_PREFIX_LEN {
            return Err(GtpError::InvalidMessage(format!(
                "length {length} shorter than header"
            )));
        }

        let (teid, seq_offset) = if has_teid {
            (
                Some(u32::from_be_bytes([data[4], data[5], data[6], data[7]])),
                8,
            )
        } else {
            (None, 4)
        };
        let sequence = u32::from_be_bytes([
            0,
            data[seq_offset],
            data[seq_offset + 1],
            data[seq_offset + 2],
        ]);

        Ok(Self {
            version,
            piggybacked,
            message_type,
            length,
            teid,
            sequence,
        })
    }

    /// Encode header into a buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags());
        buf.put_u8(self.message_type);
        buf.put_u16(self.length);
        if let Some(teid) = self.teid {
            buf.put_u32(teid);
        }
        buf.put_u32((self.sequence & MAX_SEQUENCE) << 8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse_serialize_without_teid() {
        let data = vec![
            0x40, 0x01, 0x00, 0x04, // v2, Echo Request, length 4
            0x00, 0x00, 0x01, 0x00, // sequence 1, spare
        ];

        let header = Header::parse(&data).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.message_type, 1);
        assert_eq!(header.teid, None);
        assert_eq!(header.sequence, 1);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn test_header_parse_serialize_with_teid() {
        let data = vec![
            0x48, 0x20, 0x00, 0x08, // v2 + T, Create Session Request, length 8
            0x12, 0x34, 0x56, 0x78, // TEID
            0xAB, 0xCD, 0xEF, 0x00, // sequence
        ];

        let header = Header::parse(&data).unwrap();
        assert_eq!(header.teid, Some(0x12345678));
        assert_eq!(header.sequence, 0xABCDEF);
        assert_eq!(header.header_len(), HEADER_LEN);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn test_new_sets_minimal_length() {
        assert_eq!(Header::new(1, None, 5).length, 4);
        assert_eq!(Header::new(32, Some(0), 5).length, 8);
        assert_eq!(Header::new(32, Some(0), 0x1FF_FFFF).sequence, MAX_SEQUENCE);
    }

    #[test]
    fn test_teid_flag_needs_twelve_bytes() {
        let data = vec![0x48, 0x20, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(
            Header::parse(&data),
            Err(GtpError::TooShort { needed: 12, .. })
        ));
    }

    #[test]
    fn test_version_is_not_validated() {
        let data = vec![0x28, 0x20, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 1, 0];
        let header = Header::parse(&data).unwrap();
        assert_eq!(header.version, 1);
    }
}

//! Typed constructors and accessors for the IEs the engine interprets.
//!
//! Everything else travels as an opaque [`Ie`] and is never inspected.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use gtpv2_dict::IeType;
use serde::{Deserialize, Serialize};

use crate::error::{GtpError, Result};
use crate::ie::Ie;

/// PDN types carried in PAA and PDN Type IEs
pub const PDN_TYPE_IPV4: u8 = 1;
pub const PDN_TYPE_IPV6: u8 = 2;
pub const PDN_TYPE_IPV4V6: u8 = 3;

/// RAT types
pub const RAT_TYPE_UTRAN: u8 = 1;
pub const RAT_TYPE_GERAN: u8 = 2;
pub const RAT_TYPE_EUTRAN: u8 = 6;

/// Bearer level QoS (TS 29.274 Section 8.15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BearerQos {
    /// Pre-emption capability: when false the bearer may pre-empt others
    pub pci: bool,
    pub priority_level: u8,
    /// Pre-emption vulnerability: when false the bearer may be pre-empted
    pub pvi: bool,
    pub qci: u8,
    /// Bit rates in kbps, 40 bits on the wire
    pub mbr_uplink: u64,
    pub mbr_downlink: u64,
    pub gbr_uplink: u64,
    pub gbr_downlink: u64,
}

const BEARER_QOS_LEN: usize = 22;

/// Fully qualified TEID (TS 29.274 Section 8.22)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FTeid {
    pub interface_type: u8,
    pub teid: u32,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl FTeid {
    /// Preferred address of the tunnel endpoint
    pub fn ip(&self) -> Option<IpAddr> {
        self.ipv4
            .map(IpAddr::V4)
            .or_else(|| self.ipv6.map(IpAddr::V6))
    }
}

fn invalid(ie_type: u8, reason: impl Into<String>) -> GtpError {
    GtpError::InvalidValue {
        ie_type,
        reason: reason.into(),
    }
}

/// Pack a digit string into TBCD, low nibble first, 0xF filler for odd lengths
fn encode_tbcd(ie_type: u8, digits: &str) -> Result<BytesMut> {
    let nibbles = digits
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| invalid(ie_type, format!("non-digit {c:?} in {digits:?}")))
        })
        .collect::<Result<Vec<u8>>>()?;

    let mut buf = BytesMut::with_capacity(nibbles.len().div_ceil(2));
    for pair in nibbles.chunks(2) {
        let low = pair[0];
        let high = pair.get(1).copied().unwrap_or(0x0F);
        buf.put_u8((high << 4) | low);
    }
    Ok(buf)
}

fn decode_tbcd(ie_type: u8, data: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(data.len() * 2);
    for (i, byte) in data.iter().enumerate() {
        for nibble in [byte & 0x0F, byte >> 4] {
            match nibble {
                0..=9 => out.push((b'0' + nibble) as char),
                0x0F if i == data.len() - 1 => {}
                _ => return Err(invalid(ie_type, format!("bad TBCD nibble {nibble:#x}"))),
            }
        }
    }
    Ok(out)
}

fn put_u40(buf: &mut BytesMut, value: u64) {
    buf.put_slice(&value.to_be_bytes()[3..8]);
}

fn get_u40(data: &[u8]) -> u64 {
    data.iter().take(5).fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

impl Ie {
    // ========================================
    // Constructors
    // ========================================

    pub fn imsi(imsi: &str) -> Result<Self> {
        let ie_type = IeType::Imsi as u8;
        Ok(Self::new(ie_type, 0, encode_tbcd(ie_type, imsi)?))
    }

    pub fn msisdn(msisdn: &str) -> Result<Self> {
        let ie_type = IeType::Msisdn as u8;
        Ok(Self::new(ie_type, 0, encode_tbcd(ie_type, msisdn)?))
    }

    pub fn mei(mei: &str) -> Result<Self> {
        let ie_type = IeType::Mei as u8;
        Ok(Self::new(ie_type, 0, encode_tbcd(ie_type, mei)?))
    }

    /// Cause with all flags clear
    pub fn cause(value: u8) -> Self {
        Self::new(IeType::Cause as u8, 0, vec![value, 0])
    }

    pub fn recovery(restart_counter: u8) -> Self {
        Self::new(IeType::Recovery as u8, 0, vec![restart_counter])
    }

    pub fn ebi(ebi: u8) -> Self {
        Self::new(IeType::Ebi as u8, 0, vec![ebi & 0x0F])
    }

    pub fn charging_id(id: u32) -> Self {
        Self::new(IeType::ChargingId as u8, 0, id.to_be_bytes().to_vec())
    }

    pub fn rat_type(rat: u8) -> Self {
        Self::new(IeType::RatType as u8, 0, vec![rat])
    }

    pub fn selection_mode(mode: u8) -> Self {
        Self::new(IeType::SelectionMode as u8, 0, vec![mode & 0x03])
    }

    pub fn pdn_type(pdn_type: u8) -> Self {
        Self::new(IeType::PdnType as u8, 0, vec![pdn_type & 0x07])
    }

    pub fn indication(flags: &[u8]) -> Self {
        Self::new(IeType::Indication as u8, 0, flags.to_vec())
    }

    /// APN in DNS label format
    pub fn apn(apn: &str) -> Self {
        let mut buf = BytesMut::with_capacity(apn.len() + 1);
        for label in apn.split('.').filter(|l| !l.is_empty()) {
            buf.put_u8(label.len() as u8);
            buf.put_slice(label.as_bytes());
        }
        Self::new(IeType::Apn as u8, 0, buf)
    }

    pub fn ambr(uplink_kbps: u32, downlink_kbps: u32) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32(uplink_kbps);
        buf.put_u32(downlink_kbps);
        Self::new(IeType::Ambr as u8, 0, buf)
    }

    pub fn bearer_qos(qos: &BearerQos) -> Self {
        let mut buf = BytesMut::with_capacity(BEARER_QOS_LEN);
        let mut arp = (qos.priority_level & 0x0F) << 2;
        if qos.pci {
            arp |= 0x40;
        }
        if qos.pvi {
            arp |= 0x01;
        }
        buf.put_u8(arp);
        buf.put_u8(qos.qci);
        put_u40(&mut buf, qos.mbr_uplink);
        put_u40(&mut buf, qos.mbr_downlink);
        put_u40(&mut buf, qos.gbr_uplink);
        put_u40(&mut buf, qos.gbr_downlink);
        Self::new(IeType::BearerQos as u8, 0, buf)
    }

    pub fn fteid(
        interface_type: u8,
        teid: u32,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Self {
        let mut buf = BytesMut::with_capacity(25);
        let mut flags = interface_type & 0x3F;
        if ipv4.is_some() {
            flags |= 0x80;
        }
        if ipv6.is_some() {
            flags |= 0x40;
        }
        buf.put_u8(flags);
        buf.put_u32(teid);
        if let Some(v4) = ipv4 {
            buf.put_slice(&v4.octets());
        }
        if let Some(v6) = ipv6 {
            buf.put_slice(&v6.octets());
        }
        Self::new(IeType::FTeid as u8, 0, buf)
    }

    /// PDN address allocation for a single address
    pub fn paa(addr: IpAddr) -> Self {
        let mut buf = BytesMut::with_capacity(18);
        match addr {
            IpAddr::V4(v4) => {
                buf.put_u8(PDN_TYPE_IPV4);
                buf.put_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                buf.put_u8(PDN_TYPE_IPV6);
                buf.put_u8(64);
                buf.put_slice(&v6.octets());
            }
        }
        Self::new(IeType::Paa as u8, 0, buf)
    }

    /// Serving network PLMN; `mnc` may be two or three digits
    pub fn serving_network(mcc: &str, mnc: &str) -> Result<Self> {
        let ie_type = IeType::ServingNetwork as u8;
        let digit = |c: char| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| invalid(ie_type, format!("non-digit {c:?} in PLMN")))
        };
        let mcc = mcc.chars().map(&digit).collect::<Result<Vec<u8>>>()?;
        let mnc = mnc.chars().map(&digit).collect::<Result<Vec<u8>>>()?;
        if mcc.len() != 3 || !(2..=3).contains(&mnc.len()) {
            return Err(invalid(ie_type, "MCC must be 3 digits, MNC 2 or 3"));
        }
        let mnc3 = mnc.get(2).copied().unwrap_or(0x0F);
        let payload = vec![
            (mcc[1] << 4) | mcc[0],
            (mnc3 << 4) | mcc[2],
            (mnc[1] << 4) | mnc[0],
        ];
        Ok(Self::new(ie_type, 0, payload))
    }

    /// Bearer Context with instance 0; use [`Ie::with_instance`] for others
    pub fn bearer_context(children: Vec<Ie>) -> Self {
        Self::grouped(IeType::BearerContext as u8, 0, children)
    }

    // ========================================
    // Accessors
    // ========================================

    fn expect_ie_type(&self, want: IeType) -> Result<()> {
        if self.ie_type == want as u8 {
            Ok(())
        } else {
            Err(invalid(
                self.ie_type,
                format!("expected {} (type {})", want.name(), want as u8),
            ))
        }
    }

    fn expect_len(&self, min: usize) -> Result<()> {
        if self.len() >= min {
            Ok(())
        } else {
            Err(invalid(
                self.ie_type,
                format!("payload is {} bytes, need {min}", self.len()),
            ))
        }
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.expect_len(1)?;
        Ok(self.payload()[0])
    }

    pub fn as_u32(&self) -> Result<u32> {
        self.expect_len(4)?;
        let p = self.payload();
        Ok(u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
    }

    /// Digits of an IMSI, MSISDN or MEI
    pub fn as_digits(&self) -> Result<String> {
        match IeType::from_u8(self.ie_type) {
            Some(IeType::Imsi | IeType::Msisdn | IeType::Mei) => {
                decode_tbcd(self.ie_type, self.payload())
            }
            _ => Err(invalid(self.ie_type, "not a TBCD digit IE")),
        }
    }

    pub fn as_cause(&self) -> Result<u8> {
        self.expect_ie_type(IeType::Cause)?;
        self.as_u8()
    }

    pub fn as_recovery(&self) -> Result<u8> {
        self.expect_ie_type(IeType::Recovery)?;
        self.as_u8()
    }

    pub fn as_ebi(&self) -> Result<u8> {
        self.expect_ie_type(IeType::Ebi)?;
        Ok(self.as_u8()? & 0x0F)
    }

    pub fn as_charging_id(&self) -> Result<u32> {
        self.expect_ie_type(IeType::ChargingId)?;
        self.as_u32()
    }

    pub fn as_apn(&self) -> Result<String> {
        self.expect_ie_type(IeType::Apn)?;
        let data = self.payload();
        let mut labels = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let len = data[offset] as usize;
            let end = offset + 1 + len;
            if end > data.len() {
                return Err(invalid(self.ie_type, "APN label overruns payload"));
            }
            labels.push(String::from_utf8_lossy(&data[offset + 1..end]).into_owned());
            offset = end;
        }
        Ok(labels.join("."))
    }

    /// (uplink, downlink) in kbps
    pub fn as_ambr(&self) -> Result<(u32, u32)> {
        self.expect_ie_type(IeType::Ambr)?;
        self.expect_len(8)?;
        let p = self.payload();
        Ok((
            u32::from_be_bytes([p[0], p[1], p[2], p[3]]),
            u32::from_be_bytes([p[4], p[5], p[6], p[7]]),
        ))
    }

    pub fn as_bearer_qos(&self) -> Result<BearerQos> {
        self.expect_ie_type(IeType::BearerQos)?;
        self.expect_len(BEARER_QOS_LEN)?;
        let p = self.payload();
        Ok(BearerQos {
            pci: p[0] & 0x40 != 0,
            priority_level: (p[0] >> 2) & 0x0F,
            pvi: p[0] & 0x01 != 0,
            qci: p[1],
            mbr_uplink: get_u40(&p[2..7]),
            mbr_downlink: get_u40(&p[7..12]),
            gbr_uplink: get_u40(&p[12..17]),
            gbr_downlink: get_u40(&p[17..22]),
        })
    }

    pub fn as_fteid(&self) -> Result<FTeid> {
        self.expect_ie_type(IeType::FTeid)?;
        self.expect_len(5)?;
        let p = self.payload();
        let flags = p[0];
        let teid = u32::from_be_bytes([p[1], p[2], p[3], p[4]]);

        let mut offset = 5;
        let ipv4 = if flags & 0x80 != 0 {
            self.expect_len(offset + 4)?;
            let a = Ipv4Addr::new(p[offset], p[offset + 1], p[offset + 2], p[offset + 3]);
            offset += 4;
            Some(a)
        } else {
            None
        };
        let ipv6 = if flags & 0x40 != 0 {
            self.expect_len(offset + 16)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&p[offset..offset + 16]);
            Some(Ipv6Addr::from(octets))
        } else {
            None
        };

        Ok(FTeid {
            interface_type: flags & 0x3F,
            teid,
            ipv4,
            ipv6,
        })
    }

    /// Allocated address; the IPv4 half wins for IPv4v6
    pub fn as_paa(&self) -> Result<IpAddr> {
        self.expect_ie_type(IeType::Paa)?;
        self.expect_len(1)?;
        let p = self.payload();
        match p[0] & 0x07 {
            PDN_TYPE_IPV4 => {
                self.expect_len(5)?;
                Ok(IpAddr::V4(Ipv4Addr::new(p[1], p[2], p[3], p[4])))
            }
            PDN_TYPE_IPV6 => {
                self.expect_len(18)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&p[2..18]);
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            PDN_TYPE_IPV4V6 => {
                self.expect_len(22)?;
                Ok(IpAddr::V4(Ipv4Addr::new(p[18], p[19], p[20], p[21])))
            }
            other => Err(invalid(self.ie_type, format!("unknown PDN type {other}"))),
        }
    }

    /// (MCC, MNC) of a Serving Network IE
    pub fn as_plmn(&self) -> Result<(String, String)> {
        self.expect_ie_type(IeType::ServingNetwork)?;
        self.expect_len(3)?;
        let p = self.payload();
        let d = |n: u8| (b'0' + n) as char;
        let mcc: String = [d(p[0] & 0x0F), d(p[0] >> 4), d(p[1] & 0x0F)]
            .iter()
            .collect();
        let mut mnc: String = [d(p[2] & 0x0F), d(p[2] >> 4)].iter().collect();
        if p[1] >> 4 != 0x0F {
            mnc.push(d(p[1] >> 4));
        }
        Ok((mcc, mnc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imsi_tbcd() {
        let ie = Ie::imsi("123451234567890").unwrap();
        assert_eq!(ie.len(), 8);
        assert_eq!(ie.payload()[0], 0x21);
        assert_eq!(ie.payload()[7], 0xF0);
        assert_eq!(ie.as_digits().unwrap(), "123451234567890");
    }

    #[test]
    fn test_even_length_digits() {
        let ie = Ie::msisdn("8130").unwrap();
        assert_eq!(ie.payload().as_ref(), &[0x18, 0x03]);
        assert_eq!(ie.as_digits().unwrap(), "8130");
    }

    #[test]
    fn test_imsi_rejects_non_digits() {
        assert!(Ie::imsi("12345abc").is_err());
    }

    #[test]
    fn test_fteid_v4() {
        let ie = Ie::fteid(10, 0xdeadbeef, Some(Ipv4Addr::new(127, 0, 0, 1)), None);
        assert_eq!(ie.len(), 9);
        assert_eq!(ie.payload()[0], 0x8A);
        let f = ie.as_fteid().unwrap();
        assert_eq!(f.interface_type, 10);
        assert_eq!(f.teid, 0xdeadbeef);
        assert_eq!(f.ip(), Some(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
    }

    #[test]
    fn test_fteid_dual_stack() {
        let ie = Ie::fteid(7, 1, Some(Ipv4Addr::new(10, 0, 0, 1)), Some(Ipv6Addr::LOCALHOST));
        assert_eq!(ie.len(), 25);
        let f = ie.as_fteid().unwrap();
        assert_eq!(f.ipv6, Some(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_fteid_truncated_address() {
        let ie = Ie::new(IeType::FTeid as u8, 0, vec![0x80, 0, 0, 0, 1, 10, 0]);
        assert!(ie.as_fteid().is_err());
    }

    #[test]
    fn test_bearer_qos_layout() {
        let qos = BearerQos {
            pci: true,
            priority_level: 2,
            pvi: true,
            qci: 9,
            mbr_uplink: 0x01_0203_0405,
            mbr_downlink: 50_000,
            gbr_uplink: 0,
            gbr_downlink: 0,
        };
        let ie = Ie::bearer_qos(&qos);
        assert_eq!(ie.len(), 22);
        assert_eq!(ie.payload()[0], 0x49);
        assert_eq!(&ie.payload()[2..7], &[1, 2, 3, 4, 5]);
        assert_eq!(ie.as_bearer_qos().unwrap(), qos);
    }

    #[test]
    fn test_apn_labels() {
        let ie = Ie::apn("some.apn.example");
        assert_eq!(ie.payload()[0], 4);
        assert_eq!(ie.as_apn().unwrap(), "some.apn.example");
    }

    #[test]
    fn test_plmn() {
        let ie = Ie::serving_network("123", "45").unwrap();
        assert_eq!(ie.payload().as_ref(), &[0x21, 0xF3, 0x54]);
        assert_eq!(ie.as_plmn().unwrap(), ("123".to_string(), "45".to_string()));

        let ie = Ie::serving_network("310", "260").unwrap();
        assert_eq!(ie.as_plmn().unwrap(), ("310".to_string(), "260".to_string()));
        assert!(Ie::serving_network("31", "26").is_err());
    }

    #[test]
    fn test_paa() {
        let ie = Ie::paa(IpAddr::V4(Ipv4Addr::new(10, 10, 0, 2)));
        assert_eq!(ie.as_paa().unwrap(), IpAddr::V4(Ipv4Addr::new(10, 10, 0, 2)));
        let ie = Ie::paa(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(ie.len(), 18);
        assert_eq!(ie.as_paa().unwrap(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_accessor_checks_type() {
        let ie = Ie::recovery(3);
        assert_eq!(ie.as_recovery().unwrap(), 3);
        assert!(ie.as_cause().is_err());
        assert!(ie.as_digits().is_err());
    }

    #[test]
    fn test_small_values() {
        assert_eq!(Ie::cause(16).as_cause().unwrap(), 16);
        assert_eq!(Ie::ebi(0x15).as_ebi().unwrap(), 5);
        assert_eq!(Ie::charging_id(77).as_charging_id().unwrap(), 77);
        assert_eq!(Ie::ambr(100, 200).as_ambr().unwrap(), (100, 200));
    }
}

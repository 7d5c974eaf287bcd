use bytes::{Bytes, BytesMut};
use gtpv2_dict::{field_table, is_accepted, slot_of, FieldSpec, IeType, MessageType, Presence};

use crate::error::{GtpError, Result};
use crate::header::{Header, GTP_VERSION_2, MANDATORY_PREFIX_LEN, MAX_SEQUENCE};
use crate::ie::Ie;

/// Largest value of the header length field
pub const MAX_MESSAGE_LENGTH: usize = u16::MAX as usize;

/// What a decoded type byte resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Known(MessageType),
    /// A type code with no field table; its IEs are all kept in the overflow list
    Unrecognized(u8),
}

impl MessageKind {
    pub fn from_code(code: u8) -> Self {
        match MessageType::from_u8(code) {
            Some(mt) => Self::Known(mt),
            None => Self::Unrecognized(code),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Known(mt) => *mt as u8,
            Self::Unrecognized(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Known(mt) => mt.name(),
            Self::Unrecognized(_) => "Unrecognized",
        }
    }
}

/// GTPv2-C message.
///
/// IEs are held in the named slots of the message type's field table; an IE
/// with no slot, or a repeat of one already filled, goes to the overflow
/// list in arrival order. The header length is kept in step with every
/// mutation, so a decoded message compares equal to the one that was encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    kind: MessageKind,
    table: &'static [FieldSpec],
    fields: Vec<Option<Ie>>,
    additional_ies: Vec<Ie>,
    /// Body of a message whose version we do not decode
    undecoded: Bytes,
}

impl Message {
    /// Build a message of a known type.
    ///
    /// `teid` is dropped for path management messages, which carry none.
    pub fn new(message_type: MessageType, teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        let teid = message_type.has_teid().then_some(teid);
        let header = Header::new(message_type as u8, teid, sequence);
        let mut msg = Self::empty(header);
        for ie in ies {
            msg.add(ie);
        }
        msg
    }

    /// Build a message for a type code with no field table
    pub fn unrecognized(code: u8, teid: Option<u32>, sequence: u32, ies: Vec<Ie>) -> Self {
        let mut msg = Self::empty(Header::new(code, teid, sequence));
        for ie in ies {
            msg.add(ie);
        }
        msg
    }

    fn empty(header: Header) -> Self {
        let kind = MessageKind::from_code(header.message_type);
        let table = match kind {
            MessageKind::Known(mt) => field_table(mt),
            MessageKind::Unrecognized(_) => &[],
        };
        let mut msg = Self {
            header,
            kind,
            table,
            fields: vec![None; table.len()],
            additional_ies: Vec::new(),
            undecoded: Bytes::new(),
        };
        msg.refresh_length();
        msg
    }

    /// Parse a message from bytes.
    ///
    /// Trailing bytes past the declared length (a piggybacked message) are
    /// left alone. A version other than 2 is not an error here: the header is
    /// decoded and the body kept raw so the caller can answer with Version
    /// Not Supported.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let total = MANDATORY_PREFIX_LEN + header.length as usize;
        if total > data.len() {
            return Err(GtpError::InvalidLength {
                declared: total,
                available: data.len(),
            });
        }
        let body = &data[header.header_len()..total];

        let mut msg = Self::empty(header);
        if msg.header.version != GTP_VERSION_2 {
            msg.undecoded = Bytes::copy_from_slice(body);
        } else {
            for ie in Ie::parse_all(body)? {
                msg.add(ie);
            }
        }
        msg.refresh_length();
        Ok(msg)
    }

    /// Encode into an existing buffer: header, named fields in table order, overflow.
    ///
    /// Fails with [`GtpError::Oversized`] when an IE or the whole message
    /// does not fit its 16-bit length field; nothing is written then.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let length = self.length_after_prefix();
        if length > MAX_MESSAGE_LENGTH {
            return Err(GtpError::Oversized {
                length,
                max: MAX_MESSAGE_LENGTH,
            });
        }
        for ie in self.ies() {
            ie.check_length()?;
        }

        self.header.encode(buf);
        for ie in self.ies() {
            ie.encode_unchecked(buf);
        }
        buf.extend_from_slice(&self.undecoded);
        Ok(())
    }

    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    pub fn encoded_len(&self) -> usize {
        MANDATORY_PREFIX_LEN + self.length_after_prefix()
    }

    fn length_after_prefix(&self) -> usize {
        let body: usize = self.ies().map(Ie::encoded_len).sum::<usize>() + self.undecoded.len();
        self.header.header_len() - MANDATORY_PREFIX_LEN + body
    }

    /// Saturates for oversized messages, which [`Message::encode`] refuses
    fn refresh_length(&mut self) {
        self.header.length = u16::try_from(self.length_after_prefix()).unwrap_or(u16::MAX);
    }

    // ========================================
    // Header access
    // ========================================

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn known_type(&self) -> Option<MessageType> {
        match self.kind {
            MessageKind::Known(mt) => Some(mt),
            MessageKind::Unrecognized(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// TEID from the header, `None` when the T flag is clear
    pub fn teid(&self) -> Option<u32> {
        self.header.teid
    }

    pub fn set_teid(&mut self, teid: u32) {
        self.header.teid = Some(teid);
        self.refresh_length();
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    pub fn set_sequence(&mut self, sequence: u32) {
        self.header.sequence = sequence & MAX_SEQUENCE;
    }

    pub fn is_piggybacked(&self) -> bool {
        self.header.piggybacked
    }

    // ========================================
    // IE access
    // ========================================

    /// Insert an IE the way decoding does: into its slot if that slot is free,
    /// otherwise at the end of the overflow list
    pub fn add(&mut self, ie: Ie) {
        match slot_of(self.table, ie.ie_type, ie.instance()) {
            Some(i) if self.fields[i].is_none() => self.fields[i] = Some(ie),
            _ => self.additional_ies.push(ie),
        }
        self.refresh_length();
    }

    /// Insert an IE replacing whatever occupies its slot.
    ///
    /// IEs without a slot replace the first overflow entry of the same type
    /// and instance, or are appended.
    pub fn set(&mut self, ie: Ie) {
        match slot_of(self.table, ie.ie_type, ie.instance()) {
            Some(i) => self.fields[i] = Some(ie),
            None => {
                let existing = self
                    .additional_ies
                    .iter_mut()
                    .find(|o| o.ie_type == ie.ie_type && o.instance() == ie.instance());
                match existing {
                    Some(slot) => *slot = ie,
                    None => self.additional_ies.push(ie),
                }
            }
        }
        self.refresh_length();
    }

    /// Remove the first IE matching `(ie_type, instance)`, named slot first
    pub fn remove(&mut self, ie_type: u8, instance: u8) -> Option<Ie> {
        let removed = match slot_of(self.table, ie_type, instance) {
            Some(i) if self.fields[i].is_some() => self.fields[i].take(),
            _ => self
                .additional_ies
                .iter()
                .position(|o| o.ie_type == ie_type && o.instance() == instance)
                .map(|pos| self.additional_ies.remove(pos)),
        };
        if removed.is_some() {
            self.refresh_length();
        }
        removed
    }

    /// First IE matching `(ie_type, instance)`
    pub fn get(&self, ie_type: u8, instance: u8) -> Option<&Ie> {
        self.find_all(ie_type, instance).next()
    }

    /// Every IE matching `(ie_type, instance)`: the named slot, then repeats
    /// from the overflow list in arrival order
    pub fn find_all(&self, ie_type: u8, instance: u8) -> impl Iterator<Item = &Ie> {
        self.ies()
            .filter(move |ie| ie.ie_type == ie_type && ie.instance() == instance)
    }

    /// IE held in the named field
    pub fn field(&self, name: &str) -> Option<&Ie> {
        self.table
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| self.fields[i].as_ref())
    }

    /// Like [`Message::field`], but a missing IE is an error
    pub fn require(&self, name: &str) -> Result<&Ie> {
        let spec = self
            .table
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                GtpError::InvalidMessage(format!("{} has no field {name}", self.name()))
            })?;
        self.field(name).ok_or(GtpError::RequiredIeMissing {
            name: spec.name,
            ie_type: spec.ie_type,
            instance: spec.instance,
        })
    }

    /// All IEs in encoding order
    pub fn ies(&self) -> impl Iterator<Item = &Ie> {
        self.fields.iter().flatten().chain(self.additional_ies.iter())
    }

    /// IEs that matched no named field, or repeated one
    pub fn additional_ies(&self) -> &[Ie] {
        &self.additional_ies
    }

    /// Fail on the first mandatory field that is absent
    pub fn check_mandatory(&self) -> Result<()> {
        for (spec, slot) in self.table.iter().zip(&self.fields) {
            if spec.presence == Presence::Mandatory && slot.is_none() {
                return Err(GtpError::RequiredIeMissing {
                    name: spec.name,
                    ie_type: spec.ie_type,
                    instance: spec.instance,
                });
            }
        }
        Ok(())
    }

    // ========================================
    // Semantic helpers
    // ========================================

    /// Cause value, if the message carries a well-formed Cause IE
    pub fn cause(&self) -> Option<u8> {
        self.get(IeType::Cause as u8, 0)
            .and_then(|ie| ie.as_cause().ok())
    }

    /// Succeed only when the Cause IE is present and in the acceptance range
    pub fn require_accepted(&self) -> Result<()> {
        let cause = self
            .get(IeType::Cause as u8, 0)
            .ok_or(GtpError::RequiredIeMissing {
                name: "cause",
                ie_type: IeType::Cause as u8,
                instance: 0,
            })?
            .as_cause()?;
        if is_accepted(cause) {
            Ok(())
        } else {
            Err(GtpError::CauseNotAccepted(cause))
        }
    }

    pub fn expect_type(&self, want: MessageType) -> Result<()> {
        if self.message_type() == want as u8 {
            Ok(())
        } else {
            Err(GtpError::UnexpectedType {
                got: self.message_type(),
                want: want as u8,
            })
        }
    }

    // ========================================
    // Catalog constructors
    // ========================================

    pub fn echo_request(sequence: u32, restart_counter: u8, ies: Vec<Ie>) -> Self {
        let mut msg = Self::new(MessageType::EchoRequest, 0, sequence, ies);
        msg.set(Ie::recovery(restart_counter));
        msg
    }

    pub fn echo_response(sequence: u32, restart_counter: u8, ies: Vec<Ie>) -> Self {
        let mut msg = Self::new(MessageType::EchoResponse, 0, sequence, ies);
        msg.set(Ie::recovery(restart_counter));
        msg
    }

    pub fn version_not_supported(teid: Option<u32>, sequence: u32) -> Self {
        Self::empty(Header::new(
            MessageType::VersionNotSupportedIndication as u8,
            teid,
            sequence,
        ))
    }

    pub fn create_session_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::CreateSessionRequest, teid, sequence, ies)
    }

    pub fn create_session_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::CreateSessionResponse, teid, sequence, ies)
    }

    pub fn modify_bearer_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::ModifyBearerRequest, teid, sequence, ies)
    }

    pub fn modify_bearer_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::ModifyBearerResponse, teid, sequence, ies)
    }

    pub fn delete_session_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::DeleteSessionRequest, teid, sequence, ies)
    }

    pub fn delete_session_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::DeleteSessionResponse, teid, sequence, ies)
    }

    pub fn create_bearer_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::CreateBearerRequest, teid, sequence, ies)
    }

    pub fn create_bearer_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::CreateBearerResponse, teid, sequence, ies)
    }

    pub fn delete_bearer_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::DeleteBearerRequest, teid, sequence, ies)
    }

    pub fn delete_bearer_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::DeleteBearerResponse, teid, sequence, ies)
    }

    pub fn release_access_bearers_request(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::ReleaseAccessBearersRequest, teid, sequence, ies)
    }

    pub fn release_access_bearers_response(teid: u32, sequence: u32, ies: Vec<Ie>) -> Self {
        Self::new(MessageType::ReleaseAccessBearersResponse, teid, sequence, ies)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::values::RAT_TYPE_EUTRAN;
    use gtpv2_dict::{is_grouped, Cause, InterfaceType};

    fn create_session_request() -> Message {
        Message::create_session_request(
            0,
            0x1234,
            vec![
                Ie::imsi("123451234567890").unwrap(),
                Ie::rat_type(RAT_TYPE_EUTRAN),
                Ie::fteid(
                    InterfaceType::S11MmeGtpC as u8,
                    0x1111,
                    Some(Ipv4Addr::new(10, 0, 0, 1)),
                    None,
                ),
                Ie::fteid(
                    InterfaceType::S5S8PgwGtpC as u8,
                    0,
                    Some(Ipv4Addr::new(10, 0, 0, 2)),
                    None,
                )
                .with_instance(1),
                Ie::apn("internet"),
                Ie::bearer_context(vec![Ie::ebi(5)]),
            ],
        )
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = create_session_request();
        let wire = msg.serialize().unwrap();
        assert_eq!(wire.len(), msg.encoded_len());
        assert_eq!(
            u16::from_be_bytes([wire[2], wire[3]]) as usize,
            wire.len() - MANDATORY_PREFIX_LEN
        );

        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.kind(), MessageKind::Known(MessageType::CreateSessionRequest));
        assert_eq!(parsed.teid(), Some(0));
        assert_eq!(parsed.sequence(), 0x1234);
    }

    #[test]
    fn test_instance_disambiguation() {
        let parsed = Message::parse(&create_session_request().serialize().unwrap()).unwrap();

        let sender = parsed.field("sender_fteid").unwrap().as_fteid().unwrap();
        let pgw = parsed.field("pgw_s5s8_fteid").unwrap().as_fteid().unwrap();
        assert_eq!(sender.teid, 0x1111);
        assert_eq!(sender.interface_type, InterfaceType::S11MmeGtpC as u8);
        assert_eq!(pgw.interface_type, InterfaceType::S5S8PgwGtpC as u8);
        assert!(parsed.additional_ies().is_empty());
    }

    #[test]
    fn test_repeated_ie_goes_to_overflow() {
        let mut msg = Message::create_session_response(
            0x10,
            7,
            vec![Ie::cause(Cause::RequestAccepted as u8)],
        );
        msg.add(Ie::bearer_context(vec![Ie::ebi(5)]));
        msg.add(Ie::bearer_context(vec![Ie::ebi(6)]));

        let parsed = Message::parse(&msg.serialize().unwrap()).unwrap();
        let ebis: Vec<u8> = parsed
            .find_all(IeType::BearerContext as u8, 0)
            .map(|bc| bc.find(IeType::Ebi as u8, 0).unwrap().as_ebi().unwrap())
            .collect();
        assert_eq!(ebis, vec![5, 6]);
        assert_eq!(parsed.additional_ies().len(), 1);
    }

    #[test]
    fn test_unmapped_ie_preserved_in_order() {
        let mut msg = Message::echo_request(1, 3, vec![]);
        msg.add(Ie::new(200, 0, vec![1u8, 2]));
        msg.add(Ie::new(201, 2, vec![3u8]));

        let parsed = Message::parse(&msg.serialize().unwrap()).unwrap();
        let extra: Vec<(u8, u8)> = parsed
            .additional_ies()
            .iter()
            .map(|ie| (ie.ie_type, ie.instance()))
            .collect();
        assert_eq!(extra, vec![(200, 0), (201, 2)]);
        assert_eq!(parsed.field("recovery").unwrap().as_recovery().unwrap(), 3);
    }

    #[test]
    fn test_unrecognized_type() {
        let msg = Message::unrecognized(250, Some(9), 77, vec![Ie::recovery(1)]);
        let parsed = Message::parse(&msg.serialize().unwrap()).unwrap();
        assert_eq!(parsed.kind(), MessageKind::Unrecognized(250));
        assert_eq!(parsed.known_type(), None);
        assert_eq!(parsed.additional_ies().len(), 1);
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_length_exceeds_buffer() {
        let mut wire = Message::echo_request(1, 0, vec![]).serialize().unwrap().to_vec();
        wire.truncate(wire.len() - 1);
        assert!(matches!(
            Message::parse(&wire),
            Err(GtpError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_bad_ie_inside_message() {
        // Echo Request whose Recovery IE claims 4 bytes but holds 1
        let wire = vec![0x40, 0x01, 0x00, 0x09, 0, 0, 1, 0, 0x03, 0x00, 0x04, 0x00, 0x07];
        let err = Message::parse(&wire).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_other_version_body_kept_raw() {
        let wire = vec![0x28, 0x20, 0x00, 0x09, 0, 0, 0, 0, 0, 0, 1, 0, 0xFF];
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.version(), 1);
        assert_eq!(parsed.ies().count(), 0);
        assert_eq!(parsed.serialize().unwrap().as_ref(), &wire[..]);
    }

    #[test]
    fn test_piggybacked_tail_ignored() {
        let mut wire = Message::echo_response(4, 1, vec![]).serialize().unwrap().to_vec();
        let first_len = wire.len();
        wire.extend_from_slice(&Message::echo_request(5, 1, vec![]).serialize().unwrap());
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.encoded_len(), first_len);
        assert_eq!(parsed.sequence(), 4);
    }

    #[test]
    fn test_check_mandatory() {
        let mut msg = create_session_request();
        assert!(msg.check_mandatory().is_ok());

        msg.remove(IeType::Apn as u8, 0);
        match msg.check_mandatory() {
            Err(GtpError::RequiredIeMissing { name, .. }) => assert_eq!(name, "apn"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(msg.require("apn").is_err());
        assert!(msg.require("imsi").is_ok());
        assert!(matches!(
            msg.require("nonexistent"),
            Err(GtpError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_set_replaces_slot() {
        let mut msg = Message::echo_request(1, 1, vec![]);
        let before = msg.encoded_len();
        msg.set(Ie::recovery(9));
        assert_eq!(msg.encoded_len(), before);
        assert_eq!(msg.field("recovery").unwrap().as_recovery().unwrap(), 9);
        assert!(msg.additional_ies().is_empty());
    }

    #[test]
    fn test_cause_helpers() {
        let ok = Message::delete_session_response(1, 2, vec![Ie::cause(Cause::RequestAccepted as u8)]);
        assert_eq!(ok.cause(), Some(16));
        assert!(ok.require_accepted().is_ok());
        assert!(ok.expect_type(MessageType::DeleteSessionResponse).is_ok());
        assert!(matches!(
            ok.expect_type(MessageType::CreateSessionResponse),
            Err(GtpError::UnexpectedType { got: 37, want: 33 })
        ));

        let rejected = Message::delete_session_response(
            1,
            2,
            vec![Ie::cause(Cause::ContextNotFound as u8)],
        );
        assert!(matches!(
            rejected.require_accepted(),
            Err(GtpError::CauseNotAccepted(64))
        ));

        let missing = Message::delete_session_response(1, 2, vec![]);
        assert!(matches!(
            missing.require_accepted(),
            Err(GtpError::RequiredIeMissing { name: "cause", .. })
        ));
    }

    #[test]
    fn test_path_management_has_no_teid() {
        let msg = Message::echo_request(3, 0, vec![]);
        assert_eq!(msg.teid(), None);
        assert_eq!(msg.serialize().unwrap()[0], 0x40);

        let vns = Message::version_not_supported(None, 3);
        assert_eq!(vns.serialize().unwrap().len(), 8);
    }

    /// An IE for a table slot: grouped slots get two children, flat ones a
    /// payload unique to the slot
    fn sample_ie(slot: usize, spec: &FieldSpec) -> Ie {
        if is_grouped(spec.ie_type) {
            Ie::grouped(
                spec.ie_type,
                spec.instance,
                vec![Ie::ebi(5), Ie::charging_id(slot as u32)],
            )
        } else {
            Ie::new(spec.ie_type, spec.instance, vec![slot as u8, spec.instance, 0xA5])
        }
    }

    #[test]
    fn test_every_table_roundtrips_fully_populated() {
        let types: Vec<MessageType> = (0..=u8::MAX).filter_map(MessageType::from_u8).collect();
        assert!(types.len() >= 15);

        for message_type in types {
            let table = field_table(message_type);
            let ies = table
                .iter()
                .enumerate()
                .map(|(slot, spec)| sample_ie(slot, spec))
                .collect();
            let msg = Message::new(message_type, 0x0A0B_0C0D, 0x00AB_CDEF, ies);

            for spec in table {
                assert!(
                    msg.field(spec.name).is_some(),
                    "{} lost field {}",
                    message_type.name(),
                    spec.name
                );
            }
            assert!(msg.additional_ies().is_empty(), "{}", message_type.name());
            assert!(msg.check_mandatory().is_ok());

            let wire = msg.serialize().unwrap();
            assert_eq!(wire.len(), msg.encoded_len());
            let parsed = Message::parse(&wire).unwrap();
            assert_eq!(parsed, msg, "{}", message_type.name());
            assert_eq!(parsed.serialize().unwrap(), wire);
        }
    }

    #[test]
    fn test_oversized_message_rejected() {
        // Each IE fits on its own; together they overflow the header length
        let half = vec![0u8; MAX_MESSAGE_LENGTH / 2];
        let mut msg = Message::echo_request(1, 0, vec![]);
        msg.add(Ie::new(IeType::PrivateExtension as u8, 0, half.clone()));
        msg.add(Ie::new(IeType::PrivateExtension as u8, 1, half));

        let mut buf = BytesMut::new();
        assert!(matches!(
            msg.encode(&mut buf),
            Err(GtpError::Oversized { max: MAX_MESSAGE_LENGTH, .. })
        ));
        assert!(buf.is_empty());
        assert!(msg.encoded_len() > MAX_MESSAGE_LENGTH);
    }
}

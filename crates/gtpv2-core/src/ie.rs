use bytes::{BufMut, Bytes, BytesMut};
use gtpv2_dict::is_grouped;

use crate::error::{GtpError, Result};

/// Type(1) + Length(2) + Spare/Instance(1)
pub const IE_HEADER_LEN: usize = 4;

/// Largest payload the 16-bit length field can describe
pub const MAX_IE_PAYLOAD: usize = u16::MAX as usize;

/// GTPv2-C Information Element.
///
/// For types registered as grouped the payload is always the concatenated
/// encoding of `children`; every mutation goes through [`Ie::add`] or
/// [`Ie::remove`], which rebuild it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ie {
    pub ie_type: u8,
    instance: u8,
    payload: Bytes,
    children: Vec<Ie>,
}

impl Ie {
    /// Create an IE carrying an opaque payload
    pub fn new(ie_type: u8, instance: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            ie_type,
            instance: instance & 0x0F,
            payload: payload.into(),
            children: Vec::new(),
        }
    }

    /// Create a grouped IE from its children
    pub fn grouped(ie_type: u8, instance: u8, children: Vec<Ie>) -> Self {
        let mut ie = Self {
            ie_type,
            instance: instance & 0x0F,
            payload: Bytes::new(),
            children,
        };
        ie.rebuild();
        ie
    }

    /// Return the same IE with another instance number
    pub fn with_instance(mut self, instance: u8) -> Self {
        self.instance = instance & 0x0F;
        self
    }

    pub fn instance(&self) -> u8 {
        self.instance
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn children(&self) -> &[Ie] {
        &self.children
    }

    pub fn is_grouped(&self) -> bool {
        is_grouped(self.ie_type)
    }

    /// Value of the wire length field
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size of the IE on the wire, header included
    pub fn encoded_len(&self) -> usize {
        IE_HEADER_LEN + self.payload.len()
    }

    /// Parse one IE from the front of `data`, returning it with the bytes consumed
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < IE_HEADER_LEN {
            return Err(GtpError::TooShort {
                needed: IE_HEADER_LEN,
                available: data.len(),
            });
        }

        let ie_type = data[0];
        let length = u16::from_be_bytes([data[1], data[2]]) as usize;
        let instance = data[3] & 0x0F;

        let available = data.len() - IE_HEADER_LEN;
        if length > available {
            return Err(GtpError::InvalidLength {
                declared: length,
                available,
            });
        }

        let payload = Bytes::copy_from_slice(&data[IE_HEADER_LEN..IE_HEADER_LEN + length]);
        let children = if is_grouped(ie_type) {
            Self::parse_all(&payload)?
        } else {
            Vec::new()
        };

        Ok((
            Self {
                ie_type,
                instance,
                payload,
                children,
            },
            IE_HEADER_LEN + length,
        ))
    }

    /// Parse a buffer that holds nothing but consecutive IEs
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        let mut ies = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let (ie, consumed) = Self::parse(&data[offset..])?;
            ies.push(ie);
            offset += consumed;
        }

        Ok(ies)
    }

    /// Fail with [`GtpError::Oversized`] if the payload does not fit the length field.
    ///
    /// A grouped IE is at least as long as any of its children, so checking
    /// the outermost IE covers the whole tree.
    pub fn check_length(&self) -> Result<()> {
        if self.payload.len() > MAX_IE_PAYLOAD {
            return Err(GtpError::Oversized {
                length: self.payload.len(),
                max: MAX_IE_PAYLOAD,
            });
        }
        Ok(())
    }

    /// Encode into an existing buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.check_length()?;
        self.encode_unchecked(buf);
        Ok(())
    }

    /// Serialize IE to bytes
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Callers have checked the length of this IE or of an enclosing one
    pub(crate) fn encode_unchecked(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ie_type);
        buf.put_u16(self.payload.len() as u16);
        buf.put_u8(self.instance & 0x0F);
        buf.put_slice(&self.payload);
    }

    /// Append children to a grouped IE.
    ///
    /// Fails without changing the IE if the result would not fit the length field.
    pub fn add(&mut self, children: impl IntoIterator<Item = Ie>) -> Result<()> {
        self.ensure_grouped()?;
        let before = self.children.len();
        self.children.extend(children);
        let length: usize = self.children.iter().map(Ie::encoded_len).sum();
        if length > MAX_IE_PAYLOAD {
            self.children.truncate(before);
            return Err(GtpError::Oversized {
                length,
                max: MAX_IE_PAYLOAD,
            });
        }
        self.rebuild();
        Ok(())
    }

    /// Remove the first child matching `(ie_type, instance)`
    pub fn remove(&mut self, ie_type: u8, instance: u8) -> Result<Option<Ie>> {
        self.ensure_grouped()?;
        let removed = self
            .children
            .iter()
            .position(|c| c.ie_type == ie_type && c.instance == instance)
            .map(|pos| self.children.remove(pos));
        if removed.is_some() {
            self.rebuild();
        }
        Ok(removed)
    }

    /// Find a child by type and instance.
    ///
    /// Linear scan over the children; callers doing repeated lookups on the
    /// same IE should keep the result.
    pub fn find(&self, ie_type: u8, instance: u8) -> Option<&Ie> {
        self.children
            .iter()
            .find(|c| c.ie_type == ie_type && c.instance == instance)
    }

    /// All children of a type, any instance
    pub fn find_all(&self, ie_type: u8) -> impl Iterator<Item = &Ie> {
        self.children.iter().filter(move |c| c.ie_type == ie_type)
    }

    fn ensure_grouped(&self) -> Result<()> {
        if self.is_grouped() {
            Ok(())
        } else {
            Err(GtpError::InvalidValue {
                ie_type: self.ie_type,
                reason: "not a grouped IE".to_string(),
            })
        }
    }

    fn rebuild(&mut self) {
        let mut buf = BytesMut::with_capacity(self.children.iter().map(Ie::encoded_len).sum());
        for child in &self.children {
            child.encode_unchecked(&mut buf);
        }
        self.payload = buf.freeze();
    }
}

//! STUN message codec (RFC 5389)
//!
//! Binary encoding and decoding of STUN messages: a 20-byte header followed
//! by type-length-value attributes, each value zero-padded to a 4-byte
//! boundary. MESSAGE-INTEGRITY and FINGERPRINT are carried as opaque
//! attributes and not checked here.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! |                     Transaction ID (96 bits)                  |
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use crate::error::StunError;
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;

/// Fixed value in every RFC 5389 header
pub const MAGIC_COOKIE: u32 = 0x2112_A442;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 20;

/// Size of an attribute's type + length prefix
const ATTR_HEADER_SIZE: usize = 4;

pub type TransactionId = [u8; 12];

/// STUN/TURN method codes
pub mod methods {
    pub const BINDING: u16 = 0x0001;
    pub const ALLOCATE: u16 = 0x0003;
    pub const REFRESH: u16 = 0x0004;
    pub const SEND: u16 = 0x0006;
    pub const DATA: u16 = 0x0007;
    pub const CREATE_PERMISSION: u16 = 0x0008;
    pub const CHANNEL_BIND: u16 = 0x0009;
}

/// STUN/TURN attribute types
pub mod attributes {
    pub const MAPPED_ADDRESS: u16 = 0x0001;
    pub const USERNAME: u16 = 0x0006;
    pub const MESSAGE_INTEGRITY: u16 = 0x0008;
    pub const ERROR_CODE: u16 = 0x0009;
    pub const CHANNEL_NUMBER: u16 = 0x000C;
    pub const LIFETIME: u16 = 0x000D;
    pub const XOR_PEER_ADDRESS: u16 = 0x0012;
    pub const DATA: u16 = 0x0013;
    pub const REALM: u16 = 0x0014;
    pub const NONCE: u16 = 0x0015;
    pub const XOR_MAPPED_ADDRESS: u16 = 0x0020;
}

/// A single STUN attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunAttribute {
    pub attr_type: u16,
    /// Unpadded value length
    pub length: u16,
    pub value: Vec<u8>,
}

/// A decoded or to-be-encoded STUN message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunMessage {
    pub msg_type: u16,
    /// Total padded attribute bytes, as carried in the header
    pub length: u16,
    pub magic_cookie: u32,
    pub transaction_id: TransactionId,
    pub attributes: Vec<StunAttribute>,
}

/// Rounds `len` up to the next multiple of four
fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Header length field for `len` bytes of attributes
fn wire_len(len: usize) -> Result<u16, StunError> {
    u16::try_from(len).map_err(|_| StunError::MessageTooLarge { len })
}

impl StunAttribute {
    /// Creates an attribute whose length is taken from `value`
    pub fn new(attr_type: u16, value: impl Into<Vec<u8>>) -> Result<Self, StunError> {
        let value = value.into();
        let length = u16::try_from(value.len()).map_err(|_| StunError::AttributeTooLarge {
            attr_type,
            len: value.len(),
        })?;

        Ok(Self {
            attr_type,
            length,
            value,
        })
    }

    /// Bytes this attribute occupies on the wire, including padding
    pub fn encoded_len(&self) -> usize {
        ATTR_HEADER_SIZE + padded(self.value.len())
    }
}

impl StunMessage {
    /// Creates an empty message of the given type
    pub fn new(msg_type: u16, transaction_id: TransactionId) -> Self {
        Self {
            msg_type,
            length: 0,
            magic_cookie: MAGIC_COOKIE,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute and updates the header length
    ///
    /// The message is left unchanged if the value or the resulting total
    /// would overflow a 16-bit length field.
    pub fn add_attribute(
        &mut self,
        attr_type: u16,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), StunError> {
        let attr = StunAttribute::new(attr_type, value)?;
        let length = wire_len(self.attributes_len() + attr.encoded_len())?;

        self.attributes.push(attr);
        self.length = length;
        Ok(())
    }

    /// First attribute of the given type, if any
    pub fn get_attribute(&self, attr_type: u16) -> Option<&StunAttribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type)
    }

    /// Total padded size of all attributes
    pub fn attributes_len(&self) -> usize {
        self.attributes.iter().map(StunAttribute::encoded_len).sum()
    }

    /// Encodes the message
    ///
    /// The header length is recomputed from the attributes, so a stale
    /// `length` field never reaches the wire.
    pub fn serialize(&self) -> Result<Bytes, StunError> {
        let attrs_len = self.attributes_len();
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + attrs_len);

        buf.put_u16(self.msg_type);
        buf.put_u16(wire_len(attrs_len)?);
        buf.put_u32(self.magic_cookie);
        buf.put_slice(&self.transaction_id);

        for attr in &self.attributes {
            let value_len = attr.value.len();
            let length = u16::try_from(value_len).map_err(|_| StunError::AttributeTooLarge {
                attr_type: attr.attr_type,
                len: value_len,
            })?;

            buf.put_u16(attr.attr_type);
            buf.put_u16(length);
            buf.put_slice(&attr.value);
            buf.put_bytes(0, padded(value_len) - value_len);
        }

        Ok(buf.freeze())
    }

    /// Decodes a message
    ///
    /// Attributes are read up to the end of `data`. Trailing bytes too short
    /// to hold an attribute header are ignored, as is padding cut off by the
    /// end of the buffer.
    pub fn parse(data: &[u8]) -> Result<Self, StunError> {
        if data.len() < HEADER_SIZE {
            return Err(StunError::TooShort { len: data.len() });
        }

        let magic_cookie = BigEndian::read_u32(&data[4..8]);
        if magic_cookie != MAGIC_COOKIE {
            return Err(StunError::BadMagicCookie(magic_cookie));
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&data[8..HEADER_SIZE]);

        let mut msg = Self {
            msg_type: BigEndian::read_u16(&data[0..2]),
            length: BigEndian::read_u16(&data[2..4]),
            magic_cookie,
            transaction_id,
            attributes: Vec::new(),
        };

        let mut offset = HEADER_SIZE;
        while offset + ATTR_HEADER_SIZE <= data.len() {
            let attr_type = BigEndian::read_u16(&data[offset..offset + 2]);
            let length = BigEndian::read_u16(&data[offset + 2..offset + 4]);
            let start = offset + ATTR_HEADER_SIZE;
            let end = start + length as usize;

            if end > data.len() {
                return Err(StunError::AttributeOverrun {
                    attr_type,
                    offset,
                    declared: length,
                });
            }

            msg.attributes.push(StunAttribute {
                attr_type,
                length,
                value: data[start..end].to_vec(),
            });

            offset = (start + padded(length as usize)).min(data.len());
        }

        if offset != data.len() {
            log::trace!(
                "Ignoring {} trailing bytes after STUN attributes",
                data.len() - offset
            );
        }

        Ok(msg)
    }
}

/// Generates a transaction ID from the OS CSPRNG
pub fn generate_transaction_id() -> TransactionId {
    let mut id = [0u8; 12];
    OsRng.fill_bytes(&mut id);
    id
}

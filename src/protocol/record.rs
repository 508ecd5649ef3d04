//! Binary layout of one record in a vnode dump stream.
//!
//! ```text
//! +-------+-------+-------+-------+--------+-----+--------+-------+
//! | vnode | last  | clock | expt  | keylen | key | vallen | value |
//! |  u32  |  u32  |  u32  |  u32  |  u32   |     |  u32   |       |
//! +-------+-------+-------+-------+--------+-----+--------+-------+
//! ```
//!
//! All integers are big-endian. Storage emits deletion markers without the
//! `vallen` field; on the wire the field is always present and zero means no
//! value. A stream ends with [`STREAM_TERMINATOR`].

use crate::core::{LogicalClock, RecoverError, Result, VnodeId};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed record header.
pub const HEADER_LEN: usize = 20;

/// Twenty zero bytes closing a vnode stream.
pub const STREAM_TERMINATOR: [u8; HEADER_LEN] = [0; HEADER_LEN];

/// One key-value entry of a vnode dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnodeRecord {
    pub vnode: VnodeId,
    /// Last update, seconds since the epoch.
    pub last_update: u32,
    pub clock: LogicalClock,
    pub expiry: u32,
    pub key: Bytes,
    /// `None` for deleted keys.
    pub value: Option<Bytes>,
}

impl VnodeRecord {
    /// Size of this record as written by [`encode`](Self::encode).
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.key.len() + 4 + self.value.as_ref().map_or(0, Bytes::len)
    }

    /// Copy of this record marked as part of a full resync.
    pub fn with_clock_zeroed(&self) -> Self {
        Self {
            clock: 0,
            ..self.clone()
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u32(self.vnode);
        buf.put_u32(self.last_update);
        buf.put_u32(self.clock);
        buf.put_u32(self.expiry);
        buf.put_u32(self.key.len() as u32);
        buf.put_slice(&self.key);
        match &self.value {
            Some(value) => {
                buf.put_u32(value.len() as u32);
                buf.put_slice(value);
            }
            None => buf.put_u32(0),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Encodes the record the way storage dumps it: deletion markers carry no
    /// value-length field.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_dump_bytes(&self) -> Bytes {
        match &self.value {
            Some(_) => self.to_bytes(),
            None => {
                let mut buf = BytesMut::with_capacity(HEADER_LEN + self.key.len());
                buf.put_u32(self.vnode);
                buf.put_u32(self.last_update);
                buf.put_u32(self.clock);
                buf.put_u32(self.expiry);
                buf.put_u32(self.key.len() as u32);
                buf.put_slice(&self.key);
                buf.freeze()
            }
        }
    }

    /// Decodes exactly one record; trailing bytes are an error.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.remaining() < HEADER_LEN {
            return Err(RecoverError::Codec(format!(
                "record shorter than its {}-byte header ({} bytes)",
                HEADER_LEN,
                data.len()
            )));
        }
        let vnode = data.get_u32();
        let last_update = data.get_u32();
        let clock = data.get_u32();
        let expiry = data.get_u32();
        let key_len = data.get_u32() as usize;
        if data.remaining() < key_len {
            return Err(RecoverError::Codec(format!(
                "vnode {} record truncated inside key: need {} bytes, have {}",
                vnode,
                key_len,
                data.remaining()
            )));
        }
        let key = Bytes::copy_from_slice(&data[..key_len]);
        data.advance(key_len);

        let value = match data.remaining() {
            0 => None,
            n if n < 4 => {
                return Err(RecoverError::Codec(format!(
                    "vnode {} record truncated inside value length",
                    vnode
                )));
            }
            _ => {
                let value_len = data.get_u32() as usize;
                if data.remaining() != value_len {
                    return Err(RecoverError::Codec(format!(
                        "vnode {} record value length {} does not match {} remaining bytes",
                        vnode,
                        value_len,
                        data.remaining()
                    )));
                }
                (value_len > 0).then(|| Bytes::copy_from_slice(data))
            }
        };

        Ok(Self {
            vnode,
            last_update,
            clock,
            expiry,
            key,
            value,
        })
    }
}

/// Rewrites an encoded dump record with its logical clock forced to zero.
pub fn zero_clock(data: &[u8]) -> Result<Bytes> {
    Ok(VnodeRecord::decode(data)?.with_clock_zeroed().to_bytes())
}

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{CorrelationId, Error, Result};

const HEADER_LEN: usize = CorrelationId::WIRE_LEN + 4;

/// Wire unit for requests and replies.
///
/// ```text
/// [16 bytes correlation id, BE][u32 BE payload length][payload]
/// ```
///
/// The payload is an encoded frame whose expected type is implied by the
/// topic it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        // ---
        let len = u32::try_from(self.payload.len()).map_err(|_| {
            Error::MalformedEnvelope(format!("payload of {} bytes is too large", self.payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_slice(&self.correlation_id.to_bytes());
        buf.put_u32(len);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parse an envelope. The payload shares `bytes`' allocation.
    pub fn decode(mut bytes: Bytes) -> Result<Self> {
        // ---
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedEnvelope(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }

        let mut id = [0u8; CorrelationId::WIRE_LEN];
        bytes.copy_to_slice(&mut id);
        let correlation_id = CorrelationId::from_bytes(id);

        let len = bytes.get_u32() as usize;
        if bytes.len() != len {
            return Err(Error::MalformedEnvelope(format!(
                "declared payload length {len}, found {} bytes",
                bytes.len()
            )));
        }

        Ok(Self {
            correlation_id,
            payload: bytes,
        })
    }
}

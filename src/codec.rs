//! Message codec.
//!
//! Frame layout (the payload of an [`Envelope`](crate::protocol::Envelope)):
//!
//! ```text
//! [u16 BE type-name length][type-name UTF-8][JSON body]
//! ```
//!
//! The type name travels with every message, so a receiver decoding against
//! the wrong shape gets `Error::TypeMismatch` instead of a silently
//! misinterpreted body.

use bytes::{BufMut, Bytes, BytesMut};

use crate::schema::{Message, MessageShape};
use crate::{Error, Result};

const NAME_LEN_WIDTH: usize = 2;

/// Encode `message` into a self-describing frame.
pub fn encode<M: Message>(message: &M) -> Result<Bytes> {
    // ---
    let name = M::TYPE_NAME.as_bytes();
    let name_len = u16::try_from(name.len())
        .map_err(|_| Error::Schema(format!("type name '{}' is too long", M::TYPE_NAME)))?;

    let body = serde_json::to_vec(message)?;

    let mut buf = BytesMut::with_capacity(NAME_LEN_WIDTH + name.len() + body.len());
    buf.put_u16(name_len);
    buf.put_slice(name);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Decode a frame that must carry `expected`.
///
/// # Errors
///
/// `Error::TypeMismatch` when the frame is truncated, names a different
/// type, or its body is rejected by `M`'s schema. `found` describes what was
/// actually received.
pub fn decode<M: Message>(bytes: &[u8], expected: MessageShape) -> Result<M> {
    // ---
    let mismatch = |found: String| Error::TypeMismatch {
        expected: expected.type_name().to_owned(),
        found,
    };

    let found = read_type_name(bytes).map_err(mismatch)?;
    if found != expected.type_name() {
        return Err(mismatch(found.to_owned()));
    }

    let body = &bytes[NAME_LEN_WIDTH + found.len()..];
    serde_json::from_slice(body).map_err(|err| mismatch(format!("{found} with invalid body ({err})")))
}

/// Decode a frame carrying exactly `M`.
pub fn decode_message<M: Message>(bytes: &[u8]) -> Result<M> {
    decode(bytes, MessageShape::of::<M>())
}

/// Type name carried by a frame, without decoding the body.
pub fn peek_type_name(bytes: &[u8]) -> Option<&str> {
    read_type_name(bytes).ok()
}

fn read_type_name(bytes: &[u8]) -> std::result::Result<&str, String> {
    // ---
    let Some(len_bytes) = bytes.get(..NAME_LEN_WIDTH) else {
        return Err(format!("truncated frame of {} bytes", bytes.len()));
    };
    let name_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;

    let Some(name) = bytes.get(NAME_LEN_WIDTH..NAME_LEN_WIDTH + name_len) else {
        return Err(format!(
            "frame declares a {name_len}-byte type name but holds {} bytes",
            bytes.len() - NAME_LEN_WIDTH
        ));
    };

    std::str::from_utf8(name).map_err(|_| "type name is not valid UTF-8".to_owned())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: f64,
        y: f64,
    }

    impl Message for Point {
        const TYPE_NAME: &'static str = "test/msgs/geometry/Point";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pose {
        position: Point,
        heading: f64,
    }

    impl Message for Pose {
        const TYPE_NAME: &'static str = "test/msgs/geometry/Pose";
    }

    #[test]
    fn test_frame_layout() {
        // ---
        let bytes = encode(&Point { x: 1.0, y: 2.0 }).unwrap();
        let name = Point::TYPE_NAME.as_bytes();

        assert_eq!(&bytes[..2], &(name.len() as u16).to_be_bytes());
        assert_eq!(&bytes[2..2 + name.len()], name);
        assert_eq!(&bytes[2 + name.len()..], br#"{"x":1.0,"y":2.0}"#);
        assert_eq!(peek_type_name(&bytes), Some(Point::TYPE_NAME));

        let back: Point = decode_message(&bytes).unwrap();
        assert_eq!(back, Point { x: 1.0, y: 2.0 });
    }

    #[test]
    fn test_wrong_type_reports_both_names() {
        // ---
        let bytes = encode(&Point { x: 0.0, y: 0.0 }).unwrap();
        let err = decode_message::<Pose>(&bytes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "message type mismatch: expected 'test/msgs/geometry/Pose', got 'test/msgs/geometry/Point'"
        );
    }

    #[test]
    fn test_truncated_frames() {
        // ---
        for bytes in [&b""[..], &b"\x00"[..], &b"\x00\x20abc"[..]] {
            assert!(matches!(
                decode_message::<Point>(bytes),
                Err(Error::TypeMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_body_rejected_by_schema() {
        // ---
        let name = Point::TYPE_NAME.as_bytes();
        let mut frame = (name.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(name);
        frame.extend_from_slice(br#"{"x":"one"}"#);

        match decode_message::<Point>(&frame) {
            Err(Error::TypeMismatch { expected, found }) => {
                assert_eq!(expected, Point::TYPE_NAME);
                assert!(found.contains("invalid body"), "{found}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

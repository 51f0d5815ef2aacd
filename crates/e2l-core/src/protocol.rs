//! Wire protocol: MessagePack bodies behind an 8-digit length prefix
//!
//! Format: `"%08d" % len(body)` in ASCII, followed by `len` bytes of
//! MessagePack. Both directions use the same framing.

use crate::error::{BridgeError, Result};
use crate::value::Value;

/// Width of the ASCII length field
pub const LENGTH_FIELD_LEN: usize = 8;

/// Largest body the length field can describe
pub const MAX_FRAME_LEN: usize = 99_999_999;

/// Serialize a value to MessagePack bytes
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Deserialize a value from MessagePack bytes
pub fn decode(bytes: &[u8]) -> Result<Value> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Build a complete frame (length field + body) for `body`
pub fn frame_body(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > MAX_FRAME_LEN {
        return Err(BridgeError::FrameLength(format!(
            "message of {} bytes does not fit the length field",
            body.len()
        )));
    }
    let mut frame = Vec::with_capacity(LENGTH_FIELD_LEN + body.len());
    frame.extend_from_slice(format!("{:08}", body.len()).as_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Encode `value` and wrap it in a frame
pub fn encode_frame(value: &Value) -> Result<Vec<u8>> {
    frame_body(&encode(value)?)
}

/// Parse an 8-byte ASCII decimal length field
pub fn parse_length(field: &[u8]) -> Result<usize> {
    if field.len() != LENGTH_FIELD_LEN || !field.iter().all(u8::is_ascii_digit) {
        return Err(BridgeError::FrameLength(format!(
            "invalid length field {:?}",
            String::from_utf8_lossy(field)
        )));
    }
    Ok(field
        .iter()
        .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0')))
}

/// Incremental frame reassembly
///
/// Bytes from arbitrary-sized reads are appended with [`FrameDecoder::extend`];
/// [`FrameDecoder::next_frame`] yields a body only once all of its bytes have
/// arrived. There is no cap below the length field's own limit.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take the next complete frame body, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < LENGTH_FIELD_LEN {
            return Ok(None);
        }
        let len = parse_length(&self.buffer[..LENGTH_FIELD_LEN])?;
        let total = LENGTH_FIELD_LEN + len;
        if self.buffer.len() < total {
            return Ok(None);
        }
        let body = self.buffer[LENGTH_FIELD_LEN..total].to_vec();
        self.buffer.drain(..total);
        Ok(Some(body))
    }

    /// Bytes buffered but not yet part of a complete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix_format() {
        let frame = frame_body(&[0xAB; 142]).unwrap();
        assert_eq!(&frame[..8], b"00000142");
        assert_eq!(frame.len(), 150);
    }

    #[test]
    fn test_frame_split_across_three_reads() {
        let msg = Value::map([("cmd", Value::from("get_spec"))]);
        let frame = encode_frame(&msg).unwrap();
        let (a, rest) = frame.split_at(3);
        let (b, c) = rest.split_at(rest.len() / 2);

        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for chunk in [a, b, c] {
            decoder.extend(chunk);
            while let Some(body) = decoder.next_frame().unwrap() {
                decoded.push(decode(&body).unwrap());
            }
        }
        assert_eq!(decoded, vec![msg]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_pipelined_frames_in_one_read() {
        let first = encode_frame(&Value::map([("cmd", Value::from("reset"))])).unwrap();
        let second = encode_frame(&Value::map([("cmd", Value::from("get_spec"))])).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[first, second].concat());

        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_large_message_reassembled() {
        let body = vec![7u8; 64 * 1024];
        let frame = frame_body(&body).unwrap();
        let mut decoder = FrameDecoder::new();
        let mut out = None;
        for chunk in frame.chunks(8192) {
            decoder.extend(chunk);
            if let Some(b) = decoder.next_frame().unwrap() {
                assert!(out.is_none(), "frame produced twice");
                out = Some(b);
            }
        }
        assert_eq!(out.unwrap(), body);
    }

    #[test]
    fn test_bad_length_field() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"12ab5678xxxx");
        assert!(matches!(
            decoder.next_frame(),
            Err(BridgeError::FrameLength(_))
        ));
    }
}

//! Entry framing: a little-endian `u32` length prefix followed by the
//! opaque payload bytes.
//!
//! The same framing is used for entries at rest in chunk files and for the
//! byte ranges returned by batched historical reads, so a host can replay a
//! range by decoding frames back-to-back.

use snafu::Snafu;

/// Width of the frame length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Error type for frame decoding.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ends before the declared frame does.
    #[snafu(display("frame truncated: need {needed} bytes, {remaining} remain"))]
    Truncated {
        /// Bytes required to complete the frame (header included).
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
}

/// Total on-disk length of a framed entry with the given payload length.
#[must_use]
pub const fn framed_len(payload_len: usize) -> usize {
    FRAME_HEADER_SIZE + payload_len
}

/// Appends the frame header and payload to `buf`.
pub fn encode_frame_into(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.reserve(framed_len(payload.len()));
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Decodes one frame from the front of `cursor`.
///
/// Returns the payload and the remaining bytes after the frame.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] if fewer than [`FRAME_HEADER_SIZE`]
/// bytes remain, or if the buffer is shorter than the declared length.
pub fn decode_frame(cursor: &[u8]) -> Result<(&[u8], &[u8]), FrameError> {
    if cursor.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::Truncated { needed: FRAME_HEADER_SIZE, remaining: cursor.len() });
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    header.copy_from_slice(&cursor[..FRAME_HEADER_SIZE]);
    let len = u32::from_le_bytes(header) as usize;

    let rest = &cursor[FRAME_HEADER_SIZE..];
    if rest.len() < len {
        return Err(FrameError::Truncated {
            needed: framed_len(len),
            remaining: cursor.len(),
        });
    }

    Ok((&rest[..len], &rest[len..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode() {
        let mut buf = Vec::new();
        encode_frame_into(&mut buf, b"hello");

        assert_eq!(buf.len(), framed_len(5));
        assert_eq!(&buf[..4], &5u32.to_le_bytes());

        let (payload, rest) = decode_frame(&buf).expect("decode");
        assert_eq!(payload, b"hello");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_consecutive_frames() {
        let mut buf = Vec::new();
        encode_frame_into(&mut buf, b"first");
        encode_frame_into(&mut buf, b"second");

        let (first, rest) = decode_frame(&buf).expect("first frame");
        assert_eq!(first, b"first");
        let (second, rest) = decode_frame(rest).expect("second frame");
        assert_eq!(second, b"second");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_short_header() {
        let err = decode_frame(&[1, 0]).unwrap_err();
        assert_eq!(err, FrameError::Truncated { needed: FRAME_HEADER_SIZE, remaining: 2 });
    }

    #[test]
    fn test_decode_short_payload() {
        let mut buf = Vec::new();
        encode_frame_into(&mut buf, b"hello");
        // Drop the last payload byte
        buf.pop();

        let err = decode_frame(&buf).unwrap_err();
        assert_eq!(err, FrameError::Truncated { needed: framed_len(5), remaining: 8 });
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert!(decode_frame(&[]).is_err());
    }
}

//! Record framing: the stream and datagram wire shapes, and the
//! reassembly buffer stream mode needs to turn a byte stream back into
//! records.

use crate::core::{
    SptpsError, AEAD_TAG_SIZE, DATAGRAM_HEADER_SIZE, MAX_RECORD_LEN, STREAM_HEADER_SIZE,
    STREAM_LENGTH_PREFIX_SIZE,
};
use crate::crypto::CipherContext;

/// Plaintext header + trailing tag overhead for a stream record, once
/// keyed.
pub const STREAM_RECORD_OVERHEAD: usize = STREAM_HEADER_SIZE + AEAD_TAG_SIZE;

/// Plaintext header + trailing tag overhead for a datagram record, once
/// keyed.
pub const DATAGRAM_RECORD_OVERHEAD: usize = DATAGRAM_HEADER_SIZE + AEAD_TAG_SIZE;

/// Builds an outbound stream-mode record.
///
/// `cipher` is `None` before the handshake completes (handshake records
/// themselves are sent in the clear, authenticated later by the SIG
/// signature rather than by an AEAD tag).
pub fn build_stream_record(
    record_type: u8,
    payload: &[u8],
    outseqno: u32,
    cipher: Option<&dyn CipherContext>,
) -> Result<Vec<u8>, SptpsError> {
    if payload.len() > MAX_RECORD_LEN {
        return Err(SptpsError::BadLength {
            expected: MAX_RECORD_LEN,
            actual: payload.len(),
        });
    }

    let mut body = Vec::with_capacity(1 + payload.len());
    body.push(record_type);
    body.extend_from_slice(payload);

    let body = match cipher {
        Some(cipher) => cipher.encrypt(outseqno, &body)?,
        None => body,
    };

    let mut frame = Vec::with_capacity(STREAM_LENGTH_PREFIX_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Builds an outbound datagram-mode record.
pub fn build_datagram_record(
    record_type: u8,
    payload: &[u8],
    outseqno: u32,
    cipher: Option<&dyn CipherContext>,
) -> Result<Vec<u8>, SptpsError> {
    if payload.len() > MAX_RECORD_LEN {
        return Err(SptpsError::BadLength {
            expected: MAX_RECORD_LEN,
            actual: payload.len(),
        });
    }

    let mut body = Vec::with_capacity(1 + payload.len());
    body.push(record_type);
    body.extend_from_slice(payload);

    let body = match cipher {
        Some(cipher) => cipher.encrypt(outseqno, &body)?,
        None => body,
    };

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&outseqno.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// A single decoded record: its type and decrypted payload.
pub struct DecodedRecord {
    /// The record type byte.
    pub record_type: u8,
    /// The payload, with cipher framing and the type byte already
    /// stripped.
    pub payload: Vec<u8>,
}

/// Splits a decrypted record body into its type byte and payload.
pub fn split_record_body(body: &[u8]) -> Result<DecodedRecord, SptpsError> {
    if body.is_empty() {
        return Err(SptpsError::ShortPacket { needed: 1, got: 0 });
    }
    Ok(DecodedRecord {
        record_type: body[0],
        payload: body[1..].to_vec(),
    })
}

/// Decodes a complete datagram-mode record (the caller guarantees the
/// buffer holds exactly one record; datagram transports deliver whole
/// messages).
pub fn decode_datagram_record(
    frame: &[u8],
    cipher: Option<&dyn CipherContext>,
) -> Result<(u32, DecodedRecord), SptpsError> {
    if frame.len() < DATAGRAM_HEADER_SIZE {
        return Err(SptpsError::ShortPacket {
            needed: DATAGRAM_HEADER_SIZE,
            got: frame.len(),
        });
    }
    let seqno = u32::from_le_bytes(frame[..4].try_into().unwrap());
    let body = &frame[4..];

    let body = match cipher {
        Some(cipher) => cipher.decrypt(seqno, body)?,
        None => body.to_vec(),
    };

    if body.is_empty() {
        return Err(SptpsError::ShortPacket {
            needed: 1,
            got: 0,
        });
    }
    let record_type = body[0];
    let payload = body[1..].to_vec();
    Ok((seqno, DecodedRecord { record_type, payload }))
}

/// Accumulates bytes arriving from a stream transport and yields at most
/// one complete, still-encrypted record body per call.
///
/// Growth is monotonic: the buffer is sized to the largest record seen so
/// far and never shrunk within a session's lifetime. This mirrors the
/// reference implementation and is a deliberate simplicity/memory
/// trade-off, not an oversight.
///
/// `feed` deliberately stops at the first complete body rather than
/// draining every record a chunk might contain, and leaves decryption to
/// the caller: the handshake can cut over to a new cipher between two
/// records delivered in the same read, so the cipher in effect has to be
/// re-read fresh before each record is decrypted, not snapshotted once
/// per `receive_data` call.
pub struct StreamReassembler {
    buf: Vec<u8>,
    /// Bytes of `buf` that currently hold data waiting to be parsed.
    filled: usize,
    /// Length of the record body currently being accumulated, once known
    /// from the 2-byte length prefix (`None` until then).
    expected_body_len: Option<usize>,
}

impl StreamReassembler {
    /// An empty reassembler.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            filled: 0,
            expected_body_len: None,
        }
    }

    /// Feeds `input` into the reassembler. Returns the number of bytes of
    /// `input` consumed, and the record body (still keyed, if the session
    /// has a cipher installed) if one became complete.
    pub fn feed(&mut self, input: &[u8]) -> (usize, Option<Vec<u8>>) {
        let mut consumed = 0;

        if self.expected_body_len.is_none() {
            let need = STREAM_LENGTH_PREFIX_SIZE - self.filled;
            let take = need.min(input.len());
            self.push_bytes(&input[..take]);
            consumed += take;

            if self.filled < STREAM_LENGTH_PREFIX_SIZE {
                return (consumed, None);
            }
            let body_len =
                u16::from_le_bytes(self.buf[..STREAM_LENGTH_PREFIX_SIZE].try_into().unwrap())
                    as usize;
            self.expected_body_len = Some(body_len);
            self.buf.resize(STREAM_LENGTH_PREFIX_SIZE + body_len, 0);
        }

        let body_len = self.expected_body_len.unwrap();
        let total_len = STREAM_LENGTH_PREFIX_SIZE + body_len;
        if self.filled < total_len {
            let need = total_len - self.filled;
            let take = need.min(input.len() - consumed);
            self.push_bytes(&input[consumed..consumed + take]);
            consumed += take;
        }

        if self.filled < total_len {
            return (consumed, None);
        }

        let body = self.buf[STREAM_LENGTH_PREFIX_SIZE..total_len].to_vec();
        self.filled = 0;
        self.expected_body_len = None;
        (consumed, Some(body))
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        if self.buf.len() < self.filled + bytes.len() {
            self.buf.resize(self.filled + bytes.len(), 0);
        }
        self.buf[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
        self.filled += bytes.len();
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ChaChaPolyContext, KeyHalf};

    #[test]
    fn stream_record_roundtrip_unkeyed() {
        let frame = build_stream_record(5, b"hi", 0, None).unwrap();
        let mut reassembler = StreamReassembler::new();
        let (consumed, body) = reassembler.feed(&frame);
        assert_eq!(consumed, frame.len());
        let decoded = split_record_body(&body.unwrap()).unwrap();
        assert_eq!((decoded.record_type, decoded.payload), (5, b"hi".to_vec()));
    }

    #[test]
    fn stream_record_roundtrip_keyed_chunked() {
        let key_material = [4u8; crate::core::EXPANDED_KEY_SIZE];
        let sender = ChaChaPolyContext::new(&key_material, KeyHalf::First).unwrap();
        let receiver = ChaChaPolyContext::new(&key_material, KeyHalf::First).unwrap();

        let frame1 = build_stream_record(0, b"hello", 0, Some(&sender)).unwrap();
        let frame2 = build_stream_record(0, b"world", 1, Some(&sender)).unwrap();
        let mut wire = frame1;
        wire.extend_from_slice(&frame2);

        let mut reassembler = StreamReassembler::new();
        let mut inseqno = 0u32;
        let mut got = Vec::new();
        // Feed one byte at a time to exercise reassembly across chunk
        // boundaries.
        let mut offset = 0;
        while offset < wire.len() {
            let end = (offset + 1).min(wire.len());
            let (consumed, body) = reassembler.feed(&wire[offset..end]);
            offset += consumed;
            if let Some(body) = body {
                let plain = receiver.decrypt(inseqno, &body).unwrap();
                let decoded = split_record_body(&plain).unwrap();
                got.push(decoded.payload);
                inseqno = inseqno.wrapping_add(1);
            }
        }
        assert_eq!(got, vec![b"hello".to_vec(), b"world".to_vec()]);
        assert_eq!(inseqno, 2);
    }

    #[test]
    fn datagram_record_roundtrip() {
        let key_material = [6u8; crate::core::EXPANDED_KEY_SIZE];
        let cipher = ChaChaPolyContext::new(&key_material, KeyHalf::First).unwrap();
        let frame = build_datagram_record(3, b"payload", 9, Some(&cipher)).unwrap();
        let (seqno, decoded) = decode_datagram_record(&frame, Some(&cipher)).unwrap();
        assert_eq!(seqno, 9);
        assert_eq!(decoded.record_type, 3);
        assert_eq!(decoded.payload, b"payload");
    }

    #[test]
    fn datagram_record_too_short_is_rejected() {
        let result = decode_datagram_record(&[0, 0], None);
        assert!(result.is_err());
    }
}

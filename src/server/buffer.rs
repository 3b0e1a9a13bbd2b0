//! Stream framing buffer for TCP/TLS transports (§4: connection-oriented
//! transport server framing). RFC 3430 puts exactly one ASN.1 SEQUENCE
//! per message with no separate length prefix, so framing means reading
//! until `codec::mp::message_len` can be computed from what's buffered
//! so far.

use bytes::BytesMut;

/// Accumulates bytes read off a stream socket via
/// `AsyncReadExt::read_buf`, and lets the caller split off complete
/// messages as framing boundaries are discovered.
#[derive(Default)]
pub struct ExchangeBuffer(BytesMut);

impl ExchangeBuffer {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Splits the first `size` bytes off as a complete message, keeping
    /// whatever trails them for the next message.
    pub fn split(&mut self, size: usize) -> Vec<u8> {
        self.0.split_to(size).to_vec()
    }

    pub fn inner_mut(&mut self) -> &mut BytesMut {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_off_complete_message_and_keeps_remainder() {
        let mut buffer = ExchangeBuffer::default();
        buffer.inner_mut().extend_from_slice(b"hellotra");

        assert_eq!(buffer.len(), 8);
        let message = buffer.split(5);
        assert_eq!(message, b"hello");
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.as_slice(), b"tra");
    }
}

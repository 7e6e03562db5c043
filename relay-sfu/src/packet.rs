//! RTP packet metadata carried through the forwarding path

use bytes::Bytes;
use std::time::Instant;

/// RTP packet with the header fields the forwarder rewrites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardablePacket {
    /// RTP payload (without header)
    pub payload: Bytes,

    /// Source SSRC
    pub ssrc: u32,

    /// Sequence number
    pub sequence_number: u16,

    /// Timestamp
    pub timestamp: u32,

    /// When packet was received
    pub received_at: Instant,
}

impl ForwardablePacket {
    #[must_use]
    pub fn new(ssrc: u32, sequence_number: u16, timestamp: u32, payload: Bytes) -> Self {
        Self {
            payload,
            ssrc,
            sequence_number,
            timestamp,
            received_at: Instant::now(),
        }
    }

    /// Packet carries nothing but padding
    #[must_use]
    pub fn is_padding_only(&self) -> bool {
        self.payload.is_empty()
    }

    /// Copy of this packet with a rewritten sequence number
    #[must_use]
    pub fn with_sequence_number(&self, sequence_number: u16) -> Self {
        Self {
            sequence_number,
            ..self.clone()
        }
    }
}

//! Sequence number munging for forwarded tracks
//!
//! The SFU does not forward every packet it receives: padding-only packets
//! are dropped and the server may generate padding of its own. Subscribers
//! must still see a gap-free sequence, so each forwarded track rewrites
//! sequence numbers through a [`RangeMap`] holding the offset
//! `incoming - outgoing`:
//!
//! - dropping a packet at the head excludes its sequence number, so every
//!   later packet shifts down by one
//! - injecting padding lowers the offset from just past the head onward, so
//!   every later packet shifts up while lost packets keep their slot
//! - a late (out-of-order) packet is looked up in the history and gets the
//!   offset that was in effect when its sequence number was current
//!
//! Sequence numbers are extended to 64 bits first so the map never has to
//! deal with 16-bit wraparound in practice.

use crate::error::{MungeError, RangeMapError};
use crate::packet::ForwardablePacket;
use crate::range_map::RangeMap;
use crate::serial;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extends 16-bit RTP sequence numbers to a monotonic 64-bit space
#[derive(Debug, Clone, Default)]
pub struct SequenceUnwrapper {
    highest: Option<u64>,
}

impl SequenceUnwrapper {
    #[must_use]
    pub const fn new() -> Self {
        Self { highest: None }
    }

    /// Returns the extended form of `sn`, or `None` if it would land before
    /// the first sequence number seen.
    pub fn extend(&mut self, sn: u16) -> Option<u64> {
        let Some(highest) = self.highest else {
            self.highest = Some(u64::from(sn));
            return Some(u64::from(sn));
        };

        #[allow(clippy::cast_possible_truncation)]
        let last = highest as u16;
        if serial::is_on_or_after(sn, last) {
            let extended = highest + u64::from(serial::distance(sn, last));
            self.highest = Some(extended);
            Some(extended)
        } else {
            highest.checked_sub(u64::from(serial::distance(last, sn)))
        }
    }

    #[must_use]
    pub const fn highest(&self) -> Option<u64> {
        self.highest
    }

    pub fn reset(&mut self) {
        self.highest = None;
    }
}

/// Munger statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MungerStats {
    /// Packets forwarded with a rewritten sequence number
    pub packets_forwarded: u64,

    /// Forwarded packets that arrived behind the head
    pub packets_out_of_order: u64,

    /// Padding-only packets dropped at the head
    pub padding_dropped: u64,

    /// Sequence numbers allocated to server-generated padding
    pub padding_injected: u64,

    /// Packets refused because they were excluded or too old
    pub packets_rejected: u64,

    /// Repeats of the packet at the head, not forwarded again
    pub packets_duplicate: u64,

    /// Number of upstream restarts
    pub restarts: u64,
}

/// Rewrites the sequence numbers of one forwarded track
#[derive(Debug, Clone)]
pub struct SequenceMunger {
    /// Extended incoming sequence number -> `incoming - outgoing`
    offsets: RangeMap<u64, u64>,
    unwrapper: SequenceUnwrapper,
    ssrc: Option<u32>,
    /// Highest extended incoming sequence number processed
    head: Option<u64>,
    /// Highest extended outgoing sequence number handed out
    last_outgoing: Option<u64>,
    restart_pending: bool,
    stats: MungerStats,
}

impl SequenceMunger {
    /// `history` bounds the number of retained offset changes.
    #[must_use]
    pub fn new(history: usize) -> Self {
        Self {
            offsets: RangeMap::new(history),
            unwrapper: SequenceUnwrapper::new(),
            ssrc: None,
            head: None,
            last_outgoing: None,
            restart_pending: false,
            stats: MungerStats::default(),
        }
    }

    /// Translates an incoming packet into the outgoing sequence space.
    ///
    /// A change of SSRC is treated as an upstream restart.
    ///
    /// # Errors
    ///
    /// Every error means the packet must not be forwarded. Only
    /// [`MungeError::Inconsistent`] points at a bug; the others are ordinary
    /// per-packet outcomes.
    pub fn translate(
        &mut self,
        packet: &ForwardablePacket,
    ) -> Result<ForwardablePacket, MungeError> {
        if self.ssrc.is_some_and(|ssrc| ssrc != packet.ssrc) {
            self.restart();
        }
        self.ssrc = Some(packet.ssrc);

        if self.restart_pending {
            self.unwrapper.reset();
        }

        let Some(extended) = self.unwrapper.extend(packet.sequence_number) else {
            self.stats.packets_rejected += 1;
            return Err(MungeError::BeforeStart(packet.sequence_number));
        };

        if self.restart_pending {
            self.rebase(extended)?;
        }

        match self.head {
            Some(head) if extended == head => {
                self.stats.packets_duplicate += 1;
                return Err(MungeError::Duplicate(extended));
            }
            Some(head) if extended < head => return self.translate_late(packet, extended),
            _ => {}
        }
        self.head = Some(extended);

        if packet.is_padding_only() {
            self.offsets.exclude_range(extended, extended + 1)?;
            self.stats.padding_dropped += 1;
            return Err(MungeError::PaddingDropped);
        }

        let outgoing = extended.wrapping_sub(self.offsets.get_value(extended)?);
        self.last_outgoing = Some(outgoing);
        self.stats.packets_forwarded += 1;

        #[allow(clippy::cast_possible_truncation)]
        let sequence_number = outgoing as u16;
        Ok(packet.with_sequence_number(sequence_number))
    }

    fn translate_late(
        &mut self,
        packet: &ForwardablePacket,
        extended: u64,
    ) -> Result<ForwardablePacket, MungeError> {
        let offset = match self.offsets.get_value(extended) {
            Ok(offset) => offset,
            Err(RangeMapError::KeyExcluded) => {
                self.stats.packets_rejected += 1;
                return Err(MungeError::Excluded(extended));
            }
            Err(RangeMapError::KeyTooOld) => {
                self.stats.packets_rejected += 1;
                debug!(
                    ssrc = packet.ssrc,
                    sequence_number = packet.sequence_number,
                    extended,
                    "Late packet older than retained history"
                );
                return Err(MungeError::TooOld(extended));
            }
            Err(e) => return Err(e.into()),
        };

        self.stats.packets_forwarded += 1;
        self.stats.packets_out_of_order += 1;

        #[allow(clippy::cast_possible_truncation)]
        let sequence_number = extended.wrapping_sub(offset) as u16;
        Ok(packet.with_sequence_number(sequence_number))
    }

    /// Allocates `count` outgoing sequence numbers for server-generated
    /// padding, right after the slot of the newest incoming packet. Later
    /// packets are shifted past them; packets still missing behind the head
    /// keep the numbers reserved for them.
    ///
    /// Returns nothing before the first packet of the stream.
    ///
    /// # Errors
    ///
    /// [`MungeError::Inconsistent`] if the offset history cannot be split at
    /// the head.
    pub fn inject_padding(&mut self, count: u16) -> Result<Vec<u16>, MungeError> {
        let Some(next) = self.next_outgoing()? else {
            return Ok(Vec::new());
        };
        if count == 0 {
            return Ok(Vec::new());
        }

        let count = u64::from(count);
        match self.head {
            Some(head) => self.offsets.adjust_value_from(head + 1, count)?,
            None => self.offsets.adjust_open_value(count),
        }

        #[allow(clippy::cast_possible_truncation)]
        let sequence_numbers = (0..count).map(|i| next.wrapping_add(i) as u16).collect();

        self.last_outgoing = Some(next.wrapping_add(count - 1));
        self.stats.padding_injected += count;

        Ok(sequence_numbers)
    }

    /// Outgoing sequence number the next packet at the head would receive
    fn next_outgoing(&self) -> Result<Option<u64>, MungeError> {
        match self.head {
            Some(head) => {
                let next = head + 1;
                Ok(Some(next.wrapping_sub(self.offsets.get_value(next)?)))
            }
            None => Ok(self.last_outgoing.map(|last| last.wrapping_add(1))),
        }
    }

    /// Marks the upstream as restarted. The next packet re-bases the offset
    /// history so outgoing numbering continues without a gap.
    pub fn restart(&mut self) {
        debug!(
            ssrc = ?self.ssrc,
            last_outgoing = ?self.last_outgoing,
            "Sequence munger restart requested"
        );
        self.restart_pending = true;
    }

    fn rebase(&mut self, extended: u64) -> Result<(), MungeError> {
        let offset = self
            .next_outgoing()?
            .map_or(0, |next| extended.wrapping_sub(next));
        self.offsets.reset(offset);
        self.head = None;
        self.restart_pending = false;
        self.stats.restarts += 1;

        debug!(extended, offset, "Sequence munger re-based");
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> MungerStats {
        self.stats.clone()
    }

    #[must_use]
    pub const fn offsets(&self) -> &RangeMap<u64, u64> {
        &self.offsets
    }
}

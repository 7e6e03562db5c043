use thiserror::Error;

/// Errors reported by [`RangeMap`](crate::RangeMap)
///
/// None of these are fatal; each one describes a single key or exclusion
/// request and the caller decides what to do with the packet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMapError {
    /// Exclusion is empty, wider than half the key space, or starts before
    /// the open range.
    #[error("end <= start")]
    ReversedOrder,

    #[error("key too old")]
    KeyTooOld,

    #[error("key excluded")]
    KeyExcluded,

    /// No range or gap matched the key; the retained history is inconsistent.
    #[error("key not found")]
    KeyNotFound,
}

/// Per-packet outcomes of [`SequenceMunger::translate`](crate::SequenceMunger::translate)
/// that do not produce a forwarded packet
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MungeError {
    #[error("padding-only packet dropped")]
    PaddingDropped,

    #[error("sequence number {0} unwraps before the start of the stream")]
    BeforeStart(u16),

    #[error("sequence number {0} repeats the head of the stream")]
    Duplicate(u64),

    #[error("sequence number {0} was excluded from the forwarded stream")]
    Excluded(u64),

    #[error("sequence number {0} is older than the retained history")]
    TooOld(u64),

    #[error("sequence map inconsistent: {0}")]
    Inconsistent(#[from] RangeMapError),
}

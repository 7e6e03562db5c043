//! Range-indexed sequence-space remapping
//!
//! Tracks a cumulative value (typically an offset) over a wrapping key space
//! such as RTP sequence numbers. The history is an ordered list of mapped
//! ranges, oldest first:
//!
//! ```text
//!   closed          excluded   closed        excluded   open
//! [start..=end]v0   (gap)     [start..=end]v1  (gap)    [start..)v2
//! ```
//!
//! Keys inside a gap were declared excluded by [`RangeMap::exclude_range`];
//! every key after a gap carries a value increased by the gap width. Only the
//! last (open) range is ever mutated. Closed ranges beyond `capacity` are
//! discarded oldest first, after which their keys report
//! [`RangeMapError::KeyTooOld`].
//!
//! The map is not synchronized. One writer per tracked stream, guarded by the
//! owning pipeline.

use crate::error::RangeMapError;
use crate::serial::{self, RangeValue, SerialKey};
use tracing::{error, trace};

const MIN_CAPACITY: usize = 1;

/// A contiguous run of keys mapping to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange<K, V> {
    start: K,
    end: K,
    value: V,
}

impl<K: SerialKey, V: RangeValue> MappedRange<K, V> {
    fn open(start: K, value: V) -> Self {
        Self {
            start,
            end: K::ZERO,
            value,
        }
    }

    #[must_use]
    pub fn start(&self) -> K {
        self.start
    }

    /// Inclusive end. Meaningless for the open range.
    #[must_use]
    pub fn end(&self) -> K {
        self.end
    }

    #[must_use]
    pub fn value(&self) -> V {
        self.value
    }
}

/// Bounded history of value changes over a wrapping key space
#[derive(Debug, Clone)]
pub struct RangeMap<K, V> {
    /// Maximum retained closed ranges; the open range is not counted.
    capacity: usize,
    /// Oldest first, open range last. Never empty.
    ranges: Vec<MappedRange<K, V>>,
}

impl<K: SerialKey, V: RangeValue> RangeMap<K, V> {
    /// Creates a map with a single open range starting at key 0 with value 0.
    ///
    /// A `capacity` of 0 is treated as 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_CAPACITY),
            ranges: vec![MappedRange::open(K::ZERO, V::ZERO)],
        }
    }

    /// Drops all history and starts over with one open range at `value`.
    pub fn reset(&mut self, value: V) {
        self.ranges.clear();
        self.ranges.push(MappedRange::open(K::ZERO, value));
    }

    /// Lowers the value of the open range by `delta`.
    ///
    /// Closed history is untouched. The subtraction wraps; callers only pass
    /// deltas their own bookkeeping has already validated.
    pub fn adjust_open_value(&mut self, delta: V) {
        let open = self.open_index();
        self.ranges[open].value = self.ranges[open].value.wrapping_sub(delta);
    }

    /// Lowers the value of every key from `key` onward by `delta`.
    ///
    /// Keys of the open range before `key` are closed off first so they keep
    /// their current value. When `key` is the open range's start this is
    /// [`RangeMap::adjust_open_value`].
    ///
    /// # Errors
    ///
    /// [`RangeMapError::ReversedOrder`] if `key` precedes the open range. The
    /// map is left unchanged in that case.
    pub fn adjust_value_from(&mut self, key: K, delta: V) -> Result<(), RangeMapError> {
        let open = self.open_index();
        let open_start = self.ranges[open].start;
        if serial::precedes(key, open_start) {
            return Err(RangeMapError::ReversedOrder);
        }

        if key == open_start {
            self.adjust_open_value(delta);
            return Ok(());
        }

        let value = self.ranges[open].value.wrapping_sub(delta);
        self.ranges[open].end = key.wrapping_sub(K::ONE);
        self.ranges.push(MappedRange::open(key, value));

        self.prune();
        Ok(())
    }

    /// Declares `[start_inclusive, end_exclusive)` excluded and raises the
    /// value of every later key by the exclusion width.
    ///
    /// # Errors
    ///
    /// [`RangeMapError::ReversedOrder`] if the range is empty, spans half the
    /// key space or more, or starts before the open range. The map is left
    /// unchanged in that case.
    pub fn exclude_range(
        &mut self,
        start_inclusive: K,
        end_exclusive: K,
    ) -> Result<(), RangeMapError> {
        let width = serial::distance(end_exclusive, start_inclusive);
        if width == K::ZERO || width >= K::HALF_RANGE {
            return Err(RangeMapError::ReversedOrder);
        }

        let open = self.open_index();
        let open_start = self.ranges[open].start;
        if serial::precedes(start_inclusive, open_start) {
            // closed history cannot be rewritten
            return Err(RangeMapError::ReversedOrder);
        }

        let value = self.ranges[open].value.wrapping_add(V::from_key(width));

        // nothing landed in the open range yet, slide it past the exclusion
        if start_inclusive == open_start {
            self.ranges[open].start = end_exclusive;
            self.ranges[open].value = value;
            return Ok(());
        }

        self.ranges[open].end = start_inclusive.wrapping_sub(K::ONE);
        self.ranges.push(MappedRange::open(end_exclusive, value));

        self.prune();
        Ok(())
    }

    /// Returns the value mapped to `key`.
    ///
    /// # Errors
    ///
    /// - [`RangeMapError::KeyTooOld`] if `key` precedes the retained history
    /// - [`RangeMapError::KeyExcluded`] if `key` falls in an excluded gap
    /// - [`RangeMapError::KeyNotFound`] if neither a range nor a gap matches
    pub fn get_value(&self, key: K) -> Result<V, RangeMapError> {
        let open = self.open_index();
        if serial::is_on_or_after(key, self.ranges[open].start) {
            return Ok(self.ranges[open].value);
        }

        // newest first: when retained history covers more than half the key
        // space the most recent interpretation of the key wins
        for idx in (0..=open).rev() {
            let range = &self.ranges[idx];
            if idx != open && serial::within(key, range.start, range.end) {
                return Ok(range.value);
            }

            if idx > 0 && serial::strictly_between(key, self.ranges[idx - 1].end, range.start) {
                return Err(RangeMapError::KeyExcluded);
            }
        }

        if serial::precedes(key, self.ranges[0].start) {
            return Err(RangeMapError::KeyTooOld);
        }

        error!(
            key = ?key,
            oldest_start = ?self.ranges[0].start,
            open_start = ?self.ranges[open].start,
            ranges = self.ranges.len(),
            "Key matched neither a range nor a gap"
        );
        Err(RangeMapError::KeyNotFound)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained ranges, including the open one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Always false; the open range is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn open_range(&self) -> &MappedRange<K, V> {
        &self.ranges[self.open_index()]
    }

    /// Retained closed ranges, oldest first.
    #[must_use]
    pub fn closed_ranges(&self) -> &[MappedRange<K, V>] {
        &self.ranges[..self.open_index()]
    }

    fn open_index(&self) -> usize {
        self.ranges.len() - 1
    }

    fn prune(&mut self) {
        // +1 for the open range
        let retained = self.capacity + 1;
        if self.ranges.len() > retained {
            let dropped = self.ranges.len() - retained;
            self.ranges.drain(..dropped);
            trace!(
                dropped,
                oldest_start = ?self.ranges[0].start,
                "Pruned closed ranges"
            );
        }
    }
}

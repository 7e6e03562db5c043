//! Property tests for the range map and its wraparound arithmetic
//!
//! Run with: cargo test -p relay-sfu --test range_map_props

use proptest::prelude::*;
use relay_sfu::serial::{self, SerialKey};
use relay_sfu::{RangeMap, RangeMapError};

const HALF: u32 = <u32 as SerialKey>::HALF_RANGE;

/// Open range start a little before the u32 wrap point, reached by merging.
const BASE: u32 = 0xffff_ff00;

fn map_near_wrap(capacity: usize) -> RangeMap<u32, u64> {
    let mut map = RangeMap::new(capacity);
    map.exclude_range(0, 0x7fff_ffff).unwrap();
    map.exclude_range(0x7fff_ffff, BASE).unwrap();
    assert_eq!(map.len(), 1);
    map
}

/// Reference model over the unwrapped (64-bit) key space.
struct Model {
    capacity: usize,
    /// (start, end inclusive, value)
    closed: Vec<(u64, u64, u64)>,
    open_start: u64,
    open_value: u64,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            closed: Vec::new(),
            open_start: u64::from(BASE),
            open_value: u64::from(BASE),
        }
    }

    fn exclude(&mut self, start: u64, end: u64) {
        if start != self.open_start {
            self.closed.push((self.open_start, start - 1, self.open_value));
            if self.closed.len() > self.capacity {
                let dropped = self.closed.len() - self.capacity;
                self.closed.drain(..dropped);
            }
        }
        self.open_start = end;
        self.open_value += end - start;
    }

    fn expected(&self, key: u64) -> Result<u64, RangeMapError> {
        if key >= self.open_start {
            return Ok(self.open_value);
        }
        let oldest = self.closed.first().map_or(self.open_start, |r| r.0);
        if key < oldest {
            return Err(RangeMapError::KeyTooOld);
        }
        self.closed
            .iter()
            .find(|r| r.0 <= key && key <= r.1)
            .map_or(Err(RangeMapError::KeyExcluded), |r| Ok(r.2))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(key: u64) -> u32 {
    key as u32
}

proptest! {
    /// Property: circular order agrees with the true order for any separation
    /// below half the key space
    #[test]
    fn prop_serial_order(a in any::<u32>(), d in 1u32..HALF) {
        let b = a.wrapping_add(d);
        prop_assert!(serial::is_on_or_after(b, a));
        prop_assert!(serial::precedes(a, b));
        prop_assert!(serial::is_on_or_after(a, a));
    }

    /// Property: interval membership follows the unwrapped interval
    #[test]
    fn prop_serial_within(a in any::<u16>(), d in 0u16..0x4000, e in 0u16..0x4000) {
        let key = a.wrapping_add(d);
        let end = a.wrapping_add(e);
        prop_assert_eq!(serial::within(key, a, end), d <= e);
        prop_assert_eq!(serial::strictly_between(key, a, end), d > 0 && d < e);
    }

    /// Property: every lookup matches the reference model, across the u32 wrap
    #[test]
    fn prop_lookup_matches_model(
        capacity in 1usize..6,
        ops in prop::collection::vec((0u64..40, 1u64..20), 1..40),
    ) {
        let mut map = map_near_wrap(capacity);
        let mut model = Model::new(capacity);

        for (gap, width) in ops {
            let start = model.open_start + gap;
            let end = start + width;
            prop_assert_eq!(map.exclude_range(truncate(start), truncate(end)), Ok(()));
            model.exclude(start, end);
            prop_assert!(map.len() <= capacity + 1);
        }

        let first = u64::from(BASE) - 10;
        for key in first..model.open_start + 10 {
            let got = map.get_value(truncate(key));
            prop_assert_eq!(got, model.expected(key), "key {}", key);
            prop_assert_eq!(got, map.get_value(truncate(key)));
        }
    }

    /// Property: ordering, width and size invariants hold while the open range
    /// laps the 16-bit key space several times
    #[test]
    fn prop_invariants_hold_over_laps(
        capacity in 1usize..10,
        ops in prop::collection::vec((0u16..3000, 1u16..3000), 1..120),
    ) {
        let half = <u16 as SerialKey>::HALF_RANGE;
        let mut map = RangeMap::<u16, u64>::new(capacity);

        for (gap, width) in ops {
            let start = map.open_range().start().wrapping_add(gap);
            let end = start.wrapping_add(width);
            prop_assert_eq!(map.exclude_range(start, end), Ok(()));
            prop_assert!(map.len() <= capacity + 1);

            let closed = map.closed_ranges();
            for (idx, range) in closed.iter().enumerate() {
                prop_assert!(serial::distance(range.end(), range.start()) < half);

                let next = closed.get(idx + 1).unwrap_or(map.open_range());
                prop_assert!(serial::distance(next.start(), range.end()) > 0);
                prop_assert!(range.value() <= next.value());
            }
        }
    }

    /// Property: a rejected exclusion leaves the map untouched
    #[test]
    fn prop_rejected_exclusion_is_atomic(
        ops in prop::collection::vec((1u32..100, 1u32..100), 1..20),
        back in 1u32..1000,
        width in 1u32..100,
    ) {
        let mut map = RangeMap::<u32, u32>::new(4);
        for (gap, w) in ops {
            let start = map.open_range().start().wrapping_add(gap);
            map.exclude_range(start, start.wrapping_add(w)).unwrap();
        }

        let before = map.clone();
        let start = map.open_range().start().wrapping_sub(back);
        prop_assert_eq!(
            map.exclude_range(start, start.wrapping_add(width)),
            Err(RangeMapError::ReversedOrder)
        );
        prop_assert_eq!(map.open_range(), before.open_range());
        prop_assert_eq!(map.closed_ranges(), before.closed_ranges());
    }

    /// Property: reset forgets all history
    #[test]
    fn prop_reset_forgets_history(
        ops in prop::collection::vec((1u32..100, 1u32..100), 0..20),
        value in any::<u32>(),
        key in 0u32..HALF,
    ) {
        let mut map = RangeMap::<u32, u32>::new(3);
        for (gap, w) in ops {
            let start = map.open_range().start().wrapping_add(gap);
            map.exclude_range(start, start.wrapping_add(w)).unwrap();
        }

        map.reset(value);
        prop_assert_eq!(map.len(), 1);
        prop_assert_eq!(map.get_value(key), Ok(value));
    }
}

#[test]
fn rejects_exclusion_of_half_the_key_space() {
    let mut map = RangeMap::<u32, u32>::new(2);
    assert_eq!(map.exclude_range(10, 10 + HALF), Err(RangeMapError::ReversedOrder));
    assert_eq!(map.exclude_range(10, 10 + HALF + 1), Err(RangeMapError::ReversedOrder));
    assert_eq!(map.exclude_range(10, 10 + HALF - 1), Ok(()));
}

#[test]
fn pruned_range_reports_too_old_while_recent_ones_answer() {
    let mut map = RangeMap::<u64, u64>::new(1);
    map.exclude_range(100, 110).unwrap();
    map.exclude_range(200, 210).unwrap();
    map.exclude_range(300, 310).unwrap();

    assert_eq!(map.get_value(50), Err(RangeMapError::KeyTooOld));
    assert_eq!(map.get_value(150), Err(RangeMapError::KeyTooOld));
    assert_eq!(map.get_value(250), Ok(20));
    assert_eq!(map.get_value(305), Err(RangeMapError::KeyExcluded));
    assert_eq!(map.get_value(310), Ok(30));
}

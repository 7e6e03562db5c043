//! Serial-number arithmetic for wrapping counters
//!
//! RTP sequence numbers and timestamps are fixed-width counters that wrap
//! from their maximum value back to zero. Ordering two values of such a
//! counter is only meaningful when their true separation is less than half
//! the key space; within that window the wrapped difference tells which one
//! comes first.
//!
//! Every ordering decision in the range map goes through the helpers here,
//! never through `<`/`>` on raw key values.

use std::fmt;

/// Key of a wrapping sequence space (RTP sequence number, timestamp, ...)
pub trait SerialKey: Copy + Eq + Ord + fmt::Debug {
    /// `2^(W-1)` for a key of width `W`
    const HALF_RANGE: Self;
    const ZERO: Self;
    const ONE: Self;

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn to_u64(self) -> u64;
}

/// Cumulative value carried by a mapped range
pub trait RangeValue: Copy + Eq + Ord + fmt::Debug {
    const ZERO: Self;

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Converts a key-space width, truncating when the value type is narrower.
    fn from_key<K: SerialKey>(key: K) -> Self;
}

macro_rules! impl_serial {
    ($($t:ty),*) => {
        $(
            impl SerialKey for $t {
                const HALF_RANGE: Self = 1 << (<$t>::BITS - 1);
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$t>::wrapping_sub(self, rhs)
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    u64::from(self)
                }
            }

            impl RangeValue for $t {
                const ZERO: Self = 0;

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$t>::wrapping_sub(self, rhs)
                }

                #[inline]
                #[allow(clippy::cast_possible_truncation)]
                fn from_key<K: SerialKey>(key: K) -> Self {
                    key.to_u64() as $t
                }
            }
        )*
    };
}

impl_serial!(u16, u32, u64);

/// `(a - b) mod 2^W`
#[inline]
#[must_use]
pub fn distance<K: SerialKey>(a: K, b: K) -> K {
    a.wrapping_sub(b)
}

/// `key` is equal to `reference` or follows it by less than half the space.
#[inline]
#[must_use]
pub fn is_on_or_after<K: SerialKey>(key: K, reference: K) -> bool {
    distance(key, reference) < K::HALF_RANGE
}

/// `key` comes before `reference` under wraparound comparison.
#[inline]
#[must_use]
pub fn precedes<K: SerialKey>(key: K, reference: K) -> bool {
    !is_on_or_after(key, reference)
}

/// `key` lies in the closed interval `[start, end]`.
#[inline]
#[must_use]
pub fn within<K: SerialKey>(key: K, start: K, end: K) -> bool {
    distance(key, start) < K::HALF_RANGE && distance(end, key) < K::HALF_RANGE
}

/// `key` lies in the open interval `(low, high)`.
#[inline]
#[must_use]
pub fn strictly_between<K: SerialKey>(key: K, low: K, high: K) -> bool {
    let after_low = distance(key, low);
    let before_high = distance(high, key);
    after_low != K::ZERO
        && after_low < K::HALF_RANGE
        && before_high != K::ZERO
        && before_high < K::HALF_RANGE
}

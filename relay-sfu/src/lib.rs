//! Relay SFU forwarding core
//!
//! Sequence-space bookkeeping for the media-forwarding path of a WebRTC
//! selective forwarding unit. Packets are forwarded selectively: padding is
//! dropped, server padding is injected, streams restart under a new SSRC. The
//! sequence numbers a subscriber sees still have to be contiguous and
//! correct across 16-bit wraparound, including for packets that arrive late.
//!
//! ## Architecture
//!
//! - **`RangeMap`**: bounded history of a cumulative value over a wrapping
//!   key space, with excluded gaps
//! - **`serial`**: circular ("serial number") comparison helpers used by the map
//! - **`SequenceMunger`**: per-track sequence number rewriting on top of a `RangeMap`
//! - **`StreamRegistry`**: one munger per forwarded track, behind a lock
//!
//! ## Usage
//!
//! ```rust
//! use relay_sfu::{RangeMap, RangeMapError};
//!
//! let mut map = RangeMap::<u32, u32>::new(8);
//! map.exclude_range(20, 25).unwrap();
//!
//! assert_eq!(map.get_value(19), Ok(0));
//! assert_eq!(map.get_value(22), Err(RangeMapError::KeyExcluded));
//! assert_eq!(map.get_value(25), Ok(5));
//! ```

mod config;
mod error;
pub mod logging;
mod munger;
mod packet;
mod range_map;
mod registry;
pub mod serial;
mod types;

pub use config::{ForwarderConfig, LoggingConfig};
pub use error::{MungeError, RangeMapError};
pub use munger::{MungerStats, SequenceMunger, SequenceUnwrapper};
pub use packet::ForwardablePacket;
pub use range_map::{MappedRange, RangeMap};
pub use registry::StreamRegistry;
pub use serial::{RangeValue, SerialKey};
pub use types::TrackId;

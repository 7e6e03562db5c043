//! Stream registry - one sequence munger per forwarded track
//!
//! The forwarding pipeline looks up the munger of a track here and holds its
//! lock for the duration of a single packet. The mungers themselves are not
//! synchronized.

use crate::config::ForwarderConfig;
use crate::error::MungeError;
use crate::munger::{MungerStats, SequenceMunger};
use crate::packet::ForwardablePacket;
use crate::types::TrackId;
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of per-track sequence mungers
pub struct StreamRegistry {
    config: Arc<ForwarderConfig>,

    streams: DashMap<TrackId, Arc<Mutex<SequenceMunger>>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new(config: ForwarderConfig) -> Self {
        info!(
            sequence_history = config.sequence_history,
            max_streams = config.max_streams,
            "Stream registry initialized"
        );

        Self {
            config: Arc::new(config),
            streams: DashMap::new(),
        }
    }

    /// Get or create the munger for a track
    pub fn get_or_create(&self, track_id: &TrackId) -> Result<Arc<Mutex<SequenceMunger>>> {
        if let Some(stream) = self.streams.get(track_id) {
            return Ok(Arc::clone(stream.value()));
        }

        // Enforce stream limit (0 = unlimited)
        if self.config.max_streams > 0 && self.streams.len() >= self.config.max_streams {
            warn!(
                track_id = %track_id,
                current_streams = self.streams.len(),
                max_streams = self.config.max_streams,
                "Stream limit reached"
            );
            return Err(anyhow!("Maximum number of forwarded streams reached"));
        }

        let stream = self
            .streams
            .entry(track_id.clone())
            .or_insert_with(|| {
                debug!(track_id = %track_id, "Created sequence munger");
                Arc::new(Mutex::new(SequenceMunger::new(self.config.sequence_history)))
            })
            .value()
            .clone();

        Ok(stream)
    }

    /// Translate a packet of a track, creating the track's munger on first use
    ///
    /// The outer error is a registry failure; the inner one is the
    /// per-packet outcome from the munger.
    pub fn translate(
        &self,
        track_id: &TrackId,
        packet: &ForwardablePacket,
    ) -> Result<std::result::Result<ForwardablePacket, MungeError>> {
        let stream = self.get_or_create(track_id)?;
        let result = stream.lock().translate(packet);

        if let Err(MungeError::Inconsistent(e)) = &result {
            warn!(track_id = %track_id, error = %e, "Sequence map inconsistent");
        }

        Ok(result)
    }

    /// Mark the upstream of a track as restarted
    pub fn restart(&self, track_id: &TrackId) -> Result<()> {
        let stream = self
            .streams
            .get(track_id)
            .ok_or_else(|| anyhow!("Stream not found"))?;
        stream.value().lock().restart();

        info!(track_id = %track_id, "Restarted stream");
        Ok(())
    }

    /// Stop tracking a track; returns whether it was tracked
    pub fn remove(&self, track_id: &TrackId) -> bool {
        let removed = self.streams.remove(track_id).is_some();
        if removed {
            debug!(track_id = %track_id, remaining = self.streams.len(), "Removed stream");
        }
        removed
    }

    #[must_use]
    pub fn stats(&self, track_id: &TrackId) -> Option<MungerStats> {
        self.streams
            .get(track_id)
            .map(|stream| stream.value().lock().stats())
    }

    #[must_use]
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.streams.iter().map(|entry| entry.key().clone()).collect()
    }

    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn media(ssrc: u32, sn: u16) -> ForwardablePacket {
        ForwardablePacket::new(ssrc, sn, 0, Bytes::from_static(b"media"))
    }

    #[test]
    fn test_stream_lifecycle() {
        let registry = StreamRegistry::new(ForwarderConfig::default());
        let track_id = TrackId::from("video-1");

        let stream = registry.get_or_create(&track_id).unwrap();
        let again = registry.get_or_create(&track_id).unwrap();
        assert!(Arc::ptr_eq(&stream, &again));
        assert_eq!(registry.stream_count(), 1);
        assert_eq!(registry.track_ids(), vec![track_id.clone()]);

        assert!(registry.remove(&track_id));
        assert!(!registry.remove(&track_id));
        assert_eq!(registry.stream_count(), 0);
    }

    #[test]
    fn test_stream_limit() {
        let config = ForwarderConfig {
            max_streams: 2,
            ..Default::default()
        };
        let registry = StreamRegistry::new(config);

        registry.get_or_create(&TrackId::from("a")).unwrap();
        registry.get_or_create(&TrackId::from("b")).unwrap();
        assert!(registry.get_or_create(&TrackId::from("c")).is_err());

        // existing streams stay reachable at the limit
        assert!(registry.get_or_create(&TrackId::from("a")).is_ok());
    }

    #[test]
    fn test_translate_and_stats() {
        let registry = StreamRegistry::new(ForwarderConfig::default());
        let audio = TrackId::from("audio");
        let video = TrackId::from("video");

        let out = registry.translate(&audio, &media(1, 10)).unwrap().unwrap();
        assert_eq!(out.sequence_number, 10);

        let padding = ForwardablePacket::new(1, 11, 0, Bytes::new());
        assert_eq!(
            registry.translate(&audio, &padding).unwrap(),
            Err(MungeError::PaddingDropped)
        );
        let out = registry.translate(&audio, &media(1, 12)).unwrap().unwrap();
        assert_eq!(out.sequence_number, 11);

        // tracks are independent
        let out = registry.translate(&video, &media(2, 12)).unwrap().unwrap();
        assert_eq!(out.sequence_number, 12);

        let stats = registry.stats(&audio).unwrap();
        assert_eq!(stats.packets_forwarded, 2);
        assert_eq!(stats.padding_dropped, 1);
        assert!(registry.stats(&TrackId::from("missing")).is_none());
    }

    #[test]
    fn test_restart() {
        let registry = StreamRegistry::new(ForwarderConfig::default());
        let track_id = TrackId::from("screen");
        assert!(registry.restart(&track_id).is_err());

        registry.translate(&track_id, &media(1, 100)).unwrap().unwrap();
        registry.restart(&track_id).unwrap();

        let out = registry.translate(&track_id, &media(1, 5000)).unwrap().unwrap();
        assert_eq!(out.sequence_number, 101);
        assert_eq!(registry.stats(&track_id).unwrap().restarts, 1);
    }
}

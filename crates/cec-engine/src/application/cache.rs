//! Short-lived memo of replies peers volunteered out of band.
//!
//! Some peers broadcast their physical address, name, or vendor id without
//! being asked.  Caching the last such frame per (peer, opcode) lets a
//! discovery stage consume the answer directly: no bus query, no timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cec_core::{CecFrame, LogicalAddress, Opcode};

/// Default entry lifetime: twice the per-stage reply timeout, so an answer
/// volunteered just before a query would have been sent still counts.
pub const DEFAULT_TTL: Duration = Duration::from_millis(4000);

/// Bounded-lifetime memo of the last frame of a given opcode seen from a
/// given peer.  Only discovery-reply opcodes are retained.
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<(LogicalAddress, Opcode), (CecFrame, Instant)>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns `true` for opcodes worth memoizing: the replies the discovery
    /// stages wait for.
    pub const fn is_cacheable(opcode: Opcode) -> bool {
        matches!(
            opcode,
            Opcode::ReportPhysicalAddress | Opcode::SetOsdName | Opcode::DeviceVendorId
        )
    }

    /// Memoizes `frame` if its opcode is cacheable; otherwise a no-op.
    /// A newer frame from the same peer replaces the old entry.
    pub fn put(&mut self, frame: &CecFrame) {
        if Self::is_cacheable(frame.opcode()) {
            self.entries
                .insert((frame.source(), frame.opcode()), (frame.clone(), Instant::now()));
        }
    }

    /// Takes the cached frame for `(peer, opcode)` if one exists and is still
    /// within its lifetime.  Expired entries are pruned on access.
    pub fn take(&mut self, peer: LogicalAddress, opcode: Opcode) -> Option<CecFrame> {
        match self.entries.remove(&(peer, opcode)) {
            Some((frame, stored_at)) if stored_at.elapsed() <= self.ttl => Some(frame),
            _ => None,
        }
    }

    /// Drops all entries (device reset).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cec_core::{DeviceType, PhysicalAddress};

    fn addr(n: u8) -> LogicalAddress {
        LogicalAddress::new(n).unwrap()
    }

    fn report_frame(from: u8) -> CecFrame {
        CecFrame::report_physical_address(
            addr(from),
            PhysicalAddress::new(0x1000),
            DeviceType::Playback,
        )
    }

    #[test]
    fn test_put_then_take_returns_the_frame_once() {
        let mut cache = ResponseCache::default();
        cache.put(&report_frame(4));

        let hit = cache.take(addr(4), Opcode::ReportPhysicalAddress);
        assert!(hit.is_some());

        // Consumed: a second take misses.
        assert!(cache.take(addr(4), Opcode::ReportPhysicalAddress).is_none());
    }

    #[test]
    fn test_take_is_keyed_by_peer_and_opcode() {
        let mut cache = ResponseCache::default();
        cache.put(&report_frame(4));

        assert!(cache.take(addr(3), Opcode::ReportPhysicalAddress).is_none());
        assert!(cache.take(addr(4), Opcode::SetOsdName).is_none());
    }

    #[test]
    fn test_non_cacheable_opcodes_are_not_retained() {
        let mut cache = ResponseCache::default();
        cache.put(&CecFrame::give_osd_name(addr(0), addr(4)));
        assert!(cache.take(addr(0), Opcode::GiveOsdName).is_none());
    }

    #[test]
    fn test_expired_entries_miss() {
        let mut cache = ResponseCache::new(Duration::ZERO);
        cache.put(&report_frame(4));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.take(addr(4), Opcode::ReportPhysicalAddress).is_none());
    }

    #[test]
    fn test_newer_frame_replaces_older_entry() {
        let mut cache = ResponseCache::default();
        let older = CecFrame::set_osd_name(addr(4), addr(0), "Old").unwrap();
        let newer = CecFrame::set_osd_name(addr(4), addr(0), "New").unwrap();
        cache.put(&older);
        cache.put(&newer);

        let hit = cache.take(addr(4), Opcode::SetOsdName).unwrap();
        assert_eq!(hit.params(), b"New");
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = ResponseCache::default();
        cache.put(&report_frame(4));
        cache.clear();
        assert!(cache.take(addr(4), Opcode::ReportPhysicalAddress).is_none());
    }
}

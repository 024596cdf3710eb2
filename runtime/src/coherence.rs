//! Tile Coherence Directory (spec §4.1, C1).
//!
//! Grounded in `base->rset`/`wset`/`dist` indexed by
//! `offm/BLOCK_SIZE, offn/BLOCK_SIZE` in `cj.c`'s
//! `cj_Task_dependency_analysis`/`cj_Worker_execute`/`cj_Worker_fetch`.

use crate::device::{DeviceRegistry, HOST};
use crate::graph::TaskId;
use crate::tile::TileId;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One location in a tile's coherence entry: a device id (host = -1) and,
/// for non-host devices, the cache slot holding the copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub device: i32,
    pub slot: Option<crate::cache::SlotId>,
}

struct CoherenceEntry {
    /// Head (index 0) is authoritative, per spec §3 invariant.
    locations: Vec<Location>,
    readers: HashSet<TaskId>,
    writer: Option<TaskId>,
}

impl CoherenceEntry {
    fn fresh_on_host() -> Self {
        Self {
            locations: vec![Location { device: HOST, slot: None }],
            readers: HashSet::new(),
            writer: None,
        }
    }
}

/// Per-tile state tracking where the authoritative copy lives, plus the
/// reader/writer bookkeeping the dependency analyser consults.
///
/// The per-tile `Mutex` is the "tile lock" in the lock-ordering discipline
/// of spec §5. Newly-seen tiles are assumed to start resident on the host
/// (a freshly allocated base matrix lives in host memory until a task
/// moves it), matching `dist[...]` being initialised to a single CPU
/// distribution entry in the original.
pub struct CoherenceDirectory {
    entries: RwLock<HashMap<TileId, Arc<Mutex<CoherenceEntry>>>>,
}

impl CoherenceDirectory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, tile: TileId) -> Arc<Mutex<CoherenceEntry>> {
        if let Some(e) = self.entries.read().get(&tile) {
            return e.clone();
        }
        self.entries
            .write()
            .entry(tile)
            .or_insert_with(|| Arc::new(Mutex::new(CoherenceEntry::fresh_on_host())))
            .clone()
    }

    // --- Dependency analyser hooks (spec §4.2) -----------------------

    pub(crate) fn last_writer(&self, tile: TileId) -> Option<TaskId> {
        self.entry(tile).lock().writer
    }

    pub(crate) fn readers_since_last_writer(&self, tile: TileId) -> Vec<TaskId> {
        self.entry(tile).lock().readers.iter().copied().collect()
    }

    pub(crate) fn record_read(&self, tile: TileId, task: TaskId) {
        self.entry(tile).lock().readers.insert(task);
    }

    pub(crate) fn record_write(&self, tile: TileId, task: TaskId) {
        let mut e = self.entry(tile).lock();
        e.readers.clear();
        e.writer = Some(task);
    }

    // --- Worker runtime hooks (spec §4.1, §4.5) ----------------------

    /// Returns the location holding `tile` on `device`, if any copy already
    /// exists there.
    pub fn latest_on(&self, tile: TileId, device: i32, _devices: &DeviceRegistry) -> Option<Location> {
        self.entry(tile).lock().locations.iter().find(|l| l.device == device).copied()
    }

    /// Ensures `device` holds a valid copy of `tile`, writing back from the
    /// current authoritative location through the host first if needed.
    /// Returns the binding (device, slot) the worker should read/write
    /// through.
    pub fn materialise_on(
        &self,
        tile: TileId,
        device: i32,
        devices: &DeviceRegistry,
    ) -> crate::error::CjResult<Location> {
        let entry_arc = self.entry(tile);
        let mut e = entry_arc.lock();

        if let Some(loc) = e.locations.iter().find(|l| l.device == device) {
            if let Some(cache) = devices.cache_of(device) {
                if let Some(slot) = loc.slot {
                    cache.touch(slot);
                }
            }
            return Ok(*loc);
        }

        let head = e.locations[0];
        if head.device != HOST {
            // Write back to host before fetching elsewhere, since the host
            // is the staging ground for every device-to-device move
            // (spec §4.1: "ensure host has a copy").
            if let Some(head_cache) = devices.cache_of(head.device) {
                if let Some(slot) = head.slot {
                    head_cache.write_back(slot);
                }
            }
            if !e.locations.iter().any(|l| l.device == HOST) {
                e.locations.push(Location { device: HOST, slot: None });
            }
        }

        let (new_loc, evicted) = if device == HOST {
            (Location { device: HOST, slot: None }, None)
        } else {
            let cache = devices
                .cache_of(device)
                .expect("materialise_on called with an unregistered device");
            let (slot, evicted) = cache.fetch(tile)?;
            (Location { device, slot: Some(slot) }, evicted)
        };
        e.locations.insert(0, new_loc);
        // Drop this tile's lock before touching another tile's entry below —
        // the lock-ordering discipline (spec §5) only orders locks of the
        // same kind by acquisition, never nesting; two tiles racing to
        // evict each other's slots must not each hold their own lock while
        // waiting on the other's.
        drop(e);

        if let Some(evicted_tile) = evicted {
            self.forget_device_copy(evicted_tile, device);
        }
        Ok(new_loc)
    }

    /// Drops `device` from `tile`'s location list after its cache slot was
    /// repurposed by an unrelated `fetch`'s LRU eviction. If that was the
    /// tile's only location, the dirty write-back `fetch` just performed
    /// means the authoritative copy is now on the host (spec §4.6: write
    /// back before reuse).
    fn forget_device_copy(&self, tile: TileId, device: i32) {
        let entry_arc = self.entry(tile);
        let mut e = entry_arc.lock();
        e.locations.retain(|l| l.device != device);
        if e.locations.is_empty() {
            e.locations.push(Location { device: HOST, slot: None });
        }
    }

    /// Collapses the coherence entry to a single authoritative location on
    /// `device` after a write, invalidating every other cache slot that
    /// used to hold the tile (spec §4.1 `mark_written_by`).
    pub fn mark_written_by(&self, tile: TileId, device: i32, slot: Option<crate::cache::SlotId>, devices: &DeviceRegistry) {
        let entry_arc = self.entry(tile);
        let mut e = entry_arc.lock();
        let stale: Vec<Location> = e.locations.iter().filter(|l| l.device != device).copied().collect();
        for loc in stale {
            if let Some(cache) = devices.cache_of(loc.device) {
                cache.invalidate(tile);
            }
        }
        if device != HOST {
            if let Some(cache) = devices.cache_of(device) {
                if let Some(slot) = slot {
                    cache.mark_dirty(slot);
                }
            }
        }
        e.locations = vec![Location { device, slot }];
    }

    /// Total number of locations (authoritative plus stale copies) recorded
    /// for a tile — used by property tests; see `authoritative_device` for
    /// spec §8 property 7, which only concerns the head of this list.
    pub fn location_count(&self, tile: TileId) -> usize {
        self.entry(tile).lock().locations.len()
    }

    pub fn authoritative_device(&self, tile: TileId) -> i32 {
        self.entry(tile).lock().locations[0].device
    }
}

impl Default for CoherenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRegistry;
    use crate::tile::BaseId;

    fn tile(n: u32) -> TileId {
        TileId { base: BaseId(0), row: 0, col: n }
    }

    #[test]
    fn eviction_invalidates_the_evicted_tiles_location() {
        let mut devices = DeviceRegistry::new();
        devices.add_accelerator(0, 1, 128, 1e9);
        let coherence = CoherenceDirectory::new();

        let loc0 = coherence.materialise_on(tile(0), 0, &devices).unwrap();
        coherence.mark_written_by(tile(0), 0, loc0.slot, &devices);
        assert_eq!(coherence.authoritative_device(tile(0)), 0);

        // Single-slot cache: materialising a second tile evicts tile 0's
        // dirty, sole-copy slot.
        coherence.materialise_on(tile(1), 0, &devices).unwrap();

        // Tile 0's device copy is gone; the directory must not still claim
        // it lives in the slot that now holds tile 1.
        assert_eq!(coherence.authoritative_device(tile(0)), HOST);
        assert_eq!(coherence.location_count(tile(0)), 1);
        assert_eq!(coherence.authoritative_device(tile(1)), 0);
    }
}

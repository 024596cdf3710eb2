//! Device cache (spec §4.6 / C2): a fixed-size slot table on one device.
//!
//! Grounded in `cj_Device.c`'s `device->cache` (fixed `CACHE_LINE` array of
//! `{status, last_use, dev_ptr}`) and the eviction/write-back logic inlined
//! in `cj_Worker_fetch`/`cj_Worker_execute` in `cj.c`.

use crate::error::{CjError, CjResult};
use crate::tile::TileId;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Observable status of a slot, per spec §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    Clean,
    Dirty,
    Pinned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

struct Slot {
    dirty: bool,
    pin_count: u32,
    last_use: u64,
    tile: Option<TileId>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            dirty: false,
            pin_count: 0,
            last_use: 0,
            tile: None,
        }
    }

    fn status(&self) -> SlotStatus {
        if self.pin_count > 0 {
            SlotStatus::Pinned
        } else if self.dirty {
            SlotStatus::Dirty
        } else {
            SlotStatus::Clean
        }
    }

    fn evictable(&self) -> bool {
        self.pin_count == 0
    }
}

struct Inner {
    slots: Vec<Slot>,
    clock: u64,
}

/// A fixed-capacity set of cache slots on one accelerator device.
///
/// `fetch`/`write_back` simulate the data transfer (they do not move real
/// bytes — moving bytes is the job of the external kernel/allocator
/// collaborator, spec §1); the cache only tracks *which* tile occupies
/// which slot and in what state, which is exactly what the coherence
/// directory needs to decide whether a materialisation is required.
pub struct DeviceCache {
    pub device: i32,
    pub line_bytes: usize,
    inner: Mutex<Inner>,
    freed: Condvar,
}

impl DeviceCache {
    pub fn new(device: i32, slot_count: usize, line_bytes: usize) -> Self {
        Self {
            device,
            line_bytes,
            inner: Mutex::new(Inner {
                slots: (0..slot_count).map(|_| Slot::empty()).collect(),
                clock: 0,
            }),
            freed: Condvar::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns the slot currently holding `tile`, if any, touching it.
    pub fn find(&self, tile: TileId) -> Option<SlotId> {
        let mut inner = self.inner.lock();
        let clock = inner.clock;
        inner.clock += 1;
        let idx = inner.slots.iter().position(|s| s.tile == Some(tile))?;
        inner.slots[idx].last_use = clock;
        Some(SlotId(idx))
    }

    /// Status of a slot, for diagnostics/tests.
    pub fn status_of(&self, slot: SlotId) -> SlotStatus {
        self.inner.lock().slots[slot.0].status()
    }

    /// Finds or evicts a slot for `tile` and binds it, host→device copy
    /// simulated by the caller after this returns. Blocks (with a bounded
    /// wait, see `CjError::CacheExhausted`) if every slot is pinned.
    ///
    /// When eviction repurposes a slot that held a different tile, that
    /// tile's identity is returned alongside the slot so the caller (the
    /// coherence directory) can drop its now-stale location for that slot
    /// (spec §4.1/§4.6: a slot holds at most one tile's copy at a time).
    pub fn fetch(&self, tile: TileId) -> CjResult<(SlotId, Option<TileId>)> {
        if let Some(slot) = self.find(tile) {
            return Ok((slot, None));
        }
        let mut inner = self.inner.lock();
        loop {
            if let Some(idx) = Self::pick_victim(&inner.slots) {
                let evicted = inner.slots[idx].tile;
                Self::write_back_locked(&mut inner, idx, self.device);
                let clock = inner.clock;
                inner.clock += 1;
                inner.slots[idx] = Slot {
                    dirty: false,
                    pin_count: 0,
                    last_use: clock,
                    tile: Some(tile),
                };
                log::debug!(
                    "device {} fetch: tile {} -> slot {} (evicted {:?})",
                    self.device,
                    tile,
                    idx,
                    evicted
                );
                return Ok((SlotId(idx), evicted));
            }
            // Every slot pinned: wait for one to free, bounded so the
            // caller can detect a pin-graph deadlock instead of hanging
            // forever (spec §4.8).
            let timed_out = self
                .freed
                .wait_for(&mut inner, Duration::from_millis(50))
                .timed_out();
            if timed_out {
                return Err(CjError::CacheExhausted { device: self.device });
            }
        }
    }

    fn pick_victim(slots: &[Slot]) -> Option<usize> {
        slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.evictable())
            .min_by_key(|(_, s)| s.last_use)
            .map(|(i, _)| i)
    }

    /// Copies device→host for a dirty slot and marks it clean. Writing the
    /// real bytes back is the host-side kernel/allocator's job; this only
    /// flips the bookkeeping the coherence directory relies on.
    pub fn write_back(&self, slot: SlotId) {
        let mut inner = self.inner.lock();
        Self::write_back_locked(&mut inner, slot.0, self.device);
    }

    /// Shared by `write_back` and the eviction path in `fetch`, which
    /// already holds `inner`'s lock and must not re-enter it.
    fn write_back_locked(inner: &mut Inner, idx: usize, device: i32) {
        if let Some(s) = inner.slots.get_mut(idx) {
            if s.dirty {
                log::debug!("device {} write-back slot {}", device, idx);
            }
            s.dirty = false;
        }
    }

    pub fn mark_dirty(&self, slot: SlotId) {
        self.inner.lock().slots[slot.0].dirty = true;
    }

    pub fn touch(&self, slot: SlotId) {
        let mut inner = self.inner.lock();
        let clock = inner.clock;
        inner.clock += 1;
        inner.slots[slot.0].last_use = clock;
    }

    pub fn pin(&self, slot: SlotId) {
        self.inner.lock().slots[slot.0].pin_count += 1;
    }

    pub fn unpin(&self, slot: SlotId) {
        let mut inner = self.inner.lock();
        let s = &mut inner.slots[slot.0];
        assert!(s.pin_count > 0, "unpin of slot {} with zero pin count", slot.0);
        s.pin_count -= 1;
        if s.pin_count == 0 {
            drop(inner);
            self.freed.notify_all();
        }
    }

    /// Invalidates (clears) the slot backing `tile`, if any is resident and
    /// unpinned. Used by `mark_written_by` on every non-authoritative
    /// location after a write collapses the coherence entry.
    pub fn invalidate(&self, tile: TileId) {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.slots.iter().position(|s| s.tile == Some(tile)) {
            if inner.slots[idx].pin_count == 0 {
                inner.slots[idx] = Slot::empty();
            }
        }
    }
}

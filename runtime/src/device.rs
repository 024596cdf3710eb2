//! Devices: the host plus zero or more accelerators, each owning a
//! `DeviceCache` (spec §3 "Device cache", §4.6).
//!
//! Grounded in `cj_Device_new`/`cj.device[i]` in `cj_Device.c`/`cj.c`: the
//! original keeps a flat `cj.device[]` array indexed by device id with
//! `-1` reserved for the host. The rewrite keeps the same `-1` sentinel
//! (spec §3: "device (host = −1)") rather than inventing an `Option` wrapper
//! everywhere `-1` already means something to the cost model and coherence
//! directory.

use crate::cache::DeviceCache;
use std::collections::HashMap;

/// Sentinel device id for the host, matching spec §3 literally.
pub const HOST: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Host,
    Accelerator,
}

struct DeviceEntry {
    kind: DeviceKind,
    cache: Option<DeviceCache>,
    /// Bytes/sec of the host<->device link, supplied by the autotuner
    /// (spec §4.3, §6). Unused for the host entry itself.
    link_bandwidth: f64,
}

/// Registry of devices known to a session: the host and the accelerators
/// passed to `init`.
pub struct DeviceRegistry {
    devices: HashMap<i32, DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let mut devices = HashMap::new();
        devices.insert(
            HOST,
            DeviceEntry {
                kind: DeviceKind::Host,
                cache: None,
                link_bandwidth: f64::INFINITY,
            },
        );
        Self { devices }
    }

    pub fn add_accelerator(&mut self, id: i32, slot_count: usize, line_bytes: usize, link_bandwidth: f64) {
        assert_ne!(id, HOST, "device id {HOST} is reserved for the host");
        self.devices.insert(
            id,
            DeviceEntry {
                kind: DeviceKind::Accelerator,
                cache: Some(DeviceCache::new(id, slot_count, line_bytes)),
                link_bandwidth,
            },
        );
    }

    pub fn kind_of(&self, device: i32) -> DeviceKind {
        self.devices
            .get(&device)
            .map(|d| d.kind)
            .unwrap_or(DeviceKind::Host)
    }

    pub fn cache_of(&self, device: i32) -> Option<&DeviceCache> {
        self.devices.get(&device).and_then(|d| d.cache.as_ref())
    }

    pub fn link_bandwidth(&self, device: i32) -> f64 {
        self.devices
            .get(&device)
            .map(|d| d.link_bandwidth)
            .unwrap_or(f64::INFINITY)
    }

    pub fn accelerator_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .devices
            .iter()
            .filter(|(_, d)| d.kind == DeviceKind::Accelerator)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Cost Model (spec §4.3, C5): estimated wall-time for a (task, worker) pair.
//!
//! Grounded in `cj_Worker_estimate_cost` in `cj.c`, which sums a
//! `model->{mkl,cublas}_{s,d}gemm` compute constant with a `pci_bandwidth`
//! transfer cost for every argument not already resident on the candidate
//! worker's device.

use crate::coherence::CoherenceDirectory;
use crate::device::{DeviceKind, DeviceRegistry, HOST};
use crate::graph::Task;
use crate::tile::{BaseMatrix, ElementType};
use std::collections::HashMap;

/// External collaborator (spec §6): supplies compute/link coefficients.
/// `StaticAutotuner` below is a fixed-coefficient stand-in suitable for
/// tests and for clients that have not wired in a real autotuner.
pub trait Autotuner: Send + Sync {
    fn compute_seconds(&self, kernel: &str, elem: ElementType, device_kind: DeviceKind) -> f64;
}

pub struct StaticAutotuner {
    pub default_compute_seconds: f64,
}

impl StaticAutotuner {
    pub fn new(default_compute_seconds: f64) -> Self {
        Self { default_compute_seconds }
    }
}

impl Default for StaticAutotuner {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Autotuner for StaticAutotuner {
    fn compute_seconds(&self, _kernel: &str, _elem: ElementType, _device_kind: DeviceKind) -> f64 {
        self.default_compute_seconds
    }
}

/// Deterministic per-(task, worker) time estimator. Coarse by design
/// (spec §4.3): no contention modelling, just compute + transfer.
pub struct CostModel<'a> {
    autotuner: &'a dyn Autotuner,
}

impl<'a> CostModel<'a> {
    pub fn new(autotuner: &'a dyn Autotuner) -> Self {
        Self { autotuner }
    }

    /// Estimated wall-time in seconds to run `task` on `device`, given the
    /// coherence directory's current snapshot. `bases` supplies tile byte
    /// sizes (element type × tile side²) for the transfer term.
    pub fn estimate(
        &self,
        task: &Task,
        device: i32,
        devices: &DeviceRegistry,
        coherence: &CoherenceDirectory,
        bases: &HashMap<crate::tile::BaseId, BaseMatrix>,
    ) -> f64 {
        let kind = devices.kind_of(device);
        let elem = task
            .args
            .first()
            .and_then(|a| bases.get(&a.tile.base))
            .map(|b| b.elem_type)
            .unwrap_or(ElementType::Double);
        let mut cost = self.autotuner.compute_seconds(task.kernel_label, elem, kind);

        for arg in &task.args {
            if coherence.latest_on(arg.tile, device, devices).is_some() {
                continue;
            }
            let bytes = bases.get(&arg.tile.base).map(|b| b.tile_bytes()).unwrap_or(0);
            let link = if device == HOST {
                // Host-bound transfer is billed against whichever device
                // currently holds the authoritative copy (spec §4.3).
                devices.link_bandwidth(coherence.authoritative_device(arg.tile))
            } else {
                devices.link_bandwidth(device)
            };
            if link.is_finite() && link > 0.0 {
                cost += bytes as f64 / link;
            }
        }
        cost
    }
}


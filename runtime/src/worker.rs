//! Worker Runtime (spec §4.5, C7): stages operands, executes a task's
//! kernel, and commits the result.
//!
//! Grounded in `cj_Worker_execute`/`cj_Worker_fetch` in `cj.c`. The kernel
//! itself is an external collaborator (spec §6); per the redesign note in
//! spec.md §9 it is a capability object (`Kernel::execute`) rather than the
//! original's raw `void (*function)(void*)` function pointer.

use crate::coherence::CoherenceDirectory;
use crate::device::{DeviceKind, DeviceRegistry, HOST};
use crate::error::CjResult;
use crate::graph::{Task, TaskId};
use crate::tile::{AccessMode, TileId};

/// Where one of a task's tile arguments ended up bound for execution.
#[derive(Clone, Copy, Debug)]
pub struct Binding {
    pub tile: TileId,
    pub mode: AccessMode,
    pub device: i32,
    pub slot: Option<crate::cache::SlotId>,
}

/// What a kernel sees: the task's resolved argument bindings. Kernels read
/// buffer pointers out of the coherence directory entries bound here, not
/// out of the task's raw argument list (spec §6).
pub struct TaskContext<'a> {
    pub task_id: TaskId,
    pub kernel_label: &'a str,
    pub bindings: &'a [Binding],
    pub device: i32,
}

impl<'a> TaskContext<'a> {
    pub fn binding_for(&self, tile: TileId) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.tile == tile)
    }
}

/// A kernel is any callable that can execute a task given its resolved
/// bindings. Implementations must not write through `R` operands (spec §6).
pub trait Kernel: Send + Sync {
    fn execute(&self, ctx: &TaskContext) -> CjResult<()>;
}

/// A kernel that does nothing but succeed; useful for tests that only
/// care about scheduling and coherence, not numerics.
pub struct NoopKernel;

impl Kernel for NoopKernel {
    fn execute(&self, _ctx: &TaskContext) -> CjResult<()> {
        Ok(())
    }
}

/// Adapts a plain closure to the `Kernel` trait.
pub struct FnKernel<F>(pub F)
where
    F: Fn(&TaskContext) -> CjResult<()> + Send + Sync;

impl<F> Kernel for FnKernel<F>
where
    F: Fn(&TaskContext) -> CjResult<()> + Send + Sync,
{
    fn execute(&self, ctx: &TaskContext) -> CjResult<()> {
        (self.0)(ctx)
    }
}

/// Static description of a worker: its id, device kind, and bound device
/// (host workers bind to `HOST`). Worker 0 is reserved for
/// submission/coordination and never appears in a `WorkerPool`'s
/// executable set (spec §4.4).
#[derive(Clone, Copy, Debug)]
pub struct WorkerSpec {
    pub id: usize,
    pub device_kind: DeviceKind,
    pub device_id: i32,
}

impl WorkerSpec {
    pub fn cpu(id: usize) -> Self {
        Self {
            id,
            device_kind: DeviceKind::Host,
            device_id: HOST,
        }
    }

    pub fn accelerator(id: usize, device_id: i32) -> Self {
        Self {
            id,
            device_kind: DeviceKind::Accelerator,
            device_id,
        }
    }
}

/// Runs one task on `worker` to completion: stage, execute, commit (spec
/// §4.5 steps 2–4). Step 1 (set `Running`) and step 5 (decrement
/// successors) are the scheduler/session's job since they touch the graph,
/// not just this task.
pub fn run_task(
    task: &Task,
    worker: &WorkerSpec,
    coherence: &CoherenceDirectory,
    devices: &DeviceRegistry,
) -> CjResult<()> {
    let mut bindings = Vec::with_capacity(task.args.len());
    for arg in &task.args {
        let loc = coherence.materialise_on(arg.tile, worker.device_id, devices)?;
        if let (Some(cache), Some(slot)) = (devices.cache_of(worker.device_id), loc.slot) {
            cache.pin(slot);
        }
        bindings.push(Binding {
            tile: arg.tile,
            mode: arg.mode,
            device: loc.device,
            slot: loc.slot,
        });
    }

    let ctx = TaskContext {
        task_id: task.id,
        kernel_label: task.kernel_label,
        bindings: &bindings,
        device: worker.device_id,
    };
    let result = task.kernel.execute(&ctx);

    for b in &bindings {
        if let (Some(cache), Some(slot)) = (devices.cache_of(worker.device_id), b.slot) {
            cache.unpin(slot);
        }
    }
    result?;

    for b in &bindings {
        if b.mode.writes() {
            coherence.mark_written_by(b.tile, worker.device_id, b.slot, devices);
        }
    }
    Ok(())
}

//! Heterogeneous task-parallel runtime core for tiled dense linear algebra.
//!
//! Clients register base matrices, submit tasks that reference tiles of
//! those matrices under a read/write access mode, and let the runtime
//! derive the dependency graph, schedule tasks onto workers, and keep each
//! tile coherent across the host and any accelerators.

mod analyser;
mod cache;
mod coherence;
mod cost;
mod device;
mod diagnostics;
mod error;
mod graph;
mod scheduler;
mod session;
mod tile;
mod worker;

pub use cache::{DeviceCache, SlotId, SlotStatus};
pub use coherence::{CoherenceDirectory, Location};
pub use cost::{Autotuner, CostModel, StaticAutotuner};
pub use device::{DeviceKind, DeviceRegistry, HOST};
pub use error::{CjError, CjResult};
pub use graph::{DepKind, Task, TaskGraph, TaskId, TaskStatus};
pub use session::{AcceleratorConfig, RuntimeConfig, Session, TermReport};
pub use tile::{AccessMode, BaseId, BaseMatrix, ElementType, MatrixRef, TileId};
pub use worker::{Binding, FnKernel, Kernel, NoopKernel, TaskContext, WorkerSpec};

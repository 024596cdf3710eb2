//! `GemmKernel`: a `cj_runtime::Kernel` performing `C += A^T * B` over a
//! tile backing store this crate owns. The runtime core never looks at
//! bytes (spec.md §1); kernels that need real numerics own their own
//! buffers and read tile identity/device binding off the `TaskContext`.

use crate::opac::mat_mul;
use cj_runtime::{CjError, CjResult, Kernel, TaskContext, TileId};
use ndarray::Array2;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Backing store for tile contents, keyed by tile identity. Standing in
/// for the allocator/indexing collaborator spec.md §1 places out of scope.
pub struct TileStore {
    tiles: Mutex<HashMap<TileId, Array2<f32>>>,
}

impl TileStore {
    pub fn new() -> Self {
        Self {
            tiles: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, tile: TileId, data: Array2<f32>) {
        self.tiles.lock().insert(tile, data);
    }

    pub fn get(&self, tile: TileId) -> CjResult<Array2<f32>> {
        self.tiles
            .lock()
            .get(&tile)
            .cloned()
            .ok_or_else(|| CjError::InvalidArgument {
                func: "TileStore::get",
                msg: format!("tile {tile} has no backing data"),
            })
    }

    pub fn set(&self, tile: TileId, data: Array2<f32>) {
        self.tiles.lock().insert(tile, data);
    }
}

impl Default for TileStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile-granularity multiply-accumulate: `c += a^T * b`. Expects exactly
/// three bound arguments in declared order: `a` (R), `b` (R), `c` (RW).
///
/// Holds its own `Arc<TileStore>` rather than borrowing one, so it can be
/// shared across worker threads as a `Arc<dyn Kernel>` (spec §6).
pub struct GemmKernel {
    pub store: Arc<TileStore>,
}

impl GemmKernel {
    pub fn new(store: Arc<TileStore>) -> Self {
        Self { store }
    }
}

impl Kernel for GemmKernel {
    fn execute(&self, ctx: &TaskContext) -> CjResult<()> {
        if ctx.bindings.len() != 3 {
            return Err(CjError::KernelFailed {
                task: ctx.task_id,
                reason: format!(
                    "gemm expects exactly 3 tile arguments (a, b, c), got {}",
                    ctx.bindings.len()
                ),
            });
        }

        let a = self.store.get(ctx.bindings[0].tile)?;
        let b = self.store.get(ctx.bindings[1].tile)?;
        let c_tile = ctx.bindings[2].tile;

        let product = mat_mul(a.t(), b.view());
        let mut c = self.store.get(c_tile)?;
        c += &product;
        self.store.set(c_tile, c);
        Ok(())
    }
}

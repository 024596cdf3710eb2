//! Tile identity and matrix-reference task arguments (spec data model, §3).
//!
//! Allocation and indexing of the underlying numeric buffers is an external
//! collaborator (out of scope, spec §1); this module only carries the
//! identity and shape information the dependency analyser, cost model and
//! coherence directory need.

use std::fmt;

/// Element type of a base matrix. Kept narrow on purpose: the runtime never
/// interprets the bytes, only their size for cache slot sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Single,
    Double,
}

impl ElementType {
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::Single => 4,
            ElementType::Double => 8,
        }
    }
}

/// Identity of a base matrix, assigned by the client when it registers one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseId(pub u32);

/// Identity of a tile: `(base matrix id, tile row index, tile column index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub base: BaseId,
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}({},{})", self.base.0, self.row, self.col)
    }
}

/// Access mode a task declares for one of its tile arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    R,
    W,
    RW,
}

impl AccessMode {
    pub fn reads(self) -> bool {
        matches!(self, AccessMode::R | AccessMode::RW)
    }

    pub fn writes(self) -> bool {
        matches!(self, AccessMode::W | AccessMode::RW)
    }
}

/// Describes a base matrix: its tile grid shape, tile side length, and
/// element type. The coherence directory (`crate::coherence`) is keyed by
/// `TileId` and is a separate component living alongside the base matrix in
/// the session, not embedded in it — see DESIGN.md for the ownership note.
#[derive(Clone, Debug)]
pub struct BaseMatrix {
    pub id: BaseId,
    pub tile_rows: u32,
    pub tile_cols: u32,
    pub tile_side: u32,
    pub elem_type: ElementType,
}

impl BaseMatrix {
    pub fn new(id: BaseId, tile_rows: u32, tile_cols: u32, tile_side: u32, elem_type: ElementType) -> Self {
        Self {
            id,
            tile_rows,
            tile_cols,
            tile_side,
            elem_type,
        }
    }

    pub fn tile_bytes(&self) -> usize {
        self.tile_side as usize * self.tile_side as usize * self.elem_type.size_bytes()
    }

    pub fn contains(&self, tile: TileId) -> bool {
        tile.base == self.id && tile.row < self.tile_rows && tile.col < self.tile_cols
    }

    pub fn tile(&self, row: u32, col: u32) -> TileId {
        TileId { base: self.id, row, col }
    }
}

/// A task argument: one tile of a base matrix, annotated with the access
/// mode under which the task touches it.
///
/// The spec's "matrix reference" is `(base, row offset, column offset,
/// height, width, element type)`; submission requires each reference to
/// describe exactly one whole tile (see `Session::submit`), since
/// decomposing an arbitrary sub-block into its covering tiles is the job of
/// the (out-of-scope) algorithmic template, not the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatrixRef {
    pub tile: TileId,
    pub mode: AccessMode,
}

impl MatrixRef {
    pub fn new(tile: TileId, mode: AccessMode) -> Self {
        Self { tile, mode }
    }

    pub fn read(tile: TileId) -> Self {
        Self::new(tile, AccessMode::R)
    }

    pub fn write(tile: TileId) -> Self {
        Self::new(tile, AccessMode::W)
    }

    pub fn read_write(tile: TileId) -> Self {
        Self::new(tile, AccessMode::RW)
    }
}

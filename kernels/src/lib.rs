//! Example numerical kernel collaborator (spec.md §1 "numerical kernels ...
//! out of scope"): a tile-multiply kernel built on `ndarray`, wired to
//! `cj_runtime::Kernel`, using a reduced-precision OPAC-style multiply
//! grounded in the original `matrices` crate's chip emulation.
//!
//! The runtime core never touches actual bytes (spec §1); this crate owns
//! the tile backing store the kernel reads and writes through.

pub mod gemm;
pub mod opac;

pub use gemm::{GemmKernel, TileStore};

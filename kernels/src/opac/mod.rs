//! Reduced-precision ("OPAC" chip emulation) block multiply, kept from the
//! original matrix-multiply crate this library was built from.

pub mod config;
pub mod intrinsics;
pub mod wrappers;

pub use wrappers::mat_mul;

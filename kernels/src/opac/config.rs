/// Block size the OPAC emulation multiplies in one shot. Chosen to match a
/// typical tile side; `mat_mul` further sub-blocks any tile larger than this.
pub const DIMENSION: usize = 64;

//! Spatial transforms between storage voxels, RAS voxels and millimeters
//!
//! All matrices act on homogeneous column vectors: `mm = M * [i, j, k, 1]`.

mod affine;
mod fov;
mod oblique;
mod reorient;
mod transform;

pub use affine::{AffineDefect, is_affine_ok, validate_affine};
pub use fov::{BOX_TRIANGLES, FovVertex, volume_box};
pub use oblique::{
    OBLIQUE_ANGLE_THRESHOLD_DEG, ObliqueGeometry, SHEAR_THRESHOLD_DEG, calculate_oblique,
    compute_oblique_angle,
};
pub use reorient::{RasOrientation, calculate_ras};
pub use transform::{mm2vox, vox2mm};

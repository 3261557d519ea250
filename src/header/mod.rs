//! NIfTI header representation, repair and decoding
//!
//! [`RawHeader`] mirrors the fields produced by a NIfTI-1/2 reader. The
//! [`normalize`] step repairs it in place before any geometry is derived.

mod normalize;
mod reader;

pub use normalize::{NormalizedHeader, normalize_header, quaternion_to_affine};
pub use reader::{NiftiVersion, read_nifti, read_nifti_header};

use nalgebra::Matrix4;
use std::fmt;

/// The `magic` field, which some readers hand over as a number instead of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Magic {
    Text(String),
    Code(i32),
}

impl Default for Magic {
    fn default() -> Self {
        Self::Text("n+1".to_string())
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Code(c) => write!(f, "#{c}"),
        }
    }
}

/// Header fields consumed by the canonicalization pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RawHeader {
    /// `dims[0]` is the rank, `dims[1..=7]` the extent along each axis
    pub dims: [i64; 8],
    /// `pix_dims[0]` is qfac, `pix_dims[1..=7]` the spacing along each axis
    pub pix_dims: [f64; 8],
    /// Voxel-to-mm transform, row-major
    pub affine: [[f64; 4]; 4],
    pub quatern_b: f64,
    pub quatern_c: f64,
    pub quatern_d: f64,
    pub qoffset_x: f64,
    pub qoffset_y: f64,
    pub qoffset_z: f64,
    pub qform_code: i32,
    pub sform_code: i32,
    pub scl_slope: f64,
    pub scl_inter: f64,
    pub cal_min: f64,
    pub cal_max: f64,
    pub datatype_code: i16,
    pub num_bits_per_voxel: i16,
    pub intent_code: i32,
    pub little_endian: bool,
    pub magic: Magic,
    pub vox_offset: i64,
    pub description: String,
}

impl Default for RawHeader {
    fn default() -> Self {
        Self {
            dims: [3, 1, 1, 1, 1, 1, 1, 1],
            pix_dims: [1.0; 8],
            affine: identity_rows(),
            quatern_b: 0.0,
            quatern_c: 0.0,
            quatern_d: 0.0,
            qoffset_x: 0.0,
            qoffset_y: 0.0,
            qoffset_z: 0.0,
            qform_code: 0,
            sform_code: 0,
            scl_slope: 1.0,
            scl_inter: 0.0,
            cal_min: 0.0,
            cal_max: 0.0,
            datatype_code: 2,
            num_bits_per_voxel: 8,
            intent_code: 0,
            little_endian: true,
            magic: Magic::default(),
            vox_offset: 352,
            description: String::new(),
        }
    }
}

impl RawHeader {
    /// The affine as a matrix acting on homogeneous column vectors
    #[must_use]
    pub fn affine_matrix(&self) -> Matrix4<f64> {
        Matrix4::from_fn(|r, c| self.affine[r][c])
    }

    pub fn set_affine_matrix(&mut self, m: &Matrix4<f64>) {
        for (r, row) in self.affine.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = m[(r, c)];
            }
        }
    }

    /// Product of the extents of axes 4 to 6 that exceed one, saturating
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.dims[4..=6]
            .iter()
            .filter(|&&d| d > 1)
            .fold(1usize, |acc, &d| {
                acc.saturating_mul(usize::try_from(d).unwrap_or(usize::MAX))
            })
    }

    /// Voxel count of a single 3D frame, `None` if it overflows `usize`
    #[must_use]
    pub fn voxels_per_frame(&self) -> Option<usize> {
        self.dims[1..=3].iter().try_fold(1usize, |acc, &d| {
            acc.checked_mul(usize::try_from(d.max(1)).ok()?)
        })
    }

    /// Voxel count of every frame, `None` if it overflows `usize`
    #[must_use]
    pub fn voxel_count(&self) -> Option<usize> {
        self.voxels_per_frame()?.checked_mul(self.frame_count())
    }
}

pub(crate) fn identity_rows() -> [[f64; 4]; 4] {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

//! Error taxonomy for volume canonicalization
//!
//! Only [`CanonError`] aborts construction of a volume. Everything else is a
//! [`Diagnostic`]: logged when raised and kept on the volume as metadata.

use std::fmt;
use thiserror::Error;

/// Fatal errors
#[derive(Debug, Error)]
pub enum CanonError {
    /// A physical voxel spacing of zero along one of the spatial axes
    #[error("implausible geometry: pixDims[{axis}] is zero")]
    ImplausibleGeometry { axis: usize },

    #[error("unsupported datatype code {0}")]
    UnsupportedDatatype(i16),

    #[error("invalid NIfTI header: {0}")]
    InvalidHeader(String),

    #[error("unknown colormap: {0}")]
    UnknownColormap(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal anomalies found while canonicalizing
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The affine stayed unusable and was replaced by a pixdim diagonal
    DegenerateAffine,
    /// `b² + c² + d²` exceeded one; the rotation component `a` was clamped to zero
    MalformedQuaternion { radicand: f64 },
    /// Voxel axes deviate from the world axes
    ObliqueGeometry { angle_deg: f64 },
    /// Voxel axes are not mutually orthogonal
    ShearedVoxels { max_shear_deg: f64 },
    /// Decoded element count differs from the count implied by the header
    BufferSizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateAffine => {
                write!(f, "affine is degenerate, using a diagonal from pixDims")
            }
            Self::MalformedQuaternion { radicand } => write!(
                f,
                "malformed quaternion (1 - (b²+c²+d²) = {radicand}), clamping a to 0"
            ),
            Self::ObliqueGeometry { angle_deg } => write!(
                f,
                "voxels not aligned with world space: {angle_deg} degrees from plumb"
            ),
            Self::ShearedVoxels { max_shear_deg } => write!(
                f,
                "voxels are rhomboidal, maximum shear is {max_shear_deg} degrees"
            ),
            Self::BufferSizeMismatch { expected, actual } => write!(
                f,
                "voxel buffer holds {actual} elements, header implies {expected}"
            ),
        }
    }
}

impl Diagnostic {
    /// Log the diagnostic and hand it back for recording
    pub(crate) fn raise(self) -> Self {
        log::warn!("{self}");
        self
    }
}

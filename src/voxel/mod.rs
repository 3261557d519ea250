//! Decoded voxel storage
//!
//! [`VoxelBuffer`] holds the typed elements produced by [`decode_voxels`].
//! Color variants keep their 8-bit channels interleaved; one element is one
//! voxel, not one channel.

mod codec;
mod intensity;

pub use codec::{DecodedVoxels, decode_voxels, swap_bytes_in_place};
pub use intensity::{HISTOGRAM_BINS, IntensityOptions, IntensityRange, cal_min_max};

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum VoxelBuffer {
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Rgb(Vec<[u8; 3]>),
    Rgba(Vec<[u8; 4]>),
}

/// Element kind of a [`VoxelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    I16,
    U16,
    F32,
    F64,
    Rgb,
    Rgba,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "uint8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Rgb => "rgb24",
            Self::Rgba => "rgba32",
        };
        write!(f, "{name}")
    }
}

impl VoxelBuffer {
    /// Number of voxels
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Rgb(v) => v.len(),
            Self::Rgba(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::U8(_) => ElementKind::U8,
            Self::I16(_) => ElementKind::I16,
            Self::U16(_) => ElementKind::U16,
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
            Self::Rgb(_) => ElementKind::Rgb,
            Self::Rgba(_) => ElementKind::Rgba,
        }
    }

    /// Raw intensity of every voxel as `f64`
    ///
    /// Color voxels yield their luminance (ITU-R BT.601 weights) so that the
    /// intensity estimator has something meaningful to work with.
    pub fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Self::U8(v) => Box::new(v.iter().map(|&x| f64::from(x))),
            Self::I16(v) => Box::new(v.iter().map(|&x| f64::from(x))),
            Self::U16(v) => Box::new(v.iter().map(|&x| f64::from(x))),
            Self::F32(v) => Box::new(v.iter().map(|&x| f64::from(x))),
            Self::F64(v) => Box::new(v.iter().copied()),
            Self::Rgb(v) => Box::new(v.iter().map(|&[r, g, b]| luminance(r, g, b))),
            Self::Rgba(v) => Box::new(v.iter().map(|&[r, g, b, _]| luminance(r, g, b))),
        }
    }
}

#[inline]
fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299f64.mul_add(
        f64::from(r),
        0.587f64.mul_add(f64::from(g), 0.114 * f64::from(b)),
    )
}

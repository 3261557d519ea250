//! Domain-specific value types shared by the header, voxel and geometry modules

use crate::error::CanonError;
use std::fmt;

/// `NIfTI` intent code for a generic vector field
pub const INTENT_VECTOR: i32 = 1007;
/// `NIfTI` intent code for an RGB vector field
pub const INTENT_RGB_VECTOR: i32 = 2003;

/// ANALYZE 7.5 / `NIfTI` datatype codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DataType {
    UInt8 = 2,
    Int16 = 4,
    Int32 = 8,
    Float32 = 16,
    Float64 = 64,
    Rgb24 = 128,
    Int8 = 256,
    UInt16 = 512,
    UInt32 = 768,
    Int64 = 1024,
    Rgba32 = 2304,
}

impl DataType {
    /// Parse a datatype code, rejecting anything outside the recognized set
    ///
    /// # Errors
    ///
    /// Returns `CanonError::UnsupportedDatatype` for unknown codes
    pub fn from_code(code: i16) -> Result<Self, CanonError> {
        Ok(match code {
            2 => Self::UInt8,
            4 => Self::Int16,
            8 => Self::Int32,
            16 => Self::Float32,
            64 => Self::Float64,
            128 => Self::Rgb24,
            256 => Self::Int8,
            512 => Self::UInt16,
            768 => Self::UInt32,
            1024 => Self::Int64,
            2304 => Self::Rgba32,
            other => return Err(CanonError::UnsupportedDatatype(other)),
        })
    }

    #[inline]
    #[must_use]
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Bits occupied by one voxel
    #[must_use]
    pub const fn bits_per_voxel(self) -> i16 {
        match self {
            Self::UInt8 | Self::Int8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Rgb24 => 24,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::Rgba32 => 32,
            Self::Float64 | Self::Int64 => 64,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    #[inline]
    #[must_use]
    pub fn is_color(self) -> bool {
        matches!(self, Self::Rgb24 | Self::Rgba32)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Rgb24 => "rgb24",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::Rgba32 => "rgba32",
        };
        write!(f, "{name} ({code})", code = self.code())
    }
}

/// Scale parameters for converting stored voxel values to real units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleParams {
    pub slope: f64,
    pub intercept: f64,
}

impl RescaleParams {
    #[must_use]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        raw.mul_add(self.slope, self.intercept)
    }
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for RescaleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope={slope}, intercept={intercept}",
            slope = self.slope,
            intercept = self.intercept
        )
    }
}

/// Image container tag handed over by the fetch step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageType {
    #[default]
    Unknown,
    Nii,
    Dcm,
    DcmManifest,
    Mih,
    Mif,
    Nhdr,
    Nrrd,
    Mhd,
    Mha,
    Mgh,
    Mgz,
    V,
    V16,
    Vmr,
    Head,
    DcmFolder,
}

impl ImageType {
    /// Guess the image type from a file name extension
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let stem = lower.strip_suffix(".gz").unwrap_or(&lower);
        match stem.rsplit_once('.').map(|(_, ext)| ext) {
            Some("nii") => Self::Nii,
            Some("dcm") => Self::Dcm,
            Some("mih") => Self::Mih,
            Some("mif") => Self::Mif,
            Some("nhdr") => Self::Nhdr,
            Some("nrrd") => Self::Nrrd,
            Some("mhd") => Self::Mhd,
            Some("mha") => Self::Mha,
            Some("mgh") => Self::Mgh,
            Some("mgz") => Self::Mgz,
            Some("v") => Self::V,
            Some("v16") => Self::V16,
            Some("vmr") => Self::Vmr,
            Some("head") => Self::Head,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_datatype_codes() {
        assert_eq!(DataType::from_code(16).unwrap(), DataType::Float32);
        assert_eq!(DataType::from_code(2304).unwrap(), DataType::Rgba32);
        assert_eq!(DataType::Rgb24.bits_per_voxel(), 24);
        assert!(DataType::Float64.is_float());
        assert!(!DataType::Int16.is_float());
    }

    #[test]
    fn test_unknown_datatype_is_rejected() {
        // complex64 is a valid NIfTI code but not a renderable one
        assert_matches!(
            DataType::from_code(32),
            Err(CanonError::UnsupportedDatatype(32))
        );
    }

    #[test]
    fn test_rescale_apply() {
        let rescale = RescaleParams::new(2.0, -10.0);
        assert_eq!(rescale.apply(5.0), 0.0);
        assert_eq!(RescaleParams::default().apply(7.5), 7.5);
    }

    #[test]
    fn test_image_type_from_file_name() {
        assert_eq!(ImageType::from_file_name("brain.nii.gz"), ImageType::Nii);
        assert_eq!(ImageType::from_file_name("T1.NII"), ImageType::Nii);
        assert_eq!(ImageType::from_file_name("scan.mgz"), ImageType::Mgz);
        assert_eq!(ImageType::from_file_name("notes.txt"), ImageType::Unknown);
    }
}

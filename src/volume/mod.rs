//! Canonical volume record and the pipeline that builds it
//!
//! [`canonicalize`] runs header normalization, voxel decoding, RAS
//! reorientation, obliquity analysis and intensity estimation, in that
//! order, and owns everything it produces.

mod presentation;
mod properties;

pub use presentation::{
    ColormapRegistry, LUT_ENTRIES, LookupTableSource, OverlayPresentation, make_lut,
};
pub use properties::{DisplayProperties, PropertyChangeCallback};

use crate::error::{CanonError, Diagnostic};
use crate::geometry::{self, FovVertex, ObliqueGeometry, RasOrientation, volume_box};
use crate::header::{RawHeader, normalize_header, read_nifti};
use crate::types::ImageType;
use crate::voxel::{IntensityOptions, IntensityRange, VoxelBuffer, cal_min_max, decode_voxels};
use nalgebra::{Matrix4, Vector3};
use std::fmt;
use uuid::Uuid;

/// Caller-selected canonicalization settings
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeOptions {
    pub name: String,
    pub image_type: ImageType,
    /// Always derive the affine from the quaternion
    pub use_qform_not_sform: bool,
    pub percentile_frac: f64,
    pub ignore_zero_voxels: bool,
    pub cal_min_max_trusted: bool,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        let intensity = IntensityOptions::default();
        Self {
            name: String::new(),
            image_type: ImageType::Nii,
            use_qform_not_sform: false,
            percentile_frac: intensity.percentile_frac,
            ignore_zero_voxels: intensity.ignore_zero_voxels,
            cal_min_max_trusted: intensity.cal_min_max_trusted,
        }
    }
}

impl VolumeOptions {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn intensity(&self) -> IntensityOptions {
        IntensityOptions {
            percentile_frac: self.percentile_frac.clamp(0.0, 0.5),
            ignore_zero_voxels: self.ignore_zero_voxels,
            cal_min_max_trusted: self.cal_min_max_trusted,
        }
    }
}

/// A volume reoriented to RAS order with its derived geometry and display range
pub struct CanonicalVolume {
    id: Uuid,
    image_type: ImageType,
    header: RawHeader,
    voxels: VoxelBuffer,
    frame_count: usize,
    orientation: RasOrientation,
    intensity: IntensityRange,
    diagnostics: Vec<Diagnostic>,
    properties: DisplayProperties,
    on_property_change: Option<PropertyChangeCallback>,
}

/// Build a [`CanonicalVolume`] from a decoded header and its raw voxel bytes
///
/// # Errors
///
/// Returns `CanonError::ImplausibleGeometry` for a zero voxel spacing and
/// `CanonError::UnsupportedDatatype` for unknown datatype codes. Every
/// other anomaly is recorded in [`CanonicalVolume::diagnostics`].
pub fn canonicalize(
    mut header: RawHeader,
    mut bytes: Vec<u8>,
    options: &VolumeOptions,
) -> Result<CanonicalVolume, CanonError> {
    let normalized = normalize_header(&mut header, &mut bytes, options.use_qform_not_sform)?;
    let mut diagnostics = normalized.diagnostics;

    let decoded = decode_voxels(&mut header, bytes)?;
    diagnostics.extend(decoded.diagnostics);

    let orientation =
        geometry::calculate_ras(&header.affine_matrix(), &header.dims, &header.pix_dims);
    diagnostics.extend(
        orientation
            .oblique
            .diagnostics()
            .into_iter()
            .map(Diagnostic::raise),
    );

    let intensity = cal_min_max(&decoded.buffer, &header, &options.intensity());

    log::debug!(
        "canonicalized {:?}: perm {:?}, dims {:?}, range {intensity}",
        options.name,
        orientation.perm_ras,
        orientation.dims_ras
    );

    Ok(CanonicalVolume {
        id: Uuid::new_v4(),
        image_type: options.image_type,
        header,
        voxels: decoded.buffer,
        frame_count: normalized.frame_count,
        orientation,
        intensity,
        diagnostics,
        properties: DisplayProperties::new(options),
        on_property_change: None,
    })
}

impl CanonicalVolume {
    /// Read a single-file NIfTI image (plain or gzipped) and canonicalize it
    ///
    /// # Errors
    ///
    /// Propagates header decoding and canonicalization errors
    pub fn from_nifti_bytes(data: &[u8], options: &VolumeOptions) -> Result<Self, CanonError> {
        let (header, voxels) = read_nifti(data)?;
        canonicalize(header, voxels, options)
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn image_type(&self) -> ImageType {
        self.image_type
    }

    /// The header after normalization and datatype widening
    #[must_use]
    pub const fn header(&self) -> &RawHeader {
        &self.header
    }

    #[must_use]
    pub const fn voxels(&self) -> &VoxelBuffer {
        &self.voxels
    }

    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub const fn orientation(&self) -> &RasOrientation {
        &self.orientation
    }

    #[must_use]
    pub const fn oblique(&self) -> &ObliqueGeometry {
        &self.orientation.oblique
    }

    #[must_use]
    pub const fn intensity(&self) -> &IntensityRange {
        &self.intensity
    }

    /// Non-fatal anomalies met while building the volume
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub const fn properties(&self) -> &DisplayProperties {
        &self.properties
    }

    #[must_use]
    pub const fn dims_ras(&self) -> [i64; 4] {
        self.orientation.dims_ras
    }

    #[must_use]
    pub const fn mat_ras(&self) -> &Matrix4<f64> {
        &self.orientation.mat_ras
    }

    /// mm position of a RAS-ordered voxel index
    #[must_use]
    pub fn vox2mm(&self, vox: &Vector3<f64>) -> Vector3<f64> {
        geometry::vox2mm(vox, &self.orientation.mat_ras)
    }

    /// RAS-ordered voxel index of an mm position, rounded unless `frac`
    #[must_use]
    pub fn mm2vox(&self, mm: &Vector3<f64>, frac: bool) -> Option<Vector3<f64>> {
        geometry::mm2vox(mm, &self.orientation.mat_ras, frac)
    }

    /// The eight corners of the volume box in mm, see [`volume_box`]
    #[must_use]
    pub fn fov_box(&self) -> [FovVertex; 8] {
        volume_box(&self.orientation.mat_ras, &self.orientation.dims_ras)
    }

    /// Re-run the intensity estimator with the current display settings
    pub(crate) fn recompute_intensity(&mut self) {
        let options = IntensityOptions {
            percentile_frac: self.properties.percentile_frac,
            ignore_zero_voxels: self.properties.ignore_zero_voxels,
            cal_min_max_trusted: self.properties.cal_min_max_trusted,
        };
        self.intensity = cal_min_max(&self.voxels, &self.header, &options);
        log::debug!("intensity range of {} recomputed: {}", self.id, self.intensity);
    }
}

impl fmt::Debug for CanonicalVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalVolume")
            .field("id", &self.id)
            .field("image_type", &self.image_type)
            .field("voxels", &self.voxels.kind())
            .field("len", &self.voxels.len())
            .field("orientation", &self.orientation)
            .field("intensity", &self.intensity)
            .field("diagnostics", &self.diagnostics)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

//! Obliquity and shear of a RAS-ordered affine, plus the fractional-to-mm
//! matrices derived from it

use super::transform::{mm2vox, vox2mm};
use crate::error::Diagnostic;
use nalgebra::{Matrix4, Vector3};

/// Oblique angles at or below this are reported as exactly zero
pub const OBLIQUE_ANGLE_THRESHOLD_DEG: f64 = 0.01;
/// Shear above this is reported as rhomboidal voxels
pub const SHEAR_THRESHOLD_DEG: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ObliqueGeometry {
    /// Columns are the mm displacement of a one-mm step along each RAS voxel axis
    pub oblique_ras: Matrix4<f64>,
    pub oblique_angle: f64,
    pub max_shear_deg: f64,
    /// Maps `[0,1]³` fractional volume coordinates to mm
    pub frac2mm: Matrix4<f64>,
    /// Like `frac2mm` but assuming orthogonal axes with pixdim spacing
    pub frac2mm_ortho: Matrix4<f64>,
    pub extents_min_ortho: Vector3<f64>,
    pub extents_max_ortho: Vector3<f64>,
    pub mm2ortho: Matrix4<f64>,
}

impl ObliqueGeometry {
    /// Geometry warnings for values beyond the reporting thresholds
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        if self.oblique_angle > OBLIQUE_ANGLE_THRESHOLD_DEG {
            out.push(Diagnostic::ObliqueGeometry {
                angle_deg: self.oblique_angle,
            });
        }
        if self.max_shear_deg > SHEAR_THRESHOLD_DEG {
            out.push(Diagnostic::ShearedVoxels {
                max_shear_deg: self.max_shear_deg,
            });
        }
        out
    }
}

/// Degrees between the voxel grid and the closest world axis, taken over
/// the worst-aligned of the three voxel axes
#[must_use]
pub fn compute_oblique_angle(mtx: &Matrix4<f64>) -> f64 {
    let fig_merit = (0..3)
        .map(|col| {
            let axis = mtx.fixed_view::<3, 1>(0, col);
            let norm = axis.norm();
            if norm > 0.0 { axis.amax() / norm } else { 1.0 }
        })
        .fold(f64::INFINITY, f64::min)
        .min(1.0);

    let angle = fig_merit.acos().to_degrees().abs();
    if angle > OBLIQUE_ANGLE_THRESHOLD_DEG {
        angle
    } else {
        0.0
    }
}

/// Derive obliquity, shear and the fractional/orthographic matrices from a
/// RAS-ordered affine
///
/// `pix_dims_ras` and `dims_ras` carry qfac/rank at index 0 and the RAS axes
/// at indices 1 to 3.
#[must_use]
pub fn calculate_oblique(
    mat_ras: &Matrix4<f64>,
    pix_dims_ras: &[f64; 4],
    dims_ras: &[i64; 4],
) -> ObliqueGeometry {
    let oblique_angle = compute_oblique_angle(mat_ras);

    let origin = vox2mm(&Vector3::zeros(), mat_ras);
    let step = |axis: usize| {
        let mut vox = Vector3::zeros();
        vox[axis] = 1.0 / pix_dims_ras[axis + 1];
        vox2mm(&vox, mat_ras) - origin
    };
    let (x1mm, y1mm, z1mm) = (step(0), step(1), step(2));

    let mut oblique_ras = Matrix4::identity();
    oblique_ras.fixed_view_mut::<3, 1>(0, 0).copy_from(&x1mm);
    oblique_ras.fixed_view_mut::<3, 1>(0, 1).copy_from(&y1mm);
    oblique_ras.fixed_view_mut::<3, 1>(0, 2).copy_from(&z1mm);

    let deviation = |a: &Vector3<f64>, b: &Vector3<f64>| (90.0 - a.angle(b).to_degrees()).abs();
    let max_shear_deg = deviation(&x1mm, &y1mm)
        .max(deviation(&x1mm, &z1mm))
        .max(deviation(&y1mm, &z1mm));

    let dim = Vector3::new(dims_ras[1] as f64, dims_ras[2] as f64, dims_ras[3] as f64);
    // voxel centers of an n-voxel axis sit at (i + 0.5) / n in unit space
    let frac2mm = mat_ras
        * Matrix4::new_translation(&Vector3::repeat(-0.5))
        * Matrix4::new_nonuniform_scaling(&dim);

    let pixdim = Vector3::new(pix_dims_ras[1], pix_dims_ras[2], pix_dims_ras[3]);
    let origin_voxel = mm2vox(&Vector3::zeros(), mat_ras, true).unwrap_or_else(|| {
        log::warn!("RAS affine is singular, placing the world origin at voxel 0");
        Vector3::zeros()
    });
    let ortho_translation = (-origin_voxel - Vector3::repeat(0.5)).component_mul(&pixdim);
    let ortho_extent = pixdim.component_mul(&dim);

    let mut frac2mm_ortho = Matrix4::new_nonuniform_scaling(&ortho_extent);
    frac2mm_ortho
        .fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&ortho_translation);

    let extents_min_ortho = ortho_translation;
    let extents_max_ortho = ortho_translation + ortho_extent;

    let mm2ortho = oblique_ras.try_inverse().unwrap_or_else(|| {
        log::warn!("oblique matrix is singular, mm2ortho falls back to identity");
        Matrix4::identity()
    });

    ObliqueGeometry {
        oblique_ras,
        oblique_angle,
        max_shear_deg,
        frac2mm,
        frac2mm_ortho,
        extents_min_ortho,
        extents_max_ortho,
        mm2ortho,
    }
}

//! Storage-to-RAS axis canonicalization
//!
//! Finds which storage axis runs closest to each of the Right, Anterior and
//! Superior world axes, and whether it runs backwards. The volume is never
//! physically reshuffled; instead `to_ras`/`to_ras_vox` describe the mapping
//! so the renderer can sample storage order as if it were RAS order.

use super::affine::validate_affine;
use super::oblique::{ObliqueGeometry, calculate_oblique};
use super::transform::vox2mm;
use nalgebra::{Matrix4, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct RasOrientation {
    /// `[rank, x, y, z]` in RAS order
    pub dims_ras: [i64; 4],
    /// `[qfac, x, y, z]` in RAS order
    pub pix_dims_ras: [f64; 4],
    /// 1-based storage axis feeding each RAS axis, negative when flipped
    pub perm_ras: [i32; 3],
    /// RAS-ordered voxel index to mm
    pub mat_ras: Matrix4<f64>,
    /// Storage-order unit texture coordinates to RAS-order unit coordinates
    pub to_ras: Matrix4<f64>,
    /// Storage-order voxel index to RAS-order voxel index
    pub to_ras_vox: Matrix4<f64>,
    /// Corner of the field of view at the storage origin edge, in mm
    pub mm000: Vector3<f64>,
    pub mm100: Vector3<f64>,
    pub mm010: Vector3<f64>,
    pub mm001: Vector3<f64>,
    pub oblique: ObliqueGeometry,
}

impl RasOrientation {
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.perm_ras == [1, 2, 3]
    }

    /// Apply `to_ras_vox` to an integer storage index
    #[must_use]
    pub fn storage_index_to_ras(&self, ijk: [usize; 3]) -> [usize; 3] {
        let storage = Vector3::new(ijk[0] as f64, ijk[1] as f64, ijk[2] as f64);
        let ras = vox2mm(&storage, &self.to_ras_vox);
        [
            ras[0].round() as usize,
            ras[1].round() as usize,
            ras[2].round() as usize,
        ]
    }
}

/// Pick the storage axis (0-based) for each RAS axis
///
/// RAS-X takes the column with the largest magnitude in row 0, RAS-Y the
/// larger of the two remaining columns in row 1, RAS-Z whatever is left.
/// Ties go to the lower storage axis.
fn assign_axes(affine: &Matrix4<f64>) -> [usize; 3] {
    let abs = |row: usize, col: usize| affine[(row, col)].abs();

    let mut x = 0;
    for col in 1..3 {
        if abs(0, col) > abs(0, x) {
            x = col;
        }
    }

    let (first, second) = match x {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let y = if abs(1, second) > abs(1, first) {
        second
    } else {
        first
    };

    [x, y, 3 - x - y]
}

/// Compute the RAS permutation, flips and transforms for a voxel-to-mm
/// affine, then derive the obliquity geometry of the result
///
/// `dims` and `pix_dims` are the header arrays (rank/qfac at index 0).
#[must_use]
pub fn calculate_ras(
    affine: &Matrix4<f64>,
    dims: &[i64; 8],
    pix_dims: &[f64; 8],
) -> RasOrientation {
    if let Err(defect) = validate_affine(affine) {
        log::warn!("reorienting a defective affine: {defect}");
    }

    let axes = assign_axes(affine);
    let perm = axes.map(|a| a + 1);

    let corner = |i: f64, j: f64, k: f64| vox2mm(&Vector3::new(i, j, k), affine);
    let mm000 = corner(-0.5, -0.5, -0.5);
    let mm100 = corner(dims[1] as f64 - 0.5, -0.5, -0.5);
    let mm010 = corner(-0.5, dims[2] as f64 - 0.5, -0.5);
    let mm001 = corner(-0.5, -0.5, dims[3] as f64 - 0.5);

    // affine with its rotation columns reordered into RAS order
    let mut permuted = *affine;
    for (ras, &storage) in axes.iter().enumerate() {
        for row in 0..3 {
            permuted[(row, ras)] = affine[(row, storage)];
        }
    }
    let flip = [0, 1, 2].map(|a| permuted[(a, a)] < 0.0);

    let dims_ras = [dims[0], dims[perm[0]], dims[perm[1]], dims[perm[2]]];
    let pix_dims_ras = [
        pix_dims[0],
        pix_dims[perm[0]],
        pix_dims[perm[1]],
        pix_dims[perm[2]],
    ];
    let mut perm_ras = perm.map(|p| p as i32);
    for (p, &flipped) in perm_ras.iter_mut().zip(&flip) {
        if flipped {
            *p = -*p;
        }
    }

    log::debug!("RAS permutation {perm_ras:?}");

    if perm == [1, 2, 3] && flip == [false; 3] {
        let oblique = calculate_oblique(affine, &pix_dims_ras, &dims_ras);
        return RasOrientation {
            dims_ras,
            pix_dims_ras,
            perm_ras,
            mat_ras: *affine,
            to_ras: Matrix4::identity(),
            to_ras_vox: Matrix4::identity(),
            mm000,
            mm100,
            mm010,
            mm001,
            oblique,
        };
    }

    let sign = flip.map(|f| if f { -1.0 } else { 1.0 });
    let flipped = flip.map(|f| if f { 1.0 } else { 0.0 });

    // mirror flipped axes about the volume center; this is its own inverse
    let mut flip_mat = Matrix4::identity();
    for a in 0..3 {
        flip_mat[(a, a)] = sign[a];
        flip_mat[(a, 3)] = (dims[perm[a]] - 1) as f64 * flipped[a];
    }
    let mat_ras = permuted * flip_mat;

    let mut to_ras = Matrix4::zeros();
    to_ras[(3, 3)] = 1.0;
    for a in 0..3 {
        to_ras[(a, axes[a])] = sign[a];
        to_ras[(a, 3)] = flipped[a];
    }

    let mut to_ras_vox = to_ras;
    for a in 0..3 {
        to_ras_vox[(a, 3)] = (dims[perm[a]] - 1) as f64 * flipped[a];
    }

    let oblique = calculate_oblique(&mat_ras, &pix_dims_ras, &dims_ras);
    RasOrientation {
        dims_ras,
        pix_dims_ras,
        perm_ras,
        mat_ras,
        to_ras,
        to_ras_vox,
        mm000,
        mm100,
        mm010,
        mm001,
        oblique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DIMS: [i64; 8] = [3, 4, 5, 6, 1, 1, 1, 1];
    const PIX: [f64; 8] = [1.0, 1.0, 2.0, 3.0, 1.0, 1.0, 1.0, 1.0];

    fn diag_affine() -> Matrix4<f64> {
        Matrix4::new(
            1.0, 0.0, 0.0, -10.0, //
            0.0, 2.0, 0.0, 20.0, //
            0.0, 0.0, 3.0, -30.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// storage axis 1 runs posterior (-y), axis 2 runs superior, axis 3 runs right
    fn permuted_affine() -> Matrix4<f64> {
        Matrix4::new(
            0.0, 0.0, 3.0, -30.0, //
            -1.0, 0.0, 0.0, 10.0, //
            0.0, 2.0, 0.0, 5.0, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    #[test]
    fn test_identity_orientation() {
        let ras = calculate_ras(&diag_affine(), &DIMS, &PIX);

        assert_eq!(ras.perm_ras, [1, 2, 3]);
        assert!(ras.is_identity());
        assert_eq!(ras.to_ras, Matrix4::identity());
        assert_eq!(ras.to_ras_vox, Matrix4::identity());
        assert_eq!(ras.dims_ras, [3, 4, 5, 6]);
        assert_eq!(ras.pix_dims_ras, [1.0, 1.0, 2.0, 3.0]);
        assert_eq!(ras.mat_ras, diag_affine());
        assert_eq!(ras.oblique.oblique_angle, 0.0);
    }

    #[test]
    fn test_permuted_and_flipped_axes() {
        let ras = calculate_ras(&permuted_affine(), &DIMS, &PIX);

        // RAS-X from storage 3, RAS-Y from storage 1 (flipped), RAS-Z from storage 2
        assert_eq!(ras.perm_ras, [3, -1, 2]);
        assert_eq!(ras.dims_ras, [3, 6, 4, 5]);
        assert_eq!(ras.pix_dims_ras, [1.0, 3.0, 1.0, 2.0]);

        // the RAS affine has a positive diagonal
        for a in 0..3 {
            assert!(ras.mat_ras[(a, a)] > 0.0);
        }
    }

    #[test]
    fn test_to_ras_vox_round_trip() {
        let affine = permuted_affine();
        let ras = calculate_ras(&affine, &DIMS, &PIX);

        for i in 0..DIMS[1] as usize {
            for j in 0..DIMS[2] as usize {
                for k in 0..DIMS[3] as usize {
                    let storage = Vector3::new(i as f64, j as f64, k as f64);
                    let ras_idx = ras.storage_index_to_ras([i, j, k]);

                    assert!(ras_idx[0] < ras.dims_ras[1] as usize);
                    assert!(ras_idx[1] < ras.dims_ras[2] as usize);
                    assert!(ras_idx[2] < ras.dims_ras[3] as usize);

                    // the same voxel lands on the same mm position either way
                    let ras_vec =
                        Vector3::new(ras_idx[0] as f64, ras_idx[1] as f64, ras_idx[2] as f64);
                    assert_relative_eq!(
                        vox2mm(&ras_vec, &ras.mat_ras),
                        vox2mm(&storage, &affine),
                        epsilon = 1e-9
                    );
                }
            }
        }
    }

    #[test]
    fn test_to_ras_maps_unit_corners() {
        let ras = calculate_ras(&permuted_affine(), &DIMS, &PIX);

        // storage origin sits at RAS x=0, y=1 (flipped), z=0
        let origin = vox2mm(&Vector3::zeros(), &ras.to_ras);
        assert_relative_eq!(origin, Vector3::new(0.0, 1.0, 0.0));

        let far = vox2mm(&Vector3::new(1.0, 1.0, 1.0), &ras.to_ras);
        assert_relative_eq!(far, Vector3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_single_flip_keeps_permutation() {
        let mut affine = diag_affine();
        affine[(0, 0)] = -1.0;
        let ras = calculate_ras(&affine, &DIMS, &PIX);

        assert_eq!(ras.perm_ras, [-1, 2, 3]);
        assert!(!ras.is_identity());
        // RAS voxel 0 is the last storage voxel along x
        assert_eq!(ras.storage_index_to_ras([3, 0, 0]), [0, 0, 0]);
        assert_eq!(ras.storage_index_to_ras([0, 2, 1]), [3, 2, 1]);
    }

    #[test]
    fn test_ties_favor_lower_axis() {
        // 45 degree rotation in the x/y plane: rows 0 and 1 tie between columns
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let affine = Matrix4::new(
            h, -h, 0.0, 0.0, //
            h, h, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let ras = calculate_ras(&affine, &[3, 4, 4, 4, 1, 1, 1, 1], &[1.0; 8]);
        assert_eq!(ras.perm_ras, [1, 2, 3]);
        assert_relative_eq!(ras.oblique.oblique_angle, 45.0, epsilon = 1e-6);
    }

    #[test]
    fn test_field_of_view_corners() {
        let ras = calculate_ras(&diag_affine(), &DIMS, &PIX);
        assert_relative_eq!(ras.mm000, Vector3::new(-10.5, 19.0, -31.5));
        assert_relative_eq!(ras.mm100, Vector3::new(-6.5, 19.0, -31.5));
        assert_relative_eq!(ras.mm010, Vector3::new(-10.5, 29.0, -31.5));
        assert_relative_eq!(ras.mm001, Vector3::new(-10.5, 19.0, -13.5));
    }
}

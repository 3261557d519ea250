//! Field-of-view box of a RAS-ordered volume

use super::transform::vox2mm;
use nalgebra::{Matrix4, Vector3};

/// A corner of the volume box: mm position and unit texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovVertex {
    pub position: Vector3<f64>,
    pub tex: Vector3<f64>,
}

/// Two triangles per face, indexing the vertices returned by [`volume_box`]
pub const BOX_TRIANGLES: [u16; 36] = [
    0, 3, 2, 2, 1, 0, // superior
    4, 7, 6, 6, 5, 4, // inferior
    5, 6, 2, 2, 3, 5, // anterior
    4, 0, 1, 1, 7, 4, // posterior
    7, 1, 2, 2, 6, 7, // right
    4, 5, 3, 3, 0, 4, // left
];

/// The eight corners of the volume in the order LPS, RPS, RAS, LAS, LPI,
/// LAI, RAI, RPI
///
/// Voxel coordinates address voxel centers, so the box spans from -0.5 to
/// `extent - 0.5` along every RAS axis.
#[must_use]
pub fn volume_box(mat_ras: &Matrix4<f64>, dims_ras: &[i64; 4]) -> [FovVertex; 8] {
    let (l, p, i) = (-0.5, -0.5, -0.5);
    let r = dims_ras[1] as f64 - 0.5;
    let a = dims_ras[2] as f64 - 0.5;
    let s = dims_ras[3] as f64 - 0.5;

    let vertex = |x: f64, y: f64, z: f64, tex: [f64; 3]| FovVertex {
        position: vox2mm(&Vector3::new(x, y, z), mat_ras),
        tex: Vector3::from(tex),
    };

    [
        vertex(l, p, s, [0.0, 0.0, 1.0]),
        vertex(r, p, s, [1.0, 0.0, 1.0]),
        vertex(r, a, s, [1.0, 1.0, 1.0]),
        vertex(l, a, s, [0.0, 1.0, 1.0]),
        vertex(l, p, i, [0.0, 0.0, 0.0]),
        vertex(l, a, i, [0.0, 1.0, 0.0]),
        vertex(r, a, i, [1.0, 1.0, 0.0]),
        vertex(r, p, i, [1.0, 0.0, 0.0]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_spans_voxel_edges() {
        let mat_ras = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 2.0, 2.0));
        let corners = volume_box(&mat_ras, &[3, 10, 20, 5]);

        assert_relative_eq!(corners[4].position, Vector3::new(-1.0, -1.0, -1.0));
        assert_relative_eq!(corners[2].position, Vector3::new(19.0, 39.0, 9.0));
        assert_relative_eq!(corners[2].tex, Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_triangles_cover_every_vertex() {
        for v in 0..8u16 {
            assert!(BOX_TRIANGLES.contains(&v));
        }
        assert!(BOX_TRIANGLES.iter().all(|&i| i < 8));
    }
}

use nalgebra::{Matrix4, Vector3};

/// Map a voxel position to millimeters through `mtx`
#[inline]
#[must_use]
pub fn vox2mm(xyz: &Vector3<f64>, mtx: &Matrix4<f64>) -> Vector3<f64> {
    (mtx * xyz.push(1.0)).xyz()
}

/// Map a millimeter position back to voxel space
///
/// With `frac` the fractional voxel coordinate is returned, otherwise each
/// component is rounded to the nearest voxel index. Returns `None` when
/// `mtx` is singular.
#[must_use]
pub fn mm2vox(mm: &Vector3<f64>, mtx: &Matrix4<f64>, frac: bool) -> Option<Vector3<f64>> {
    let inverse = mtx.try_inverse()?;
    let pos = vox2mm(mm, &inverse);
    if frac {
        Some(pos)
    } else {
        Some(pos.map(f64::round))
    }
}

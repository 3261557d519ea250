//! Header repair
//!
//! Images in the wild are frequently non-conformant. Every step here either
//! heals the header in place (logging what it did) or, for zero voxel
//! spacing, gives up with [`CanonError::ImplausibleGeometry`].

use super::{Magic, RawHeader};
use crate::error::{CanonError, Diagnostic};
use crate::geometry::{is_affine_ok, validate_affine};
use crate::types::{DataType, INTENT_RGB_VECTOR, INTENT_VECTOR};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use nalgebra::{Matrix3, Matrix4, Vector3};

/// What normalization found out about the header it repaired
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHeader {
    /// Number of 3D frames after any vector repacking
    pub frame_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Repair `header` in place, repacking `bytes` when it holds a 3-component
/// float vector field
///
/// # Errors
///
/// Returns `CanonError::ImplausibleGeometry` if any spatial pixdim is zero
pub fn normalize_header(
    header: &mut RawHeader,
    bytes: &mut Vec<u8>,
    use_qform_not_sform: bool,
) -> Result<NormalizedHeader, CanonError> {
    let mut diagnostics = Vec::new();

    if let Magic::Code(code) = header.magic {
        log::debug!("numeric magic {code} replaced with text form");
        header.magic = Magic::Text("n+1".to_string());
    }

    let mut frame_count = header.frame_count();

    if is_vector_field(header, frame_count) {
        if let Some(rgb) = repack_vector_field(header, bytes) {
            *bytes = rgb;
            header.datatype_code = DataType::Rgb24.code();
            header.num_bits_per_voxel = DataType::Rgb24.bits_per_voxel();
            header.dims[0] = header.dims[0].min(3);
            header.dims[4..=6].fill(1);
            frame_count = 1;
        }
    }

    if let Some(axis) = (1..=3).find(|&i| header.pix_dims[i] == 0.0) {
        return Err(CanonError::ImplausibleGeometry { axis });
    }

    if header.scl_slope == 0.0 || header.scl_slope.is_nan() {
        header.scl_slope = 1.0;
    }
    if header.scl_inter.is_nan() {
        header.scl_inter = 0.0;
    }

    let sform_ok = is_affine_ok(&header.affine_matrix());
    if !sform_ok || use_qform_not_sform || header.qform_code > header.sform_code {
        log::debug!(
            "deriving affine from quaternion (sform ok: {sform_ok}, qform_code {}, sform_code {})",
            header.qform_code,
            header.sform_code
        );
        let (affine, quaternion_diagnostic) = quaternion_to_affine(header);
        header.set_affine_matrix(&affine);
        diagnostics.extend(quaternion_diagnostic);
    }

    if let Err(defect) = validate_affine(&header.affine_matrix()) {
        log::debug!("affine still unusable after quaternion pass: {defect}");
        let spacing = [1, 2, 3].map(|i| {
            let d = header.pix_dims[i];
            if d == 0.0 || d.is_nan() { 1.0 } else { d }
        });
        header.pix_dims[1..=3].copy_from_slice(&spacing);
        header.set_affine_matrix(&Matrix4::new_nonuniform_scaling(&Vector3::from(spacing)));
        diagnostics.push(Diagnostic::DegenerateAffine.raise());
    }

    Ok(NormalizedHeader {
        frame_count,
        diagnostics,
    })
}

/// Build the voxel-to-mm affine from the quaternion parameters
///
/// A quaternion whose `b² + c² + d²` exceeds one has no real `a`; it is
/// clamped to zero and reported as [`Diagnostic::MalformedQuaternion`].
#[must_use]
pub fn quaternion_to_affine(header: &RawHeader) -> (Matrix4<f64>, Option<Diagnostic>) {
    let (b, c, d) = (header.quatern_b, header.quatern_c, header.quatern_d);
    let radicand = 1.0 - (b * b + c * c + d * d);
    let (a, diagnostic) = if radicand < 0.0 {
        (0.0, Some(Diagnostic::MalformedQuaternion { radicand }.raise()))
    } else {
        (radicand.sqrt(), None)
    };

    #[rustfmt::skip]
    let rotation = Matrix3::new(
        a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d),         2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),         a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),         2.0 * (c * d + a * b),         a * a + d * d - c * c - b * b,
    );

    let mut scale = Vector3::new(header.pix_dims[1], header.pix_dims[2], header.pix_dims[3]);
    if header.pix_dims[0] <= 0.0 {
        scale.z = -scale.z;
    }

    let mut affine = Matrix4::identity();
    affine
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&(rotation * Matrix3::from_diagonal(&scale)));
    affine[(0, 3)] = header.qoffset_x;
    affine[(1, 3)] = header.qoffset_y;
    affine[(2, 3)] = header.qoffset_z;

    (affine, diagnostic)
}

fn is_vector_field(header: &RawHeader, frame_count: usize) -> bool {
    matches!(header.intent_code, INTENT_VECTOR | INTENT_RGB_VECTOR)
        && frame_count == 3
        && DataType::from_code(header.datatype_code).is_ok_and(DataType::is_float)
}

/// Interleave three float planes into 8-bit RGB triplets scaled by the
/// largest absolute component
fn repack_vector_field(header: &RawHeader, bytes: &[u8]) -> Option<Vec<u8>> {
    let Some(count) = header.voxels_per_frame().and_then(|n| n.checked_mul(3)) else {
        log::warn!("vector field dims {:?} overflow; leaving it as is", header.dims);
        return None;
    };
    let nvox = count / 3;
    let planes = read_floats(header, bytes, count)?;

    let max_abs = planes.iter().fold(0.0_f64, |mx, v| mx.max(v.abs()));
    let scale = if max_abs > 0.0 { 255.0 / max_abs } else { 1.0 };

    let mut rgb = vec![0u8; nvox * 3];
    for (i, triplet) in rgb.chunks_exact_mut(3).enumerate() {
        for (channel, out) in triplet.iter_mut().enumerate() {
            // saturating cast; NaN components become 0
            *out = (planes[i + channel * nvox].abs() * scale).round() as u8;
        }
    }

    log::debug!("repacked {nvox}-voxel vector field into RGB (max |v| = {max_abs})");
    Some(rgb)
}

fn read_floats(header: &RawHeader, bytes: &[u8], count: usize) -> Option<Vec<f64>> {
    let width = if header.datatype_code == DataType::Float64.code() { 8 } else { 4 };
    let Some(src) = count.checked_mul(width).and_then(|n| bytes.get(..n)) else {
        log::warn!(
            "vector field needs {count} {width}-byte floats, buffer holds {} bytes; \
             leaving it as is",
            bytes.len()
        );
        return None;
    };

    let mut out = vec![0.0_f64; count];
    if width == 8 {
        if header.little_endian {
            LittleEndian::read_f64_into(src, &mut out);
        } else {
            BigEndian::read_f64_into(src, &mut out);
        }
    } else {
        let mut narrow = vec![0.0_f32; count];
        if header.little_endian {
            LittleEndian::read_f32_into(src, &mut narrow);
        } else {
            BigEndian::read_f32_into(src, &mut narrow);
        }
        for (o, &n) in out.iter_mut().zip(&narrow) {
            *o = f64::from(n);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    fn header_3d() -> RawHeader {
        RawHeader {
            dims: [3, 2, 2, 2, 1, 1, 1, 1],
            pix_dims: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            sform_code: 1,
            ..RawHeader::default()
        }
    }

    #[test]
    fn test_numeric_magic_is_replaced() {
        let mut header = header_3d();
        header.magic = Magic::Code(1);
        normalize_header(&mut header, &mut Vec::new(), false).unwrap();
        assert_eq!(header.magic, Magic::Text("n+1".to_string()));
    }

    #[test]
    fn test_zero_pixdim_is_fatal() {
        let mut header = header_3d();
        header.pix_dims[2] = 0.0;
        assert_matches!(
            normalize_header(&mut header, &mut Vec::new(), false),
            Err(CanonError::ImplausibleGeometry { axis: 2 })
        );
    }

    #[test]
    fn test_scale_defaults() {
        let mut header = header_3d();
        header.scl_slope = 0.0;
        header.scl_inter = f64::NAN;
        normalize_header(&mut header, &mut Vec::new(), false).unwrap();
        assert_eq!(header.scl_slope, 1.0);
        assert_eq!(header.scl_inter, 0.0);

        let mut header = header_3d();
        header.scl_slope = f64::NAN;
        header.scl_inter = 4.0;
        normalize_header(&mut header, &mut Vec::new(), false).unwrap();
        assert_eq!(header.scl_slope, 1.0);
        assert_eq!(header.scl_inter, 4.0);
    }

    #[test]
    fn test_qform_preferred_over_missing_sform() {
        let mut header = RawHeader {
            qform_code: 1,
            sform_code: 0,
            pix_dims: [1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0],
            qoffset_x: 10.0,
            qoffset_y: 20.0,
            qoffset_z: 30.0,
            ..RawHeader::default()
        };
        let report = normalize_header(&mut header, &mut Vec::new(), false).unwrap();

        let expected = Matrix4::new(
            2.0, 0.0, 0.0, 10.0, //
            0.0, 2.0, 0.0, 20.0, //
            0.0, 0.0, 2.0, 30.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        assert_relative_eq!(header.affine_matrix(), expected);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_sform_kept_when_authoritative() {
        let mut header = header_3d();
        header.affine[0][3] = -42.0;
        header.qoffset_x = 99.0;
        normalize_header(&mut header, &mut Vec::new(), false).unwrap();
        assert_eq!(header.affine[0][3], -42.0);

        // unless the caller asks for the qform
        normalize_header(&mut header, &mut Vec::new(), true).unwrap();
        assert_eq!(header.affine[0][3], 99.0);
    }

    #[test]
    fn test_negative_qfac_flips_third_column() {
        let mut header = header_3d();
        header.pix_dims[0] = -1.0;
        header.pix_dims[3] = 3.0;
        let (affine, diagnostic) = quaternion_to_affine(&header);
        assert!(diagnostic.is_none());
        assert_relative_eq!(affine[(2, 2)], -3.0);
    }

    #[test]
    fn test_quaternion_rotation() {
        // 90 degrees about z: b = c = 0, d = sin(45°)
        let mut header = header_3d();
        header.quatern_d = std::f64::consts::FRAC_1_SQRT_2;
        let (affine, _) = quaternion_to_affine(&header);
        assert_relative_eq!(affine[(0, 1)], -1.0, epsilon = 1e-12);
        assert_relative_eq!(affine[(1, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(affine[(0, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_quaternion_is_clamped() {
        let mut header = header_3d();
        header.quatern_b = 1.0;
        header.quatern_c = 1.0;
        let (affine, diagnostic) = quaternion_to_affine(&header);
        assert_matches!(diagnostic, Some(Diagnostic::MalformedQuaternion { .. }));
        assert!(affine.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_degenerate_affine_falls_back_to_diagonal() {
        let mut header = header_3d();
        header.affine = [[0.0; 4]; 4];
        header.sform_code = 1;
        header.qform_code = 0;
        header.quatern_b = f64::NAN;
        header.pix_dims[1] = f64::NAN;
        header.pix_dims[2] = 2.0;
        header.pix_dims[3] = 4.0;

        let report = normalize_header(&mut header, &mut Vec::new(), false).unwrap();

        assert_eq!(report.diagnostics, vec![Diagnostic::DegenerateAffine]);
        assert_eq!(&header.pix_dims[1..=3], &[1.0, 2.0, 4.0]);
        assert_relative_eq!(
            header.affine_matrix(),
            Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 2.0, 4.0))
        );
    }

    #[test]
    fn test_vector_field_is_repacked_to_rgb() {
        let mut header = header_3d();
        header.dims = [4, 2, 1, 1, 3, 1, 1, 1];
        header.intent_code = INTENT_RGB_VECTOR;
        header.datatype_code = DataType::Float32.code();
        header.num_bits_per_voxel = 32;

        // planes: x = [1, -2], y = [0, 4], z = [-4, 0.5]
        let planes: [f32; 6] = [1.0, -2.0, 0.0, 4.0, -4.0, 0.5];
        let mut bytes: Vec<u8> = planes.iter().flat_map(|v| v.to_le_bytes()).collect();

        let report = normalize_header(&mut header, &mut bytes, false).unwrap();

        assert_eq!(report.frame_count, 1);
        assert_eq!(header.datatype_code, DataType::Rgb24.code());
        assert_eq!(header.num_bits_per_voxel, 24);
        assert_eq!(header.dims[4], 1);
        assert_eq!(bytes, vec![64, 0, 255, 128, 255, 32]);
    }

    #[test]
    fn test_big_endian_f64_vector_field_is_repacked() {
        let mut header = header_3d();
        header.dims = [5, 2, 1, 1, 1, 3, 1, 1];
        header.intent_code = INTENT_VECTOR;
        header.datatype_code = DataType::Float64.code();
        header.num_bits_per_voxel = 64;
        header.little_endian = false;

        let planes: [f64; 6] = [1.0, -2.0, 0.0, 4.0, -4.0, 0.5];
        let mut bytes: Vec<u8> = planes.iter().flat_map(|v| v.to_be_bytes()).collect();

        let report = normalize_header(&mut header, &mut bytes, false).unwrap();

        assert_eq!(report.frame_count, 1);
        assert_eq!(header.datatype_code, DataType::Rgb24.code());
        assert_eq!(header.dims[5], 1);
        assert_eq!(bytes, vec![64, 0, 255, 128, 255, 32]);
    }

    #[test]
    fn test_overflowing_vector_field_is_left_alone() {
        let mut header = header_3d();
        header.dims = [4, 1 << 22, 1 << 22, 1 << 22, 3, 1, 1, 1];
        header.intent_code = INTENT_VECTOR;
        header.datatype_code = DataType::Float32.code();
        header.num_bits_per_voxel = 32;
        let mut bytes = vec![0u8; 24];

        let report = normalize_header(&mut header, &mut bytes, false).unwrap();
        assert_eq!(report.frame_count, 3);
        assert_eq!(bytes.len(), 24);
        assert_eq!(header.datatype_code, DataType::Float32.code());
    }

    #[test]
    fn test_scalar_4d_float_is_not_repacked() {
        let mut header = header_3d();
        header.dims = [4, 1, 1, 1, 3, 1, 1, 1];
        header.datatype_code = DataType::Float32.code();
        let mut bytes = vec![0u8; 12];

        let report = normalize_header(&mut header, &mut bytes, false).unwrap();
        assert_eq!(report.frame_count, 3);
        assert_eq!(bytes.len(), 12);
        assert_eq!(header.datatype_code, DataType::Float32.code());
    }
}

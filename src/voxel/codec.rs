//! Byte-order correction and typed reinterpretation of raw voxel bytes

use super::VoxelBuffer;
use crate::error::{CanonError, Diagnostic};
use crate::header::RawHeader;
use crate::types::DataType;
use byteorder::{ByteOrder, NativeEndian};

/// Result of decoding: the typed buffer plus any size anomaly
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVoxels {
    pub buffer: VoxelBuffer,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reverse the byte order of every `width`-byte element in place
///
/// Trailing bytes that do not fill a whole element are left untouched.
pub fn swap_bytes_in_place(bytes: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for element in bytes.chunks_exact_mut(width) {
        element.reverse();
    }
}

/// Decode raw voxel bytes into a typed buffer
///
/// Bytes are swapped to host order when the header says so, then
/// reinterpreted according to the datatype. Signed 8-bit data is widened to
/// 16-bit and 32/64-bit integers to `f64`; the header's datatype code and
/// bit depth are updated to match.
///
/// # Errors
///
/// Returns `CanonError::UnsupportedDatatype` for datatype codes outside the
/// recognized set (complex, float128, ...)
pub fn decode_voxels(
    header: &mut RawHeader,
    mut bytes: Vec<u8>,
) -> Result<DecodedVoxels, CanonError> {
    let datatype = DataType::from_code(header.datatype_code)?;

    let host_little_endian = cfg!(target_endian = "little");
    if !datatype.is_color()
        && header.num_bits_per_voxel > 8
        && header.little_endian != host_little_endian
    {
        let width = usize::try_from(header.num_bits_per_voxel / 8).unwrap_or(1);
        log::debug!("swapping {width}-byte voxels to host byte order");
        swap_bytes_in_place(&mut bytes, width);
    }

    let buffer = match datatype {
        DataType::UInt8 => VoxelBuffer::U8(bytes),
        DataType::Int8 => {
            header.datatype_code = DataType::Int16.code();
            header.num_bits_per_voxel = 16;
            VoxelBuffer::I16(bytes.iter().map(|&b| i16::from(i8::from_ne_bytes([b]))).collect())
        }
        DataType::Int16 => VoxelBuffer::I16(read_typed(&bytes, NativeEndian::read_i16_into)),
        DataType::UInt16 => VoxelBuffer::U16(read_typed(&bytes, NativeEndian::read_u16_into)),
        DataType::Float32 => VoxelBuffer::F32(read_typed(&bytes, NativeEndian::read_f32_into)),
        DataType::Float64 => VoxelBuffer::F64(read_typed(&bytes, NativeEndian::read_f64_into)),
        DataType::UInt32 => {
            let raw: Vec<u32> = read_typed(&bytes, NativeEndian::read_u32_into);
            widen_to_f64(header, raw.into_iter().map(f64::from))
        }
        DataType::Int32 => {
            let raw: Vec<i32> = read_typed(&bytes, NativeEndian::read_i32_into);
            widen_to_f64(header, raw.into_iter().map(f64::from))
        }
        DataType::Int64 => {
            let raw: Vec<i64> = read_typed(&bytes, NativeEndian::read_i64_into);
            // magnitudes above 2^53 lose precision
            #[allow(clippy::cast_precision_loss)]
            let widened = raw.into_iter().map(|v| v as f64);
            widen_to_f64(header, widened)
        }
        DataType::Rgb24 => VoxelBuffer::Rgb(
            bytes
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect(),
        ),
        DataType::Rgba32 => VoxelBuffer::Rgba(
            bytes
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect(),
        ),
    };

    // an overflowing count can never match, so it is reported as usize::MAX
    let expected = header.voxel_count().unwrap_or(usize::MAX);
    let mut diagnostics = Vec::new();
    if buffer.len() != expected {
        diagnostics.push(
            Diagnostic::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            }
            .raise(),
        );
    }

    Ok(DecodedVoxels {
        buffer,
        diagnostics,
    })
}

/// Reinterpret host-order bytes as `T`, ignoring a trailing partial element
fn read_typed<T: Default + Clone>(bytes: &[u8], read_into: fn(&[u8], &mut [T])) -> Vec<T> {
    let width = std::mem::size_of::<T>();
    let count = bytes.len() / width;
    let mut out = vec![T::default(); count];
    read_into(&bytes[..count * width], &mut out);
    out
}

fn widen_to_f64(header: &mut RawHeader, values: impl Iterator<Item = f64>) -> VoxelBuffer {
    header.datatype_code = DataType::Float64.code();
    header.num_bits_per_voxel = 64;
    VoxelBuffer::F64(values.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn header(datatype: DataType, nx: i64, little_endian: bool) -> RawHeader {
        let mut header = RawHeader::default();
        header.dims[1] = nx;
        header.datatype_code = datatype.code();
        header.num_bits_per_voxel = datatype.bits_per_voxel();
        header.little_endian = little_endian;
        header
    }

    #[test]
    fn test_double_swap_is_identity() {
        let original: Vec<u8> = (0u8..48).collect();
        for width in [2, 4, 8] {
            let mut bytes = original.clone();
            swap_bytes_in_place(&mut bytes, width);
            assert_ne!(bytes, original);
            swap_bytes_in_place(&mut bytes, width);
            assert_eq!(bytes, original, "width {width}");
        }
    }

    #[test]
    fn test_swap_reverses_each_element() {
        let mut bytes = vec![1, 2, 3, 4, 5, 6, 7, 8];
        swap_bytes_in_place(&mut bytes, 4);
        assert_eq!(bytes, vec![4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn test_big_endian_int16() {
        let mut hdr = header(DataType::Int16, 2, false);
        let decoded = decode_voxels(&mut hdr, vec![0x01, 0x02, 0xff, 0xfe]).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::I16(vec![0x0102, -2]));
        assert!(decoded.diagnostics.is_empty());
    }

    #[test]
    fn test_little_endian_float32() {
        let mut hdr = header(DataType::Float32, 2, true);
        let mut bytes = 1.5f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-4.0f32).to_le_bytes());
        let decoded = decode_voxels(&mut hdr, bytes).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::F32(vec![1.5, -4.0]));
    }

    #[test]
    fn test_int8_widens_to_int16() {
        let mut hdr = header(DataType::Int8, 3, true);
        let decoded = decode_voxels(&mut hdr, vec![0x80, 0x00, 0x7f]).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::I16(vec![-128, 0, 127]));
        assert_eq!(hdr.datatype_code, 4);
        assert_eq!(hdr.num_bits_per_voxel, 16);
    }

    #[test]
    fn test_wide_integers_become_f64() {
        let mut hdr = header(DataType::UInt32, 1, true);
        let decoded = decode_voxels(&mut hdr, 4_000_000_000u32.to_le_bytes().to_vec()).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::F64(vec![4.0e9]));
        assert_eq!(hdr.datatype_code, 64);

        let mut hdr = header(DataType::Int64, 1, false);
        let decoded = decode_voxels(&mut hdr, (-7i64).to_be_bytes().to_vec()).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::F64(vec![-7.0]));
    }

    #[test]
    fn test_rgb_is_never_swapped() {
        let mut hdr = header(DataType::Rgb24, 2, false);
        let decoded = decode_voxels(&mut hdr, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(decoded.buffer, VoxelBuffer::Rgb(vec![[1, 2, 3], [4, 5, 6]]));
    }

    #[test]
    fn test_unsupported_datatype() {
        let mut hdr = RawHeader::default();
        hdr.datatype_code = 32; // complex64
        assert_matches!(
            decode_voxels(&mut hdr, vec![0; 8]),
            Err(CanonError::UnsupportedDatatype(32))
        );
    }

    #[test]
    fn test_short_buffer_is_reported_not_fatal() {
        let mut hdr = header(DataType::Int16, 4, true);
        let decoded = decode_voxels(&mut hdr, vec![0; 5]).unwrap();
        assert_eq!(decoded.buffer.len(), 2);
        assert_eq!(
            decoded.diagnostics,
            vec![Diagnostic::BufferSizeMismatch {
                expected: 4,
                actual: 2
            }]
        );
    }
}

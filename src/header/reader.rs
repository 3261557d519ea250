//! NIfTI-1/2 binary header decoding
//!
//! Supports the 348-byte NIfTI-1 and the 540-byte NIfTI-2 layouts in either
//! byte order, detected from `sizeof_hdr`. Gzip-compressed input is
//! inflated first.

use super::normalize::quaternion_to_affine;
use super::{Magic, RawHeader};
use crate::error::CanonError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiftiVersion {
    Nifti1,
    Nifti2,
}

impl NiftiVersion {
    #[must_use]
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }
}

/// NIfTI-1 field byte offsets
mod offsets_v1 {
    pub const DIM: usize = 40;
    pub const INTENT_CODE: usize = 68;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const SCL_SLOPE: usize = 112;
    pub const SCL_INTER: usize = 116;
    pub const CAL_MAX: usize = 124;
    pub const CAL_MIN: usize = 128;
    pub const DESCRIP: usize = 148;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QOFFSET_X: usize = 268;
    pub const SROW_X: usize = 280;
    pub const MAGIC: usize = 344;
}

/// NIfTI-2 field byte offsets
mod offsets_v2 {
    pub const MAGIC: usize = 4;
    pub const DATATYPE: usize = 12;
    pub const BITPIX: usize = 14;
    pub const DIM: usize = 16;
    pub const PIXDIM: usize = 104;
    pub const VOX_OFFSET: usize = 168;
    pub const SCL_SLOPE: usize = 176;
    pub const SCL_INTER: usize = 184;
    pub const CAL_MAX: usize = 192;
    pub const CAL_MIN: usize = 200;
    pub const DESCRIP: usize = 240;
    pub const QFORM_CODE: usize = 344;
    pub const SFORM_CODE: usize = 348;
    pub const QUATERN_B: usize = 352;
    pub const QOFFSET_X: usize = 376;
    pub const SROW_X: usize = 400;
    pub const INTENT_CODE: usize = 504;
}

const GZIP_SIGNATURE: [u8; 2] = [0x1f, 0x8b];

/// Decode a complete single-file NIfTI image (optionally gzipped) into its
/// header and the raw voxel bytes that follow `vox_offset`
///
/// # Errors
///
/// Returns an error if decompression fails, the header is not NIfTI-1/2,
/// or `vox_offset` points past the end of the data
pub fn read_nifti(data: &[u8]) -> Result<(RawHeader, Vec<u8>), CanonError> {
    let data: Cow<'_, [u8]> = if data.starts_with(&GZIP_SIGNATURE) {
        let mut inflated = Vec::new();
        GzDecoder::new(data).read_to_end(&mut inflated)?;
        log::debug!("inflated {} gzip bytes to {}", data.len(), inflated.len());
        Cow::Owned(inflated)
    } else {
        Cow::Borrowed(data)
    };

    let (header, version) = read_nifti_header(&data)?;

    let offset = usize::try_from(header.vox_offset)
        .ok()
        .map(|o| o.max(version.header_size()))
        .filter(|&o| o <= data.len())
        .ok_or_else(|| {
            CanonError::InvalidHeader(format!(
                "vox_offset {} is outside the {}-byte image",
                header.vox_offset,
                data.len()
            ))
        })?;

    let width = usize::try_from(header.num_bits_per_voxel.max(8) / 8).unwrap_or(1);
    let end = header
        .voxel_count()
        .and_then(|n| n.checked_mul(width))
        .and_then(|n| offset.checked_add(n))
        .map_or(data.len(), |end| end.min(data.len()));

    Ok((header, data[offset..end].to_vec()))
}

/// Decode a NIfTI-1 or NIfTI-2 header
///
/// The affine is taken from the sform rows when `sform_code > 0`, else from
/// the quaternion when `qform_code > 0`, else from the pixdims.
///
/// # Errors
///
/// Returns `CanonError::InvalidHeader` when `sizeof_hdr` matches neither
/// layout or the buffer is shorter than the header
pub fn read_nifti_header(bytes: &[u8]) -> Result<(RawHeader, NiftiVersion), CanonError> {
    let Some(prefix) = bytes.get(..4) else {
        return Err(CanonError::InvalidHeader(
            "too short to hold sizeof_hdr".to_string(),
        ));
    };

    let (version, little_endian) = match (
        LittleEndian::read_i32(prefix),
        BigEndian::read_i32(prefix),
    ) {
        (348, _) => (NiftiVersion::Nifti1, true),
        (_, 348) => (NiftiVersion::Nifti1, false),
        (540, _) => (NiftiVersion::Nifti2, true),
        (_, 540) => (NiftiVersion::Nifti2, false),
        (le, _) => {
            return Err(CanonError::InvalidHeader(format!(
                "sizeof_hdr {le} is neither 348 nor 540"
            )));
        }
    };

    if bytes.len() < version.header_size() {
        return Err(CanonError::InvalidHeader(format!(
            "got {} bytes, need {} for {version:?}",
            bytes.len(),
            version.header_size()
        )));
    }

    let mut header = match (version, little_endian) {
        (NiftiVersion::Nifti1, true) => parse_v1::<LittleEndian>(bytes),
        (NiftiVersion::Nifti1, false) => parse_v1::<BigEndian>(bytes),
        (NiftiVersion::Nifti2, true) => parse_v2::<LittleEndian>(bytes),
        (NiftiVersion::Nifti2, false) => parse_v2::<BigEndian>(bytes),
    };
    header.little_endian = little_endian;

    if header.sform_code <= 0 {
        if header.qform_code > 0 {
            // normalize_header re-derives this affine and records the diagnostic
            let (affine, _) = quaternion_to_affine(&header);
            header.set_affine_matrix(&affine);
        } else {
            for axis in 0..3 {
                header.affine[axis][axis] = header.pix_dims[axis + 1];
            }
        }
    }

    log::debug!(
        "{version:?} header: dims {:?}, datatype {}, {} endian",
        header.dims,
        header.datatype_code,
        if little_endian { "little" } else { "big" }
    );

    Ok((header, version))
}

fn text_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

#[allow(clippy::wildcard_imports)]
fn parse_v1<E: ByteOrder>(bytes: &[u8]) -> RawHeader {
    use offsets_v1::*;

    let f32_at = |offset: usize| f64::from(E::read_f32(&bytes[offset..offset + 4]));

    let mut header = RawHeader::default();
    for (i, d) in header.dims.iter_mut().enumerate() {
        let offset = DIM + i * 2;
        *d = i64::from(E::read_i16(&bytes[offset..offset + 2]));
    }
    for (i, p) in header.pix_dims.iter_mut().enumerate() {
        *p = f32_at(PIXDIM + i * 4);
    }
    for (row, srow) in header.affine.iter_mut().take(3).enumerate() {
        for (col, v) in srow.iter_mut().enumerate() {
            *v = f32_at(SROW_X + row * 16 + col * 4);
        }
    }

    header.intent_code = i32::from(E::read_i16(&bytes[INTENT_CODE..INTENT_CODE + 2]));
    header.datatype_code = E::read_i16(&bytes[DATATYPE..DATATYPE + 2]);
    header.num_bits_per_voxel = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
    header.vox_offset = f32_at(VOX_OFFSET) as i64;
    header.scl_slope = f32_at(SCL_SLOPE);
    header.scl_inter = f32_at(SCL_INTER);
    header.cal_max = f32_at(CAL_MAX);
    header.cal_min = f32_at(CAL_MIN);
    header.description = text_field(&bytes[DESCRIP..DESCRIP + 80]);
    header.qform_code = i32::from(E::read_i16(&bytes[QFORM_CODE..QFORM_CODE + 2]));
    header.sform_code = i32::from(E::read_i16(&bytes[SFORM_CODE..SFORM_CODE + 2]));
    header.quatern_b = f32_at(QUATERN_B);
    header.quatern_c = f32_at(QUATERN_B + 4);
    header.quatern_d = f32_at(QUATERN_B + 8);
    header.qoffset_x = f32_at(QOFFSET_X);
    header.qoffset_y = f32_at(QOFFSET_X + 4);
    header.qoffset_z = f32_at(QOFFSET_X + 8);
    header.magic = Magic::Text(text_field(&bytes[MAGIC..MAGIC + 4]));
    header
}

#[allow(clippy::wildcard_imports)]
fn parse_v2<E: ByteOrder>(bytes: &[u8]) -> RawHeader {
    use offsets_v2::*;

    let f64_at = |offset: usize| E::read_f64(&bytes[offset..offset + 8]);

    let mut header = RawHeader::default();
    for (i, d) in header.dims.iter_mut().enumerate() {
        let offset = DIM + i * 8;
        *d = E::read_i64(&bytes[offset..offset + 8]);
    }
    for (i, p) in header.pix_dims.iter_mut().enumerate() {
        *p = f64_at(PIXDIM + i * 8);
    }
    for (row, srow) in header.affine.iter_mut().take(3).enumerate() {
        for (col, v) in srow.iter_mut().enumerate() {
            *v = f64_at(SROW_X + row * 32 + col * 8);
        }
    }

    header.intent_code = E::read_i32(&bytes[INTENT_CODE..INTENT_CODE + 4]);
    header.datatype_code = E::read_i16(&bytes[DATATYPE..DATATYPE + 2]);
    header.num_bits_per_voxel = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
    header.vox_offset = E::read_i64(&bytes[VOX_OFFSET..VOX_OFFSET + 8]);
    header.scl_slope = f64_at(SCL_SLOPE);
    header.scl_inter = f64_at(SCL_INTER);
    header.cal_max = f64_at(CAL_MAX);
    header.cal_min = f64_at(CAL_MIN);
    header.description = text_field(&bytes[DESCRIP..DESCRIP + 80]);
    header.qform_code = E::read_i32(&bytes[QFORM_CODE..QFORM_CODE + 4]);
    header.sform_code = E::read_i32(&bytes[SFORM_CODE..SFORM_CODE + 4]);
    header.quatern_b = f64_at(QUATERN_B);
    header.quatern_c = f64_at(QUATERN_B + 8);
    header.quatern_d = f64_at(QUATERN_B + 16);
    header.qoffset_x = f64_at(QOFFSET_X);
    header.qoffset_y = f64_at(QOFFSET_X + 8);
    header.qoffset_z = f64_at(QOFFSET_X + 16);
    header.magic = Magic::Text(text_field(&bytes[MAGIC..MAGIC + 8]));
    header
}

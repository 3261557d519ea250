use nalgebra::Matrix4;
use thiserror::Error;

/// Why an affine cannot be used as a voxel-to-mm transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AffineDefect {
    #[error("affine entry ({row}, {col}) is not finite")]
    NonFinite { row: usize, col: usize },

    #[error("affine row {0} has no non-zero rotation entry")]
    EmptyRow(usize),

    #[error("affine column {0} has no non-zero rotation entry")]
    EmptyColumn(usize),
}

/// Check the upper 3x4 part of an affine for NaN/infinite entries and for
/// rows or columns of the 3x3 block that are entirely zero
///
/// # Errors
///
/// Returns the first defect found
pub fn validate_affine(mtx: &Matrix4<f64>) -> Result<(), AffineDefect> {
    for row in 0..3 {
        for col in 0..4 {
            if !mtx[(row, col)].is_finite() {
                return Err(AffineDefect::NonFinite { row, col });
            }
        }
    }

    let mut row_ok = [false; 3];
    let mut col_ok = [false; 3];
    for row in 0..3 {
        for col in 0..3 {
            if mtx[(row, col)] != 0.0 {
                row_ok[row] = true;
                col_ok[col] = true;
            }
        }
    }

    if let Some(row) = row_ok.iter().position(|ok| !ok) {
        return Err(AffineDefect::EmptyRow(row));
    }
    if let Some(col) = col_ok.iter().position(|ok| !ok) {
        return Err(AffineDefect::EmptyColumn(col));
    }

    Ok(())
}

#[inline]
#[must_use]
pub fn is_affine_ok(mtx: &Matrix4<f64>) -> bool {
    validate_affine(mtx).is_ok()
}

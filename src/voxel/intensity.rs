//! Display intensity range estimation by percentile clipping
//!
//! At most two passes over the buffer: one for the extrema, one to fill a
//! histogram of [`HISTOGRAM_BINS`] bins.

use super::VoxelBuffer;
use crate::header::RawHeader;
use crate::types::RescaleParams;
use std::fmt;

pub const HISTOGRAM_BINS: usize = 1001;

/// Knobs of the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityOptions {
    /// Fraction of voxels clipped at each end, within `[0, 0.5]`
    pub percentile_frac: f64,
    pub ignore_zero_voxels: bool,
    /// Use the header's `cal_min`/`cal_max` as-is when they form a finite range
    pub cal_min_max_trusted: bool,
}

impl Default for IntensityOptions {
    fn default() -> Self {
        Self {
            percentile_frac: 0.02,
            ignore_zero_voxels: false,
            cal_min_max_trusted: true,
        }
    }
}

/// Scaled intensity bounds of a volume
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntensityRange {
    pub cal_min: f64,
    pub cal_max: f64,
    pub robust_min: f64,
    pub robust_max: f64,
    pub global_min: f64,
    pub global_max: f64,
}

impl IntensityRange {
    fn display(min: f64, max: f64, global_min: f64, global_max: f64) -> Self {
        Self {
            cal_min: min,
            cal_max: max,
            robust_min: min,
            robust_max: max,
            global_min,
            global_max,
        }
    }
}

impl fmt::Display for IntensityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4}..{:.4} (global {:.4}..{:.4})",
            self.cal_min, self.cal_max, self.global_min, self.global_max
        )
    }
}

/// Estimate the display range of `buffer`
///
/// Non-finite voxels never contribute. Zero voxels are skipped when
/// `ignore_zero_voxels` is set. Header `cal_min`/`cal_max` are preferred
/// over the histogram cutoffs when they lie strictly inside the scaled
/// global range.
#[must_use]
pub fn cal_min_max(
    buffer: &VoxelBuffer,
    header: &RawHeader,
    options: &IntensityOptions,
) -> IntensityRange {
    let (hdr_min, hdr_max) = (header.cal_min, header.cal_max);

    if options.cal_min_max_trusted
        && hdr_min < hdr_max
        && hdr_min.is_finite()
        && hdr_max.is_finite()
    {
        log::debug!("using trusted header range {hdr_min}..{hdr_max}");
        return IntensityRange::display(hdr_min, hdr_max, hdr_min, hdr_max);
    }

    let rescale = RescaleParams::new(header.scl_slope, header.scl_inter);
    let scaled_pair = |lo: f64, hi: f64| {
        let (a, b) = (rescale.apply(lo), rescale.apply(hi));
        if a <= b { (a, b) } else { (b, a) }
    };

    let skip = |v: f64| !v.is_finite() || (options.ignore_zero_voxels && v == 0.0);

    let mut mn = f64::INFINITY;
    let mut mx = f64::NEG_INFINITY;
    let mut excluded = 0usize;
    for v in buffer.values() {
        if skip(v) {
            excluded += 1;
            continue;
        }
        mn = mn.min(v);
        mx = mx.max(v);
    }
    if mn > mx {
        log::warn!("no finite voxels to estimate an intensity range from");
        mn = 0.0;
        mx = 0.0;
    }

    let (global_min, global_max) = scaled_pair(mn, mx);

    let frac = options.percentile_frac.clamp(0.0, 0.5);
    let included = buffer.len() - excluded;
    let n2pct = (included as f64 * frac).round() as usize;
    if n2pct < 1 || mn == mx {
        return IntensityRange::display(global_min, global_max, global_min, global_max);
    }

    let last_bin = HISTOGRAM_BINS - 1;
    let scl = last_bin as f64 / (mx - mn);
    let mut hist = vec![0usize; HISTOGRAM_BINS];
    for v in buffer.values() {
        if skip(v) {
            continue;
        }
        let bin = ((v - mn) * scl).round() as usize;
        hist[bin.min(last_bin)] += 1;
    }

    let mut lo = 0;
    let mut n = 0;
    while n < n2pct && lo < HISTOGRAM_BINS {
        n += hist[lo];
        lo += 1;
    }
    lo = lo.saturating_sub(1);

    let mut hi = HISTOGRAM_BINS;
    n = 0;
    while n < n2pct && hi > 0 {
        hi -= 1;
        n += hist[hi];
    }
    hi = hi.min(last_bin);

    if lo == hi {
        loop {
            if lo > 0 {
                lo -= 1;
                if hist[lo] > 0 {
                    break;
                }
            }
            if hi < last_bin {
                hi += 1;
                if hist[hi] > 0 {
                    break;
                }
            }
            if lo == 0 && hi == last_bin {
                break;
            }
        }
    }

    let (pct_lo, pct_hi) = scaled_pair(lo as f64 / scl + mn, hi as f64 / scl + mn);

    if hdr_min < hdr_max && hdr_min > global_min && hdr_max < global_max {
        log::debug!("header range {hdr_min}..{hdr_max} preferred over {pct_lo}..{pct_hi}");
        return IntensityRange::display(hdr_min, hdr_max, global_min, global_max);
    }

    IntensityRange::display(pct_lo, pct_hi, global_min, global_max)
}

use crate::error::CanonError;
use crate::header::RawHeader;
use crate::types::ImageType;
use crate::volume::VolumeOptions;
use clap::Parser;
use std::fmt;
use std::path::{Path, PathBuf};

/// Reorient NIfTI volumes to RAS and report their canonical geometry
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// NIfTI file path(s) (.nii or .nii.gz)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Derive the affine from the quaternion even when an sform is present
    #[arg(short, long)]
    pub qform: bool,

    /// Fraction of voxels clipped at each end of the display range
    #[arg(short, long, default_value_t = 0.02)]
    pub percentile: f64,

    /// Leave zero voxels out of the display range
    #[arg(short = 'z', long)]
    pub ignore_zeros: bool,

    /// Use the header's cal_min/cal_max as the display range when valid
    #[arg(short = 't', long)]
    pub trust_cal: bool,

    /// Show the header fields as well
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Canonicalization settings for `path`
    #[must_use]
    pub fn volume_options(&self, path: &Path) -> VolumeOptions {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        VolumeOptions {
            image_type: ImageType::from_file_name(&name),
            name,
            use_qform_not_sform: self.qform,
            percentile_frac: self.percentile.clamp(0.0, 0.5),
            ignore_zero_voxels: self.ignore_zeros,
            cal_min_max_trusted: self.trust_cal,
        }
    }
}

/// Failure while processing one file on the command line
#[derive(Debug)]
pub enum ProcessError {
    /// File could not be read
    ReadFailed(anyhow::Error),

    /// File read but it is not a NIfTI image - no header available
    NotANifti(String),

    /// Header decoded, but canonicalization failed
    CanonicalizationFailed {
        header: Box<RawHeader>,
        error: CanonError,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::ReadFailed(e) => write!(f, "{e:#}"),
            ProcessError::NotANifti(msg) => write!(f, "{msg}"),
            ProcessError::CanonicalizationFailed { error, .. } => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for ProcessError {}

impl ProcessError {
    /// Returns the header if it was decoded (for verbose display before error)
    #[must_use]
    pub fn header(&self) -> Option<&RawHeader> {
        match self {
            ProcessError::CanonicalizationFailed { header, .. } => Some(header),
            _ => None,
        }
    }
}

pub mod cli;
pub mod display_metadata;
pub mod error;
pub mod geometry;
pub mod header;
pub mod types;
pub mod volume;
pub mod voxel;

// Re-export commonly used items
pub use display_metadata::{print_header, print_volume};
pub use error::{CanonError, Diagnostic};
pub use header::{RawHeader, read_nifti};
pub use volume::{CanonicalVolume, VolumeOptions, canonicalize};

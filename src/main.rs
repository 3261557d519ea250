use anyhow::Context;
use clap::{CommandFactory, Parser};
use niicanon::cli::{Args, ProcessError};
use niicanon::{CanonicalVolume, canonicalize, header};
use std::path::Path;

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.files.is_empty() {
        let _ = Args::command().print_help();
        println!();
        return;
    }

    let multiple_files = args.files.len() > 1;
    let mut any_failed = false;

    for (idx, file_path) in args.files.iter().enumerate() {
        if multiple_files {
            println!("{}", file_path.display());
        }

        match process_file(file_path, &args) {
            Ok(volume) => niicanon::print_volume(&volume),
            Err(e) => {
                println!("Error: {e}");
                any_failed = true;
            }
        }

        if multiple_files && idx < args.files.len() - 1 {
            println!();
        }
    }

    if any_failed {
        std::process::exit(1);
    }
}

/// Canonicalize a single NIfTI file
fn process_file(file_path: &Path, args: &Args) -> Result<CanonicalVolume, ProcessError> {
    // Stage 1: Read the file
    let data = std::fs::read(file_path)
        .with_context(|| format!("failed to read {}", file_path.display()))
        .map_err(ProcessError::ReadFailed)?;

    // Stage 2: Decode the header
    let (raw_header, voxels) =
        header::read_nifti(&data).map_err(|e| ProcessError::NotANifti(e.to_string()))?;

    // Stage 3: Verbose output (print before canonicalization can fail)
    if args.verbose {
        niicanon::print_header(&raw_header);
    }

    // Stage 4: Canonicalize
    let options = args.volume_options(file_path);
    canonicalize(raw_header.clone(), voxels, &options).map_err(|error| {
        ProcessError::CanonicalizationFailed {
            header: Box::new(raw_header),
            error,
        }
    })
}

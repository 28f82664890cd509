//! Bulk conversion of an artwork directory to RGB PNGs.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::artwork::source::FileImageSource;
use crate::error::{PokembedError, Result};
use crate::store::atomic::write_atomic;

/// A file that could not be converted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionFailure {
    pub file: String,
    pub reason: String,
}

/// Result of converting a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub input_dir: String,
    pub output_dir: String,
    pub found: usize,
    pub converted: usize,
    pub failures: Vec<ConversionFailure>,
    pub duration_ms: u64,
}

/// Flatten every `*.png` in `input` onto white and save it under the same
/// name in `output`.
///
/// Files are processed in parallel; a failing file is recorded and skipped.
pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ConversionSummary> {
    let input = input.as_ref();
    let output = output.as_ref();
    let start = Instant::now();

    if !input.is_dir() {
        return Err(PokembedError::not_found(input));
    }
    fs::create_dir_all(output)?;

    let mut files: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    files.sort();

    info!("Found {} images in {}", files.len(), input.display());

    let source = FileImageSource::new();
    let failures: Vec<ConversionFailure> = files
        .par_iter()
        .filter_map(|path| {
            let file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            match convert_file(&source, path, &output.join(&file)) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Error converting {file}: {e}");
                    Some(ConversionFailure {
                        file,
                        reason: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let summary = ConversionSummary {
        input_dir: input.display().to_string(),
        output_dir: output.display().to_string(),
        found: files.len(),
        converted: files.len() - failures.len(),
        failures,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Converted {}/{} images into {}",
        summary.converted,
        summary.found,
        output.display()
    );
    Ok(summary)
}

fn convert_file(source: &FileImageSource, from: &Path, to: &Path) -> Result<()> {
    let rgb = source.load_path(from)?;

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|e| PokembedError::other(format!("PNG encode failed: {e}")))?;

    write_atomic(to, encoded.get_ref())
}

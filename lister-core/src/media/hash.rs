use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Serialize;
use tracing::debug;

use super::error::{MediaError, MediaResult};

const HASH_SIDE: u32 = 8;

/// 64-bit average hash; bit 63 is the top-left cell, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn of_image(image: &DynamicImage) -> Self {
        let cells = image
            .grayscale()
            .thumbnail_exact(HASH_SIDE, HASH_SIDE)
            .to_luma8();
        let values: Vec<f64> = cells.pixels().map(|pixel| f64::from(pixel.0[0])).collect();
        let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
        let bits = values
            .iter()
            .fold(0u64, |acc, value| (acc << 1) | u64::from(*value > mean));
        Self(bits)
    }

    pub fn of_file(path: &Path) -> MediaResult<Self> {
        let decode = |source: image::ImageError| MediaError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let image = image::io::Reader::open(path)
            .map_err(|source| MediaError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| MediaError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .decode()
            .map_err(decode)?;
        Ok(Self::of_image(&image))
    }

    /// Hamming distance between two hashes.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Greedy first-wins selection: an item is kept unless it lies within
/// `threshold` of an already kept hash. Returns the kept indices in order.
pub fn select_distinct(hashes: &[PerceptualHash], threshold: u32) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for (index, hash) in hashes.iter().enumerate() {
        let duplicate = kept
            .iter()
            .any(|&other| hashes[other].distance(hash) <= threshold);
        if !duplicate {
            kept.push(index);
        }
    }
    kept
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    pub kept: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Lists the frame files of `dir` in ascending frame-index order.
///
/// Stems are compared as numbers so `10000.jpg` follows `9999.jpg`; files
/// without a numeric stem come last, by name.
pub fn frame_files(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let io = |source: std::io::Error| MediaError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| (frame_index(path).unwrap_or(u64::MAX), path.clone()));
    Ok(files)
}

fn frame_index(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.parse().ok()
}

/// Deletes near-duplicate frames from `dir`, keeping the first of each group.
pub fn dedup_directory(dir: &Path, threshold: u32) -> MediaResult<DedupReport> {
    let files = frame_files(dir)?;
    let hashes = files
        .iter()
        .map(|path| PerceptualHash::of_file(path))
        .collect::<MediaResult<Vec<_>>>()?;
    let kept = select_distinct(&hashes, threshold);

    let mut report = DedupReport::default();
    let mut keep_iter = kept.iter().peekable();
    for (index, path) in files.into_iter().enumerate() {
        if keep_iter.peek() == Some(&&index) {
            keep_iter.next();
            report.kept.push(path);
        } else {
            fs::remove_file(&path).map_err(|source| MediaError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(frame = %path.display(), hash = %hashes[index], "removed near-duplicate frame");
            report.removed.push(path);
        }
    }
    Ok(report)
}

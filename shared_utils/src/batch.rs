//! Batch processing module
//!
//! Candidate file collection and outcome aggregation for a conversion run.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recognized media extensions (lowercase, no dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "m4v", "webm"];

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect candidate files under `dir`, name-sorted for a deterministic
/// processing order.
pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Aggregated counts for one batch, success split by the strategy that
/// produced it.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total: usize,
    pub skipped: usize,
    pub remuxed: usize,
    pub hw_encoded: usize,
    pub sw_encoded: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn remux(&mut self) {
        self.total += 1;
        self.remuxed += 1;
    }

    pub fn hw_encode(&mut self) {
        self.total += 1;
        self.hw_encoded += 1;
    }

    pub fn sw_encode(&mut self) {
        self.total += 1;
        self.sw_encoded += 1;
    }

    pub fn fail(&mut self, path: PathBuf, error: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn succeeded(&self) -> usize {
        self.remuxed + self.hw_encoded + self.sw_encoded
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            ((self.succeeded() + self.skipped) as f64 / self.total as f64) * 100.0
        }
    }
}

//! External tool detection
//!
//! The whole pipeline rides on ffmpeg/ffprobe being present; fail loudly at
//! startup instead of on the first file.

use crate::errors::{Result, VidCompatError};

pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

pub fn check_tool(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Error with an install hint when `name` is not on PATH.
pub fn require_tool(name: &str) -> Result<()> {
    if check_tool(name) {
        Ok(())
    } else {
        Err(VidCompatError::ToolNotFound(format!(
            "{} not found on PATH. Install with: brew install ffmpeg (macOS) \
             or apt install ffmpeg (Debian/Ubuntu)",
            name
        )))
    }
}

/// Verify every tool the pipeline needs.
pub fn require_all() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        require_tool(tool)?;
    }
    Ok(())
}

//! vid-compat - Playback compatibility analysis and tiered H.264/MP4 conversion
//!
//! Classifies media files against a direct-play target profile and, when
//! needed, converts them with the cheapest strategy that restores
//! compatibility:
//! - Remux (container change only) when the streams already comply
//! - Hardware encode when a usable hw encoder is present
//! - Software libx264 encode as the terminal fallback
//!
//! ## Library use
//! ```rust,ignore
//! use vid_compat::{convert_file, ConvertConfig};
//! use shared_utils::CancelToken;
//! use std::path::Path;
//!
//! let config = ConvertConfig::default();
//! let outcome = convert_file(Path::new("video.mkv"), &config, &CancelToken::new())?;
//! ```

pub mod orchestrator;
pub mod runner;

// Re-exports
pub use orchestrator::{
    convert_file, derive_output_path, inspect_file, ConvertConfig, ConvertOutcome, OutcomeState,
};
pub use runner::{run_auto, run_check};

// Shared types
pub use shared_utils::{
    classify, CompatibilityVerdict, EncodePlan, EncodeStrategy, Issue, IssueKind,
    MediaDescription, Result, TargetProfile, VidCompatError,
};

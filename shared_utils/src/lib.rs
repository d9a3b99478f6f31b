//! Shared utilities for direct_play_boost tools
//!
//! This crate provides the common machinery behind vid-compat:
//! - FFprobe wrapper and media description parsing
//! - Playback compatibility classification against a target profile
//! - Encode planning (skip / remux / hw-encode / sw-encode) and ffmpeg
//!   argument construction
//! - Hardware encoder detection
//! - Encode process management (stderr drain, process-group cancellation)
//! - Live `-progress` stream parsing with monotonic percentages
//! - Batch collection, reporting, logging and safety checks

pub mod batch;
pub mod cancel;
pub mod compat;
pub mod errors;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod hw_encoder;
pub mod logging;
pub mod planner;
pub mod progress;
pub mod report;
pub mod safety;
pub mod tools;

pub use batch::{collect_files, has_extension, BatchResult, VIDEO_EXTENSIONS};
pub use cancel::{install_ctrlc_handler, CancelToken};
pub use compat::{classify, CompatibilityVerdict, Issue, IssueKind, TargetProfile};
pub use errors::{Result, VidCompatError};
pub use ffmpeg_process::{format_encode_error, EncodeProcess};
pub use ffprobe::{
    get_duration, is_ffprobe_available, normalize_level, parse_probe_output, probe_media,
    MediaDescription, Stream, StreamKind,
};
pub use hw_encoder::{HwAccel, HwEncoder, HwKind};
pub use planner::{
    build_plan, encode_args, force_software, next_tier, remux_args, scale_filter, EncodePlan,
    EncodeStrategy, AUDIO_BITRATE, DEFAULT_CRF, HW_BUFSIZE, HW_MAXRATE,
};
pub use progress::{
    create_batch_bar, create_encode_bar, format_bytes, format_duration, EncodeProgress,
};
pub use report::{
    print_check_file, print_check_header, print_check_tally, print_summary_report,
};
pub use safety::{check_dangerous_directory, check_safe_for_destructive};
pub use tools::{check_tool, require_all, require_tool, REQUIRED_TOOLS};

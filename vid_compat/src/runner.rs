//! Batch driver
//!
//! Iterates the candidate file set sequentially, invokes the per-file
//! orchestrator, aggregates outcomes and prints the summary report.
//! Cancellation propagates immediately — the remaining queue is halted,
//! never silently skipped.

use crate::orchestrator::{convert_file, ConvertConfig, ConvertOutcome, OutcomeState};
use shared_utils::{
    collect_files, has_extension, print_check_file, print_check_header, print_check_tally,
    print_summary_report, probe_media, BatchResult, CancelToken, CompatibilityVerdict, Issue,
    IssueKind, Result, TargetProfile, VidCompatError, VIDEO_EXTENSIONS,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Convert a file or a directory tree. Returns the aggregated batch result;
/// `Err(Cancelled)` means the queue was halted by the user.
pub fn run_auto(
    input: &Path,
    config: &ConvertConfig,
    cancel: &CancelToken,
    recursive: bool,
) -> Result<BatchResult> {
    if input.is_dir() {
        process_directory(input, config, cancel, recursive)
    } else {
        process_single_file(input, config, cancel)
    }
}

fn process_directory(
    input: &Path,
    config: &ConvertConfig,
    cancel: &CancelToken,
    recursive: bool,
) -> Result<BatchResult> {
    let files = collect_files(input, VIDEO_EXTENSIONS, recursive);

    if files.is_empty() {
        return Err(VidCompatError::General(format!(
            "No video files found in directory: {} (supported: {})",
            input.display(),
            VIDEO_EXTENSIONS.join(", ")
        )));
    }

    info!("📂 Found {} video files to process", files.len());

    let start_time = Instant::now();
    let mut batch = BatchResult::new();
    let mut outcomes: Vec<ConvertOutcome> = Vec::with_capacity(files.len());
    let mut total_input_bytes: u64 = 0;
    let mut total_output_bytes: u64 = 0;

    for file in &files {
        cancel.check()?;

        match convert_file(file, config, cancel) {
            Ok(outcome) => {
                print_status_line(file, &outcome);
                if outcome.state.is_success() && outcome.state != OutcomeState::Skipped {
                    total_input_bytes += outcome.input_size;
                    total_output_bytes += outcome.output_size.unwrap_or(outcome.input_size);
                }
                record(&mut batch, file, &outcome);
                outcomes.push(outcome);
            }
            Err(VidCompatError::Cancelled) => {
                // Fail fast: cleanup already ran for the interrupted file
                return Err(VidCompatError::Cancelled);
            }
            Err(e) => {
                info!("❌ {} failed: {}", file.display(), e);
                batch.fail(file.clone(), e.to_string());
            }
        }
    }

    print_summary_report(&batch, start_time.elapsed(), total_input_bytes, total_output_bytes);
    write_report(config, &outcomes)?;

    Ok(batch)
}

/// Persist the structured outcome records when a report path was given.
fn write_report(config: &ConvertConfig, outcomes: &[ConvertOutcome]) -> Result<()> {
    let Some(ref path) = config.report_path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(outcomes)
        .map_err(|e| VidCompatError::General(format!("Failed to serialize report: {}", e)))?;
    std::fs::write(path, json)?;
    info!("📝 Wrote outcome report: {}", path.display());
    Ok(())
}

fn process_single_file(
    input: &Path,
    config: &ConvertConfig,
    cancel: &CancelToken,
) -> Result<BatchResult> {
    if !has_extension(input, VIDEO_EXTENSIONS) {
        return Err(VidCompatError::General(format!(
            "Not a video file: {} (supported: {})",
            input.display(),
            VIDEO_EXTENSIONS.join(", ")
        )));
    }

    let start_time = Instant::now();
    let mut batch = BatchResult::new();

    let outcome = convert_file(input, config, cancel)?;
    print_status_line(input, &outcome);

    info!("");
    info!("📊 Conversion Summary:");
    info!("   Input:  {} ({} bytes)", outcome.input_path, outcome.input_size);
    if let Some(ref out_path) = outcome.output_path {
        info!(
            "   Output: {} ({} bytes)",
            out_path,
            outcome.output_size.unwrap_or(0)
        );
    }
    info!("   Result: {}", outcome.message);
    info!("   Time:   {:.1}s", start_time.elapsed().as_secs_f64());

    record(&mut batch, input, &outcome);
    write_report(config, std::slice::from_ref(&outcome))?;
    Ok(batch)
}

fn record(batch: &mut BatchResult, file: &Path, outcome: &ConvertOutcome) {
    match outcome.state {
        OutcomeState::Skipped => batch.skip(),
        OutcomeState::Remuxed => batch.remux(),
        OutcomeState::HwEncoded => batch.hw_encode(),
        OutcomeState::SwEncoded => batch.sw_encode(),
        OutcomeState::Failed => batch.fail(file.to_path_buf(), outcome.message.clone()),
    }
}

fn print_status_line(file: &Path, outcome: &ConvertOutcome) {
    let name = file.file_name().unwrap_or_default().to_string_lossy();
    match outcome.state {
        OutcomeState::Skipped => info!("⏭️ {} → SKIP ({})", name, outcome.message),
        OutcomeState::Failed => info!("❌ {} → FAILED ({})", name, outcome.message),
        _ => info!(
            "✅ {} → {} ({} | {:.0}s)",
            name,
            outcome.output_path.as_deref().unwrap_or("?"),
            outcome.message,
            outcome.elapsed_secs
        ),
    }
}

/// Classification-only pass over a file or directory: per-file report plus
/// a ready/needs-fixing tally.
pub fn run_check(input: &Path, profile: &TargetProfile) -> Result<(usize, usize)> {
    let files = if input.is_dir() {
        collect_files(input, VIDEO_EXTENSIONS, true)
    } else {
        vec![input.to_path_buf()]
    };

    if files.is_empty() {
        return Err(VidCompatError::General(format!(
            "No video files found in directory: {}",
            input.display()
        )));
    }

    print_check_header(&format!(
        "{} / {}",
        profile.video_codec,
        profile.allowed_containers.join("+")
    ));

    let mut ready = 0usize;
    let mut needs_fixing = 0usize;

    for file in &files {
        let name = file.file_name().unwrap_or_default().to_string_lossy();
        let verdict = match probe_media(file) {
            Ok(desc) => shared_utils::classify(&desc, profile),
            Err(e) => CompatibilityVerdict {
                compatible: false,
                issues: vec![Issue {
                    kind: IssueKind::NoVideoStream,
                    detail: format!("ffprobe failed: {}", e),
                }],
            },
        };

        print_check_file(&name, &verdict);
        if verdict.compatible {
            ready += 1;
        } else {
            needs_fixing += 1;
        }
    }

    print_check_tally(ready, needs_fixing);
    Ok((ready, needs_fixing))
}

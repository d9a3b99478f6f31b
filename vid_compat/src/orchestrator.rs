//! Per-file transcode orchestrator
//!
//! Drives one file through `Planned → Executing → Verifying → {Done,
//! Retrying, Failed}`. Every tier writes to a tier-tagged temporary path and
//! only a verified artifact is renamed onto the final path, so the canonical
//! output never holds a partial file. A scope-exit guard removes temporaries
//! on every non-success path, including cancellation unwinds.

use chrono::{DateTime, Local};
use serde::Serialize;
use shared_utils::{
    build_plan, classify, create_encode_bar, encode_args, force_software, format_encode_error,
    get_duration, next_tier, probe_media, remux_args, CancelToken, EncodePlan, EncodeProcess,
    EncodeProgress, EncodeStrategy, HwEncoder, MediaDescription, Result, TargetProfile,
    VidCompatError,
};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Grace period between SIGTERM and SIGKILL on cancellation.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Immutable per-run configuration, built once in `main`.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub profile: TargetProfile,
    pub output_dir: Option<PathBuf>,
    /// Overwrite an existing output instead of skipping
    pub force: bool,
    /// Remove the source after a verified success
    pub delete_original: bool,
    /// Resolved at startup; `None` disables the hardware tier
    pub hw_encoder: Option<HwEncoder>,
    /// Write the per-file outcome records as JSON after the batch
    pub report_path: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            profile: TargetProfile::default(),
            output_dir: None,
            force: false,
            delete_original: false,
            hw_encoder: None,
            report_path: None,
        }
    }
}

/// Final state of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeState {
    Skipped,
    Remuxed,
    HwEncoded,
    SwEncoded,
    Failed,
}

impl OutcomeState {
    fn from_strategy(strategy: EncodeStrategy) -> Self {
        match strategy {
            EncodeStrategy::Skip => OutcomeState::Skipped,
            EncodeStrategy::Remux => OutcomeState::Remuxed,
            EncodeStrategy::HwEncode => OutcomeState::HwEncoded,
            EncodeStrategy::SwEncode => OutcomeState::SwEncoded,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, OutcomeState::Failed)
    }
}

/// Per-file outcome record, one per input, suitable for the summary report.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutcome {
    pub input_path: String,
    pub output_path: Option<String>,
    pub state: OutcomeState,
    pub message: String,
    pub elapsed_secs: f64,
    pub input_size: u64,
    pub output_size: Option<u64>,
    pub finished_at: DateTime<Local>,
}

/// State machine over one file. Transitions are driven by [`convert_file`];
/// the fallback edge is single and non-recursive.
#[derive(Debug)]
enum JobState {
    Planned(EncodePlan),
    Executing(EncodePlan),
    Verifying { plan: EncodePlan, artifact: PathBuf },
    Retrying { failed: EncodeStrategy, diagnostic: String },
    Done { strategy: EncodeStrategy },
    Failed { diagnostic: String },
}

/// Decision after re-probing an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyTransition {
    Commit,
    RetrySoftware,
    GiveUp,
}

/// Software encode is the terminal fallback; its output is never retried.
fn verify_transition(strategy: EncodeStrategy, compatible: bool) -> VerifyTransition {
    if compatible {
        VerifyTransition::Commit
    } else if strategy == EncodeStrategy::SwEncode {
        VerifyTransition::GiveUp
    } else {
        VerifyTransition::RetrySoftware
    }
}

/// Output path: same stem, normalized `.mp4` extension, in the output dir
/// (or next to the source). A `_compat` suffix avoids colliding with an
/// mp4 source converted in place.
pub fn derive_output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let dir = output_dir
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).to_path_buf());

    let candidate = dir.join(format!("{}.mp4", stem));
    if candidate == input {
        dir.join(format!("{}_compat.mp4", stem))
    } else {
        candidate
    }
}

/// Tier-tagged transient artifact next to the final output.
fn tier_temp_path(output: &Path, tag: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    output.with_file_name(format!("{}.{}.tmp.mp4", stem, tag))
}

/// Removes tracked transient artifacts when dropped, unless disarmed after
/// a committed success. Runs on early returns, cancellation and panics.
struct CleanupGuard {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl CleanupGuard {
    fn new() -> Self {
        Self {
            paths: Vec::new(),
            armed: true,
        }
    }

    fn track(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Remove every tracked artifact that still exists. Also used on
    /// success to clear temporaries left by earlier failed tiers.
    fn sweep(&mut self) {
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial artifact");
                } else {
                    info!(path = %path.display(), "Removed partial artifact");
                }
            }
        }
        self.paths.clear();
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.sweep();
        }
    }
}

/// Conservative plan when the source could not be probed: full encode,
/// audio re-encoded, no scaling assumptions.
fn fallback_plan(hw: Option<HwEncoder>) -> EncodePlan {
    EncodePlan {
        strategy: if hw.is_some() {
            EncodeStrategy::HwEncode
        } else {
            EncodeStrategy::SwEncode
        },
        encoder: hw,
        scale: None,
        copy_audio: false,
        strip_subtitles: false,
    }
}

/// Convert one file. Returns `Ok` with a (possibly `Failed`) outcome
/// record; only cancellation propagates as an error so the batch driver
/// can halt the queue.
pub fn convert_file(
    input: &Path,
    config: &ConvertConfig,
    cancel: &CancelToken,
) -> Result<ConvertOutcome> {
    let start = Instant::now();
    cancel.check()?;

    let desc = match probe_media(input) {
        Ok(d) => Some(d),
        Err(e) => {
            // Unknown is treated as incompatible, never compatible-by-default
            warn!(input = %input.display(), error = %e, "Probe failed, forcing full encode");
            None
        }
    };
    let verdict = desc.as_ref().map(|d| classify(d, &config.profile));
    let duration = desc
        .as_ref()
        .and_then(|d| d.duration)
        .or_else(|| get_duration(input));
    let input_size = desc
        .as_ref()
        .map(|d| d.size)
        .filter(|s| *s > 0)
        .or_else(|| std::fs::metadata(input).map(|m| m.len()).ok())
        .unwrap_or(0);

    let output = derive_output_path(input, config.output_dir.as_deref());

    if let Some(v) = verdict.as_ref() {
        if v.compatible {
            info!("🎬 {} → SKIP (already compatible)", input.display());
            return Ok(outcome(
                input,
                None,
                OutcomeState::Skipped,
                "already compatible - skipped",
                start,
                input_size,
                None,
            ));
        }
    }

    if output.exists() && !config.force {
        info!("⏭️ Output exists, skipping: {}", output.display());
        return Ok(outcome(
            input,
            None,
            OutcomeState::Skipped,
            &format!("output exists: {}", output.display()),
            start,
            input_size,
            None,
        ));
    }

    if let Some(dir) = output.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let initial_plan = match (desc.as_ref(), verdict.as_ref()) {
        (Some(d), Some(v)) => build_plan(d, v, &config.profile, config.hw_encoder.as_ref()),
        _ => fallback_plan(config.hw_encoder.clone()),
    };

    if let Some(v) = verdict.as_ref() {
        for issue in &v.issues {
            info!("   ↳ {}", issue.detail);
        }
    }
    info!(
        "🎬 {} → {}",
        input.display(),
        initial_plan.strategy.as_str()
    );

    let mut guard = CleanupGuard::new();
    let mut state = JobState::Planned(initial_plan);

    loop {
        state = match state {
            JobState::Planned(plan) => {
                cancel.check()?;
                JobState::Executing(plan)
            }

            JobState::Executing(plan) => {
                let artifact = tier_temp_path(&output, plan.strategy.tier_tag());
                guard.track(artifact.clone());

                let args = match plan.strategy {
                    EncodeStrategy::Remux => remux_args(input, &artifact),
                    _ => encode_args(&plan, &config.profile, input, &artifact),
                };

                match execute_attempt(&plan, &args, input, duration, cancel) {
                    Ok(()) => JobState::Verifying { plan, artifact },
                    Err(VidCompatError::Execution(diag)) => {
                        warn!(
                            "   ❌ {} tier failed: {}",
                            plan.strategy.as_str(),
                            diag
                        );
                        JobState::Retrying {
                            failed: plan.strategy,
                            diagnostic: diag,
                        }
                    }
                    Err(e) => return Err(e),
                }
            }

            JobState::Verifying { plan, artifact } => {
                cancel.check()?;
                let compatible = match probe_media(&artifact) {
                    Ok(d) => {
                        let v = classify(&d, &config.profile);
                        if !v.compatible {
                            for issue in &v.issues {
                                warn!("   ↳ output: {}", issue.detail);
                            }
                        }
                        v.compatible
                    }
                    Err(e) => {
                        warn!("   ↳ output probe failed: {}", e);
                        false
                    }
                };

                match verify_transition(plan.strategy, compatible) {
                    VerifyTransition::Commit => {
                        commit_artifact(&artifact, &output)?;
                        JobState::Done {
                            strategy: plan.strategy,
                        }
                    }
                    VerifyTransition::RetrySoftware => JobState::Retrying {
                        failed: plan.strategy,
                        diagnostic: "output failed verification".to_string(),
                    },
                    VerifyTransition::GiveUp => JobState::Failed {
                        diagnostic: "software encode produced non-compliant output".to_string(),
                    },
                }
            }

            JobState::Retrying { failed, diagnostic } => match next_tier(failed) {
                Some(EncodeStrategy::SwEncode) => {
                    info!("   🔁 Falling back to software encode");
                    let plan = match desc.as_ref() {
                        Some(d) => force_software(d, &config.profile),
                        None => fallback_plan(None),
                    };
                    JobState::Planned(plan)
                }
                _ => JobState::Failed {
                    diagnostic,
                },
            },

            JobState::Done { strategy } => {
                // Temporaries from earlier failed tiers must not survive a
                // success either
                guard.sweep();
                guard.disarm();
                let output_size = std::fs::metadata(&output).map(|m| m.len()).ok();

                if config.delete_original && input != output {
                    if let Err(e) = std::fs::remove_file(input) {
                        warn!("⚠️ Could not delete original {}: {}", input.display(), e);
                    }
                }

                let final_state = OutcomeState::from_strategy(strategy);
                let message = match strategy {
                    EncodeStrategy::Remux => "remuxed to mp4",
                    EncodeStrategy::HwEncode => "hardware encoded and compatible",
                    _ => "software encoded (CRF) and compatible",
                };
                info!("   ✅ {}", message);
                return Ok(outcome(
                    input,
                    Some(&output),
                    final_state,
                    message,
                    start,
                    input_size,
                    output_size,
                ));
            }

            JobState::Failed { diagnostic } => {
                // Guard drop removes every transient artifact
                info!("   ❌ {}", diagnostic);
                return Ok(outcome(
                    input,
                    None,
                    OutcomeState::Failed,
                    &diagnostic,
                    start,
                    input_size,
                    None,
                ));
            }
        };
    }
}

/// Run one encode attempt, feeding the live progress stream into a bar.
/// Cancellation is checked per progress line; on cancellation the whole
/// process group is terminated before the error propagates.
fn execute_attempt(
    plan: &EncodePlan,
    args: &[String],
    input: &Path,
    duration: Option<f64>,
    cancel: &CancelToken,
) -> Result<()> {
    cancel.check()?;

    let mut cmd = Command::new("ffmpeg");
    cmd.args(args);

    let mut process =
        EncodeProcess::spawn(&mut cmd).map_err(|e| VidCompatError::Execution(e.to_string()))?;

    let label = format!(
        "{} {}",
        plan.strategy.as_str(),
        input.file_name().unwrap_or_default().to_string_lossy()
    );
    let bar = create_encode_bar(&label);
    let mut monitor = EncodeProgress::new(duration);

    if let Some(stdout) = process.take_stdout() {
        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            if cancel.is_cancelled() {
                bar.finish_and_clear();
                if let Err(e) = process.terminate_group(KILL_GRACE) {
                    warn!("Failed to terminate encode process group: {}", e);
                }
                return Err(VidCompatError::Cancelled);
            }

            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            if let Some(percent) = monitor.parse_line(&line) {
                bar.set_position(percent as u64);
            }
        }
    }

    let (status, stderr) = process
        .wait_with_output()
        .map_err(|e| VidCompatError::Execution(e.to_string()))?;
    bar.finish_and_clear();

    cancel.check()?;

    if status.success() {
        Ok(())
    } else {
        Err(VidCompatError::Execution(format_encode_error(&stderr)))
    }
}

/// Move a verified artifact onto the canonical output path.
fn commit_artifact(artifact: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        std::fs::remove_file(output)?;
    }
    std::fs::rename(artifact, output)?;
    Ok(())
}

fn outcome(
    input: &Path,
    output: Option<&Path>,
    state: OutcomeState,
    message: &str,
    start: Instant,
    input_size: u64,
    output_size: Option<u64>,
) -> ConvertOutcome {
    ConvertOutcome {
        input_path: input.display().to_string(),
        output_path: output.map(|p| p.display().to_string()),
        state,
        message: message.to_string(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        input_size,
        output_size,
        finished_at: Local::now(),
    }
}

/// Probe-and-classify for the `check` and `plan` subcommands.
pub fn inspect_file(
    input: &Path,
    profile: &TargetProfile,
) -> Result<(MediaDescription, shared_utils::CompatibilityVerdict)> {
    let desc = probe_media(input)?;
    let verdict = classify(&desc, profile);
    Ok((desc, verdict))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_output_path_normalizes_extension() {
        let out = derive_output_path(Path::new("videos/movie.mkv"), None);
        assert_eq!(out, Path::new("videos/movie.mp4"));
    }

    #[test]
    fn test_derive_output_path_with_output_dir() {
        let out = derive_output_path(Path::new("videos/movie.mkv"), Some(Path::new("converted")));
        assert_eq!(out, Path::new("converted/movie.mp4"));
    }

    #[test]
    fn test_derive_output_path_avoids_in_place_collision() {
        let out = derive_output_path(Path::new("videos/movie.mp4"), None);
        assert_eq!(out, Path::new("videos/movie_compat.mp4"));

        // Same name is fine when it lands in a different directory
        let out = derive_output_path(Path::new("videos/movie.mp4"), Some(Path::new("converted")));
        assert_eq!(out, Path::new("converted/movie.mp4"));
    }

    #[test]
    fn test_tier_temp_path() {
        let out = tier_temp_path(Path::new("converted/movie.mp4"), "sw");
        assert_eq!(out, Path::new("converted/movie.sw.tmp.mp4"));

        let out = tier_temp_path(Path::new("converted/movie.mp4"), "remux");
        assert_eq!(out, Path::new("converted/movie.remux.tmp.mp4"));
    }

    #[test]
    fn test_cleanup_guard_removes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("movie.hw.tmp.mp4");
        std::fs::write(&partial, b"partial data").unwrap();

        {
            let mut guard = CleanupGuard::new();
            guard.track(partial.clone());
        }

        assert!(!partial.exists(), "partial artifact must not survive");
    }

    #[test]
    fn test_cleanup_guard_disarmed_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("movie.mp4");
        std::fs::write(&artifact, b"finished").unwrap();

        {
            let mut guard = CleanupGuard::new();
            guard.track(artifact.clone());
            guard.disarm();
        }

        assert!(artifact.exists());
    }

    #[test]
    fn test_cleanup_guard_tolerates_missing_files() {
        let mut guard = CleanupGuard::new();
        guard.track(PathBuf::from("/nonexistent/path/x.tmp.mp4"));
        // Drop must not panic
    }

    #[test]
    fn test_sweep_clears_earlier_tier_leftovers() {
        // hw temp left behind by a failed tier, then a sw success
        let dir = tempfile::tempdir().unwrap();
        let hw_temp = dir.path().join("movie.hw.tmp.mp4");
        let committed = dir.path().join("movie.mp4");
        std::fs::write(&hw_temp, b"failed tier").unwrap();
        std::fs::write(&committed, b"verified").unwrap();

        let mut guard = CleanupGuard::new();
        guard.track(hw_temp.clone());
        guard.sweep();
        guard.disarm();
        drop(guard);

        assert!(!hw_temp.exists());
        assert!(committed.exists());
    }

    #[test]
    fn test_verify_transition_retry_once_law() {
        // Failed verification on a non-terminal tier retries as software
        assert_eq!(
            verify_transition(EncodeStrategy::HwEncode, false),
            VerifyTransition::RetrySoftware
        );
        assert_eq!(
            verify_transition(EncodeStrategy::Remux, false),
            VerifyTransition::RetrySoftware
        );
        // Software is terminal: no further tier
        assert_eq!(
            verify_transition(EncodeStrategy::SwEncode, false),
            VerifyTransition::GiveUp
        );
        // A compatible artifact always commits
        for strategy in [
            EncodeStrategy::Remux,
            EncodeStrategy::HwEncode,
            EncodeStrategy::SwEncode,
        ] {
            assert_eq!(
                verify_transition(strategy, true),
                VerifyTransition::Commit
            );
        }
    }

    #[test]
    fn test_outcome_state_mapping() {
        assert_eq!(
            OutcomeState::from_strategy(EncodeStrategy::Remux),
            OutcomeState::Remuxed
        );
        assert_eq!(
            OutcomeState::from_strategy(EncodeStrategy::HwEncode),
            OutcomeState::HwEncoded
        );
        assert_eq!(
            OutcomeState::from_strategy(EncodeStrategy::SwEncode),
            OutcomeState::SwEncoded
        );
        assert!(OutcomeState::Remuxed.is_success());
        assert!(!OutcomeState::Failed.is_success());
    }

    #[test]
    fn test_fallback_plan_prefers_hardware() {
        let hw = HwEncoder {
            kind: shared_utils::HwKind::Nvidia,
            name: "h264_nvenc",
            quality_param: "cq",
            quality_value: 19,
            rate_args: &[],
        };
        let plan = fallback_plan(Some(hw));
        assert_eq!(plan.strategy, EncodeStrategy::HwEncode);
        assert!(plan.encoder.is_some());
        assert!(!plan.copy_audio);

        let plan = fallback_plan(None);
        assert_eq!(plan.strategy, EncodeStrategy::SwEncode);
        assert!(plan.encoder.is_none());
    }

    #[test]
    fn test_commit_artifact_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("movie.sw.tmp.mp4");
        let output = dir.path().join("movie.mp4");
        std::fs::write(&artifact, b"new").unwrap();
        std::fs::write(&output, b"old").unwrap();

        commit_artifact(&artifact, &output).unwrap();

        assert!(!artifact.exists());
        assert_eq!(std::fs::read(&output).unwrap(), b"new");
    }
}

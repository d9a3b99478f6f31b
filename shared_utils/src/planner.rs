//! Encode planner
//!
//! Turns a compatibility verdict into the cheapest transformation that
//! reaches the target profile, and builds the corresponding ffmpeg
//! argument vectors. Planning is pure: no I/O, no process is spawned, and
//! a plan is never mutated — fallback builds a fresh one.

use crate::compat::{CompatibilityVerdict, TargetProfile};
use crate::ffprobe::MediaDescription;
use crate::hw_encoder::HwEncoder;
use std::path::Path;

/// Software (libx264) quality: lower CRF means higher quality/size.
pub const DEFAULT_CRF: u8 = 18;
/// Effective bitrate ceiling for VBR hardware encoders.
pub const HW_MAXRATE: &str = "12M";
pub const HW_BUFSIZE: &str = "24M";
/// Re-encoded audio target.
pub const AUDIO_BITRATE: &str = "128k";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStrategy {
    /// Already compatible, spawn nothing
    Skip,
    /// Stream copy into the target container
    Remux,
    HwEncode,
    SwEncode,
}

impl EncodeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeStrategy::Skip => "skip",
            EncodeStrategy::Remux => "remux",
            EncodeStrategy::HwEncode => "hw-encode",
            EncodeStrategy::SwEncode => "sw-encode",
        }
    }

    /// Tier label used in temporary artifact names.
    pub fn tier_tag(&self) -> &'static str {
        match self {
            EncodeStrategy::Skip => "skip",
            EncodeStrategy::Remux => "remux",
            EncodeStrategy::HwEncode => "hw",
            EncodeStrategy::SwEncode => "sw",
        }
    }
}

/// The fallback tier after a failed attempt, if any. Software encode is
/// terminal: there is nothing below it.
pub fn next_tier(strategy: EncodeStrategy) -> Option<EncodeStrategy> {
    match strategy {
        EncodeStrategy::Remux | EncodeStrategy::HwEncode => Some(EncodeStrategy::SwEncode),
        EncodeStrategy::Skip | EncodeStrategy::SwEncode => None,
    }
}

/// Execution plan for one attempt on one file.
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub strategy: EncodeStrategy,
    /// Hardware encoder identity; `None` for every other strategy
    pub encoder: Option<HwEncoder>,
    /// Target box when the source exceeds the profile maxima
    pub scale: Option<(u32, u32)>,
    /// Copy the audio stream instead of re-encoding it
    pub copy_audio: bool,
    /// Drop subtitle streams via explicit stream mapping
    pub strip_subtitles: bool,
}

/// Select the cheapest strategy that reaches compatibility.
pub fn build_plan(
    desc: &MediaDescription,
    verdict: &CompatibilityVerdict,
    profile: &TargetProfile,
    hw: Option<&HwEncoder>,
) -> EncodePlan {
    let strategy = if verdict.compatible {
        EncodeStrategy::Skip
    } else if verdict.container_only() {
        EncodeStrategy::Remux
    } else if hw.is_some() {
        EncodeStrategy::HwEncode
    } else {
        EncodeStrategy::SwEncode
    };

    plan_with_strategy(desc, profile, strategy, hw)
}

/// Rebuild a plan for the terminal software tier. Used by the retry path;
/// the failed plan is left untouched.
pub fn force_software(desc: &MediaDescription, profile: &TargetProfile) -> EncodePlan {
    plan_with_strategy(desc, profile, EncodeStrategy::SwEncode, None)
}

fn plan_with_strategy(
    desc: &MediaDescription,
    profile: &TargetProfile,
    strategy: EncodeStrategy,
    hw: Option<&HwEncoder>,
) -> EncodePlan {
    let scale = desc.first_video().and_then(|v| {
        if profile.exceeds_box(v.width, v.height) {
            Some((profile.max_width, profile.max_height))
        } else {
            None
        }
    });

    let copy_audio = desc
        .audio_streams()
        .any(|s| s.codec_name == profile.audio_codec);

    let strip_subtitles =
        !profile.tolerate_subtitles && desc.subtitle_streams().next().is_some();

    EncodePlan {
        encoder: match strategy {
            EncodeStrategy::HwEncode => hw.cloned(),
            _ => None,
        },
        strategy,
        scale,
        copy_audio,
        strip_subtitles,
    }
}

/// Aspect-preserving downscale into `max_w` x `max_h`, forcing the free
/// dimension to the nearest even value (chroma subsampling requirement).
pub fn scale_filter(max_w: u32, max_h: u32) -> String {
    let ar = max_w as f64 / max_h as f64;
    format!(
        "scale='if(gt(iw/ih,{ar}),{w},-2)':'if(gt(iw/ih,{ar}),-2,{h})'",
        ar = ar,
        w = max_w,
        h = max_h
    )
}

fn level_string(max_level: i64) -> String {
    format!("{}.{}", max_level / 10, max_level % 10)
}

fn encode_profile(profile: &TargetProfile) -> &str {
    profile
        .allowed_profiles
        .last()
        .map(|s| s.as_str())
        .unwrap_or("high")
}

/// Thread budget handed to libx264; leaves one core for the progress
/// reader and the rest of the process.
fn encoder_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Full ffmpeg argument vector for an encode attempt.
///
/// The progress feed goes to stdout as line-oriented `key=value` pairs
/// (`-progress pipe:1`), stderr carries only errors.
pub fn encode_args(
    plan: &EncodePlan,
    profile: &TargetProfile,
    input: &Path,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
    ];

    if plan.strip_subtitles {
        // Keep first video + all audio, drop everything else
        args.extend([
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "0:a?".into(),
            "-sn".into(),
        ]);
    }

    let level = level_string(profile.max_level);
    match plan.encoder {
        Some(ref enc) => {
            args.extend([
                "-c:v".into(),
                enc.name.into(),
                "-pix_fmt".into(),
                profile.pixel_format.clone(),
                "-profile:v".into(),
                encode_profile(profile).to_string(),
                "-level".into(),
                level,
            ]);
            args.extend(enc.rate_args.iter().map(|s| s.to_string()));
            args.extend([
                format!("-{}", enc.quality_param),
                enc.quality_value.to_string(),
                "-maxrate".into(),
                HW_MAXRATE.into(),
                "-bufsize".into(),
                HW_BUFSIZE.into(),
            ]);
        }
        None => {
            args.extend([
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "slow".into(),
                "-crf".into(),
                DEFAULT_CRF.to_string(),
                "-pix_fmt".into(),
                profile.pixel_format.clone(),
                "-profile:v".into(),
                encode_profile(profile).to_string(),
                "-level".into(),
                level,
                "-threads".into(),
                encoder_threads().to_string(),
            ]);
        }
    }

    if let Some((w, h)) = plan.scale {
        args.extend(["-vf".into(), scale_filter(w, h)]);
    }

    if plan.copy_audio {
        args.extend(["-c:a".into(), "copy".into()]);
    } else {
        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            AUDIO_BITRATE.into(),
            "-ac".into(),
            "2".into(),
        ]);
    }

    args.extend(output_tail(output));
    args
}

/// Stream-copy remux into the target container.
pub fn remux_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-c".into(),
        "copy".into(),
    ];
    args.extend(output_tail(output));
    args
}

fn output_tail(output: &Path) -> Vec<String> {
    vec![
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        output.display().to_string(),
    ]
}

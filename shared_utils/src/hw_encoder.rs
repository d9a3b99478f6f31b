//! Hardware encoder detection
//!
//! Unified detection of H.264 hardware encoders across platforms:
//!
//! | Platform | Encoder |
//! |----------|------------------|
//! | NVIDIA | h264_nvenc |
//! | Apple Silicon | h264_videotoolbox |
//! | Intel QSV | h264_qsv |
//! | AMD AMF | h264_amf |
//!
//! Detection parses `ffmpeg -encoders` once per process and then runs a
//! one-frame null encode to confirm the encoder actually works on this
//! host (the build may list NVENC without a usable GPU).

use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

static HW_ACCEL: OnceLock<HwAccel> = OnceLock::new();

/// Hardware acceleration backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwKind {
    Nvidia,
    Apple,
    IntelQsv,
    AmdAmf,
    None,
}

impl std::fmt::Display for HwKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HwKind::Nvidia => write!(f, "NVIDIA NVENC"),
            HwKind::Apple => write!(f, "Apple VideoToolbox"),
            HwKind::IntelQsv => write!(f, "Intel QSV"),
            HwKind::AmdAmf => write!(f, "AMD AMF"),
            HwKind::None => write!(f, "None (CPU)"),
        }
    }
}

/// A usable H.264 hardware encoder and the quality knobs it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwEncoder {
    pub kind: HwKind,
    /// ffmpeg encoder name
    pub name: &'static str,
    /// Constant-quality flag (NVENC uses `-cq`, VideoToolbox `-q:v`,
    /// QSV/AMF `-global_quality`/`-qp_i` style)
    pub quality_param: &'static str,
    /// Quality value handed to `quality_param`; lower = better
    pub quality_value: u8,
    /// Rate-control arguments appended after the quality flag
    pub rate_args: &'static [&'static str],
}

/// Detection result; `encoder` is `None` when only CPU encoding is viable.
#[derive(Debug, Clone)]
pub struct HwAccel {
    pub kind: HwKind,
    pub encoder: Option<HwEncoder>,
}

impl Default for HwAccel {
    fn default() -> Self {
        Self {
            kind: HwKind::None,
            encoder: None,
        }
    }
}

const NVENC: HwEncoder = HwEncoder {
    kind: HwKind::Nvidia,
    name: "h264_nvenc",
    quality_param: "cq",
    quality_value: 19,
    rate_args: &["-preset", "p4", "-rc", "vbr", "-b:v", "0"],
};

const VIDEOTOOLBOX: HwEncoder = HwEncoder {
    kind: HwKind::Apple,
    name: "h264_videotoolbox",
    quality_param: "q:v",
    quality_value: 18,
    // VideoToolbox is best-effort on quality hints; give it a bitrate floor
    rate_args: &["-b:v", "12M"],
};

const QSV: HwEncoder = HwEncoder {
    kind: HwKind::IntelQsv,
    name: "h264_qsv",
    quality_param: "global_quality",
    quality_value: 19,
    rate_args: &["-look_ahead", "1"],
};

const AMF: HwEncoder = HwEncoder {
    kind: HwKind::AmdAmf,
    name: "h264_amf",
    quality_param: "qp_i",
    quality_value: 19,
    rate_args: &["-quality", "quality", "-rc", "cqp"],
};

impl HwAccel {
    /// Detect the available hardware encoder (cached for the process).
    pub fn detect() -> &'static HwAccel {
        HW_ACCEL.get_or_init(|| {
            debug!("Detecting hardware H.264 encoders");
            let result = Self::detect_internal();
            if let Some(ref enc) = result.encoder {
                info!(encoder = enc.name, "Hardware encoder available: {}", result.kind);
            } else {
                info!("No hardware encoder available, software libx264 only");
            }
            result
        })
    }

    fn detect_internal() -> HwAccel {
        let encoders = list_video_encoders();
        Self::from_encoder_list(&encoders, test_encoder)
    }

    /// Selection over an already-obtained encoder list; the `verify`
    /// callback confirms the encoder works (injected for tests).
    fn from_encoder_list<F>(encoders: &[String], verify: F) -> HwAccel
    where
        F: Fn(&str) -> bool,
    {
        // macOS prefers VideoToolbox, everything else prefers NVENC
        let candidates: &[HwEncoder] = if cfg!(target_os = "macos") {
            &[VIDEOTOOLBOX, NVENC, QSV, AMF]
        } else {
            &[NVENC, QSV, AMF, VIDEOTOOLBOX]
        };

        for candidate in candidates {
            let listed = encoders.iter().any(|e| e.contains(candidate.name));
            if listed && verify(candidate.name) {
                return HwAccel {
                    kind: candidate.kind,
                    encoder: Some(candidate.clone()),
                };
            }
        }

        HwAccel::default()
    }
}

fn list_video_encoders() -> Vec<String> {
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-encoders")
        .output();

    match output {
        Ok(out) => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            stdout
                .lines()
                .filter(|line| line.starts_with(" V"))
                .map(|line| line.to_string())
                .collect()
        }
        Err(_) => Vec::new(),
    }
}

/// One-frame null encode to confirm the encoder actually works here.
fn test_encoder(encoder: &str) -> bool {
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-f")
        .arg("lavfi")
        .arg("-i")
        .arg("nullsrc=s=64x64:d=0.1")
        .arg("-c:v")
        .arg(encoder)
        .arg("-frames:v")
        .arg("1")
        .arg("-f")
        .arg("null")
        .arg("-")
        .output();

    match output {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!(" V....D {:<24} Some encoder", n))
            .collect()
    }

    #[test]
    fn test_empty_listing_means_cpu_only() {
        let accel = HwAccel::from_encoder_list(&[], |_| true);
        assert_eq!(accel.kind, HwKind::None);
        assert!(accel.encoder.is_none());
    }

    #[test]
    fn test_listed_but_unverifiable_encoder_rejected() {
        let accel = HwAccel::from_encoder_list(&listing(&["h264_nvenc"]), |_| false);
        assert_eq!(accel.kind, HwKind::None);
    }

    #[test]
    fn test_nvenc_detected() {
        let accel =
            HwAccel::from_encoder_list(&listing(&["libx264", "h264_nvenc"]), |_| true);
        if cfg!(target_os = "macos") {
            // VideoToolbox not listed, NVENC is next
            assert_eq!(accel.kind, HwKind::Nvidia);
        } else {
            assert_eq!(accel.kind, HwKind::Nvidia);
        }
        assert_eq!(accel.encoder.unwrap().name, "h264_nvenc");
    }

    #[test]
    fn test_software_encoder_never_selected() {
        let accel = HwAccel::from_encoder_list(&listing(&["libx264"]), |_| true);
        assert!(accel.encoder.is_none());
    }

    #[test]
    fn test_verify_gates_fallthrough() {
        // NVENC listed but broken, QSV listed and working
        let accel = HwAccel::from_encoder_list(
            &listing(&["h264_nvenc", "h264_qsv"]),
            |name| name == "h264_qsv",
        );
        assert_eq!(accel.kind, HwKind::IntelQsv);
        assert_eq!(accel.encoder.unwrap().quality_param, "global_quality");
    }
}

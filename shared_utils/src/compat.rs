//! Playback compatibility classifier
//!
//! Evaluates a probed [`MediaDescription`] against a [`TargetProfile`] and
//! collects every deficiency instead of short-circuiting, so the planner
//! and the `check` report both see the full picture.

use crate::ffprobe::{normalize_level, MediaDescription};
use serde::{Deserialize, Serialize};

/// Machine-checkable deficiency category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Container,
    NoVideoStream,
    VideoCodec,
    PixelFormat,
    Profile,
    Level,
    Resolution,
    AudioCodec,
    SubtitlePresent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub detail: String,
}

impl Issue {
    fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Classification result; `compatible` is true iff `issues` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityVerdict {
    pub compatible: bool,
    pub issues: Vec<Issue>,
}

impl CompatibilityVerdict {
    fn from_issues(issues: Vec<Issue>) -> Self {
        Self {
            compatible: issues.is_empty(),
            issues,
        }
    }

    /// True when the only thing wrong is the container, i.e. a stream-copy
    /// remux is sufficient.
    pub fn container_only(&self) -> bool {
        !self.issues.is_empty()
            && self
                .issues
                .iter()
                .all(|i| i.kind == IssueKind::Container)
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

/// Playback target. Read-only after startup; built once in `main` and
/// passed by reference into every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProfile {
    /// Substring match against ffprobe's comma-separated `format_name`
    pub allowed_containers: Vec<String>,
    pub video_codec: String,
    pub pixel_format: String,
    /// Case-insensitive
    pub allowed_profiles: Vec<String>,
    /// Tenths: 41 means "4.1"
    pub max_level: i64,
    pub max_width: u32,
    pub max_height: u32,
    pub audio_codec: String,
    pub tolerate_subtitles: bool,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            allowed_containers: vec!["mp4".to_string(), "mov".to_string()],
            video_codec: "h264".to_string(),
            pixel_format: "yuv420p".to_string(),
            allowed_profiles: vec![
                "baseline".to_string(),
                "main".to_string(),
                "high".to_string(),
            ],
            max_level: 41,
            max_width: 3840,
            max_height: 2160,
            audio_codec: "aac".to_string(),
            tolerate_subtitles: false,
        }
    }
}

impl TargetProfile {
    pub fn container_matches(&self, format_name: &str) -> bool {
        self.allowed_containers
            .iter()
            .any(|c| format_name.contains(c.as_str()))
    }

    pub fn profile_allowed(&self, profile: &str) -> bool {
        self.allowed_profiles
            .iter()
            .any(|p| p.eq_ignore_ascii_case(profile))
    }

    pub fn exceeds_box(&self, width: u32, height: u32) -> bool {
        width > self.max_width || height > self.max_height
    }
}

/// Classify a media description against the target profile.
///
/// Only the first video stream is evaluated. A file without one is
/// unconditionally incompatible and no further rules run.
pub fn classify(desc: &MediaDescription, profile: &TargetProfile) -> CompatibilityVerdict {
    let mut issues = Vec::new();

    if !profile.container_matches(&desc.format_name) {
        issues.push(Issue::new(
            IssueKind::Container,
            format!(
                "Container: {} (prefer {})",
                desc.format_name,
                profile.allowed_containers.join("/")
            ),
        ));
    }

    let video = match desc.first_video() {
        Some(v) => v,
        None => {
            issues.push(Issue::new(IssueKind::NoVideoStream, "No video stream"));
            return CompatibilityVerdict::from_issues(issues);
        }
    };

    if video.codec_name != profile.video_codec {
        issues.push(Issue::new(
            IssueKind::VideoCodec,
            format!(
                "Video codec: {} (expected {})",
                video.codec_name, profile.video_codec
            ),
        ));
    }

    if let Some(ref pix_fmt) = video.pix_fmt {
        if *pix_fmt != profile.pixel_format {
            issues.push(Issue::new(
                IssueKind::PixelFormat,
                format!(
                    "Pixel format: {} (expected {})",
                    pix_fmt, profile.pixel_format
                ),
            ));
        }
    }

    if let Some(ref video_profile) = video.profile {
        if !video_profile.is_empty() && !profile.profile_allowed(video_profile) {
            issues.push(Issue::new(
                IssueKind::Profile,
                format!("Profile: {}", video_profile),
            ));
        }
    }

    if let Some(level) = video.level.and_then(normalize_level) {
        if level > profile.max_level {
            issues.push(Issue::new(
                IssueKind::Level,
                format!(
                    "Level {:.1} > {:.1}",
                    level as f64 / 10.0,
                    profile.max_level as f64 / 10.0
                ),
            ));
        }
    }

    if profile.exceeds_box(video.width, video.height) {
        issues.push(Issue::new(
            IssueKind::Resolution,
            format!(
                "Resolution {}x{} > {}x{}",
                video.width, video.height, profile.max_width, profile.max_height
            ),
        ));
    }

    let audio_ok = desc
        .audio_streams()
        .any(|s| s.codec_name == profile.audio_codec);
    if !audio_ok {
        issues.push(Issue::new(
            IssueKind::AudioCodec,
            format!("No {} audio track", profile.audio_codec),
        ));
    }

    if !profile.tolerate_subtitles {
        for sub in desc.subtitle_streams() {
            let lang = sub.language.as_deref().unwrap_or("und");
            issues.push(Issue::new(
                IssueKind::SubtitlePresent,
                format!("Embedded subtitle: {} ({})", sub.codec_name, lang),
            ));
        }
    }

    CompatibilityVerdict::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffprobe::{Stream, StreamKind};

    fn video_stream(codec: &str, pix_fmt: &str, profile: &str, level: f64, w: u32, h: u32) -> Stream {
        Stream {
            index: 0,
            kind: StreamKind::Video,
            codec_name: codec.to_string(),
            pix_fmt: Some(pix_fmt.to_string()),
            profile: Some(profile.to_string()),
            level: Some(level),
            width: w,
            height: h,
            language: None,
        }
    }

    fn audio_stream(codec: &str) -> Stream {
        Stream {
            index: 1,
            kind: StreamKind::Audio,
            codec_name: codec.to_string(),
            pix_fmt: None,
            profile: None,
            level: None,
            width: 0,
            height: 0,
            language: None,
        }
    }

    fn subtitle_stream(codec: &str) -> Stream {
        Stream {
            index: 2,
            kind: StreamKind::Subtitle,
            codec_name: codec.to_string(),
            pix_fmt: None,
            profile: None,
            level: None,
            width: 0,
            height: 0,
            language: Some("eng".to_string()),
        }
    }

    fn desc(format_name: &str, streams: Vec<Stream>) -> MediaDescription {
        MediaDescription {
            format_name: format_name.to_string(),
            duration: Some(60.0),
            size: 1024,
            streams,
        }
    }

    fn compliant() -> MediaDescription {
        desc(
            "mov,mp4,m4a,3gp,3g2,mj2",
            vec![
                video_stream("h264", "yuv420p", "High", 40.0, 1920, 1080),
                audio_stream("aac"),
            ],
        )
    }

    #[test]
    fn test_fully_compliant_is_compatible() {
        let verdict = classify(&compliant(), &TargetProfile::default());
        assert!(verdict.compatible);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn test_no_streams_never_compatible() {
        let verdict = classify(&desc("mp4", vec![]), &TargetProfile::default());
        assert!(!verdict.compatible);
        assert!(verdict.has(IssueKind::NoVideoStream));
        // Evaluation terminates at rule 2: no codec/audio issues piled on
        assert_eq!(verdict.issues.len(), 1);
    }

    #[test]
    fn test_no_video_stream_with_audio_only() {
        let verdict = classify(
            &desc("mp4", vec![audio_stream("aac")]),
            &TargetProfile::default(),
        );
        assert!(!verdict.compatible);
        assert!(verdict.has(IssueKind::NoVideoStream));
    }

    #[test]
    fn test_container_only_mismatch() {
        let mut d = compliant();
        d.format_name = "matroska,webm".to_string();
        let verdict = classify(&d, &TargetProfile::default());
        assert!(!verdict.compatible);
        assert!(verdict.container_only());
    }

    #[test]
    fn test_level_normalization_variants() {
        let profile = TargetProfile::default();

        for raw in [41.0, 4.1] {
            let mut d = compliant();
            d.streams[0].level = Some(raw);
            let verdict = classify(&d, &profile);
            assert!(
                verdict.compatible,
                "level {} should satisfy max 4.1",
                raw
            );
        }

        for raw in [50.0, 5.0] {
            let mut d = compliant();
            d.streams[0].level = Some(raw);
            let verdict = classify(&d, &profile);
            assert!(verdict.has(IssueKind::Level), "level {} should fail", raw);
        }
    }

    #[test]
    fn test_zero_level_is_not_checked() {
        let mut d = compliant();
        d.streams[0].level = Some(0.0);
        assert!(classify(&d, &TargetProfile::default()).compatible);

        d.streams[0].level = None;
        assert!(classify(&d, &TargetProfile::default()).compatible);
    }

    #[test]
    fn test_profile_case_insensitive() {
        let mut d = compliant();
        d.streams[0].profile = Some("HIGH".to_string());
        assert!(classify(&d, &TargetProfile::default()).compatible);

        d.streams[0].profile = Some("High 10".to_string());
        let verdict = classify(&d, &TargetProfile::default());
        assert!(verdict.has(IssueKind::Profile));
    }

    #[test]
    fn test_missing_pix_fmt_tolerated() {
        let mut d = compliant();
        d.streams[0].pix_fmt = None;
        assert!(classify(&d, &TargetProfile::default()).compatible);
    }

    #[test]
    fn test_resolution_both_dimensions_checked() {
        let profile = TargetProfile {
            max_width: 1920,
            max_height: 1080,
            ..TargetProfile::default()
        };

        let mut d = compliant();
        d.streams[0].width = 3840;
        d.streams[0].height = 2160;
        assert!(classify(&d, &profile).has(IssueKind::Resolution));

        // Width within bounds, height exceeding (portrait video)
        let mut d = compliant();
        d.streams[0].width = 1080;
        d.streams[0].height = 1920;
        assert!(classify(&d, &profile).has(IssueKind::Resolution));
    }

    #[test]
    fn test_any_matching_audio_stream_suffices() {
        let mut d = compliant();
        d.streams.push(audio_stream("ac3"));
        assert!(classify(&d, &TargetProfile::default()).compatible);

        let d = desc(
            "mp4",
            vec![
                video_stream("h264", "yuv420p", "High", 40.0, 1280, 720),
                audio_stream("ac3"),
            ],
        );
        let verdict = classify(&d, &TargetProfile::default());
        assert!(verdict.has(IssueKind::AudioCodec));
    }

    #[test]
    fn test_subtitle_forces_incompatibility() {
        let mut d = compliant();
        d.streams.push(subtitle_stream("mov_text"));
        let verdict = classify(&d, &TargetProfile::default());
        assert!(!verdict.compatible);
        assert_eq!(verdict.issues.len(), 1);
        assert!(verdict.has(IssueKind::SubtitlePresent));
    }

    #[test]
    fn test_subtitle_tolerated_when_configured() {
        let profile = TargetProfile {
            tolerate_subtitles: true,
            ..TargetProfile::default()
        };
        let mut d = compliant();
        d.streams.push(subtitle_stream("subrip"));
        assert!(classify(&d, &profile).compatible);
    }

    #[test]
    fn test_all_deficiencies_collected() {
        let d = desc(
            "avi",
            vec![
                video_stream("mpeg4", "yuv422p", "Simple", 0.0, 4096, 2304),
                audio_stream("mp3"),
                subtitle_stream("srt"),
            ],
        );
        let verdict = classify(&d, &TargetProfile::default());
        assert!(!verdict.compatible);
        for kind in [
            IssueKind::Container,
            IssueKind::VideoCodec,
            IssueKind::PixelFormat,
            IssueKind::Profile,
            IssueKind::Resolution,
            IssueKind::AudioCodec,
            IssueKind::SubtitlePresent,
        ] {
            assert!(verdict.has(kind), "missing {:?}", kind);
        }
    }
}

//! FFprobe wrapper module
//!
//! Invokes ffprobe for full stream/format metadata and parses the JSON
//! output into a [`MediaDescription`]. Parsing is kept separate from the
//! process invocation so it can be tested on fixture JSON.

use crate::errors::{Result, VidCompatError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Stream classification as reported by ffprobe's `codec_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    fn from_codec_type(s: &str) -> Self {
        match s {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            _ => StreamKind::Other,
        }
    }
}

/// One elementary stream of a probed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: String,
    /// Video only
    pub pix_fmt: Option<String>,
    pub profile: Option<String>,
    /// Raw level as reported; see [`normalize_level`] for comparison form
    pub level: Option<f64>,
    pub width: u32,
    pub height: u32,
    /// Subtitle language tag when tagged
    pub language: Option<String>,
}

/// Parsed ffprobe output for one media file. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescription {
    /// Comma-separated container name list, e.g. `mov,mp4,m4a,3gp,3g2,mj2`.
    /// Never absent; empty string when ffprobe reports none.
    pub format_name: String,
    pub duration: Option<f64>,
    pub size: u64,
    pub streams: Vec<Stream>,
}

impl MediaDescription {
    pub fn first_video(&self) -> Option<&Stream> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Audio)
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Subtitle)
    }
}

pub fn is_ffprobe_available() -> bool {
    Command::new("ffprobe").arg("-version").output().is_ok()
}

/// Probe a media file for full stream and format metadata.
///
/// Non-zero exit or unparseable JSON is a probe failure; the file is then
/// treated as unknown, never as compatible-by-default.
pub fn probe_media(path: &Path) -> Result<MediaDescription> {
    if !path.exists() {
        return Err(VidCompatError::Probe(format!(
            "File not found: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(VidCompatError::Probe(format!(
            "Not a file (is it a directory?): {}",
            path.display()
        )));
    }

    let path_str = path.to_str().ok_or_else(|| {
        VidCompatError::Probe(format!("Invalid path encoding: {}", path.display()))
    })?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "--",
            path_str,
        ])
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let error_msg = if stderr.trim().is_empty() {
            format!(
                "ffprobe failed to analyze file: {} (exit code: {:?})",
                path.display(),
                output.status.code()
            )
        } else {
            format!("ffprobe error for '{}': {}", path.display(), stderr.trim())
        };
        return Err(VidCompatError::Probe(error_msg));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe `-print_format json` output.
pub fn parse_probe_output(json_str: &str) -> Result<MediaDescription> {
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| VidCompatError::Probe(e.to_string()))?;

    let format = &json["format"];
    let format_name = format["format_name"]
        .as_str()
        .unwrap_or("")
        .to_string();
    let duration = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| *d > 0.0);
    let size = format["size"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let streams = json["streams"]
        .as_array()
        .map(|arr| arr.iter().enumerate().map(parse_stream).collect())
        .unwrap_or_default();

    Ok(MediaDescription {
        format_name,
        duration,
        size,
        streams,
    })
}

fn parse_stream((position, s): (usize, &serde_json::Value)) -> Stream {
    let kind = StreamKind::from_codec_type(s["codec_type"].as_str().unwrap_or(""));

    Stream {
        index: s["index"].as_u64().unwrap_or(position as u64) as u32,
        kind,
        codec_name: s["codec_name"].as_str().unwrap_or("unknown").to_string(),
        pix_fmt: s["pix_fmt"].as_str().map(|v| v.to_string()),
        profile: s["profile"].as_str().map(|v| v.to_string()),
        level: s["level"].as_f64(),
        width: s["width"].as_u64().unwrap_or(0) as u32,
        height: s["height"].as_u64().unwrap_or(0) as u32,
        language: s["tags"]["language"].as_str().map(|v| v.to_string()),
    }
}

/// Query only the container duration in seconds.
///
/// Degrades to `None` on any failure so progress reporting can be
/// suppressed instead of aborting the conversion.
pub fn get_duration(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
            "--",
            path.to_str()?,
        ])
        .output()
        .ok()?;

    if output.status.success() {
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| *d > 0.0)
    } else {
        None
    }
}

/// Normalize a raw codec level to tenths (41 = "4.1").
///
/// ffprobe reports H.264 levels as integers in tenths, but some muxers
/// surface the decimal form; a value below 10 is taken as decimal.
pub fn normalize_level(raw: f64) -> Option<i64> {
    if raw <= 0.0 {
        return None;
    }
    if raw < 10.0 {
        Some((raw * 10.0).round() as i64)
    } else {
        Some(raw.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "codec_name": "h264",
                "profile": "High",
                "pix_fmt": "yuv420p",
                "level": 40,
                "width": 1920,
                "height": 1080
            },
            {
                "index": 1,
                "codec_type": "audio",
                "codec_name": "aac"
            },
            {
                "index": 2,
                "codec_type": "subtitle",
                "codec_name": "subrip",
                "tags": { "language": "eng" }
            }
        ],
        "format": {
            "format_name": "matroska,webm",
            "duration": "120.500000",
            "size": "7340032"
        }
    }"#;

    #[test]
    fn test_parse_full_probe() {
        let desc = parse_probe_output(SAMPLE).unwrap();
        assert_eq!(desc.format_name, "matroska,webm");
        assert_eq!(desc.duration, Some(120.5));
        assert_eq!(desc.size, 7340032);
        assert_eq!(desc.streams.len(), 3);

        let video = desc.first_video().unwrap();
        assert_eq!(video.codec_name, "h264");
        assert_eq!(video.profile.as_deref(), Some("High"));
        assert_eq!(video.pix_fmt.as_deref(), Some("yuv420p"));
        assert_eq!(video.level, Some(40.0));
        assert_eq!(video.width, 1920);
        assert_eq!(video.height, 1080);

        assert_eq!(desc.audio_streams().count(), 1);
        let sub = desc.subtitle_streams().next().unwrap();
        assert_eq!(sub.codec_name, "subrip");
        assert_eq!(sub.language.as_deref(), Some("eng"));
    }

    #[test]
    fn test_parse_no_streams() {
        let desc = parse_probe_output(r#"{"format": {"format_name": "mp4"}}"#).unwrap();
        assert_eq!(desc.format_name, "mp4");
        assert!(desc.streams.is_empty());
        assert!(desc.first_video().is_none());
        assert!(desc.duration.is_none());
    }

    #[test]
    fn test_parse_missing_format_name() {
        // format_name is resolvable even when ffprobe omits it
        let desc = parse_probe_output(r#"{"format": {}, "streams": []}"#).unwrap();
        assert_eq!(desc.format_name, "");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_probe_output("not json at all").is_err());
        assert!(parse_probe_output("").is_err());
    }

    #[test]
    fn test_stream_kind_mapping() {
        assert_eq!(StreamKind::from_codec_type("video"), StreamKind::Video);
        assert_eq!(StreamKind::from_codec_type("audio"), StreamKind::Audio);
        assert_eq!(
            StreamKind::from_codec_type("subtitle"),
            StreamKind::Subtitle
        );
        assert_eq!(StreamKind::from_codec_type("data"), StreamKind::Other);
        assert_eq!(StreamKind::from_codec_type(""), StreamKind::Other);
    }

    #[test]
    fn test_normalize_level() {
        let cases: &[(f64, Option<i64>)] = &[
            (41.0, Some(41)),
            (4.1, Some(41)),
            (40.0, Some(40)),
            (4.0, Some(40)),
            (50.0, Some(50)),
            (5.0, Some(50)),
            (3.1, Some(31)),
            (0.0, None),
            (-99.0, None),
        ];

        for (raw, expected) in cases {
            assert_eq!(
                normalize_level(*raw),
                *expected,
                "normalize_level({}) mismatch",
                raw
            );
        }
    }

    #[test]
    fn test_level_decimal_and_tenths_agree() {
        assert_eq!(normalize_level(4.1), normalize_level(41.0));
        assert_eq!(normalize_level(5.1), normalize_level(51.0));
    }
}

//! Encode progress monitoring
//!
//! ffmpeg is launched with `-progress pipe:1 -nostats`, which emits
//! line-oriented `key=value` pairs on stdout. [`EncodeProgress`] folds that
//! feed into a monotonic percentage against a known total duration, and the
//! indicatif helpers render it.
//!
//! Supported keys:
//! - `out_time_us=` / `out_time_ms=` — elapsed microseconds (ffmpeg's
//!   `out_time_ms` is microseconds despite the name)
//! - `out_time=` — elapsed as `HH:MM:SS.frac`
//! - `progress=end` — terminal sentinel

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Converts an ffmpeg progress feed into latched integer percentages.
///
/// Percent is `floor(min(elapsed/total, 1.0) * 100)`; an update is emitted
/// only when it strictly increases the previous value, so jitter and
/// out-of-order timestamps never rewind the display. The terminal sentinel
/// forces 100. Without a known duration every update is suppressed — the
/// caller still drains the feed to keep the pipe from filling.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    total_duration: Option<f64>,
    elapsed: f64,
    last_percent: u8,
    finished: bool,
}

impl EncodeProgress {
    pub fn new(total_duration: Option<f64>) -> Self {
        Self {
            total_duration: total_duration.filter(|d| *d > 0.0),
            elapsed: 0.0,
            last_percent: 0,
            finished: false,
        }
    }

    /// Feed one progress line; returns a new percentage when it advanced.
    pub fn parse_line(&mut self, line: &str) -> Option<u8> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(value) = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
        {
            if let Ok(us) = value.trim().parse::<i64>() {
                if us >= 0 {
                    self.elapsed = self.elapsed.max(us as f64 / 1_000_000.0);
                }
            }
            return self.advance();
        }

        if let Some(value) = line.strip_prefix("out_time=") {
            if let Some(secs) = parse_clock_time(value.trim()) {
                self.elapsed = self.elapsed.max(secs);
            }
            return self.advance();
        }

        if let Some(value) = line.strip_prefix("progress=") {
            if value.trim() == "end" {
                self.finished = true;
                if self.total_duration.is_some() && self.last_percent < 100 {
                    self.last_percent = 100;
                    return Some(100);
                }
            }
            return None;
        }

        None
    }

    fn advance(&mut self) -> Option<u8> {
        let total = self.total_duration?;
        let percent = ((self.elapsed / total).min(1.0) * 100.0).floor() as u8;
        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// Latched percentage so far.
    pub fn percent(&self) -> u8 {
        self.last_percent
    }

    /// True once the terminal sentinel was seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Parse `HH:MM:SS.frac` into seconds.
fn parse_clock_time(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;

    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

const ENCODE_TEMPLATE: &str = "{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}";
const BATCH_TEMPLATE: &str = "{prefix:.bold} [{bar:40.green/white}] {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓░";

/// Per-file encode bar, 0..=100.
pub fn create_encode_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(ENCODE_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

/// Whole-batch bar over the file count.
pub fn create_batch_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BATCH_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microsecond_key() {
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("out_time_us=50000000"), Some(50));
        assert_eq!(p.percent(), 50);
    }

    #[test]
    fn test_ms_key_is_microseconds() {
        // ffmpeg's out_time_ms carries microseconds, not milliseconds
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("out_time_ms=25000000"), Some(25));
    }

    #[test]
    fn test_clock_time_key() {
        let mut p = EncodeProgress::new(Some(120.0));
        assert_eq!(p.parse_line("out_time=00:01:00.00"), Some(50));
        assert_eq!(p.parse_line("out_time=00:02:00.00"), Some(100));
    }

    #[test]
    fn test_updates_latched_never_rewound() {
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("out_time_us=40000000"), Some(40));
        // Out-of-order timestamp: no decrease
        assert_eq!(p.parse_line("out_time_us=10000000"), None);
        assert_eq!(p.percent(), 40);
        // Equal value: not a strict increase, suppressed
        assert_eq!(p.parse_line("out_time_us=40000000"), None);
        assert_eq!(p.parse_line("out_time_us=41000000"), Some(41));
    }

    #[test]
    fn test_overshoot_clamped_to_100() {
        let mut p = EncodeProgress::new(Some(10.0));
        assert_eq!(p.parse_line("out_time_us=999000000"), Some(100));
        assert_eq!(p.parse_line("out_time_us=9999000000"), None);
    }

    #[test]
    fn test_sentinel_forces_100() {
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("out_time_us=30000000"), Some(30));
        assert_eq!(p.parse_line("progress=end"), Some(100));
        assert!(p.is_finished());
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn test_sentinel_at_100_not_reemitted() {
        let mut p = EncodeProgress::new(Some(10.0));
        assert_eq!(p.parse_line("out_time_us=10000000"), Some(100));
        assert_eq!(p.parse_line("progress=end"), None);
        assert_eq!(p.percent(), 100);
    }

    #[test]
    fn test_unknown_duration_suppresses_everything() {
        let mut p = EncodeProgress::new(None);
        assert_eq!(p.parse_line("out_time_us=50000000"), None);
        assert_eq!(p.parse_line("out_time=00:10:00.00"), None);
        assert_eq!(p.parse_line("progress=end"), None);
        assert_eq!(p.percent(), 0);
        assert!(p.is_finished());
    }

    #[test]
    fn test_zero_duration_treated_as_unknown() {
        let mut p = EncodeProgress::new(Some(0.0));
        assert_eq!(p.parse_line("out_time_us=1000000"), None);
    }

    #[test]
    fn test_irrelevant_keys_ignored() {
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("frame=120"), None);
        assert_eq!(p.parse_line("fps=29.97"), None);
        assert_eq!(p.parse_line("speed=1.5x"), None);
        assert_eq!(p.parse_line("progress=continue"), None);
        assert_eq!(p.parse_line(""), None);
    }

    #[test]
    fn test_malformed_values_ignored() {
        let mut p = EncodeProgress::new(Some(100.0));
        assert_eq!(p.parse_line("out_time_us=garbage"), None);
        assert_eq!(p.parse_line("out_time=nonsense"), None);
        assert_eq!(p.parse_line("out_time=12:34"), None);
        assert_eq!(p.parse_line("out_time_us=-5000000"), None);
        assert_eq!(p.percent(), 0);
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("00:00:30.00"), Some(30.0));
        assert_eq!(parse_clock_time("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_clock_time("00:01:30.50"), Some(90.5));
        assert_eq!(parse_clock_time("garbage"), None);
        assert_eq!(parse_clock_time("1:2"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}

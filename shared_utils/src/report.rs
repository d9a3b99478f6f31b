//! Report module
//!
//! Summary reporting for batch conversions and the compatibility check
//! command.

use crate::batch::BatchResult;
use crate::compat::CompatibilityVerdict;
use crate::progress::{format_bytes, format_duration};
use console::style;
use std::time::Duration;

pub fn print_summary_report(
    result: &BatchResult,
    duration: Duration,
    input_bytes: u64,
    output_bytes: u64,
) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                 📊 Conversion Summary Report                     ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!(
        "║  📁 Files Processed:    {:>10}                               ║",
        result.total
    );
    println!(
        "║  ⏭️  Already Compatible: {:>10}                               ║",
        result.skipped
    );
    println!(
        "║  📦 Remuxed:            {:>10}                               ║",
        result.remuxed
    );
    println!(
        "║  ⚡ Hardware Encoded:   {:>10}                               ║",
        result.hw_encoded
    );
    println!(
        "║  🖥️  Software Encoded:   {:>10}                               ║",
        result.sw_encoded
    );
    println!(
        "║  ❌ Failed:             {:>10}                               ║",
        result.failed
    );
    println!(
        "║  📈 Success Rate:       {:>9.1}%                               ║",
        result.success_rate()
    );
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!(
        "║  💾 Input Size:         {:>10}                               ║",
        format_bytes(input_bytes)
    );
    println!(
        "║  💾 Output Size:        {:>10}                               ║",
        format_bytes(output_bytes)
    );
    println!(
        "║  ⏱️  Total Time:         {:>10}                               ║",
        format_duration(duration)
    );
    println!("╚══════════════════════════════════════════════════════════════════╝");

    if !result.errors.is_empty() {
        println!();
        println!("{}", style("❌ Errors encountered:").red().bold());
        println!(
            "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
        );
        for (path, error) in &result.errors {
            println!("   {} → {}", path.display(), error);
        }
    }
}

pub fn print_check_header(profile_name: &str) {
    println!("{}", "═".repeat(70));
    println!("🎬 Direct Play Compatibility Check ({})", profile_name);
    println!("{}", "═".repeat(70));
}

/// One line per file, with each deficiency indented under a failing file.
pub fn print_check_file(name: &str, verdict: &CompatibilityVerdict) {
    if verdict.compatible {
        println!("{} {}", style("✅").green(), name);
    } else {
        println!("{} {}", style("❌").red(), name);
        for issue in &verdict.issues {
            println!("   ↳ {}", issue.detail);
        }
    }
}

pub fn print_check_tally(ready: usize, needs_fixing: usize) {
    println!("{}", "═".repeat(70));
    println!(
        "{} Direct Play Ready: {}",
        style("✅").green(),
        style(ready).bold()
    );
    println!(
        "{} Needs Fixing: {}",
        style("❌").red(),
        style(needs_fixing).bold()
    );
    println!("{}", "═".repeat(70));
}

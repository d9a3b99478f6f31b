//! Safety module
//!
//! Guards against pointing the converter's output (or `--delete-original`)
//! at a system directory.

use std::path::Path;

const DANGEROUS_DIRS: &[&str] = &[
    "/",
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/private",
    "/Library",
    "/Applications",
    "/Users",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/opt",
];

pub fn check_dangerous_directory(path: &Path) -> Result<(), String> {
    let path_str = path.to_string_lossy();

    for dangerous in DANGEROUS_DIRS {
        if path_str == *dangerous {
            return Err(format!(
                "🚨 DANGEROUS OPERATION BLOCKED!\n\
                 ❌ Target directory '{}' is a protected system directory.\n\
                 💡 Please specify a safe subdirectory instead.",
                dangerous
            ));
        }
    }

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let components: Vec<_> = canonical.components().collect();

    if components.len() <= 3 {
        let path_str = canonical.to_string_lossy();
        if path_str.starts_with("/Users/") || path_str.starts_with("/home/") {
            return Err(format!(
                "🚨 DANGEROUS OPERATION BLOCKED!\n\
                 ❌ Target '{}' is too close to your home directory root.\n\
                 💡 Please specify a subdirectory like ~/Videos/converted instead.",
                path.display()
            ));
        }
    }

    Ok(())
}

/// Extra warning for destructive operations in common personal folders.
pub fn check_safe_for_destructive(path: &Path, operation: &str) -> Result<(), String> {
    check_dangerous_directory(path)?;

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    if path_str.contains("/Desktop") || path_str.contains("/Downloads") {
        eprintln!(
            "⚠️  WARNING: You are about to {} files in '{}'.\n\
             ⚠️  Make sure you have backups before proceeding.",
            operation,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangerous_directories() {
        assert!(check_dangerous_directory(Path::new("/")).is_err());
        assert!(check_dangerous_directory(Path::new("/usr")).is_err());
        assert!(check_dangerous_directory(Path::new("/etc")).is_err());
    }

    #[test]
    fn test_safe_directories() {
        assert!(check_dangerous_directory(Path::new("/home/test/videos/converted")).is_ok());
        assert!(check_dangerous_directory(Path::new("relative/output")).is_ok());
    }
}

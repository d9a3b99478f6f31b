//! Cooperative cancellation
//!
//! A Ctrl-C flips a shared flag; the orchestrator checks the token at every
//! suspension point and unwinds with cleanup instead of dying mid-write.
//! A second Ctrl-C force-exits for users who really mean it.

use crate::errors::{Result, VidCompatError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out of the current operation once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VidCompatError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Install the Ctrl-C handler: first signal cancels cooperatively, a second
/// one exits immediately with the conventional 130.
pub fn install_ctrlc_handler(token: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        warn!("Received Ctrl+C, stopping after cleanup (press again to force quit)");
        eprintln!("\nReceived Ctrl+C, stopping after cleanup (press again to force quit)");
        token.cancel();
    })
    .map_err(|e| VidCompatError::General(format!("Failed to set Ctrl+C handler: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_is_sticky_and_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(VidCompatError::Cancelled)));
        assert!(matches!(clone.check(), Err(VidCompatError::Cancelled)));
    }
}

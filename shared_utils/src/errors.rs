use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidCompatError {
    #[error("FFprobe failed: {0}")]
    Probe(String),

    #[error("Encode process failed: {0}")]
    Execution(String),

    #[error("Output failed verification: {0}")]
    Verification(String),

    #[error("Conversion failed after all tiers: {0}")]
    Terminal(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(String),
}

impl VidCompatError {
    /// True for failures the orchestrator may consume by falling back to
    /// the next tier; `Terminal` and `Cancelled` must propagate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VidCompatError::Execution(_) | VidCompatError::Verification(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VidCompatError>;

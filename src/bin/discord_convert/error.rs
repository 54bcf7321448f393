//! Error kinds for converting a single file.

use std::path::PathBuf;

use discord_tools::tail_chars;

/// Maximum number of diagnostic characters kept from a failed tool invocation.
pub const DIAGNOSTIC_MAX_CHARS: usize = 1000;

/// Errors that end the processing of one input file.
///
/// `CleanupFailure` is the exception: it is only ever reported as a warning.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The input path does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The input has no video stream.
    #[error("No video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },

    /// ffprobe failed or returned output that could not be parsed.
    #[error("ffprobe failed:\n{message}")]
    ProbeFailure { message: String },

    /// The audio reservation alone uses up the whole size budget.
    #[error(
        "Video too long ({duration:.0}s) to fit in {} with {audio_kbps} kbps audio.\nTip: split the video into shorter segments.",
        discord_tools::format_size(*target_bytes)
    )]
    BudgetInfeasible {
        duration: f64,
        target_bytes: u64,
        audio_kbps: u32,
    },

    /// An encoder pass exited with a non-zero status.
    #[error("Encoding pass {pass} failed:\n{diagnostic}")]
    EncodeFailure { pass: u8, diagnostic: String },

    /// Removing a pass-log artifact failed.
    #[error("Failed to remove {}: {source}", path.display())]
    CleanupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required external tool could not be started.
    #[error("{tool} not found. Install ffmpeg or set `tool_dir` in the config file")]
    ToolNotFound { tool: String },

    /// File system error while copying or inspecting files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Create a probe failure keeping the tail of the tool diagnostic.
    pub fn probe_failure(message: &str) -> Self {
        Self::ProbeFailure {
            message: tail_chars(message.trim(), DIAGNOSTIC_MAX_CHARS).to_string(),
        }
    }

    /// Create an encode failure keeping the tail of the tool diagnostic.
    pub fn encode_failure(pass: u8, diagnostic: &str) -> Self {
        Self::EncodeFailure {
            pass,
            diagnostic: tail_chars(diagnostic.trim(), DIAGNOSTIC_MAX_CHARS).to_string(),
        }
    }

    /// Short kind name used in the run log.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::NoVideoStream { .. } => "NO_VIDEO_STREAM",
            Self::ProbeFailure { .. } => "PROBE_FAILURE",
            Self::BudgetInfeasible { .. } => "BUDGET_INFEASIBLE",
            Self::EncodeFailure { .. } => "ENCODE_FAILURE",
            Self::CleanupFailure { .. } => "CLEANUP_FAILURE",
            Self::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            Self::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn encode_failure_keeps_diagnostic_tail() {
        let long = format!("{}END", "x".repeat(5000));
        let error = ConvertError::encode_failure(1, &long);
        match &error {
            ConvertError::EncodeFailure { pass, diagnostic } => {
                assert_eq!(*pass, 1);
                assert_eq!(diagnostic.chars().count(), DIAGNOSTIC_MAX_CHARS);
                assert!(diagnostic.ends_with("END"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn budget_message_mentions_duration_and_audio() {
        let error = ConvertError::BudgetInfeasible {
            duration: 3600.0,
            target_bytes: 9_961_472,
            audio_kbps: 128,
        };
        let message = error.to_string();
        assert!(message.contains("3600s"));
        assert!(message.contains("128 kbps"));
        assert!(message.contains("9.50 MB"));
    }

    #[test]
    fn probe_failure_message_contains_tool_text() {
        let error = ConvertError::probe_failure("  moov atom not found\n");
        assert_eq!(error.to_string(), "ffprobe failed:\nmoov atom not found");
        assert_eq!(error.kind(), "PROBE_FAILURE");
    }
}

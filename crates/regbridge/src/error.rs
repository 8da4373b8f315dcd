//! Error and warning types for registration sessions.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Errors that can occur while driving the registration tool.
///
/// Every variant is fatal for the session that produced it. Temporary
/// resources acquired by the session are released before the error reaches
/// the caller.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The parameter file is missing, not a regular file, or unreadable.
    #[error("Invalid parameter file {path}: {reason}")]
    InvalidParameterFile { path: PathBuf, reason: String },

    /// In-memory pixel data could not be serialized to the temp image format.
    #[error("Failed to encode pixel data: {message}")]
    Encode { message: String },

    /// The result image could not be decoded into pixel data.
    #[error("Failed to decode result image {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A temporary file or directory could not be created.
    #[error("Failed to create temporary resource {path}: {source}")]
    TempResource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registration tool executable could not be located.
    #[error("Registration tool not found. Ensure elastix is installed and in PATH, or set ELASTIX_PATH environment variable")]
    ToolNotFound,

    /// The registration tool could not be started.
    #[error("Failed to spawn registration tool: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The registration tool exceeded the configured timeout and was killed.
    #[error("Registration tool timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The registration tool exited with a non-zero status.
    #[error("Registration failed with exit status {exit_code}: {stderr}")]
    RegistrationFailed { exit_code: i32, stderr: String },

    /// An expected result artifact is absent after a successful run.
    #[error("Expected result file not found: {path}")]
    MissingResultFile { path: PathBuf },

    /// No `result.0.*` image was written although one was required.
    #[error("No result image found in {dir}")]
    MissingResultImage { dir: PathBuf },

    /// A row of the iteration log did not parse.
    #[error("Malformed iteration log at line {line}: {reason}")]
    MalformedIterationLog { line: usize, reason: String },

    /// The result image could not be moved to the requested location.
    #[error("Failed to move result image to {destination}: {source}")]
    Relocate {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A session was asked to run more than once.
    #[error("Registration session has already run")]
    SessionReused,

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistrationError {
    /// Creates a new invalid parameter file error.
    pub fn invalid_parameter_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidParameterFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new registration failed error.
    pub fn registration_failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Creates a new malformed iteration log error.
    pub fn malformed_iteration_log(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedIterationLog {
            line,
            reason: reason.into(),
        }
    }

    /// Creates a new encode error.
    pub fn encode(message: impl fmt::Display) -> Self {
        Self::Encode {
            message: message.to_string(),
        }
    }

    /// Creates a new decode error.
    pub fn decode(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Stable error code for reporting, e.g. `REG_007`.
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationError::InvalidParameterFile { .. } => "REG_001",
            RegistrationError::Encode { .. } => "REG_002",
            RegistrationError::Decode { .. } => "REG_003",
            RegistrationError::TempResource { .. } => "REG_004",
            RegistrationError::ToolNotFound => "REG_005",
            RegistrationError::SpawnFailed(_) => "REG_006",
            RegistrationError::Timeout { .. } => "REG_007",
            RegistrationError::RegistrationFailed { .. } => "REG_008",
            RegistrationError::MissingResultFile { .. } => "REG_009",
            RegistrationError::MissingResultImage { .. } => "REG_010",
            RegistrationError::MalformedIterationLog { .. } => "REG_011",
            RegistrationError::Relocate { .. } => "REG_012",
            RegistrationError::SessionReused => "REG_013",
            RegistrationError::Io(_) => "REG_014",
        }
    }

    /// Error category for grouping related errors.
    pub fn category(&self) -> &'static str {
        match self {
            RegistrationError::InvalidParameterFile { .. } => "input",
            RegistrationError::Encode { .. } | RegistrationError::Decode { .. } => "codec",
            RegistrationError::TempResource { .. } | RegistrationError::Io(_) => "filesystem",
            RegistrationError::ToolNotFound
            | RegistrationError::SpawnFailed(_)
            | RegistrationError::Timeout { .. }
            | RegistrationError::RegistrationFailed { .. } => "tool",
            RegistrationError::MissingResultFile { .. }
            | RegistrationError::MissingResultImage { .. }
            | RegistrationError::MalformedIterationLog { .. } => "result",
            RegistrationError::Relocate { .. } => "output",
            RegistrationError::SessionReused => "session",
        }
    }
}

/// Non-fatal conditions surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationWarning {
    /// The tool wrote the result with a different extension than the
    /// requested output path. The file was moved regardless.
    ExtensionMismatch {
        produced: PathBuf,
        requested: PathBuf,
    },

    /// The moving image was in-memory data but the tool wrote no result
    /// image, so no registered pixels are returned.
    ResultImageNotWritten { dir: PathBuf },
}

impl RegistrationWarning {
    /// Stable warning code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            RegistrationWarning::ExtensionMismatch { .. } => "REG_W001",
            RegistrationWarning::ResultImageNotWritten { .. } => "REG_W002",
        }
    }
}

impl fmt::Display for RegistrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationWarning::ExtensionMismatch {
                produced,
                requested,
            } => write!(
                f,
                "Result image {} has a different extension than output path {}; moved anyway",
                produced.display(),
                requested.display()
            ),
            RegistrationWarning::ResultImageNotWritten { dir } => {
                write!(f, "Registration tool wrote no result image in {}", dir.display())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistrationError::ToolNotFound;
        assert!(err.to_string().contains("ELASTIX_PATH"));

        let err = RegistrationError::Timeout { timeout_secs: 30 };
        assert!(err.to_string().contains("30 seconds"));

        let err = RegistrationError::registration_failed(2, "metric diverged");
        assert!(err.to_string().contains("metric diverged"));
        assert_eq!(err.code(), "REG_008");
        assert_eq!(err.category(), "tool");
    }

    #[test]
    fn test_warning_display() {
        let warning = RegistrationWarning::ExtensionMismatch {
            produced: PathBuf::from("out/result.0.png"),
            requested: PathBuf::from("/tmp/out.jpg"),
        };
        assert!(warning.to_string().contains("/tmp/out.jpg"));
        assert_eq!(warning.code(), "REG_W001");
    }
}

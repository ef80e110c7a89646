/*!
 * Error types for the kreel pipeline.
 *
 * This module contains custom error types for the different stages of the
 * caption pipeline, using the thiserror crate for ergonomic error definitions.
 * Recoverable conditions (interpolated timings, oversized words) are not
 * errors; they are reported as statistics on the pipeline result.
 */

use thiserror::Error;

/// Errors returned by a speech synthesizer
///
/// Cloneable so that one failed synthesis can be handed to every caller
/// waiting on the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// Error when sending the request fails
    #[error("Synthesis request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the synthesis service itself
    #[error("Synthesis service responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the service
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Quota or rate limit exhausted
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The requested voice does not exist
    #[error("Invalid voice: {0}")]
    InvalidVoice(String),

    /// The service answered but the payload could not be used
    #[error("Invalid synthesis response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while building a subtitle style
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    /// Colour is not in `&HAABBGGRR` form
    #[error("Invalid colour for {field}: '{value}' (expected &HAABBGGRR)")]
    InvalidColor {
        /// Style field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Alignment outside the numpad range
    #[error("Invalid alignment {0} (expected 1-9)")]
    InvalidAlignment(u8),

    /// Font size must be positive
    #[error("Invalid font size {0}")]
    InvalidFontSize(u32),

    /// Negative or non-finite outline/shadow metric
    #[error("Invalid {field}: {value}")]
    InvalidMetric {
        /// Style field name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Font name is blank
    #[error("Font name must not be empty")]
    EmptyFontName,
}

/// Errors that halt the caption pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Script bytes are not valid UTF-8
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Script exceeds the configured character ceiling
    #[error("Script too long: {chars} characters (limit {limit})")]
    ScriptTooLong {
        /// Characters in the script
        chars: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Script contains no speakable words
    #[error("Script contains no words")]
    EmptyScript,

    /// Error from the speech synthesizer
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Timing data is unusable (zero audio duration, negative or NaN offsets)
    #[error("Timing data missing: {0}")]
    TimingDataMissing(String),

    /// Background media cannot be planned against
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    /// Renderer exited with a failure status
    #[error("Render failed (exit code {exit_code:?}): {stderr}")]
    Render {
        /// Process exit code if one was reported
        exit_code: Option<i32>,
        /// Filtered stderr of the renderer
        stderr: String,
    },

    /// Renderer did not finish in time
    #[error("Render timed out after {timeout_secs}s")]
    RenderTimeout {
        /// Configured timeout
        timeout_secs: u64,
    },

    /// Render was cancelled by the caller
    #[error("Render cancelled")]
    RenderCancelled,

    /// Run was cancelled before rendering started
    #[error("Pipeline cancelled")]
    Cancelled,

    /// A required external binary is not installed
    #[error("Missing dependency '{binary}': {detail}")]
    MissingDependency {
        /// Binary name
        binary: String,
        /// Underlying error text
        detail: String,
    },

    /// Style configuration rejected
    #[error("Style error: {0}")]
    InvalidStyle(#[from] StyleError),

    /// Error from a file operation
    #[error("File error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<std::string::FromUtf8Error> for PipelineError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Self::Encoding(error.to_string())
    }
}

impl From<std::str::Utf8Error> for PipelineError {
    fn from(error: std::str::Utf8Error) -> Self {
        Self::Encoding(error.to_string())
    }
}

impl PipelineError {
    /// Whether the error was raised before any external work happened
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Encoding(_) | Self::ScriptTooLong { .. } | Self::EmptyScript
        )
    }
}

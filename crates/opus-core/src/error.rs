//! Error handling for the transcoding core
//!
//! Every failure is scoped to the pipeline instance that produced it; nothing
//! in this crate is fatal to the process.

#![allow(missing_docs)]

use std::fmt;
use thiserror::Error;

use crate::negotiation::AttrKey;

/// Result type alias for transcoding operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Comprehensive error type for transcoding and negotiation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Invalid transcoder configuration
    #[error("Invalid transcoder configuration: {details}")]
    InvalidConfig { details: String },

    /// Frame format does not match what the pipeline expects
    #[error("Invalid audio format: {details}")]
    InvalidFormat { details: String },

    /// Zero-length linear frame submitted to an encoder
    #[error("Empty frame submitted for encoding")]
    EmptyFrame,

    /// Invalid frame size
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// Sample rate outside the supported enumeration
    #[error("Invalid sample rate: {rate}Hz (supported: {supported:?})")]
    InvalidSampleRate { rate: u32, supported: Vec<u32> },

    /// Rate converter cannot be built for this pair
    #[error("Unsupported rate conversion: {from}Hz -> {to}Hz")]
    UnsupportedRatePair { from: u32, to: u32 },

    /// Encoding operation failed
    #[error("Encoding failed: {reason}")]
    EncodingFailed { reason: String },

    /// Decoding operation failed
    #[error("Decoding failed: {reason}")]
    DecodingFailed { reason: String },

    /// Input would not fit in the accumulation buffer
    #[error("Buffer overflow: attempted to write {size} samples to {capacity} sample buffer")]
    BufferOverflow { size: usize, capacity: usize },

    /// Codec or resampler construction failed
    #[error("Codec initialization failed: {reason}")]
    InitializationFailed { reason: String },

    /// An earlier lazy configuration failed; the pipeline must be torn down
    #[error("Pipeline unusable after failed configuration: {reason}")]
    PipelineUnusable { reason: String },

    /// Sample-rate sets of two descriptors are disjoint
    #[error("No joint capabilities: sample rate sets do not intersect")]
    NoIntersection,

    /// Value kind does not match the attribute key
    #[error("Attribute {key:?} expects a {expected} value")]
    AttributeMismatch { key: AttrKey, expected: &'static str },

    /// Numeric attribute id not known to this format
    #[error("Unknown attribute id: {id}")]
    UnknownAttribute { id: u32 },

    /// Malformed SDP fmtp parameter
    #[error("Invalid fmtp parameter: {details}")]
    InvalidFmtp { details: String },

    /// No translator registered for the requested format pair
    #[error("Translator not found: {name}")]
    TranslatorNotFound { name: String },

    /// External library error
    #[error("External library error: {library} - {error}")]
    ExternalLibraryError { library: String, error: String },

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {message} (this is a bug, please report it)")]
    InternalError { message: String },
}

impl CodecError {
    /// Create a new invalid configuration error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    /// Create a new invalid format error
    pub fn invalid_format(details: impl Into<String>) -> Self {
        Self::InvalidFormat {
            details: details.into(),
        }
    }

    /// Create a new encoding failed error
    pub fn encoding_failed(reason: impl Into<String>) -> Self {
        Self::EncodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a new decoding failed error
    pub fn decoding_failed(reason: impl Into<String>) -> Self {
        Self::DecodingFailed {
            reason: reason.into(),
        }
    }

    /// Create a new initialization failed error
    pub fn initialization_failed(reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new invalid fmtp error
    pub fn invalid_fmtp(details: impl Into<String>) -> Self {
        Self::InvalidFmtp {
            details: details.into(),
        }
    }

    /// Create a new external library error
    pub fn external(library: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::ExternalLibraryError {
            library: library.into(),
            error: error.to_string(),
        }
    }

    /// Create a new internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Check if the owning pipeline can keep processing after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Per-call failures; the next frame may succeed
            Self::EmptyFrame
            | Self::InvalidFormat { .. }
            | Self::InvalidFrameSize { .. }
            | Self::EncodingFailed { .. }
            | Self::DecodingFailed { .. }
            | Self::BufferOverflow { .. }
            | Self::ExternalLibraryError { .. } => true,

            Self::InvalidConfig { .. }
            | Self::InvalidSampleRate { .. }
            | Self::UnsupportedRatePair { .. }
            | Self::InitializationFailed { .. }
            | Self::PipelineUnusable { .. }
            | Self::NoIntersection
            | Self::AttributeMismatch { .. }
            | Self::UnknownAttribute { .. }
            | Self::InvalidFmtp { .. }
            | Self::TranslatorNotFound { .. }
            | Self::InternalError { .. } => false,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig { .. }
            | Self::InvalidSampleRate { .. }
            | Self::UnsupportedRatePair { .. }
            | Self::TranslatorNotFound { .. } => ErrorCategory::Configuration,

            Self::InvalidFormat { .. }
            | Self::EmptyFrame
            | Self::InvalidFrameSize { .. }
            | Self::EncodingFailed { .. }
            | Self::DecodingFailed { .. } => ErrorCategory::Processing,

            Self::BufferOverflow { .. } => ErrorCategory::Memory,

            Self::InitializationFailed { .. } | Self::PipelineUnusable { .. } => {
                ErrorCategory::Initialization
            }

            Self::NoIntersection
            | Self::AttributeMismatch { .. }
            | Self::UnknownAttribute { .. }
            | Self::InvalidFmtp { .. } => ErrorCategory::Negotiation,

            Self::ExternalLibraryError { .. } => ErrorCategory::External,

            Self::InternalError { .. } => ErrorCategory::Internal,
        }
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration and parameter errors
    Configuration,
    /// Per-frame processing errors
    Processing,
    /// Buffer capacity errors
    Memory,
    /// Lazy setup errors
    Initialization,
    /// Capability negotiation errors
    Negotiation,
    /// External library errors
    External,
    /// Internal library errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Processing => write!(f, "Processing"),
            Self::Memory => write!(f, "Memory"),
            Self::Initialization => write!(f, "Initialization"),
            Self::Negotiation => write!(f, "Negotiation"),
            Self::External => write!(f, "External"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Outcome of a joint negotiation whose sample-rate sets are disjoint
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sample rate sets do not intersect")]
pub struct NoIntersection;

impl From<NoIntersection> for CodecError {
    fn from(_: NoIntersection) -> Self {
        Self::NoIntersection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CodecError::invalid_config("test message");
        assert!(matches!(err, CodecError::InvalidConfig { .. }));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_error_recoverability() {
        assert!(CodecError::decoding_failed("corrupt").is_recoverable());
        assert!(CodecError::EmptyFrame.is_recoverable());
        assert!(!CodecError::initialization_failed("no encoder").is_recoverable());
        assert!(!CodecError::PipelineUnusable {
            reason: "x".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CodecError::encoding_failed("test").category(),
            ErrorCategory::Processing
        );
        assert_eq!(
            CodecError::BufferOverflow { size: 100, capacity: 50 }.category(),
            ErrorCategory::Memory
        );
        assert_eq!(CodecError::NoIntersection.category(), ErrorCategory::Negotiation);
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::UnsupportedRatePair { from: 11025, to: 48000 };
        let display = format!("{}", err);
        assert!(display.contains("11025"));
        assert!(display.contains("48000"));
    }

    #[test]
    fn test_no_intersection_conversion() {
        let err: CodecError = NoIntersection.into();
        assert_eq!(err, CodecError::NoIntersection);
    }
}

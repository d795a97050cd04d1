//! # Opus-Core: Opus Transcoding and Capability Negotiation
//!
//! This library converts between signed linear PCM and Opus for the media
//! pipeline, and negotiates the Opus parameters two parties share.
//!
//! ## Features
//!
//! - **Capability negotiation**: compare and merge advertised Opus attributes
//!   (sample rates, bitrate ceiling, DTX, FEC, CBR, frame duration, mode)
//! - **Encode pipeline**: accumulates arbitrary-size linear input, resamples
//!   to the working rate and emits whole compressed frames
//! - **Decode pipeline**: one linear frame per compressed frame, with loss
//!   concealment for empty payloads
//! - **Translator registry**: one record per supported linear rate and
//!   direction, created explicitly by the host
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_opus_core::{
//!     CapabilityDescriptor, Frame, LinearRate, SampleRate, SimulatedOpus,
//!     TranscoderConfig, TranslatorRegistry,
//! };
//!
//! let registry =
//!     TranslatorRegistry::with_backend(TranscoderConfig::default(), Arc::new(SimulatedOpus))?;
//!
//! // Negotiate with the peer
//! let ours = CapabilityDescriptor::default();
//! let theirs = CapabilityDescriptor::with_rate(SampleRate::Rate48000);
//! let joint = ours.joint(&theirs)?;
//!
//! let mut pair = registry.create_pair(LinearRate::Rate48000, Some(joint))?;
//! pair.encoder.submit(&Frame::linear(LinearRate::Rate48000, &[0i16; 960]))?;
//! let packets = pair.encoder.produce()?;
//! assert_eq!(packets.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `opus`: real libopus backend (requires the native library); without it
//!   the simulated backend is the default

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod codecs;
pub mod config;
pub mod engine;
pub mod error;
pub mod negotiation;
pub mod pipeline;
pub mod resample;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use codecs::{default_backend, EncoderSettings, FrameDecoder, FrameEncoder, OpusBackend, SimulatedOpus};
#[cfg(feature = "opus")]
pub use codecs::LibOpus;
pub use config::{ResamplerQuality, TranscoderConfig};
pub use engine::{Direction, Transcoder, TranscoderPair, TranslatorRecord, TranslatorRegistry};
pub use error::{CodecError, ErrorCategory, NoIntersection, Result};
pub use negotiation::{AttrKey, AttrValue, CapabilityDescriptor, FormatCmp, JointDescriptor};
pub use pipeline::{DecodePipeline, EncodePipeline};
pub use resample::RateConverter;
pub use types::{
    CodingMode, Format, FormatKind, Frame, FrameDuration, LinearRate, RateSet, SampleRate,
};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Installs a `tracing` subscriber if none is set and builds the μ-law
/// tables used by the simulated backend. Safe to call multiple times.
///
/// # Errors
///
/// Currently infallible; the `Result` is kept for parity with the other
/// codec crates.
pub fn init() -> Result<()> {
    // Initialize logging if not already done
    let _ = tracing_subscriber::fmt::try_init();

    codecs::ulaw::init_tables();

    tracing::info!("Opus-Core v{} initialized", VERSION);
    tracing::info!("Default backend: {}", default_backend().name());

    Ok(())
}

/// Get library information
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        backend: default_backend().name(),
        linear_rates: LinearRate::ALL.iter().map(|r| r.hz()).collect(),
    }
}

/// Library information structure
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    /// Library version
    pub version: &'static str,
    /// Name of the default codec backend
    pub backend: &'static str,
    /// Linear rates translators are registered for, in Hz
    pub linear_rates: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_info() {
        let info = info();
        assert_eq!(info.version, VERSION);
        assert_eq!(info.linear_rates.len(), 8);
        #[cfg(not(feature = "opus"))]
        assert_eq!(info.backend, "opus-sim");
    }
}

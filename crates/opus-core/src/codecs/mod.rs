//! Compressor/decompressor backends
//!
//! The pipelines treat the codec as a black box behind [`FrameEncoder`] and
//! [`FrameDecoder`]. An [`OpusBackend`] creates them; the registry holds one
//! backend and hands it to every transcoder it builds.

use crate::error::Result;
use crate::negotiation::{CapabilityDescriptor, MAX_BITRATE};
use crate::types::{CodingMode, FrameDuration, SampleRate};
use std::sync::Arc;

#[cfg(feature = "opus")]
pub mod libopus;
pub mod sim;
pub mod ulaw;

#[cfg(feature = "opus")]
pub use libopus::LibOpus;
pub use sim::SimulatedOpus;

/// Largest compressed frame a backend may produce for one call
pub const MAX_PACKET_SIZE: usize = 4000;

/// Parameters the compressor is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Working sample rate
    pub sample_rate: SampleRate,
    /// Coding mode (selects the codec application)
    pub mode: CodingMode,
    /// Bitrate ceiling in bits/sec
    pub max_bitrate: u32,
    /// Discontinuous transmission
    pub dtx: bool,
    /// In-band forward error correction
    pub fec: bool,
    /// Constant bitrate
    pub cbr: bool,
    /// Frame duration
    pub frame_duration: FrameDuration,
}

impl EncoderSettings {
    /// Settings for `sample_rate` with every other attribute at its default
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            mode: CodingMode::Voice,
            max_bitrate: MAX_BITRATE,
            dtx: false,
            fec: false,
            cbr: false,
            frame_duration: FrameDuration::Ms20,
        }
    }

    /// Settings taken from negotiated attributes, running at `sample_rate`
    pub fn from_attributes(sample_rate: SampleRate, attrs: &CapabilityDescriptor) -> Self {
        Self {
            sample_rate,
            mode: attrs.mode(),
            max_bitrate: attrs.max_bitrate(),
            dtx: attrs.dtx(),
            fec: attrs.fec(),
            cbr: attrs.cbr(),
            frame_duration: attrs.frame_duration(),
        }
    }

    /// Samples per frame
    pub fn frame_size(&self) -> usize {
        self.sample_rate.frame_size(self.frame_duration)
    }
}

/// Frame-synchronous compressor
pub trait FrameEncoder: Send {
    /// Compress exactly one frame of `pcm` into `out`.
    ///
    /// Returns the number of bytes written. `Ok(0)` or an error means no
    /// frame was produced for this call.
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize>;
}

/// Frame-synchronous decompressor
pub trait FrameDecoder: Send {
    /// Decompress `payload` into `out`, which is sized to one frame.
    ///
    /// When `conceal` is set and `payload` is empty the decoder synthesises
    /// a concealment frame instead of failing. Returns the number of samples
    /// written.
    fn decode(&mut self, payload: &[u8], out: &mut [i16], conceal: bool) -> Result<usize>;
}

/// Factory for compressor/decompressor instances
pub trait OpusBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Create a compressor
    fn create_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn FrameEncoder>>;

    /// Create a decompressor running at `sample_rate`
    fn create_decoder(&self, sample_rate: SampleRate) -> Result<Box<dyn FrameDecoder>>;
}

/// Backend used when the host does not pick one: libopus when the `opus`
/// feature is enabled, the simulated codec otherwise.
pub fn default_backend() -> Arc<dyn OpusBackend> {
    #[cfg(feature = "opus")]
    {
        Arc::new(LibOpus)
    }
    #[cfg(not(feature = "opus"))]
    {
        Arc::new(SimulatedOpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_attributes() {
        let attrs = CapabilityDescriptor::default()
            .with_dtx(true)
            .with_cbr(true)
            .with_max_bitrate(24_000)
            .with_frame_duration(FrameDuration::Ms40)
            .with_mode(CodingMode::Audio);
        let settings = EncoderSettings::from_attributes(SampleRate::Rate16000, &attrs);
        assert!(settings.dtx);
        assert!(settings.cbr);
        assert!(!settings.fec);
        assert_eq!(settings.max_bitrate, 24_000);
        assert_eq!(settings.mode, CodingMode::Audio);
        assert_eq!(settings.frame_size(), 640);
    }

    #[test]
    fn test_default_backend_creates_codecs() {
        let backend = default_backend();
        assert!(backend
            .create_encoder(&EncoderSettings::new(SampleRate::Rate48000))
            .is_ok());
        assert!(backend.create_decoder(SampleRate::Rate8000).is_ok());
    }
}

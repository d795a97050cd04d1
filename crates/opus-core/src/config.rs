//! Transcoder configuration

use crate::error::{CodecError, Result};
use crate::types::{FrameDuration, SampleRate};

/// Default per-instance scratch buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8096;

/// Default cap on compressed frames held between two `produce` calls
pub const DEFAULT_MAX_FRAMES_PER_CALL: usize = 8;

/// Rate converter quality/latency trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplerQuality {
    /// Short filter, lowest latency
    Fast,
    /// Default trade-off
    #[default]
    Balanced,
    /// Long filter, best stop-band attenuation
    High,
}

impl ResamplerQuality {
    /// Sinc filter length in taps
    pub fn sinc_len(self) -> usize {
        match self {
            Self::Fast => 32,
            Self::Balanced => 128,
            Self::High => 256,
        }
    }

    /// Oversampling factor of the interpolation table
    pub fn oversampling_factor(self) -> usize {
        match self {
            Self::Fast => 64,
            Self::Balanced => 128,
            Self::High => 256,
        }
    }
}

/// Configuration shared by every transcoder a registry creates
#[derive(Debug, Clone, PartialEq)]
pub struct TranscoderConfig {
    /// Scratch buffer size in bytes; the linear accumulation buffer holds
    /// `buffer_size / 2` samples
    pub buffer_size: usize,
    /// Completed compressed frames recorded between two `produce` calls
    pub max_frames_per_call: usize,
    /// Frame duration used when no joint descriptor was negotiated
    pub default_frame_duration: FrameDuration,
    /// Rate converter quality
    pub resampler_quality: ResamplerQuality,
    /// Input block fed to the rate converter, in milliseconds
    pub resampler_chunk_ms: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_frames_per_call: DEFAULT_MAX_FRAMES_PER_CALL,
            default_frame_duration: FrameDuration::Ms20,
            resampler_quality: ResamplerQuality::Balanced,
            resampler_chunk_ms: 10,
        }
    }
}

impl TranscoderConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scratch buffer size in bytes
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the completed-frame cap
    pub fn with_max_frames_per_call(mut self, max_frames: usize) -> Self {
        self.max_frames_per_call = max_frames;
        self
    }

    /// Set the fallback frame duration
    pub fn with_default_frame_duration(mut self, duration: FrameDuration) -> Self {
        self.default_frame_duration = duration;
        self
    }

    /// Set the rate converter quality
    pub fn with_resampler_quality(mut self, quality: ResamplerQuality) -> Self {
        self.resampler_quality = quality;
        self
    }

    /// Set the rate converter input block duration
    pub fn with_resampler_chunk_ms(mut self, chunk_ms: u32) -> Self {
        self.resampler_chunk_ms = chunk_ms;
        self
    }

    /// Samples the linear accumulation buffer can hold
    pub fn buffer_samples(&self) -> usize {
        self.buffer_size / std::mem::size_of::<i16>()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let largest_frame = SampleRate::Rate48000.frame_size(FrameDuration::Ms60);
        if self.buffer_samples() < largest_frame {
            return Err(CodecError::invalid_config(format!(
                "buffer_size {} bytes cannot hold one {} sample frame",
                self.buffer_size, largest_frame
            )));
        }

        if self.max_frames_per_call == 0 || self.max_frames_per_call > 64 {
            return Err(CodecError::invalid_config(format!(
                "max_frames_per_call must be within 1-64, got {}",
                self.max_frames_per_call
            )));
        }

        if !(1..=20).contains(&self.resampler_chunk_ms) {
            return Err(CodecError::invalid_config(format!(
                "resampler_chunk_ms must be within 1-20, got {}",
                self.resampler_chunk_ms
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranscoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_samples(), 4048);
        assert_eq!(config.max_frames_per_call, 8);
    }

    #[test]
    fn test_config_validation() {
        assert!(TranscoderConfig::new().with_buffer_size(1024).validate().is_err());
        assert!(TranscoderConfig::new().with_max_frames_per_call(0).validate().is_err());
        assert!(TranscoderConfig::new().with_resampler_chunk_ms(0).validate().is_err());
        assert!(TranscoderConfig::new()
            .with_buffer_size(16384)
            .with_max_frames_per_call(16)
            .with_resampler_quality(ResamplerQuality::High)
            .validate()
            .is_ok());
    }
}

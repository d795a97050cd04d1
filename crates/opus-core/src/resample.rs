//! Streaming single-channel sample rate conversion
//!
//! [`RateConverter`] wraps a rubato sinc resampler. Input of any length is
//! queued and fed to the resampler in fixed blocks, so filter state carries
//! across calls and the number of samples returned for a given input length
//! varies from call to call. Callers must accumulate output by count.

use crate::config::ResamplerQuality;
use crate::error::{CodecError, Result};
use crate::types::LinearRate;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, trace};

const PCM_SCALE: f32 = 32768.0;

/// Stateful resampler between two fixed rates
pub struct RateConverter {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    chunk_size: usize,
    /// Input samples not yet fed to the resampler
    pending: Vec<f32>,
}

impl RateConverter {
    /// Create a converter from `input_rate` to `output_rate` (Hz).
    ///
    /// Both rates must be one of the linear rates a translator exists for.
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        quality: ResamplerQuality,
        chunk_ms: u32,
    ) -> Result<Self> {
        if LinearRate::from_hz(input_rate).is_err() || LinearRate::from_hz(output_rate).is_err() {
            return Err(CodecError::UnsupportedRatePair {
                from: input_rate,
                to: output_rate,
            });
        }

        let chunk_size = (input_rate * chunk_ms / 1000).max(1) as usize;
        let ratio = f64::from(output_rate) / f64::from(input_rate);
        let params = SincInterpolationParameters {
            sinc_len: quality.sinc_len(),
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: quality.oversampling_factor(),
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1).map_err(|e| {
            CodecError::initialization_failed(format!(
                "rate converter {}Hz -> {}Hz: {}",
                input_rate, output_rate, e
            ))
        })?;

        debug!(
            "Created rate converter {}Hz -> {}Hz ({:?}, {} sample blocks)",
            input_rate, output_rate, quality, chunk_size
        );

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            chunk_size,
            pending: Vec::with_capacity(chunk_size * 2),
        })
    }

    /// Input rate in Hz
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Output rate in Hz
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Input samples queued but not yet converted
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Upper bound on the samples the next call to [`process_into`] can
    /// append for `input_len` new input samples.
    ///
    /// [`process_into`]: RateConverter::process_into
    pub fn max_output_len(&self, input_len: usize) -> usize {
        let blocks = (self.pending.len() + input_len) / self.chunk_size;
        let per_block =
            (self.chunk_size as f64 * f64::from(self.output_rate) / f64::from(self.input_rate)).ceil() as usize + 2;
        blocks * per_block
    }

    /// Convert `input`, appending the produced samples to `output`.
    ///
    /// Returns the number of samples appended.
    pub fn process_into(&mut self, input: &[i16], output: &mut Vec<i16>) -> Result<usize> {
        self.pending
            .extend(input.iter().map(|&s| f32::from(s) / PCM_SCALE));

        let before = output.len();
        let mut consumed = 0;
        while self.pending.len() - consumed >= self.resampler.input_frames_next() {
            let needed = self.resampler.input_frames_next();
            let block = [&self.pending[consumed..consumed + needed]];
            let converted = self
                .resampler
                .process(&block, None)
                .map_err(|e| CodecError::external("rubato", e))?;
            consumed += needed;

            if let Some(channel) = converted.first() {
                output.extend(
                    channel
                        .iter()
                        .map(|&s| (s * PCM_SCALE).round().clamp(-32768.0, 32767.0) as i16),
                );
            }
        }
        self.pending.drain(..consumed);

        let produced = output.len() - before;
        trace!(
            "Rate converter {}Hz -> {}Hz: {} in, {} out, {} pending",
            self.input_rate,
            self.output_rate,
            input.len(),
            produced,
            self.pending.len()
        );
        Ok(produced)
    }

    /// Convert `input` into a new vector
    pub fn process(&mut self, input: &[i16]) -> Result<Vec<i16>> {
        let mut output = Vec::with_capacity(self.max_output_len(input.len()));
        self.process_into(input, &mut output)?;
        Ok(output)
    }
}

impl std::fmt::Debug for RateConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateConverter")
            .field("input_rate", &self.input_rate)
            .field("output_rate", &self.output_rate)
            .field("chunk_size", &self.chunk_size)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(from: u32, to: u32) -> RateConverter {
        RateConverter::new(from, to, ResamplerQuality::Balanced, 10).unwrap()
    }

    #[test]
    fn test_rejects_unknown_rates() {
        let err = RateConverter::new(11025, 48000, ResamplerQuality::Balanced, 10).unwrap_err();
        assert_eq!(err, CodecError::UnsupportedRatePair { from: 11025, to: 48000 });
    }

    #[test]
    fn test_upsample_long_run_ratio() {
        let mut rc = converter(8000, 48000);
        let mut total = 0;
        // 1 second in 20ms frames
        for _ in 0..50 {
            total += rc.process(&[1000i16; 160]).unwrap().len();
        }
        // Everything but at most one block is converted
        assert!(total <= 48000);
        assert!(total >= 48000 - 480 - 6, "total {}", total);
    }

    #[test]
    fn test_downsample_long_run_ratio() {
        let mut rc = converter(48000, 16000);
        let mut total = 0;
        for _ in 0..50 {
            total += rc.process(&[0i16; 960]).unwrap().len();
        }
        assert!(total <= 16000 + 2);
        assert!(total >= 16000 - 160 - 2, "total {}", total);
    }

    #[test]
    fn test_small_inputs_are_queued() {
        let mut rc = converter(16000, 8000);
        // Block size is 160 samples at 16kHz
        let out = rc.process(&[0i16; 100]).unwrap();
        assert!(out.is_empty());
        assert_eq!(rc.pending_len(), 100);

        let out = rc.process(&[0i16; 100]).unwrap();
        assert!(!out.is_empty());
        assert_eq!(rc.pending_len(), 40);
    }

    #[test]
    fn test_max_output_len_bounds_output() {
        let mut rc = converter(44100, 48000);
        for len in [17usize, 441, 882, 1000, 3] {
            let bound = rc.max_output_len(len);
            let out = rc.process(&vec![500i16; len]).unwrap();
            assert!(out.len() <= bound, "{} > {}", out.len(), bound);
        }
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut rc = converter(8000, 16000);
        let out = rc.process(&[0i16; 800]).unwrap();
        assert!(out.iter().all(|&s| s == 0));
    }
}

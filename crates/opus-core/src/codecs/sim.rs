//! Simulated Opus backend
//!
//! A deterministic stand-in for libopus with the same frame contracts, so
//! the engine can be built and exercised without the native library.
//!
//! Packet layout:
//!
//! ```text
//! byte 0     TOC: rate code (bits 7-5) | duration code (bits 4-2) | silence (bit 1) | fec (bit 0)
//! byte 1     decimation stride (absent in silence packets)
//! byte 2..   μ-law codes of every stride-th sample
//! ```
//!
//! The stride is chosen so one μ-law byte per kept sample stays under the
//! bitrate ceiling; the decoder holds each kept sample across its stride.

use super::{ulaw, EncoderSettings, FrameDecoder, FrameEncoder, OpusBackend};
use crate::error::{CodecError, Result};
use crate::negotiation::MIN_BITRATE;
use crate::types::{FrameDuration, SampleRate};
use tracing::{debug, trace};

/// Highest bitrate the simulated codec spends
pub const SIM_MAX_BITRATE: u32 = 64_000;

/// Frames whose samples all stay below this magnitude count as silence
const SILENCE_THRESHOLD: i16 = 32;

const TOC_SILENCE: u8 = 0x02;
const TOC_FEC: u8 = 0x01;

/// Simulated codec factory
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedOpus;

impl OpusBackend for SimulatedOpus {
    fn name(&self) -> &'static str {
        "opus-sim"
    }

    fn create_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(SimEncoder::new(settings)?))
    }

    fn create_decoder(&self, sample_rate: SampleRate) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(SimDecoder::new(sample_rate)))
    }
}

fn rate_code(rate: SampleRate) -> u8 {
    SampleRate::ALL.iter().position(|r| *r == rate).unwrap_or(0) as u8
}

fn duration_code(duration: FrameDuration) -> u8 {
    FrameDuration::ALL.iter().position(|d| *d == duration).unwrap_or(0) as u8
}

/// Simulated compressor
#[derive(Debug)]
pub struct SimEncoder {
    settings: EncoderSettings,
    frame_size: usize,
    stride: usize,
}

impl SimEncoder {
    /// Create an encoder for `settings`
    pub fn new(settings: &EncoderSettings) -> Result<Self> {
        if settings.max_bitrate < MIN_BITRATE {
            return Err(CodecError::initialization_failed(format!(
                "bitrate ceiling {}bps below {}bps",
                settings.max_bitrate, MIN_BITRATE
            )));
        }

        let target = settings.max_bitrate.min(SIM_MAX_BITRATE);
        let raw_bitrate = settings.sample_rate.hz() * 8;
        let stride = raw_bitrate.div_ceil(target).clamp(1, 255) as usize;
        let frame_size = settings.frame_size();

        debug!(
            "Created simulated encoder: {}, {} samples/frame, stride {}, dtx={} cbr={}",
            settings.sample_rate, frame_size, stride, settings.dtx, settings.cbr
        );

        Ok(Self {
            settings: *settings,
            frame_size,
            stride,
        })
    }

    /// Bytes of a full (non-silence) packet
    pub fn packet_size(&self) -> usize {
        2 + self.frame_size.div_ceil(self.stride)
    }

    fn toc(&self, silence: bool) -> u8 {
        let mut toc = (rate_code(self.settings.sample_rate) << 5)
            | (duration_code(self.settings.frame_duration) << 2);
        if silence {
            toc |= TOC_SILENCE;
        }
        if self.settings.fec {
            toc |= TOC_FEC;
        }
        toc
    }
}

impl FrameEncoder for SimEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        if pcm.len() != self.frame_size {
            return Err(CodecError::InvalidFrameSize {
                expected: self.frame_size,
                actual: pcm.len(),
            });
        }

        let silent = pcm.iter().all(|s| s.unsigned_abs() < SILENCE_THRESHOLD as u16);
        if self.settings.dtx && !self.settings.cbr && silent {
            let Some(first) = out.first_mut() else {
                return Err(CodecError::encoding_failed("no room for silence packet"));
            };
            *first = self.toc(true);
            trace!("Simulated encoder emitted DTX silence packet");
            return Ok(1);
        }

        let needed = self.packet_size();
        if out.len() < needed {
            return Err(CodecError::encoding_failed(format!(
                "output buffer holds {} bytes, packet needs {}",
                out.len(),
                needed
            )));
        }

        out[0] = self.toc(false);
        out[1] = self.stride as u8;
        for (slot, sample) in out[2..needed].iter_mut().zip(pcm.iter().step_by(self.stride)) {
            *slot = ulaw::compress(*sample);
        }
        Ok(needed)
    }
}

/// Simulated decompressor
#[derive(Debug)]
pub struct SimDecoder {
    sample_rate: SampleRate,
    /// Last frame handed out, replayed attenuated on loss
    last_frame: Vec<i16>,
}

impl SimDecoder {
    /// Create a decoder running at `sample_rate`
    pub fn new(sample_rate: SampleRate) -> Self {
        debug!("Created simulated decoder: {}", sample_rate);
        Self {
            sample_rate,
            last_frame: Vec::new(),
        }
    }

    fn conceal(&mut self, out: &mut [i16]) -> usize {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.last_frame.get(i).map_or(0, |s| s / 2);
        }
        self.last_frame.clear();
        self.last_frame.extend_from_slice(out);
        trace!("Simulated decoder concealed {} samples", out.len());
        out.len()
    }
}

impl FrameDecoder for SimDecoder {
    fn decode(&mut self, payload: &[u8], out: &mut [i16], conceal: bool) -> Result<usize> {
        let Some(&toc) = payload.first() else {
            if conceal {
                return Ok(self.conceal(out));
            }
            return Err(CodecError::decoding_failed("empty payload"));
        };

        let rate = SampleRate::ALL
            .get(usize::from(toc >> 5))
            .copied()
            .ok_or_else(|| CodecError::decoding_failed(format!("invalid rate code in TOC {:#04x}", toc)))?;
        if rate != self.sample_rate {
            return Err(CodecError::decoding_failed(format!(
                "packet coded at {}, decoder runs at {}",
                rate, self.sample_rate
            )));
        }
        let duration = FrameDuration::ALL
            .get(usize::from((toc >> 2) & 0x07))
            .copied()
            .ok_or_else(|| CodecError::decoding_failed(format!("invalid duration code in TOC {:#04x}", toc)))?;

        let samples = rate.frame_size(duration);
        if samples > out.len() {
            return Err(CodecError::InvalidFrameSize {
                expected: out.len(),
                actual: samples,
            });
        }
        let out = &mut out[..samples];

        if toc & TOC_SILENCE != 0 {
            if payload.len() != 1 {
                return Err(CodecError::decoding_failed("silence packet carries data"));
            }
            out.fill(0);
        } else {
            let stride = usize::from(*payload.get(1).unwrap_or(&0));
            if stride == 0 || payload.len() != 2 + samples.div_ceil(stride) {
                return Err(CodecError::decoding_failed(format!(
                    "corrupt payload: {} bytes for {} samples at stride {}",
                    payload.len(),
                    samples,
                    stride
                )));
            }
            let codes = &payload[2..];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = ulaw::expand(codes[i / stride]);
            }
        }

        self.last_frame.clear();
        self.last_frame.extend_from_slice(out);
        Ok(samples)
    }
}

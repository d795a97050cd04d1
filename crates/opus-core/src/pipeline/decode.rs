//! Decode pipeline: compressed frames in, signed linear out
//!
//! One output frame per input frame at most. The working rate is taken from
//! the first compressed frame's format tag.

use super::PipelineState;
use crate::codecs::{FrameDecoder, OpusBackend};
use crate::config::TranscoderConfig;
use crate::error::{CodecError, Result};
use crate::negotiation::CapabilityDescriptor;
use crate::resample::RateConverter;
use crate::types::{Format, Frame, LinearRate, SampleRate};
use crate::utils::validation::validate_encoded_data;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Live handles of a configured decode pipeline.
///
/// Field order is drop order: the decompressor goes before the converter.
struct DecodeHandles {
    decoder: Box<dyn FrameDecoder>,
    converter: Option<RateConverter>,
    working_rate: SampleRate,
    frame_size: usize,
    /// Scratch the decompressor writes one frame into
    scratch: Vec<i16>,
    /// Decoded samples waiting for `produce`
    pending: Vec<i16>,
    timestamp: Option<u64>,
    seqno: Option<u32>,
}

/// Compressed to linear pipeline for one call leg
pub struct DecodePipeline {
    config: TranscoderConfig,
    backend: Arc<dyn OpusBackend>,
    target: LinearRate,
    state: PipelineState<DecodeHandles>,
}

impl DecodePipeline {
    /// Create an unconfigured pipeline producing linear output at `target`
    pub fn new(config: TranscoderConfig, backend: Arc<dyn OpusBackend>, target: LinearRate) -> Self {
        Self {
            config,
            backend,
            target,
            state: PipelineState::Uninitialized,
        }
    }

    /// Linear rate this pipeline produces
    pub fn target_rate(&self) -> LinearRate {
        self.target
    }

    /// Rate the decompressor runs at, once configured
    pub fn working_rate(&self) -> Option<SampleRate> {
        match &self.state {
            PipelineState::Ready(handles) => Some(handles.working_rate),
            _ => None,
        }
    }

    /// Samples requested from the decompressor per call, once configured
    pub fn frame_size(&self) -> Option<usize> {
        match &self.state {
            PipelineState::Ready(handles) => Some(handles.frame_size),
            _ => None,
        }
    }

    /// Check if the decompressor has been created
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Check if configuration failed and the pipeline awaits teardown
    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    /// Whether a rate converter sits behind the decompressor
    pub fn has_converter(&self) -> bool {
        matches!(&self.state, PipelineState::Ready(h) if h.converter.is_some())
    }

    /// Decode one compressed frame.
    ///
    /// An empty payload yields a concealment frame. A decompressor error
    /// drops this frame but leaves the pipeline usable.
    pub fn submit(&mut self, frame: &Frame) -> Result<()> {
        let attrs = match &frame.format {
            Format::Opus(attrs) => *attrs,
            other => {
                return Err(CodecError::invalid_format(format!(
                    "decoder to slin {} got {:?}",
                    self.target,
                    other.kind()
                )))
            }
        };
        validate_encoded_data(&frame.data)?;

        let (config, backend, target) = (&self.config, &self.backend, self.target);
        let handles = self
            .state
            .ensure_ready(|| configure(config, backend.as_ref(), &attrs, target))?;

        let conceal = frame.data.is_empty();
        match handles.decoder.decode(&frame.data, &mut handles.scratch, conceal) {
            Ok(samples) => {
                handles.pending.clear();
                handles.pending.extend_from_slice(&handles.scratch[..samples]);
                handles.timestamp = frame.timestamp;
                handles.seqno = frame.seqno;
                trace!(
                    "Decoded {} bytes into {} samples{}",
                    frame.datalen(),
                    samples,
                    if conceal { " (concealed)" } else { "" }
                );
                Ok(())
            }
            Err(e) => {
                warn!("Decoder failed on {} byte payload: {}", frame.datalen(), e);
                handles.pending.clear();
                Err(match e {
                    CodecError::DecodingFailed { .. } => e,
                    other => CodecError::decoding_failed(other.to_string()),
                })
            }
        }
    }

    /// Return the last decoded frame as linear audio at the target rate.
    ///
    /// `None` when nothing is pending or the converter is still filling.
    pub fn produce(&mut self) -> Result<Option<Frame>> {
        let target = self.target;
        let Some(handles) = self.state.ready() else {
            return Ok(None);
        };

        let pending = std::mem::take(&mut handles.pending);
        let pcm = match handles.converter.as_mut() {
            Some(converter) => converter.process(&pending)?,
            None => pending,
        };
        if pcm.is_empty() {
            return Ok(None);
        }

        let mut frame = Frame::linear(target, &pcm);
        frame.timestamp = handles.timestamp.take();
        frame.seqno = handles.seqno.take();
        Ok(Some(frame))
    }

    /// Release the decompressor and then the rate converter. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(handles) = self.state.take() {
            debug!(
                "Tearing down decode pipeline opus {} -> slin {}",
                handles.working_rate, self.target
            );
            let DecodeHandles {
                decoder, converter, ..
            } = handles;
            drop(decoder);
            drop(converter);
        }
    }
}

fn configure(
    config: &TranscoderConfig,
    backend: &dyn OpusBackend,
    attrs: &CapabilityDescriptor,
    target: LinearRate,
) -> Result<DecodeHandles> {
    let working_rate = attrs
        .sample_rates()
        .highest()
        .ok_or_else(|| CodecError::invalid_format("compressed frame advertises no sample rate"))?;
    let frame_size = working_rate.frame_size(attrs.frame_duration());

    let converter = if working_rate.hz() != target.hz() {
        Some(RateConverter::new(
            working_rate.hz(),
            target.hz(),
            config.resampler_quality,
            config.resampler_chunk_ms,
        )?)
    } else {
        None
    };

    let decoder = backend.create_decoder(working_rate)?;

    debug!(
        "Configured decode pipeline opus {} -> slin {} via {}: {} samples/frame, converter={}",
        working_rate,
        target,
        backend.name(),
        frame_size,
        converter.is_some()
    );

    Ok(DecodeHandles {
        decoder,
        converter,
        working_rate,
        frame_size,
        scratch: vec![0i16; frame_size],
        pending: Vec::with_capacity(frame_size),
        timestamp: None,
        seqno: None,
    })
}

impl std::fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("target", &self.target)
            .field("working_rate", &self.working_rate())
            .field("backend", &self.backend.name())
            .field("ready", &self.state.is_ready())
            .field("failed", &self.state.is_failed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::{EncoderSettings, OpusBackend, SimulatedOpus};
    use crate::types::{FrameDuration, RateSet};
    use bytes::Bytes;

    fn pipeline(target: LinearRate) -> DecodePipeline {
        DecodePipeline::new(TranscoderConfig::default(), Arc::new(SimulatedOpus), target)
    }

    fn packet(rate: SampleRate, pcm: &[i16]) -> Frame {
        let mut encoder = SimulatedOpus
            .create_encoder(&EncoderSettings::new(rate))
            .unwrap();
        let mut out = vec![0u8; 4000];
        let len = encoder.encode(pcm, &mut out).unwrap();
        out.truncate(len);
        Frame::opus(
            CapabilityDescriptor::with_rate(rate),
            pcm.len(),
            Bytes::from(out),
        )
    }

    #[test]
    fn test_decode_without_conversion() {
        let mut dec = pipeline(LinearRate::Rate8000);
        dec.submit(&packet(SampleRate::Rate8000, &[1000i16; 160]).with_seqno(9))
            .unwrap();
        assert!(!dec.has_converter());
        assert_eq!(dec.frame_size(), Some(160));

        let frame = dec.produce().unwrap().unwrap();
        assert_eq!(frame.samples, 160);
        assert_eq!(frame.format, Format::Linear(LinearRate::Rate8000));
        assert_eq!(frame.seqno, Some(9));
        assert!(dec.produce().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_then_good_payload() {
        let mut dec = pipeline(LinearRate::Rate48000);
        let corrupt = Frame::opus(
            CapabilityDescriptor::with_rate(SampleRate::Rate48000),
            960,
            Bytes::from_static(&[0xff, 0x01, 0x02]),
        );
        let err = dec.submit(&corrupt).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
        assert!(dec.produce().unwrap().is_none());

        dec.submit(&packet(SampleRate::Rate48000, &[0i16; 960])).unwrap();
        assert_eq!(dec.produce().unwrap().unwrap().samples, 960);
    }

    #[test]
    fn test_empty_payload_conceals() {
        let mut dec = pipeline(LinearRate::Rate16000);
        let lost = Frame::opus(
            CapabilityDescriptor::with_rate(SampleRate::Rate16000),
            0,
            Bytes::new(),
        );
        dec.submit(&lost).unwrap();
        assert_eq!(dec.produce().unwrap().unwrap().samples, 320);
    }

    #[test]
    fn test_frame_duration_from_tag() {
        let mut dec = pipeline(LinearRate::Rate24000);
        let tag = CapabilityDescriptor::new(RateSet::single(SampleRate::Rate24000))
            .with_frame_duration(FrameDuration::Ms40);
        dec.submit(&Frame::opus(tag, 0, Bytes::new())).unwrap();
        assert_eq!(dec.frame_size(), Some(960));
    }

    #[test]
    fn test_linear_input_rejected() {
        let mut dec = pipeline(LinearRate::Rate8000);
        let err = dec
            .submit(&Frame::linear(LinearRate::Rate8000, &[0i16; 160]))
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat { .. }));
        assert!(!dec.is_ready());
    }

    #[test]
    fn test_resampled_output() {
        let mut dec = pipeline(LinearRate::Rate32000);
        let mut total = 0;
        for _ in 0..10 {
            dec.submit(&packet(SampleRate::Rate48000, &[0i16; 960])).unwrap();
            if let Some(frame) = dec.produce().unwrap() {
                total += frame.samples;
            }
        }
        assert!(dec.has_converter());
        assert!(total <= 6400 + 4);
        assert!(total >= 6400 - 640, "total {}", total);
        dec.teardown();
        assert!(dec.working_rate().is_none());
    }
}

//! Encode pipeline: signed linear in, compressed frames out
//!
//! Linear samples (resampled to the working rate when needed) accumulate in
//! a buffer that is compressed in whole-frame strides. Unconsumed samples are
//! moved to the start of the buffer after every call, so irregular input
//! sizes never misplace the next append.

use super::PipelineState;
use crate::codecs::{EncoderSettings, FrameEncoder, OpusBackend, MAX_PACKET_SIZE};
use crate::config::TranscoderConfig;
use crate::error::{CodecError, Result};
use crate::negotiation::{CapabilityDescriptor, JointDescriptor};
use crate::resample::RateConverter;
use crate::types::{Format, Frame, LinearRate, RateSet, SampleRate};
use crate::utils::validation::{validate_buffer_fit, validate_linear_payload};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Live handles of a configured encode pipeline.
///
/// Field order is drop order: the compressor goes before the converter.
struct EncodeHandles {
    encoder: Box<dyn FrameEncoder>,
    converter: Option<RateConverter>,
    working_rate: SampleRate,
    frame_size: usize,
    /// Format tag stamped on every output frame
    output_attrs: CapabilityDescriptor,
    /// Linear samples at the working rate waiting to be compressed
    accum: Vec<i16>,
    /// Compressed bytes of the frames completed since the last `produce`
    outbuf: Vec<u8>,
    /// Bytes of `outbuf` in use
    out_used: usize,
    /// (offset, length) of each completed frame inside `outbuf`
    completed: Vec<(usize, usize)>,
}

/// Linear to compressed pipeline for one call leg
pub struct EncodePipeline {
    config: TranscoderConfig,
    backend: Arc<dyn OpusBackend>,
    joint: Option<JointDescriptor>,
    source: LinearRate,
    state: PipelineState<EncodeHandles>,
}

impl EncodePipeline {
    /// Create an unconfigured pipeline taking linear input at `source`.
    ///
    /// With a joint descriptor the compressor runs at its working rate and
    /// attributes; without one it runs at the codec rate closest to `source`.
    pub fn new(
        config: TranscoderConfig,
        backend: Arc<dyn OpusBackend>,
        joint: Option<JointDescriptor>,
        source: LinearRate,
    ) -> Self {
        Self {
            config,
            backend,
            joint,
            source,
            state: PipelineState::Uninitialized,
        }
    }

    /// Linear rate this pipeline accepts
    pub fn source_rate(&self) -> LinearRate {
        self.source
    }

    /// Rate the compressor runs (or will run) at
    pub fn working_rate(&self) -> SampleRate {
        working_rate_for(self.joint.as_ref(), self.source)
    }

    /// Check if the compressor has been created
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Check if configuration failed and the pipeline awaits teardown
    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    /// Samples per compressed frame, once configured
    pub fn frame_size(&self) -> Option<usize> {
        match &self.state {
            PipelineState::Ready(handles) => Some(handles.frame_size),
            _ => None,
        }
    }

    /// Linear samples held for the next call
    pub fn buffered_samples(&self) -> usize {
        match &self.state {
            PipelineState::Ready(handles) => handles.accum.len(),
            _ => 0,
        }
    }

    /// Whether a rate converter sits in front of the compressor
    pub fn has_converter(&self) -> bool {
        matches!(&self.state, PipelineState::Ready(h) if h.converter.is_some())
    }

    /// Accept one linear frame.
    ///
    /// Compresses every whole frame now buffered. Fails without touching
    /// pipeline state on empty or mismatched input.
    pub fn submit(&mut self, frame: &Frame) -> Result<()> {
        validate_linear_payload(&frame.data)?;
        if frame.samples == 0 {
            return Err(CodecError::EmptyFrame);
        }
        match frame.format {
            Format::Linear(rate) if rate == self.source => {}
            ref other => {
                return Err(CodecError::invalid_format(format!(
                    "encoder for slin {} got {:?}",
                    self.source,
                    other.kind()
                )))
            }
        }

        let pcm = frame.linear_samples()?;
        let capacity = self.config.buffer_samples();
        let max_frames = self.config.max_frames_per_call;

        let (config, backend, joint, source) =
            (&self.config, &self.backend, self.joint.as_ref(), self.source);
        let handles = self
            .state
            .ensure_ready(|| configure(config, backend.as_ref(), joint, source))?;

        let incoming = match &handles.converter {
            Some(converter) => converter.max_output_len(pcm.len()),
            None => pcm.len(),
        };
        if let Err(e) = validate_buffer_fit(handles.accum.len(), incoming, capacity) {
            warn!("Encode pipeline out of buffer space: {}", e);
            return Err(e);
        }

        match handles.converter.as_mut() {
            Some(converter) => {
                converter.process_into(&pcm, &mut handles.accum)?;
            }
            None => handles.accum.extend_from_slice(&pcm),
        }

        handles.encode_buffered(max_frames);
        Ok(())
    }

    /// Hand out the frames completed since the last call, oldest first.
    ///
    /// Returns an empty list when nothing completed.
    pub fn produce(&mut self) -> Vec<Frame> {
        let Some(handles) = self.state.ready() else {
            return Vec::new();
        };

        let frames: Vec<Frame> = handles
            .completed
            .drain(..)
            .map(|(offset, len)| {
                Frame::opus(
                    handles.output_attrs,
                    handles.frame_size,
                    Bytes::copy_from_slice(&handles.outbuf[offset..offset + len]),
                )
            })
            .collect();
        handles.out_used = 0;

        if !frames.is_empty() {
            trace!(
                "Encode pipeline produced {} frames at {}",
                frames.len(),
                handles.working_rate
            );
        }
        frames
    }

    /// Release the compressor and then the rate converter. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(handles) = self.state.take() {
            debug!(
                "Tearing down encode pipeline {} -> opus {}",
                self.source, handles.working_rate
            );
            let EncodeHandles {
                encoder, converter, ..
            } = handles;
            drop(encoder);
            drop(converter);
        }
    }
}

/// Without a joint descriptor, linear rates that are not codec rates (32, 44.1
/// and 96 kHz) run at the next codec rate up rather than at the input rate.
fn working_rate_for(joint: Option<&JointDescriptor>, source: LinearRate) -> SampleRate {
    match joint {
        Some(joint) => joint.working_rate(),
        None => SampleRate::for_linear(source),
    }
}

fn configure(
    config: &TranscoderConfig,
    backend: &dyn OpusBackend,
    joint: Option<&JointDescriptor>,
    source: LinearRate,
) -> Result<EncodeHandles> {
    let working_rate = working_rate_for(joint, source);
    let (settings, output_attrs) = match joint {
        Some(joint) => (
            EncoderSettings::from_attributes(working_rate, joint.descriptor()),
            joint.output_attributes(),
        ),
        None => {
            let settings = EncoderSettings {
                frame_duration: config.default_frame_duration,
                ..EncoderSettings::new(working_rate)
            };
            let attrs = CapabilityDescriptor::new(RateSet::single(working_rate))
                .with_frame_duration(settings.frame_duration);
            (settings, attrs)
        }
    };

    let converter = if working_rate.hz() != source.hz() {
        Some(RateConverter::new(
            source.hz(),
            working_rate.hz(),
            config.resampler_quality,
            config.resampler_chunk_ms,
        )?)
    } else {
        None
    };

    let encoder = backend.create_encoder(&settings)?;
    let frame_size = settings.frame_size();

    debug!(
        "Configured encode pipeline {} -> opus {} via {}: {} samples/frame, converter={}",
        source,
        working_rate,
        backend.name(),
        frame_size,
        converter.is_some()
    );

    Ok(EncodeHandles {
        encoder,
        converter,
        working_rate,
        frame_size,
        output_attrs,
        accum: Vec::with_capacity(config.buffer_samples()),
        outbuf: vec![0u8; config.buffer_size],
        out_used: 0,
        completed: Vec::with_capacity(config.max_frames_per_call),
    })
}

impl EncodeHandles {
    /// Compress whole frames from the front of the accumulation buffer
    fn encode_buffered(&mut self, max_frames: usize) {
        let mut consumed = 0;
        let mut dropped = 0;

        while self.accum.len() - consumed >= self.frame_size {
            let offset = self.out_used;
            let room = (self.outbuf.len() - offset).min(MAX_PACKET_SIZE);
            let pcm = &self.accum[consumed..consumed + self.frame_size];

            let written = match self.encoder.encode(pcm, &mut self.outbuf[offset..offset + room]) {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    debug!("Encoder produced no output; keeping samples buffered");
                    break;
                }
                Err(e) => {
                    warn!("Encoder failed: {}; keeping samples buffered", e);
                    break;
                }
            };
            consumed += self.frame_size;

            if self.completed.len() < max_frames {
                self.completed.push((offset, written));
                self.out_used += written;
                trace!("Encoded frame of {} bytes at offset {}", written, offset);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            debug!(
                "Completed-frame list full ({}); dropped {} frames this call",
                max_frames, dropped
            );
        }

        // Leftover samples move to the front for the next append
        self.accum.drain(..consumed);
    }
}

impl std::fmt::Debug for EncodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodePipeline")
            .field("source", &self.source)
            .field("working_rate", &self.working_rate())
            .field("backend", &self.backend.name())
            .field("ready", &self.state.is_ready())
            .field("failed", &self.state.is_failed())
            .field("buffered_samples", &self.buffered_samples())
            .finish()
    }
}

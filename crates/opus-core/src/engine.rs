//! Transcoder façade and translator registry
//!
//! The host builds one [`TranslatorRegistry`] at startup. It advertises a
//! [`TranslatorRecord`] per supported format pair and creates a
//! [`Transcoder`] for each call leg that needs one.

use crate::codecs::{default_backend, OpusBackend};
use crate::config::TranscoderConfig;
use crate::error::{CodecError, Result};
use crate::negotiation::JointDescriptor;
use crate::pipeline::{DecodePipeline, EncodePipeline};
use crate::types::{Frame, FormatKind, LinearRate};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Translation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Signed linear to compressed
    Encode,
    /// Compressed to signed linear
    Decode,
}

/// Registration metadata for one supported format pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorRecord {
    /// Name, e.g. `slin 16khz -> opus`
    pub name: String,
    /// Source format
    pub src: FormatKind,
    /// Destination format
    pub dst: FormatKind,
    /// Per-call scratch buffer size in bytes
    pub buffer_size: usize,
    /// Maximum samples produced per call
    pub buffer_samples: usize,
}

impl TranslatorRecord {
    fn new(src: FormatKind, dst: FormatKind, config: &TranscoderConfig) -> Self {
        Self {
            name: format!("{} -> {}", src, dst),
            src,
            dst,
            buffer_size: config.buffer_size,
            buffer_samples: config.buffer_samples(),
        }
    }

    /// Direction of this translator
    pub fn direction(&self) -> Direction {
        match self.dst {
            FormatKind::Opus => Direction::Encode,
            FormatKind::Linear(_) => Direction::Decode,
        }
    }

    /// The linear side of the pair
    pub fn linear_rate(&self) -> Option<LinearRate> {
        match (self.src, self.dst) {
            (FormatKind::Linear(rate), _) | (_, FormatKind::Linear(rate)) => Some(rate),
            _ => None,
        }
    }
}

impl fmt::Display for TranslatorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Table of supported translators; the explicit replacement for a
/// process-wide codec table
pub struct TranslatorRegistry {
    config: TranscoderConfig,
    backend: Arc<dyn OpusBackend>,
    records: Vec<TranslatorRecord>,
    by_name: HashMap<String, usize>,
}

impl TranslatorRegistry {
    /// Create a registry using the default backend
    pub fn new(config: TranscoderConfig) -> Result<Self> {
        Self::with_backend(config, default_backend())
    }

    /// Create a registry whose transcoders use `backend`
    pub fn with_backend(config: TranscoderConfig, backend: Arc<dyn OpusBackend>) -> Result<Self> {
        config.validate()?;

        let mut records = Vec::with_capacity(LinearRate::ALL.len() * 2);
        for rate in LinearRate::ALL {
            records.push(TranslatorRecord::new(
                FormatKind::Linear(rate),
                FormatKind::Opus,
                &config,
            ));
            records.push(TranslatorRecord::new(
                FormatKind::Opus,
                FormatKind::Linear(rate),
                &config,
            ));
        }
        let by_name = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.name.clone(), i))
            .collect();

        info!(
            "Registered {} opus translators using {} backend",
            records.len(),
            backend.name()
        );

        Ok(Self {
            config,
            backend,
            records,
            by_name,
        })
    }

    /// Every registered translator
    pub fn records(&self) -> &[TranslatorRecord] {
        &self.records
    }

    /// Look up a translator by name
    pub fn get(&self, name: &str) -> Option<&TranslatorRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// Look up the translator for a format pair
    pub fn find(&self, src: FormatKind, dst: FormatKind) -> Option<&TranslatorRecord> {
        self.records.iter().find(|r| r.src == src && r.dst == dst)
    }

    /// Configuration handed to every transcoder
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Name of the active codec backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of registered translators
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create a transcoder for `src -> dst`.
    ///
    /// `joint` carries the negotiated parameters; encoders without one run
    /// at the codec rate closest to the linear rate. Decoders take their
    /// parameters from the frames they receive.
    pub fn create(
        &self,
        src: FormatKind,
        dst: FormatKind,
        joint: Option<JointDescriptor>,
    ) -> Result<Transcoder> {
        let record = self
            .find(src, dst)
            .cloned()
            .ok_or_else(|| CodecError::TranslatorNotFound {
                name: format!("{} -> {}", src, dst),
            })?;

        let inner = match (record.src, record.dst) {
            (FormatKind::Linear(rate), FormatKind::Opus) => Pipeline::Encode(EncodePipeline::new(
                self.config.clone(),
                Arc::clone(&self.backend),
                joint,
                rate,
            )),
            (FormatKind::Opus, FormatKind::Linear(rate)) => Pipeline::Decode(DecodePipeline::new(
                self.config.clone(),
                Arc::clone(&self.backend),
                rate,
            )),
            _ => {
                return Err(CodecError::internal_error(format!(
                    "registered translator {} has no pipeline",
                    record.name
                )))
            }
        };

        debug!("Created transcoder {}", record.name);
        Ok(Transcoder { record, inner })
    }

    /// Create the encode and decode transcoders for a call leg whose linear
    /// side runs at `rate`
    pub fn create_pair(&self, rate: LinearRate, joint: Option<JointDescriptor>) -> Result<TranscoderPair> {
        Ok(TranscoderPair {
            encoder: self.create(FormatKind::Linear(rate), FormatKind::Opus, joint)?,
            decoder: self.create(FormatKind::Opus, FormatKind::Linear(rate), joint)?,
        })
    }
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("records", &self.records.len())
            .finish()
    }
}

#[derive(Debug)]
enum Pipeline {
    Encode(EncodePipeline),
    Decode(DecodePipeline),
}

/// One translator instance, exclusively owned by a call leg
#[derive(Debug)]
pub struct Transcoder {
    record: TranslatorRecord,
    inner: Pipeline,
}

impl Transcoder {
    /// Registration record this instance was created from
    pub fn record(&self) -> &TranslatorRecord {
        &self.record
    }

    /// Translation direction
    pub fn direction(&self) -> Direction {
        self.record.direction()
    }

    /// Feed one input frame
    pub fn submit(&mut self, frame: &Frame) -> Result<()> {
        let kind = frame.format.kind();
        if kind != self.record.src {
            return Err(CodecError::invalid_format(format!(
                "{} cannot accept {}",
                self.record.name, kind
            )));
        }

        match &mut self.inner {
            Pipeline::Encode(pipeline) => pipeline.submit(frame),
            Pipeline::Decode(pipeline) => pipeline.submit(frame),
        }
    }

    /// Collect the output of the frames submitted since the last call
    pub fn produce(&mut self) -> Result<Vec<Frame>> {
        match &mut self.inner {
            Pipeline::Encode(pipeline) => Ok(pipeline.produce()),
            Pipeline::Decode(pipeline) => Ok(pipeline.produce()?.into_iter().collect()),
        }
    }

    /// Release codec and converter state. Idempotent; the transcoder
    /// reconfigures from the next submitted frame.
    pub fn teardown(&mut self) {
        match &mut self.inner {
            Pipeline::Encode(pipeline) => pipeline.teardown(),
            Pipeline::Decode(pipeline) => pipeline.teardown(),
        }
    }

    /// The encode pipeline, for encode transcoders
    pub fn as_encoder(&self) -> Option<&EncodePipeline> {
        match &self.inner {
            Pipeline::Encode(pipeline) => Some(pipeline),
            Pipeline::Decode(_) => None,
        }
    }

    /// The decode pipeline, for decode transcoders
    pub fn as_decoder(&self) -> Option<&DecodePipeline> {
        match &self.inner {
            Pipeline::Decode(pipeline) => Some(pipeline),
            Pipeline::Encode(_) => None,
        }
    }
}

impl Drop for Transcoder {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Encode and decode transcoders for one call leg
#[derive(Debug)]
pub struct TranscoderPair {
    /// Linear to compressed
    pub encoder: Transcoder,
    /// Compressed to linear
    pub decoder: Transcoder,
}

impl TranscoderPair {
    /// Transcoder for `direction`
    pub fn get_mut(&mut self, direction: Direction) -> &mut Transcoder {
        match direction {
            Direction::Encode => &mut self.encoder,
            Direction::Decode => &mut self.decoder,
        }
    }

    /// Tear down both directions
    pub fn teardown(&mut self) {
        self.encoder.teardown();
        self.decoder.teardown();
    }
}

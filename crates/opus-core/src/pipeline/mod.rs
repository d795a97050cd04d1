//! Encode and decode pipelines
//!
//! Each pipeline is owned by one call leg. It starts unconfigured and builds
//! its codec handles from the first frame it sees.

pub mod decode;
pub mod encode;

pub use decode::DecodePipeline;
pub use encode::EncodePipeline;

use crate::error::{CodecError, Result};

/// Lifecycle of a pipeline's codec handles
#[derive(Debug)]
pub(crate) enum PipelineState<H> {
    /// Not configured yet, or torn down
    Uninitialized,
    /// Configured; holds the live handles
    Ready(H),
    /// Configuration failed; every call fails until teardown
    Failed {
        /// Why configuration failed
        reason: String,
    },
}

impl<H> Default for PipelineState<H> {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl<H> PipelineState<H> {
    /// Return the live handles, running `configure` first if needed.
    ///
    /// A configuration error moves the state to `Failed`.
    pub(crate) fn ensure_ready(
        &mut self,
        configure: impl FnOnce() -> Result<H>,
    ) -> Result<&mut H> {
        if let Self::Failed { reason } = self {
            return Err(CodecError::PipelineUnusable {
                reason: reason.clone(),
            });
        }

        if matches!(self, Self::Uninitialized) {
            match configure() {
                Ok(handles) => *self = Self::Ready(handles),
                Err(e) => {
                    let err = match e {
                        CodecError::InitializationFailed { .. } => e,
                        other => CodecError::initialization_failed(other.to_string()),
                    };
                    *self = Self::Failed {
                        reason: err.to_string(),
                    };
                    return Err(err);
                }
            }
        }

        match self {
            Self::Ready(handles) => Ok(handles),
            _ => Err(CodecError::internal_error("pipeline not ready after configuration")),
        }
    }

    /// Live handles, if configured
    pub(crate) fn ready(&mut self) -> Option<&mut H> {
        match self {
            Self::Ready(handles) => Some(handles),
            _ => None,
        }
    }

    /// Check if the handles are live
    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Check if configuration failed
    pub(crate) fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Return to `Uninitialized`, handing back any live handles to drop
    pub(crate) fn take(&mut self) -> Option<H> {
        match std::mem::take(self) {
            Self::Ready(handles) => Some(handles),
            _ => None,
        }
    }
}

//! Input validation utilities for pipeline operations

use crate::codecs::MAX_PACKET_SIZE;
use crate::error::{CodecError, Result};

/// Validate a signed linear payload: non-empty and a whole number of samples
pub fn validate_linear_payload(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(CodecError::EmptyFrame);
    }

    if data.len() % 2 != 0 {
        return Err(CodecError::invalid_format(format!(
            "Linear payload of {} bytes is not a whole number of samples",
            data.len()
        )));
    }

    Ok(())
}

/// Validate a compressed payload. Empty payloads are allowed (they request
/// concealment).
pub fn validate_encoded_data(data: &[u8]) -> Result<()> {
    if data.len() > MAX_PACKET_SIZE {
        return Err(CodecError::invalid_format(format!(
            "Encoded data too large: {} bytes",
            data.len()
        )));
    }

    Ok(())
}

/// Validate that `incoming` more samples fit next to `held` in a buffer of
/// `capacity` samples
pub fn validate_buffer_fit(held: usize, incoming: usize, capacity: usize) -> Result<()> {
    let size = held.saturating_add(incoming);
    if size > capacity {
        return Err(CodecError::BufferOverflow { size, capacity });
    }

    Ok(())
}

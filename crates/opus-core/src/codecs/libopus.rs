//! libopus backend
//!
//! Thin wrapper over the `opus` crate bindings. Only built with the `opus`
//! feature since it links the native library.

use super::{EncoderSettings, FrameDecoder, FrameEncoder, OpusBackend};
use crate::error::{CodecError, Result};
use crate::types::{CodingMode, SampleRate};
use tracing::{debug, warn};

/// Backend creating libopus encoders and decoders
#[derive(Debug, Clone, Copy, Default)]
pub struct LibOpus;

impl OpusBackend for LibOpus {
    fn name(&self) -> &'static str {
        "libopus"
    }

    fn create_encoder(&self, settings: &EncoderSettings) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(LibOpusEncoder::new(settings)?))
    }

    fn create_decoder(&self, sample_rate: SampleRate) -> Result<Box<dyn FrameDecoder>> {
        Ok(Box::new(LibOpusDecoder::new(sample_rate)?))
    }
}

fn init_error(e: opus::Error) -> CodecError {
    CodecError::initialization_failed(format!("libopus: {}", e))
}

/// libopus compressor
pub struct LibOpusEncoder {
    encoder: opus::Encoder,
}

impl LibOpusEncoder {
    /// Create and parameterise an encoder
    pub fn new(settings: &EncoderSettings) -> Result<Self> {
        let application = match settings.mode {
            CodingMode::Voice => opus::Application::Voip,
            CodingMode::Audio => opus::Application::Audio,
        };

        let mut encoder = opus::Encoder::new(
            settings.sample_rate.hz(),
            opus::Channels::Mono,
            application,
        )
        .map_err(init_error)?;

        let bitrate = i32::try_from(settings.max_bitrate).unwrap_or(i32::MAX);
        encoder
            .set_bitrate(opus::Bitrate::Bits(bitrate))
            .map_err(init_error)?;
        encoder.set_vbr(!settings.cbr).map_err(init_error)?;
        encoder.set_inband_fec(settings.fec).map_err(init_error)?;
        if settings.dtx {
            // The safe bindings expose no DTX control
            warn!("libopus backend ignores dtx=1");
        }

        debug!(
            "Created libopus encoder: {}, {:?}, {}bps, cbr={} fec={}",
            settings.sample_rate, settings.mode, settings.max_bitrate, settings.cbr, settings.fec
        );

        Ok(Self { encoder })
    }
}

impl FrameEncoder for LibOpusEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize> {
        self.encoder
            .encode(pcm, out)
            .map_err(|e| CodecError::encoding_failed(format!("libopus: {}", e)))
    }
}

/// libopus decompressor
pub struct LibOpusDecoder {
    decoder: opus::Decoder,
}

impl LibOpusDecoder {
    /// Create a decoder running at `sample_rate`
    pub fn new(sample_rate: SampleRate) -> Result<Self> {
        let decoder =
            opus::Decoder::new(sample_rate.hz(), opus::Channels::Mono).map_err(init_error)?;
        debug!("Created libopus decoder: {}", sample_rate);
        Ok(Self { decoder })
    }
}

impl FrameDecoder for LibOpusDecoder {
    fn decode(&mut self, payload: &[u8], out: &mut [i16], conceal: bool) -> Result<usize> {
        if payload.is_empty() && !conceal {
            return Err(CodecError::decoding_failed("empty payload"));
        }
        // An empty packet asks libopus for loss concealment
        self.decoder
            .decode(payload, out, false)
            .map_err(|e| CodecError::decoding_failed(format!("libopus: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::MAX_PACKET_SIZE;

    #[test]
    fn test_libopus_round_trip_frame() {
        let settings = EncoderSettings::new(SampleRate::Rate48000);
        let mut encoder = LibOpusEncoder::new(&settings).unwrap();
        let mut decoder = LibOpusDecoder::new(SampleRate::Rate48000).unwrap();

        let pcm = vec![0i16; settings.frame_size()];
        let mut packet = vec![0u8; MAX_PACKET_SIZE];
        let len = encoder.encode(&pcm, &mut packet).unwrap();
        assert!(len > 0);

        let mut out = vec![0i16; settings.frame_size()];
        assert_eq!(decoder.decode(&packet[..len], &mut out, false).unwrap(), 960);
    }
}

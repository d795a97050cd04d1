//! Core types shared by negotiation, the pipelines and the engine
//!
//! Sample rates come in two flavours: [`SampleRate`] is the closed set the
//! compressor can operate at, [`LinearRate`] is the set of signed linear
//! formats the host pipeline hands us.

use crate::error::{CodecError, Result};
use crate::negotiation::CapabilityDescriptor;
use bytes::Bytes;
use std::fmt;

/// Sample rates the compressor/decompressor can operate at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleRate {
    /// 8 kHz (narrowband)
    Rate8000,
    /// 12 kHz (mediumband)
    Rate12000,
    /// 16 kHz (wideband)
    Rate16000,
    /// 24 kHz (super-wideband)
    Rate24000,
    /// 48 kHz (fullband)
    Rate48000,
}

impl SampleRate {
    /// All codec rates in ascending order
    pub const ALL: [SampleRate; 5] = [
        Self::Rate8000,
        Self::Rate12000,
        Self::Rate16000,
        Self::Rate24000,
        Self::Rate48000,
    ];

    /// Get the sample rate value in Hz
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate8000 => 8000,
            Self::Rate12000 => 12000,
            Self::Rate16000 => 16000,
            Self::Rate24000 => 24000,
            Self::Rate48000 => 48000,
        }
    }

    /// Create from Hz value
    pub fn from_hz(hz: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() == hz)
            .ok_or_else(|| CodecError::InvalidSampleRate {
                rate: hz,
                supported: Self::ALL.iter().map(|r| r.hz()).collect(),
            })
    }

    /// Samples in one frame of `duration` at this rate
    pub fn frame_size(self, duration: FrameDuration) -> usize {
        (self.hz() * duration.as_ms() / 1000) as usize
    }

    /// Working rate used for a linear format when nothing was negotiated:
    /// the lowest codec rate that does not lose bandwidth.
    pub fn for_linear(rate: LinearRate) -> Self {
        Self::ALL
            .into_iter()
            .find(|codec| codec.hz() >= rate.hz())
            .unwrap_or(Self::Rate48000)
    }

    fn bit(self) -> u8 {
        match self {
            Self::Rate8000 => 1 << 0,
            Self::Rate12000 => 1 << 1,
            Self::Rate16000 => 1 << 2,
            Self::Rate24000 => 1 << 3,
            Self::Rate48000 => 1 << 4,
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

/// Signed linear formats the host pipeline can exchange with us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinearRate {
    /// 8 kHz
    Rate8000,
    /// 12 kHz
    Rate12000,
    /// 16 kHz
    Rate16000,
    /// 24 kHz
    Rate24000,
    /// 32 kHz
    Rate32000,
    /// 44.1 kHz
    Rate44100,
    /// 48 kHz
    Rate48000,
    /// 96 kHz
    Rate96000,
}

impl LinearRate {
    /// Every linear rate a translator is registered for
    pub const ALL: [LinearRate; 8] = [
        Self::Rate8000,
        Self::Rate12000,
        Self::Rate16000,
        Self::Rate24000,
        Self::Rate32000,
        Self::Rate44100,
        Self::Rate48000,
        Self::Rate96000,
    ];

    /// Get the sample rate value in Hz
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate8000 => 8000,
            Self::Rate12000 => 12000,
            Self::Rate16000 => 16000,
            Self::Rate24000 => 24000,
            Self::Rate32000 => 32000,
            Self::Rate44100 => 44100,
            Self::Rate48000 => 48000,
            Self::Rate96000 => 96000,
        }
    }

    /// Create from Hz value
    pub fn from_hz(hz: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() == hz)
            .ok_or_else(|| CodecError::InvalidSampleRate {
                rate: hz,
                supported: Self::ALL.iter().map(|r| r.hz()).collect(),
            })
    }

    /// The identical codec rate, if the compressor can run at this rate
    pub fn as_codec_rate(self) -> Option<SampleRate> {
        SampleRate::from_hz(self.hz()).ok()
    }
}

impl fmt::Display for LinearRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}khz", self.hz() / 1000)
    }
}

/// Set of codec sample rates, stored as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RateSet(u8);

impl RateSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every codec rate
    pub fn all() -> Self {
        SampleRate::ALL.into_iter().collect()
    }

    /// A set holding one rate
    pub fn single(rate: SampleRate) -> Self {
        Self(rate.bit())
    }

    /// Return a copy of the set with `rate` added
    pub fn with(self, rate: SampleRate) -> Self {
        Self(self.0 | rate.bit())
    }

    /// Check membership
    pub fn contains(self, rate: SampleRate) -> bool {
        self.0 & rate.bit() != 0
    }

    /// Rates present in both sets
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Check if no rate is present
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of rates present
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate in ascending rate order
    pub fn iter(self) -> impl Iterator<Item = SampleRate> {
        SampleRate::ALL.into_iter().filter(move |rate| self.contains(*rate))
    }

    /// Highest rate in the set
    pub fn highest(self) -> Option<SampleRate> {
        self.iter().last()
    }

    /// Lowest rate in the set
    pub fn lowest(self) -> Option<SampleRate> {
        self.iter().next()
    }
}

impl FromIterator<SampleRate> for RateSet {
    fn from_iter<I: IntoIterator<Item = SampleRate>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Display for RateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rates: Vec<String> = self.iter().map(|r| r.hz().to_string()).collect();
        write!(f, "{{{}}}", rates.join(","))
    }
}

/// Duration of one compressed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum FrameDuration {
    /// 5 ms
    Ms5,
    /// 10 ms
    Ms10,
    /// 20 ms
    #[default]
    Ms20,
    /// 40 ms
    Ms40,
    /// 60 ms
    Ms60,
}

impl FrameDuration {
    /// All durations in ascending order
    pub const ALL: [FrameDuration; 5] = [Self::Ms5, Self::Ms10, Self::Ms20, Self::Ms40, Self::Ms60];

    /// Duration in milliseconds
    pub fn as_ms(self) -> u32 {
        match self {
            Self::Ms5 => 5,
            Self::Ms10 => 10,
            Self::Ms20 => 20,
            Self::Ms40 => 40,
            Self::Ms60 => 60,
        }
    }

    /// Create from a millisecond value
    pub fn from_ms(ms: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_ms() == ms)
            .ok_or_else(|| CodecError::invalid_format(format!("unsupported frame duration {}ms", ms)))
    }
}

impl fmt::Display for FrameDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_ms())
    }
}

/// Coding mode; `Voice` sorts first so it wins a conservative merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CodingMode {
    /// Voice-optimized coding
    #[default]
    Voice,
    /// General audio coding
    Audio,
}

impl CodingMode {
    /// Numeric value used by hosts that exchange attributes as integers
    pub fn id(self) -> u32 {
        match self {
            Self::Voice => 0,
            Self::Audio => 1,
        }
    }

    /// Create from the numeric value
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Voice),
            1 => Ok(Self::Audio),
            other => Err(CodecError::invalid_format(format!("unknown coding mode {}", other))),
        }
    }
}

/// Format tag carried by every frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    /// Signed linear 16-bit, native byte order
    Linear(LinearRate),
    /// Compressed audio with its capability attributes
    Opus(CapabilityDescriptor),
}

impl Format {
    /// Sample rate in Hz; for compressed audio the highest advertised rate
    pub fn sample_rate_hz(&self) -> Option<u32> {
        match self {
            Self::Linear(rate) => Some(rate.hz()),
            Self::Opus(attrs) => attrs.sample_rates().highest().map(SampleRate::hz),
        }
    }

    /// Format kind, ignoring attributes
    pub fn kind(&self) -> FormatKind {
        match self {
            Self::Linear(rate) => FormatKind::Linear(*rate),
            Self::Opus(_) => FormatKind::Opus,
        }
    }
}

/// Format identity used for translator registration and lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Signed linear at a fixed rate
    Linear(LinearRate),
    /// Compressed audio, any rate
    Opus,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear(rate) => write!(f, "slin {}", rate),
            Self::Opus => write!(f, "opus"),
        }
    }
}

/// A media frame exchanged with the host pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Format tag
    pub format: Format,
    /// Number of audio samples the frame represents
    pub samples: usize,
    /// Raw payload
    pub data: Bytes,
    /// Timestamp (opaque to the transcoder)
    pub timestamp: Option<u64>,
    /// Sequence number (opaque to the transcoder)
    pub seqno: Option<u32>,
}

impl Frame {
    /// Create a signed linear frame from samples
    pub fn linear(rate: LinearRate, pcm: &[i16]) -> Self {
        Self {
            format: Format::Linear(rate),
            samples: pcm.len(),
            data: Bytes::copy_from_slice(bytemuck::cast_slice(pcm)),
            timestamp: None,
            seqno: None,
        }
    }

    /// Create a compressed frame
    pub fn opus(attrs: CapabilityDescriptor, samples: usize, data: Bytes) -> Self {
        Self {
            format: Format::Opus(attrs),
            samples,
            data,
            timestamp: None,
            seqno: None,
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the sequence number
    pub fn with_seqno(mut self, seqno: u32) -> Self {
        self.seqno = Some(seqno);
        self
    }

    /// Payload length in bytes
    pub fn datalen(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the payload as signed linear samples
    pub fn linear_samples(&self) -> Result<Vec<i16>> {
        if self.data.len() % 2 != 0 {
            return Err(CodecError::invalid_format(format!(
                "linear payload of {} bytes is not a whole number of samples",
                self.data.len()
            )));
        }
        Ok(self
            .data
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect())
    }

    /// Get the frame duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match self.format.sample_rate_hz() {
            Some(rate) if rate > 0 => self.samples as f64 * 1000.0 / rate as f64,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_conversion() {
        assert_eq!(SampleRate::Rate8000.hz(), 8000);
        assert_eq!(SampleRate::from_hz(24000).unwrap(), SampleRate::Rate24000);
        assert!(SampleRate::from_hz(44100).is_err());
    }

    #[test]
    fn test_frame_size_for_every_duration() {
        for rate in SampleRate::ALL {
            assert_eq!(rate.frame_size(FrameDuration::Ms20), (rate.hz() / 50) as usize);
        }
        assert_eq!(SampleRate::Rate48000.frame_size(FrameDuration::Ms60), 2880);
        assert_eq!(SampleRate::Rate8000.frame_size(FrameDuration::Ms5), 40);
    }

    #[test]
    fn test_working_rate_for_linear() {
        assert_eq!(SampleRate::for_linear(LinearRate::Rate16000), SampleRate::Rate16000);
        assert_eq!(SampleRate::for_linear(LinearRate::Rate32000), SampleRate::Rate48000);
        assert_eq!(SampleRate::for_linear(LinearRate::Rate44100), SampleRate::Rate48000);
        assert_eq!(SampleRate::for_linear(LinearRate::Rate96000), SampleRate::Rate48000);
    }

    #[test]
    fn test_rate_set_operations() {
        let a = RateSet::single(SampleRate::Rate16000).with(SampleRate::Rate48000);
        let b = RateSet::single(SampleRate::Rate48000);
        assert_eq!(a.len(), 2);
        assert_eq!(a.intersection(b), b);
        assert_eq!(a.highest(), Some(SampleRate::Rate48000));
        assert_eq!(a.lowest(), Some(SampleRate::Rate16000));
        assert!(RateSet::single(SampleRate::Rate8000).intersection(b).is_empty());
        assert_eq!(RateSet::all().len(), 5);
        assert_eq!(format!("{}", a), "{16000,48000}");
    }

    #[test]
    fn test_linear_frame_payload() {
        let pcm = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let frame = Frame::linear(LinearRate::Rate8000, &pcm);
        assert_eq!(frame.samples, 5);
        assert_eq!(frame.datalen(), 10);
        assert_eq!(frame.linear_samples().unwrap(), pcm);
    }

    #[test]
    fn test_odd_linear_payload_rejected() {
        let mut frame = Frame::linear(LinearRate::Rate8000, &[0i16; 4]);
        frame.data = Bytes::from_static(&[0, 0, 0]);
        assert!(frame.linear_samples().is_err());
    }

    #[test]
    fn test_frame_duration() {
        let frame = Frame::linear(LinearRate::Rate8000, &[0i16; 160]);
        assert_eq!(frame.duration_ms(), 20.0);
        assert_eq!(format!("{}", frame.format.kind()), "slin 8khz");
    }

    #[test]
    fn test_mode_ordering_prefers_voice() {
        assert!(CodingMode::Voice < CodingMode::Audio);
        assert_eq!(CodingMode::from_id(1).unwrap(), CodingMode::Audio);
        assert!(CodingMode::from_id(7).is_err());
    }
}

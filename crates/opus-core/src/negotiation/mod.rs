//! Capability negotiation
//!
//! Each party advertises a [`CapabilityDescriptor`]. Two descriptors are
//! never mutated; [`joint`] combines them into a [`JointDescriptor`] that
//! configures the encode and decode pipelines, or reports
//! [`NoIntersection`] when the sample-rate sets are disjoint.
//!
//! Only the sample-rate set decides compatibility. The remaining attributes
//! are merged as follows:
//!
//! | Attribute | Merge |
//! |---|---|
//! | sample rates | intersection |
//! | max bitrate | lesser |
//! | DTX, FEC | both must enable |
//! | CBR | either may request |
//! | frame duration | shorter |
//! | coding mode | voice wins |

pub mod fmtp;

use crate::error::{CodecError, NoIntersection, Result};
use crate::types::{CodingMode, FrameDuration, RateSet, SampleRate};
use std::fmt;

/// Highest bitrate the codec accepts, used as the advertised default
pub const MAX_BITRATE: u32 = 510_000;

/// Lowest bitrate the codec accepts
pub const MIN_BITRATE: u32 = 6_000;

/// Result of comparing two descriptors for compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCmp {
    /// Sample-rate sets match
    Equal,
    /// Sample-rate sets differ
    NotEqual,
}

/// Attribute keys of a capability descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKey {
    /// Sample-rate set
    SampleRate,
    /// Maximum bitrate in bits/sec
    MaxBitrate,
    /// Discontinuous transmission
    Dtx,
    /// Forward error correction
    Fec,
    /// Constant bitrate
    Cbr,
    /// Frame duration
    Ptime,
    /// Coding mode
    Mode,
}

impl AttrKey {
    /// All keys in host id order
    pub const ALL: [AttrKey; 7] = [
        Self::SampleRate,
        Self::Dtx,
        Self::Fec,
        Self::Cbr,
        Self::MaxBitrate,
        Self::Ptime,
        Self::Mode,
    ];

    /// Map a host numeric attribute id to a key
    pub fn from_id(id: u32) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(CodecError::UnknownAttribute { id })
    }

    /// Host numeric attribute id
    pub fn id(self) -> u32 {
        match self {
            Self::SampleRate => 0,
            Self::Dtx => 1,
            Self::Fec => 2,
            Self::Cbr => 3,
            Self::MaxBitrate => 4,
            Self::Ptime => 5,
            Self::Mode => 6,
        }
    }

    fn value_kind(self) -> &'static str {
        match self {
            Self::SampleRate => "rate set",
            Self::MaxBitrate => "bitrate",
            Self::Dtx | Self::Fec | Self::Cbr => "flag",
            Self::Ptime => "duration",
            Self::Mode => "mode",
        }
    }
}

/// Attribute value, typed per key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue {
    /// Sample-rate set
    Rates(RateSet),
    /// Bitrate in bits/sec
    Bitrate(u32),
    /// Boolean flag
    Flag(bool),
    /// Frame duration
    Duration(FrameDuration),
    /// Coding mode
    Mode(CodingMode),
}

impl AttrValue {
    /// Interpret a host integer for `key`.
    ///
    /// Sample rates are accepted both as a single rate in Hz and as a
    /// bitmask of rates (bit 0 = 8 kHz ... bit 4 = 48 kHz); the two ranges
    /// do not overlap.
    pub fn from_raw(key: AttrKey, raw: u32) -> Result<Self> {
        let value = match key {
            AttrKey::SampleRate => match SampleRate::from_hz(raw) {
                Ok(rate) => Self::Rates(RateSet::single(rate)),
                Err(_) if raw <= 0x1f => Self::Rates(
                    SampleRate::ALL
                        .into_iter()
                        .enumerate()
                        .filter(|(bit, _)| raw & (1 << bit) != 0)
                        .map(|(_, rate)| rate)
                        .collect(),
                ),
                Err(err) => return Err(err),
            },
            AttrKey::MaxBitrate => Self::Bitrate(raw),
            AttrKey::Dtx | AttrKey::Fec | AttrKey::Cbr => Self::Flag(raw != 0),
            AttrKey::Ptime => Self::Duration(FrameDuration::from_ms(raw)?),
            AttrKey::Mode => Self::Mode(CodingMode::from_id(raw)?),
        };
        Ok(value)
    }

    /// Host integer form; rate sets are rendered as a bitmask
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Rates(rates) => SampleRate::ALL
                .into_iter()
                .enumerate()
                .filter(|(_, rate)| rates.contains(*rate))
                .fold(0, |mask, (bit, _)| mask | (1 << bit)),
            Self::Bitrate(bps) => bps,
            Self::Flag(flag) => u32::from(flag),
            Self::Duration(duration) => duration.as_ms(),
            Self::Mode(mode) => mode.id(),
        }
    }
}

/// Parameters one party advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityDescriptor {
    sample_rates: RateSet,
    max_bitrate: u32,
    dtx: bool,
    fec: bool,
    cbr: bool,
    frame_duration: FrameDuration,
    mode: CodingMode,
}

impl Default for CapabilityDescriptor {
    fn default() -> Self {
        Self {
            sample_rates: RateSet::all(),
            max_bitrate: MAX_BITRATE,
            dtx: false,
            fec: false,
            cbr: false,
            frame_duration: FrameDuration::Ms20,
            mode: CodingMode::Voice,
        }
    }
}

impl CapabilityDescriptor {
    /// Descriptor advertising `rates` with default attributes
    pub fn new(sample_rates: RateSet) -> Self {
        Self {
            sample_rates,
            ..Self::default()
        }
    }

    /// Descriptor advertising a single rate
    pub fn with_rate(rate: SampleRate) -> Self {
        Self::new(RateSet::single(rate))
    }

    /// Set the sample-rate set
    pub fn with_sample_rates(mut self, sample_rates: RateSet) -> Self {
        self.sample_rates = sample_rates;
        self
    }

    /// Set the bitrate ceiling
    pub fn with_max_bitrate(mut self, max_bitrate: u32) -> Self {
        self.max_bitrate = max_bitrate;
        self
    }

    /// Enable or disable DTX
    pub fn with_dtx(mut self, dtx: bool) -> Self {
        self.dtx = dtx;
        self
    }

    /// Enable or disable FEC
    pub fn with_fec(mut self, fec: bool) -> Self {
        self.fec = fec;
        self
    }

    /// Enable or disable CBR
    pub fn with_cbr(mut self, cbr: bool) -> Self {
        self.cbr = cbr;
        self
    }

    /// Set the frame duration
    pub fn with_frame_duration(mut self, frame_duration: FrameDuration) -> Self {
        self.frame_duration = frame_duration;
        self
    }

    /// Set the coding mode
    pub fn with_mode(mut self, mode: CodingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sample-rate set
    pub fn sample_rates(&self) -> RateSet {
        self.sample_rates
    }

    /// Bitrate ceiling in bits/sec
    pub fn max_bitrate(&self) -> u32 {
        self.max_bitrate
    }

    /// DTX enabled
    pub fn dtx(&self) -> bool {
        self.dtx
    }

    /// FEC enabled
    pub fn fec(&self) -> bool {
        self.fec
    }

    /// CBR enabled
    pub fn cbr(&self) -> bool {
        self.cbr
    }

    /// Frame duration
    pub fn frame_duration(&self) -> FrameDuration {
        self.frame_duration
    }

    /// Coding mode
    pub fn mode(&self) -> CodingMode {
        self.mode
    }

    /// Read one attribute
    pub fn get(&self, key: AttrKey) -> AttrValue {
        match key {
            AttrKey::SampleRate => AttrValue::Rates(self.sample_rates),
            AttrKey::MaxBitrate => AttrValue::Bitrate(self.max_bitrate),
            AttrKey::Dtx => AttrValue::Flag(self.dtx),
            AttrKey::Fec => AttrValue::Flag(self.fec),
            AttrKey::Cbr => AttrValue::Flag(self.cbr),
            AttrKey::Ptime => AttrValue::Duration(self.frame_duration),
            AttrKey::Mode => AttrValue::Mode(self.mode),
        }
    }

    /// Read one attribute by host numeric id
    pub fn get_by_id(&self, id: u32) -> Result<AttrValue> {
        Ok(self.get(AttrKey::from_id(id)?))
    }

    /// Return a copy with every `(key, value)` pair applied.
    ///
    /// Fails without producing a descriptor if any value kind does not
    /// match its key.
    pub fn set(&self, attrs: &[(AttrKey, AttrValue)]) -> Result<Self> {
        let mut updated = *self;
        for &(key, value) in attrs {
            match (key, value) {
                (AttrKey::SampleRate, AttrValue::Rates(rates)) => updated.sample_rates = rates,
                (AttrKey::MaxBitrate, AttrValue::Bitrate(bps)) => updated.max_bitrate = bps,
                (AttrKey::Dtx, AttrValue::Flag(flag)) => updated.dtx = flag,
                (AttrKey::Fec, AttrValue::Flag(flag)) => updated.fec = flag,
                (AttrKey::Cbr, AttrValue::Flag(flag)) => updated.cbr = flag,
                (AttrKey::Ptime, AttrValue::Duration(duration)) => updated.frame_duration = duration,
                (AttrKey::Mode, AttrValue::Mode(mode)) => updated.mode = mode,
                (key, _) => {
                    return Err(CodecError::AttributeMismatch {
                        key,
                        expected: key.value_kind(),
                    })
                }
            }
        }
        Ok(updated)
    }

    /// Check that every `(key, value)` pair holds
    pub fn has_all(&self, attrs: &[(AttrKey, AttrValue)]) -> Result<bool> {
        for &(key, expected) in attrs {
            let actual = self.get(key);
            if std::mem::discriminant(&actual) != std::mem::discriminant(&expected) {
                return Err(CodecError::AttributeMismatch {
                    key,
                    expected: key.value_kind(),
                });
            }
            if actual != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compatibility comparison; only the sample-rate sets matter
    pub fn compare(&self, other: &Self) -> FormatCmp {
        if self.sample_rates == other.sample_rates {
            FormatCmp::Equal
        } else {
            FormatCmp::NotEqual
        }
    }

    /// Merge two descriptors into the set of parameters both can use
    pub fn joint(&self, other: &Self) -> std::result::Result<JointDescriptor, NoIntersection> {
        let sample_rates = self.sample_rates.intersection(other.sample_rates);
        if sample_rates.is_empty() {
            return Err(NoIntersection);
        }

        Ok(JointDescriptor(Self {
            sample_rates,
            max_bitrate: self.max_bitrate.min(other.max_bitrate),
            dtx: self.dtx && other.dtx,
            fec: self.fec && other.fec,
            cbr: self.cbr || other.cbr,
            frame_duration: self.frame_duration.min(other.frame_duration),
            mode: self.mode.min(other.mode),
        }))
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rates={} maxbitrate={} dtx={} fec={} cbr={} ptime={} mode={:?}",
            self.sample_rates,
            self.max_bitrate,
            u8::from(self.dtx),
            u8::from(self.fec),
            u8::from(self.cbr),
            self.frame_duration,
            self.mode
        )
    }
}

/// Negotiated parameters; the sample-rate set is never empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointDescriptor(CapabilityDescriptor);

impl JointDescriptor {
    /// The merged descriptor
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.0
    }

    /// Rate the compressor runs at: the highest rate both sides accept
    pub fn working_rate(&self) -> SampleRate {
        // Construction guarantees a non-empty set.
        self.0
            .sample_rates
            .highest()
            .unwrap_or(SampleRate::Rate8000)
    }

    /// Format attributes for frames produced at the working rate
    pub fn output_attributes(&self) -> CapabilityDescriptor {
        self.0.with_sample_rates(RateSet::single(self.working_rate()))
    }
}

impl TryFrom<CapabilityDescriptor> for JointDescriptor {
    type Error = NoIntersection;

    /// Accept an externally negotiated descriptor as-is
    fn try_from(descriptor: CapabilityDescriptor) -> std::result::Result<Self, Self::Error> {
        if descriptor.sample_rates.is_empty() {
            Err(NoIntersection)
        } else {
            Ok(Self(descriptor))
        }
    }
}

impl From<JointDescriptor> for CapabilityDescriptor {
    fn from(joint: JointDescriptor) -> Self {
        joint.0
    }
}

/// Compare two descriptors for compatibility
pub fn compare(a: &CapabilityDescriptor, b: &CapabilityDescriptor) -> FormatCmp {
    a.compare(b)
}

/// Compute the joint descriptor of `a` and `b`
pub fn joint(
    a: &CapabilityDescriptor,
    b: &CapabilityDescriptor,
) -> std::result::Result<JointDescriptor, NoIntersection> {
    a.joint(b)
}

/// Read one attribute of `descriptor`
pub fn get(descriptor: &CapabilityDescriptor, key: AttrKey) -> AttrValue {
    descriptor.get(key)
}

/// Copy `descriptor` with `attrs` applied
pub fn set(descriptor: &CapabilityDescriptor, attrs: &[(AttrKey, AttrValue)]) -> Result<CapabilityDescriptor> {
    descriptor.set(attrs)
}

/// Check that `descriptor` holds every `(key, value)` pair
pub fn has_all(descriptor: &CapabilityDescriptor, attrs: &[(AttrKey, AttrValue)]) -> Result<bool> {
    descriptor.has_all(attrs)
}

//! SDP `a=fmtp` mapping for capability descriptors
//!
//! Recognised parameters: `maxplaybackrate`, `maxaveragebitrate`, `usedtx`,
//! `useinbandfec`, `cbr` and `ptime`. Anything else (`stereo`,
//! `sprop-maxcapturerate`, ...) is ignored.

use super::{CapabilityDescriptor, MAX_BITRATE, MIN_BITRATE};
use crate::error::{CodecError, Result};
use crate::types::{FrameDuration, RateSet, SampleRate};

impl CapabilityDescriptor {
    /// Build a descriptor from an fmtp parameter string such as
    /// `"maxplaybackrate=16000;usedtx=1;useinbandfec=1"`.
    pub fn from_fmtp(params: &str) -> Result<Self> {
        let mut descriptor = Self::default();

        for param in params.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = param
                .split_once('=')
                .ok_or_else(|| CodecError::invalid_fmtp(format!("missing value in '{}'", param)))?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();

            match name.as_str() {
                "maxplaybackrate" => {
                    let hz = parse_number(&name, value)?;
                    let rates: RateSet = SampleRate::ALL.into_iter().filter(|r| r.hz() <= hz).collect();
                    if rates.is_empty() {
                        return Err(CodecError::invalid_fmtp(format!(
                            "maxplaybackrate {} is below the lowest supported rate",
                            hz
                        )));
                    }
                    descriptor = descriptor.with_sample_rates(rates);
                }
                "maxaveragebitrate" => {
                    let bps = parse_number(&name, value)?;
                    if !(MIN_BITRATE..=MAX_BITRATE).contains(&bps) {
                        return Err(CodecError::invalid_fmtp(format!(
                            "maxaveragebitrate {} outside {}-{}",
                            bps, MIN_BITRATE, MAX_BITRATE
                        )));
                    }
                    descriptor = descriptor.with_max_bitrate(bps);
                }
                "usedtx" => descriptor = descriptor.with_dtx(parse_flag(&name, value)?),
                "useinbandfec" => descriptor = descriptor.with_fec(parse_flag(&name, value)?),
                "cbr" => descriptor = descriptor.with_cbr(parse_flag(&name, value)?),
                "ptime" => {
                    let ms = parse_number(&name, value)?;
                    let duration = FrameDuration::from_ms(ms)
                        .map_err(|_| CodecError::invalid_fmtp(format!("unsupported ptime {}", ms)))?;
                    descriptor = descriptor.with_frame_duration(duration);
                }
                _ => {}
            }
        }

        Ok(descriptor)
    }

    /// Render the descriptor as an fmtp parameter string.
    ///
    /// The rate set is expressed as `maxplaybackrate`, so a set with gaps
    /// below its highest rate is widened on the way back in.
    pub fn to_fmtp(&self) -> String {
        let mut params = Vec::with_capacity(6);
        if let Some(highest) = self.sample_rates().highest() {
            params.push(format!("maxplaybackrate={}", highest.hz()));
        }
        params.push(format!("maxaveragebitrate={}", self.max_bitrate()));
        params.push(format!("usedtx={}", u8::from(self.dtx())));
        params.push(format!("useinbandfec={}", u8::from(self.fec())));
        params.push(format!("cbr={}", u8::from(self.cbr())));
        params.push(format!("ptime={}", self.frame_duration().as_ms()));
        params.join(";")
    }
}

fn parse_number(name: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|e| CodecError::invalid_fmtp(format!("{}={}: {}", name, value, e)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(CodecError::invalid_fmtp(format!("{} must be 0 or 1, got '{}'", name, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_offer() {
        let descriptor =
            CapabilityDescriptor::from_fmtp("maxplaybackrate=16000; sprop-maxcapturerate=16000; usedtx=1; useinbandfec=1")
                .unwrap();
        assert_eq!(descriptor.sample_rates().highest(), Some(SampleRate::Rate16000));
        assert_eq!(descriptor.sample_rates().len(), 3);
        assert!(descriptor.dtx());
        assert!(descriptor.fec());
        assert!(!descriptor.cbr());
    }

    #[test]
    fn test_empty_fmtp_is_default() {
        assert_eq!(CapabilityDescriptor::from_fmtp("").unwrap(), CapabilityDescriptor::default());
    }

    #[test]
    fn test_rejects_malformed_values() {
        assert!(CapabilityDescriptor::from_fmtp("usedtx=yes").is_err());
        assert!(CapabilityDescriptor::from_fmtp("maxaveragebitrate=1").is_err());
        assert!(CapabilityDescriptor::from_fmtp("maxplaybackrate=4000").is_err());
        assert!(CapabilityDescriptor::from_fmtp("ptime=30").is_err());
        assert!(CapabilityDescriptor::from_fmtp("cbr").is_err());
    }

    #[test]
    fn test_render_and_parse_back() {
        let descriptor = CapabilityDescriptor::from_fmtp("maxplaybackrate=24000;maxaveragebitrate=20000;cbr=1;ptime=40")
            .unwrap();
        let rendered = descriptor.to_fmtp();
        assert!(rendered.contains("maxplaybackrate=24000"));
        assert!(rendered.contains("cbr=1"));
        assert_eq!(CapabilityDescriptor::from_fmtp(&rendered).unwrap(), descriptor);
    }
}

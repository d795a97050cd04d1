//! Capability negotiation integration tests
//!
//! Scenarios for merging two advertised descriptors, attribute accessors
//! and the fmtp mapping.

use proptest::prelude::*;
use rvoip_opus_core::{
    negotiation::{self, MAX_BITRATE},
    AttrKey, AttrValue, CapabilityDescriptor, CodecError, CodingMode, FormatCmp, FrameDuration,
    JointDescriptor, NoIntersection, RateSet, SampleRate,
};

fn rates(list: &[SampleRate]) -> RateSet {
    list.iter().copied().collect()
}

#[cfg(test)]
mod joint_tests {
    use super::*;

    #[test]
    fn test_dtx_fec_cbr_scenario() {
        let a = CapabilityDescriptor::new(rates(&[SampleRate::Rate16000, SampleRate::Rate48000]))
            .with_dtx(true)
            .with_fec(false)
            .with_cbr(false);
        let b = CapabilityDescriptor::with_rate(SampleRate::Rate48000)
            .with_dtx(true)
            .with_fec(true)
            .with_cbr(true);

        let joint = negotiation::joint(&a, &b).unwrap();
        let merged = joint.descriptor();
        assert_eq!(merged.sample_rates(), rates(&[SampleRate::Rate48000]));
        assert!(merged.dtx());
        assert!(!merged.fec());
        assert!(merged.cbr());
        assert_eq!(joint.working_rate(), SampleRate::Rate48000);
    }

    #[test]
    fn test_disjoint_rates_have_no_joint() {
        let a = CapabilityDescriptor::new(rates(&[SampleRate::Rate8000, SampleRate::Rate12000]));
        let b = CapabilityDescriptor::new(rates(&[SampleRate::Rate24000, SampleRate::Rate48000]));

        assert_eq!(negotiation::joint(&a, &b), Err(NoIntersection));
        assert_eq!(negotiation::compare(&a, &b), FormatCmp::NotEqual);

        let err: CodecError = a.joint(&b).unwrap_err().into();
        assert_eq!(err, CodecError::NoIntersection);
    }

    #[test]
    fn test_conservative_merge_of_scalars() {
        let a = CapabilityDescriptor::default()
            .with_max_bitrate(32_000)
            .with_frame_duration(FrameDuration::Ms60)
            .with_mode(CodingMode::Audio);
        let b = CapabilityDescriptor::default()
            .with_max_bitrate(64_000)
            .with_frame_duration(FrameDuration::Ms10)
            .with_mode(CodingMode::Voice);

        let joint = a.joint(&b).unwrap();
        assert_eq!(joint.descriptor().max_bitrate(), 32_000);
        assert_eq!(joint.descriptor().frame_duration(), FrameDuration::Ms10);
        assert_eq!(joint.descriptor().mode(), CodingMode::Voice);
    }

    #[test]
    fn test_compare_ignores_everything_but_rates() {
        let a = CapabilityDescriptor::with_rate(SampleRate::Rate16000).with_dtx(true);
        let b = CapabilityDescriptor::with_rate(SampleRate::Rate16000).with_max_bitrate(12_000);
        assert_eq!(a.compare(&b), FormatCmp::Equal);
    }

    #[test]
    fn test_joint_from_external_descriptor() {
        let joint = JointDescriptor::try_from(CapabilityDescriptor::with_rate(SampleRate::Rate12000)).unwrap();
        assert_eq!(joint.working_rate(), SampleRate::Rate12000);
        assert!(JointDescriptor::try_from(CapabilityDescriptor::new(RateSet::empty())).is_err());
    }
}

#[cfg(test)]
mod accessor_tests {
    use super::*;

    #[test]
    fn test_set_then_has_all() {
        let base = CapabilityDescriptor::default();
        let updated = negotiation::set(
            &base,
            &[
                (AttrKey::Dtx, AttrValue::Flag(true)),
                (AttrKey::MaxBitrate, AttrValue::Bitrate(20_000)),
                (AttrKey::Ptime, AttrValue::Duration(FrameDuration::Ms40)),
            ],
        )
        .unwrap();

        // The original is untouched
        assert!(!base.dtx());
        assert_eq!(base.max_bitrate(), MAX_BITRATE);

        assert!(negotiation::has_all(
            &updated,
            &[
                (AttrKey::Dtx, AttrValue::Flag(true)),
                (AttrKey::Ptime, AttrValue::Duration(FrameDuration::Ms40)),
            ]
        )
        .unwrap());
        assert!(!updated
            .has_all(&[(AttrKey::Fec, AttrValue::Flag(true))])
            .unwrap());
        assert_eq!(
            negotiation::get(&updated, AttrKey::MaxBitrate),
            AttrValue::Bitrate(20_000)
        );
    }

    #[test]
    fn test_mismatched_value_kind_is_an_error() {
        let base = CapabilityDescriptor::default();
        let err = base
            .set(&[(AttrKey::Dtx, AttrValue::Bitrate(1))])
            .unwrap_err();
        assert!(matches!(err, CodecError::AttributeMismatch { key: AttrKey::Dtx, .. }));

        let err = base
            .has_all(&[(AttrKey::Mode, AttrValue::Flag(false))])
            .unwrap_err();
        assert!(matches!(err, CodecError::AttributeMismatch { key: AttrKey::Mode, .. }));
    }

    #[test]
    fn test_numeric_ids() {
        let ids: Vec<AttrKey> = (0..7).map(|id| AttrKey::from_id(id).unwrap()).collect();
        assert_eq!(ids, AttrKey::ALL.to_vec());
        assert_eq!(AttrKey::from_id(7), Err(CodecError::UnknownAttribute { id: 7 }));

        let descriptor = CapabilityDescriptor::default().with_cbr(true);
        assert_eq!(descriptor.get_by_id(3).unwrap(), AttrValue::Flag(true));
        assert!(descriptor.get_by_id(42).is_err());
    }

    #[test]
    fn test_raw_sample_rate_forms() {
        assert_eq!(
            AttrValue::from_raw(AttrKey::SampleRate, 48000).unwrap(),
            AttrValue::Rates(rates(&[SampleRate::Rate48000]))
        );
        assert_eq!(
            AttrValue::from_raw(AttrKey::SampleRate, 0b10100).unwrap(),
            AttrValue::Rates(rates(&[SampleRate::Rate16000, SampleRate::Rate48000]))
        );
        assert!(AttrValue::from_raw(AttrKey::SampleRate, 44100).is_err());
        assert_eq!(AttrValue::Rates(rates(&[SampleRate::Rate8000])).to_raw(), 1);
    }
}

#[cfg(test)]
mod fmtp_tests {
    use super::*;

    #[test]
    fn test_negotiate_from_sdp_offers() {
        let ours = CapabilityDescriptor::from_fmtp("useinbandfec=1;usedtx=1").unwrap();
        let theirs = CapabilityDescriptor::from_fmtp("maxplaybackrate=16000;useinbandfec=1;cbr=1").unwrap();

        let joint = ours.joint(&theirs).unwrap();
        assert_eq!(joint.working_rate(), SampleRate::Rate16000);
        assert!(joint.descriptor().fec());
        assert!(!joint.descriptor().dtx());
        assert!(joint.descriptor().cbr());

        let answer = joint.output_attributes().to_fmtp();
        assert!(answer.contains("maxplaybackrate=16000"));
        assert!(answer.contains("useinbandfec=1"));
    }

    #[test]
    fn test_malformed_fmtp_rejected() {
        assert!(CapabilityDescriptor::from_fmtp("usedtx=yes").is_err());
        assert!(CapabilityDescriptor::from_fmtp("ptime=25").is_err());
        assert!(CapabilityDescriptor::from_fmtp("maxaveragebitrate=100").is_err());
    }
}

fn arb_descriptor() -> impl Strategy<Value = CapabilityDescriptor> {
    (
        0u8..32,
        6_000u32..=510_000,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0usize..5,
        any::<bool>(),
    )
        .prop_map(|(mask, bitrate, dtx, fec, cbr, duration, audio)| {
            let rates: RateSet = SampleRate::ALL
                .into_iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, rate)| rate)
                .collect();
            CapabilityDescriptor::new(rates)
                .with_max_bitrate(bitrate)
                .with_dtx(dtx)
                .with_fec(fec)
                .with_cbr(cbr)
                .with_frame_duration(FrameDuration::ALL[duration])
                .with_mode(if audio { CodingMode::Audio } else { CodingMode::Voice })
        })
}

proptest! {
    #[test]
    fn prop_joint_is_commutative(a in arb_descriptor(), b in arb_descriptor()) {
        prop_assert_eq!(a.joint(&b), b.joint(&a));
    }

    #[test]
    fn prop_joint_rates_are_the_intersection(a in arb_descriptor(), b in arb_descriptor()) {
        let common = a.sample_rates().intersection(b.sample_rates());
        match a.joint(&b) {
            Ok(joint) => {
                prop_assert_eq!(joint.descriptor().sample_rates(), common);
                prop_assert!(!common.is_empty());
            }
            Err(NoIntersection) => prop_assert!(common.is_empty()),
        }
    }

    #[test]
    fn prop_joint_with_self_keeps_attributes(a in arb_descriptor()) {
        if let Ok(joint) = a.joint(&a) {
            prop_assert_eq!(*joint.descriptor(), a);
        }
    }
}

//! G.711 μ-law companding
//!
//! The simulated backend stores its decimated samples as μ-law bytes. The
//! per-sample routines follow the ITU-T STL reference; bulk work goes
//! through lookup tables built on first use.

use once_cell::sync::Lazy;

/// Pre-computed μ-law encoding table (16-bit linear → 8-bit μ-law)
static MULAW_ENCODE_TABLE: Lazy<Box<[u8; 65536]>> = Lazy::new(|| {
    let mut table = Box::new([0u8; 65536]);
    for (i, entry) in table.iter_mut().enumerate() {
        let sample = (i as u16).wrapping_sub(32768) as i16;
        *entry = ulaw_compress(sample);
    }
    table
});

/// Pre-computed μ-law decoding table (8-bit μ-law → 16-bit linear)
static MULAW_DECODE_TABLE: Lazy<[i16; 256]> = Lazy::new(|| {
    let mut table = [0i16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = ulaw_expand(i as u8);
    }
    table
});

/// μ-law compression of one sample
pub fn ulaw_compress(sample: i16) -> u8 {
    let absno = if sample < 0 {
        (((!sample) as u16) >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };

    let absno = absno.min(0x1FFF);

    let mut i = absno >> 6;
    let mut segno = 1;
    while i != 0 {
        segno += 1;
        i >>= 1;
    }

    let high_nibble = 0x0008 - segno;
    let low_nibble = 0x000F - ((absno >> segno) & 0x000F);
    let mut result = (high_nibble << 4) | low_nibble;

    if sample >= 0 {
        result |= 0x0080;
    }

    result as u8
}

/// μ-law expansion of one sample
pub fn ulaw_expand(compressed: u8) -> i16 {
    let sign = if compressed < 0x0080 { -1 } else { 1 };
    let mantissa = (!compressed) as i16;
    let exponent = (mantissa >> 4) & 0x0007;
    let segment = exponent + 1;
    let mantissa = mantissa & 0x000F;

    let step = 4 << segment;

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// Table-driven μ-law compression
pub fn compress(sample: i16) -> u8 {
    MULAW_ENCODE_TABLE[(sample as u16).wrapping_add(32768) as usize]
}

/// Table-driven μ-law expansion
pub fn expand(encoded: u8) -> i16 {
    MULAW_DECODE_TABLE[encoded as usize]
}

/// Force table construction
pub fn init_tables() {
    Lazy::force(&MULAW_ENCODE_TABLE);
    Lazy::force(&MULAW_DECODE_TABLE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_maps_to_zero() {
        assert_eq!(expand(compress(0)), 0);
    }

    #[test]
    fn test_tables_match_reference() {
        for sample in [-32768i16, -12345, -1, 0, 1, 77, 8159, 32767] {
            assert_eq!(compress(sample), ulaw_compress(sample));
        }
        for code in 0..=255u8 {
            assert_eq!(expand(code), ulaw_expand(code));
        }
    }

    #[test]
    fn test_quantization_error_is_bounded() {
        for sample in (-32000i16..32000).step_by(97) {
            let restored = expand(compress(sample)) as i32;
            let error = (restored - sample as i32).abs();
            // Largest μ-law step is 1024
            assert!(error <= 1024, "sample {} restored as {}", sample, restored);
        }
    }
}

//! Bit-pattern helpers for flag-typed attributes.
//!
//! Flag values travel through the engine as `f64` (every resolved value does);
//! these helpers convert to and from the underlying bit pattern. Negative and
//! non-finite values decode as the empty pattern.

/// Decodes a float-encoded bit pattern.
pub fn to_bits(value: f64) -> u64 {
    // Saturating cast: NaN and negatives become 0.
    value as u64
}

/// Encodes a bit pattern as a float.
pub fn from_bits(bits: u64) -> f64 {
    bits as f64
}

/// Returns true if every bit of `flag` is set in `value`.
pub fn contains(value: f64, flag: f64) -> bool {
    let flag = to_bits(flag);
    to_bits(value) & flag == flag
}

pub fn add(value: f64, flag: f64) -> f64 {
    from_bits(to_bits(value) | to_bits(flag))
}

pub fn remove(value: f64, flag: f64) -> f64 {
    from_bits(to_bits(value) & !to_bits(flag))
}

/// Indices of every set bit, lowest first.
pub fn set_bits(value: f64) -> impl Iterator<Item = usize> {
    let bits = to_bits(value);
    (0..u64::BITS as usize).filter(move |bit| bits & (1u64 << bit) != 0)
}

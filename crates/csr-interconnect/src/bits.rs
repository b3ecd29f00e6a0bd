//! Bit-vector helpers shared by the register model and the bus adapters.

/// Widest register the model can hold.
pub const MAX_REGISTER_WIDTH: u32 = u128::BITS;

/// Returns a mask with the low `width` bits set.
#[must_use]
pub const fn mask(width: u32) -> u128 {
    if width >= u128::BITS {
        u128::MAX
    } else {
        (1_u128 << width) - 1
    }
}

/// Returns a 64-bit mask with the low `width` bits set.
#[must_use]
pub const fn mask64(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1_u64 << width) - 1
    }
}

/// Smallest `n` such that `1 << n >= value`.
#[must_use]
pub const fn ceil_log2(value: u64) -> u32 {
    if value <= 1 {
        0
    } else {
        u64::BITS - (value - 1).leading_zeros()
    }
}

/// Number of bits needed to hold `value`.
///
/// A negative value is sized by its magnitude plus a sign bit, so `-128`
/// needs nine bits. Zero needs one bit.
#[must_use]
pub const fn bits_for(value: i64) -> u32 {
    let magnitude = value.unsigned_abs();
    let bits = if magnitude == 0 {
        1
    } else {
        u64::BITS - magnitude.leading_zeros()
    };
    if value < 0 {
        bits + 1
    } else {
        bits
    }
}

/// Number of significant bits in an unsigned value (zero needs none).
#[must_use]
pub const fn significant_bits(value: u128) -> u32 {
    u128::BITS - value.leading_zeros()
}

/// Rounds `value` up to a multiple of `1 << bits`, saturating at `u64::MAX`.
#[must_use]
pub const fn align_up(value: u64, bits: u32) -> u64 {
    if bits >= u64::BITS {
        return if value == 0 { 0 } else { u64::MAX };
    }
    let step = 1_u64 << bits;
    match value.checked_add(step - 1) {
        Some(bumped) => bumped & !(step - 1),
        None => u64::MAX,
    }
}

/// Low 64 bits of a register-sized value.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn low_word(value: u128) -> u64 {
    (value & u64::MAX as u128) as u64
}

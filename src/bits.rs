/// Set bit `bit` of `x` on if `toggle` is true, otherwise off.
pub fn bit(bit: u64, x: u64, toggle: bool) -> u64 {
    if toggle {
        x | (1 << bit)
    } else {
        x & !(1 << bit)
    }
}

/// Test whether bit `bit` of `x` is set.
pub fn test_bit(bit: u64, x: u64) -> bool {
    (x >> bit) & 1 == 1
}

/// Round `n` up to the next multiple of 8, the alignment of every OpenFlow record.
pub fn round_up8(n: usize) -> usize {
    (n + 7) & !7
}

/// Number of zero bytes needed after `n` bytes to reach 8-byte alignment.
pub fn pad_len8(n: usize) -> usize {
    round_up8(n) - n
}

/// Test whether every byte of `bytes` is zero.
pub fn is_all_zeros(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

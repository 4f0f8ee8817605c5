//! Coercion of typed-in counts.
//!
//! Data entry tolerates sloppy input: anything that does not start with an
//! integer becomes 0, negative numbers floor at 0, and trailing junk after
//! the leading digits is ignored. Counts are capped at [`MAX_COUNT`].

/// Largest count a cell can hold. Totals over a whole table stay far below
/// `u64::MAX`.
pub const MAX_COUNT: u64 = u32::MAX as u64;

/// Coerce raw cell input to a count.
pub fn coerce_count(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());

    if end == 0 || negative {
        return 0;
    }

    // A digit run too long for u64 is still a huge number, not garbage.
    digits[..end]
        .parse::<u64>()
        .map_or(MAX_COUNT, |v| v.min(MAX_COUNT))
}

/// True when `raw` is not a plain non-negative integer and had to be coerced.
pub fn was_coerced(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.parse::<u64>().map_or(true, |v| v != coerce_count(raw))
}

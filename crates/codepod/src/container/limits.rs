//! Translation of human-readable limits into runtime units

/// CPU accounting period in microseconds (100ms)
pub const CPU_PERIOD: i64 = 100_000;

/// Memory limit used when the configured string cannot be parsed (128 MiB)
pub const DEFAULT_MEMORY_BYTES: u64 = 128 * 1024 * 1024;

/// CPU quota used when the configured fraction cannot be parsed (half a core)
const DEFAULT_CPU_QUOTA: i64 = CPU_PERIOD / 2;

/// Parse a memory string like `128m`, `1g`, `512kb` or `256` into bytes
///
/// Case-insensitive. Units `k`, `m`, `g` scale by powers of 1024 and may be
/// followed by a `b`; a bare number is taken as bytes. Returns `None` on
/// anything else, including overflow.
pub fn try_parse_memory(input: &str) -> Option<u64> {
    let lower = input.to_ascii_lowercase();
    let rest = lower.strip_suffix('b').unwrap_or(&lower);

    let (digits, multiplier) = match rest.as_bytes().last()? {
        b'k' => (&rest[..rest.len() - 1], 1024),
        b'm' => (&rest[..rest.len() - 1], 1024 * 1024),
        b'g' => (&rest[..rest.len() - 1], 1024 * 1024 * 1024),
        _ => (rest, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}

/// Parse a memory string into bytes, falling back to 128 MiB
pub fn parse_memory(input: &str) -> u64 {
    try_parse_memory(input).unwrap_or(DEFAULT_MEMORY_BYTES)
}

/// Convert a fractional core count into a CPU quota per [`CPU_PERIOD`]
///
/// `0.5` becomes `50000`. The result is truncated toward zero. Unparseable,
/// non-finite or non-positive values fall back to half a core.
pub fn cpu_quota(cpus: &str) -> i64 {
    match cpus.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => {
            (value * CPU_PERIOD as f64).trunc() as i64
        }
        _ => DEFAULT_CPU_QUOTA,
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn megabytes_scale_by_mebibyte(n in 0u64..1_000_000) {
            prop_assert_eq!(parse_memory(&format!("{n}m")), n * 1024 * 1024);
        }

        #[test]
        fn bare_numbers_are_bytes(n in 0u64..u64::MAX) {
            prop_assert_eq!(parse_memory(&n.to_string()), n);
        }

        #[test]
        fn parse_memory_never_panics(s in ".*") {
            let _ = parse_memory(&s);
        }

        #[test]
        fn cpu_quota_is_monotonic(a in 1u32..4000, b in 1u32..4000) {
            let qa = cpu_quota(&format!("{}", f64::from(a) / 1000.0));
            let qb = cpu_quota(&format!("{}", f64::from(b) / 1000.0));
            prop_assert_eq!(a <= b, qa <= qb);
        }
    }
}

//! Fixed-precision formatting of scaled channel values

/// Largest precision accepted for a channel.
///
/// An f64 carries roughly 15-17 significant digits, so more decimals than
/// this only print noise for realistic telemetry magnitudes.
pub const MAX_PRECISION: u8 = 9;

/// Determine appropriate decimal places from scale factor
///
/// Used when a channel definition omits an explicit precision.
///
/// # Examples
/// - scale 1.0 → 0 decimal places (integers)
/// - scale 0.1 → 1 decimal place
/// - scale 0.01 → 2 decimal places
/// - scale 0.25 → 2 decimal places (1/4 needs 2 places)
pub fn precision_from_scale(scale: f64) -> u8 {
    let abs_scale = scale.abs();

    if !abs_scale.is_finite() || abs_scale == 0.0 {
        return 0;
    }

    if abs_scale >= 1.0 && (abs_scale - abs_scale.round()).abs() < 1e-9 {
        return 0;
    }

    // Scale by 10 until the fractional part disappears
    let mut temp = abs_scale;
    let mut precision = 0u8;

    while precision < 6 {
        if (temp - temp.round()).abs() < 1e-9 {
            break;
        }
        temp *= 10.0;
        precision += 1;
    }

    precision
}

/// Format a value with exactly `precision` decimal places.
///
/// Negative zero (e.g. `-0.04` at one decimal) is printed without a sign.
pub fn format_fixed(value: f64, precision: u8) -> String {
    let formatted = format!("{:.*}", precision as usize, value);

    match formatted.strip_prefix('-') {
        Some(digits) if digits.bytes().all(|b| b == b'0' || b == b'.') => digits.to_string(),
        _ => formatted,
    }
}

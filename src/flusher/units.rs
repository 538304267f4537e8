//! Duration and Size Parsing
//!
//! Forgiving parsers for the threshold strings used in the configuration.
//! Both are total: unparseable or missing segments contribute zero.
//!
//! # Formats
//!
//! ```text
//! duration:  [<N>y][<N>M][<N>w][<N>d][<N>h][<N>m][<N>s]
//! size:      [<N>TB][<N>GB][<N>MB]
//! ```
//!
//! Segment order is fixed and units are case-sensitive (`M` is months,
//! `m` is minutes).

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Duration units in the order they must appear.
const DURATION_UNITS: [(&str, i64); 7] = [
    ("y", 365 * DAY),
    ("M", 30 * DAY),
    ("w", 7 * DAY),
    ("d", DAY),
    ("h", HOUR),
    ("m", MINUTE),
    ("s", 1),
];

/// Size units in the order they must appear (binary multipliers).
const SIZE_UNITS: [(&str, u64); 3] = [("TB", 1 << 40), ("GB", 1 << 30), ("MB", 1 << 20)];

/// Convert a duration string such as `"7d"` or `"1y2M3w"` to seconds.
///
/// Returns 0 for empty or unparseable input.
pub fn seconds(duration: &str) -> i64 {
    parse_segments(duration, &DURATION_UNITS)
        .into_iter()
        .fold(0i64, |total, (count, multiplier)| {
            let count = i64::try_from(count).unwrap_or(0);
            total.saturating_add(count.saturating_mul(multiplier))
        })
}

/// Convert a size string such as `"10GB"` or `"1TB512GB"` to bytes.
///
/// Returns 0 for empty or unparseable input.
pub fn bytes(size: &str) -> u64 {
    parse_segments(size, &SIZE_UNITS)
        .into_iter()
        .fold(0u64, |total, (count, multiplier)| {
            total.saturating_add(count.saturating_mul(multiplier))
        })
}

/// Walk `input` from the start, consuming `<digits><unit>` segments in the
/// fixed unit order. A unit that does not match at the cursor is skipped
/// and the next unit is tried at the same position. Parsing stops at the
/// first position where no remaining unit matches.
fn parse_segments<M: Copy>(input: &str, units: &[(&str, M)]) -> Vec<(u64, M)> {
    let mut rest = input;
    let mut segments = Vec::new();

    for &(unit, multiplier) in units {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            break;
        }
        if !rest[digits..].starts_with(unit) {
            continue;
        }
        // Out-of-range counts contribute nothing.
        let count = rest[..digits].parse::<u64>().unwrap_or(0);
        segments.push((count, multiplier));
        rest = &rest[digits + unit.len()..];
    }

    segments
}

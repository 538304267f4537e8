//! Property-Based Tests for Threshold Parsing
//!
//! # Test Properties
//!
//! 1. **Totality**: arbitrary input never panics
//! 2. **Composition**: a well-formed string equals the sum of its segments
//! 3. **Omission**: dropping a segment removes exactly its contribution

#![cfg(test)]

use proptest::prelude::*;

use super::units::{bytes, seconds};

// =============================================================================
// Property Strategies
// =============================================================================

/// Seven optional segment counts, small enough that the sum cannot overflow.
fn duration_parts_strategy() -> impl Strategy<Value = [Option<u32>; 7]> {
    prop::array::uniform7(prop::option::of(0u32..10_000))
}

fn size_parts_strategy() -> impl Strategy<Value = [Option<u32>; 3]> {
    prop::array::uniform3(prop::option::of(0u32..100_000))
}

fn render(parts: &[Option<u32>], units: &[&str]) -> String {
    parts
        .iter()
        .zip(units)
        .filter_map(|(count, unit)| count.map(|c| format!("{}{}", c, unit)))
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_seconds_never_panics(input in ".*") {
        let _ = seconds(&input);
    }

    #[test]
    fn prop_bytes_never_panics(input in ".*") {
        let _ = bytes(&input);
    }

    #[test]
    fn prop_seconds_is_sum_of_segments(parts in duration_parts_strategy()) {
        let multipliers: [i64; 7] = [31_536_000, 2_592_000, 604_800, 86_400, 3_600, 60, 1];
        let input = render(&parts, &["y", "M", "w", "d", "h", "m", "s"]);

        let expected: i64 = parts
            .iter()
            .zip(multipliers)
            .map(|(count, mult)| count.map_or(0, |c| i64::from(c) * mult))
            .sum();

        prop_assert_eq!(seconds(&input), expected);
    }

    #[test]
    fn prop_bytes_is_sum_of_segments(parts in size_parts_strategy()) {
        let multipliers: [u64; 3] = [1 << 40, 1 << 30, 1 << 20];
        let input = render(&parts, &["TB", "GB", "MB"]);

        let expected: u64 = parts
            .iter()
            .zip(multipliers)
            .map(|(count, mult)| count.map_or(0, |c| u64::from(c) * mult))
            .sum();

        prop_assert_eq!(bytes(&input), expected);
    }

    #[test]
    fn prop_seconds_non_negative(input in "[0-9yMwdhms]{0,24}") {
        prop_assert!(seconds(&input) >= 0);
    }
}

//! Slice assignment and slice-range partitioning.
//!
//! The slice of an entity is `abs(hash % NUMBER_OF_SLICES)` where `hash` is the
//! 32-bit `h = 31 * h + c` string hash over UTF-16 code units. Producers written
//! on the JVM compute the same value with `String.hashCode`, so both sides agree
//! on partitioning without exchanging it.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Size of the slice space. Slices are `0..NUMBER_OF_SLICES`.
pub const NUMBER_OF_SLICES: i32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SliceRangeError {
    #[error("number of slice ranges must divide {NUMBER_OF_SLICES} (got {0})")]
    InvalidCount(usize),
    #[error("invalid slice range {min}..={max} (slices are 0..={})", NUMBER_OF_SLICES - 1)]
    InvalidRange { min: i32, max: i32 },
}

fn string_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Deterministic slice of an entity identifier.
#[must_use]
pub fn slice_for(persistence_id: &str) -> i32 {
    (string_hash(persistence_id) % NUMBER_OF_SLICES).abs()
}

/// Split the slice space into `count` contiguous, equal-sized ranges.
pub fn slice_ranges(count: usize) -> Result<Vec<RangeInclusive<i32>>, SliceRangeError> {
    let total = NUMBER_OF_SLICES as usize;
    if count == 0 || count > total || total % count != 0 {
        return Err(SliceRangeError::InvalidCount(count));
    }

    let size = (total / count) as i32;
    Ok((0..count as i32)
        .map(|i| {
            let start = i * size;
            start..=start + size - 1
        })
        .collect())
}

#[must_use]
pub fn is_valid_slice_range(min: i32, max: i32) -> bool {
    (0..NUMBER_OF_SLICES).contains(&min) && (0..NUMBER_OF_SLICES).contains(&max) && min <= max
}

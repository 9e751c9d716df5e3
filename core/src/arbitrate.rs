use bytes::Bytes;

use crate::attempt::CompressionAttempt;

/// Results at or above this share of the input size count as no real savings.
pub const NEGLIGIBLE_SAVINGS_RATIO: f64 = 0.98;

/// Above this requested quality, negligible savings are not worth the
/// re-encode and the input is kept.
pub const HIGH_QUALITY_THRESHOLD: f32 = 0.85;

/// Pick the winning attempt.
///
/// The smallest successful attempt wins, the earliest in dispatch order on a
/// tie. With no success the synthetic original wins. When the requested
/// quality is above [`HIGH_QUALITY_THRESHOLD`] and the winner saves less than
/// 2%, the original wins instead.
pub fn arbitrate(attempts: &[CompressionAttempt], input: &Bytes, quality: f32) -> CompressionAttempt {
    let best = attempts
        .iter()
        .filter(|a| a.is_success())
        .reduce(|best, current| if current.size() < best.size() { current } else { best });

    match best {
        None => CompressionAttempt::original(input.clone()),
        Some(best) if not_worth_it(best.size(), input.len(), quality) => CompressionAttempt::original(input.clone()),
        Some(best) => best.clone(),
    }
}

/// True when a result of `size` bytes saves too little at this quality.
pub fn not_worth_it(size: usize, original_size: usize, quality: f32) -> bool {
    size as f64 >= original_size as f64 * NEGLIGIBLE_SAVINGS_RATIO && quality > HIGH_QUALITY_THRESHOLD
}

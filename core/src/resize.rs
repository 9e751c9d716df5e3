use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::CompressOptions;
use crate::error::BackendError;

/// Largest output, in pixels, a resize may produce.
pub const MAX_OUTPUT_PIXELS: u64 = 64 * 1024 * 1024;

/// How a backend interprets the dimension options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePolicy {
    /// Fit inside the target (or max) box, never enlarging.
    FitInside,
    /// Resize to exactly the target size (a missing side follows the aspect
    /// ratio); max dimensions only shrink.
    Exact,
}

fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

/// Shrink `(width, height)` to fit the given bounds, keeping aspect ratio.
fn fit_within(width: u32, height: u32, max_w: Option<u32>, max_h: Option<u32>) -> Option<(u32, u32)> {
    let scale_w = max_w.map(|m| m as f64 / width as f64);
    let scale_h = max_h.map(|m| m as f64 / height as f64);
    let scale = match (scale_w, scale_h) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return None,
    };
    if scale >= 1.0 {
        return None;
    }
    let new_w = ((width as f64 * scale).round() as u32).max(1);
    let new_h = ((height as f64 * scale).round() as u32).max(1);
    Some((new_w, new_h))
}

/// New dimensions for an image of `current` size, or `None` when it stays as is.
pub fn plan(current: (u32, u32), options: &CompressOptions, policy: ResizePolicy) -> Option<(u32, u32)> {
    let (width, height) = current;
    if width == 0 || height == 0 {
        return None;
    }

    let target_w = positive(options.target_width);
    let target_h = positive(options.target_height);
    let max_w = positive(options.max_width);
    let max_h = positive(options.max_height);
    let has_target = target_w.is_some() || target_h.is_some();

    match policy {
        ResizePolicy::FitInside if has_target => fit_within(width, height, target_w, target_h),
        ResizePolicy::FitInside => fit_within(width, height, max_w, max_h),
        ResizePolicy::Exact if has_target => {
            let new_w = target_w.unwrap_or_else(|| {
                // target_h is set here
                let h = target_h.unwrap_or(height);
                ((width as f64 * h as f64 / height as f64).round() as u32).max(1)
            });
            let new_h = target_h.unwrap_or_else(|| {
                ((height as f64 * new_w as f64 / width as f64).round() as u32).max(1)
            });
            (new_w, new_h).ne(&current).then_some((new_w, new_h))
        }
        ResizePolicy::Exact => fit_within(width, height, max_w, max_h),
    }
}

/// Apply [`plan`] to a decoded image. Outputs above [`MAX_OUTPUT_PIXELS`]
/// are refused before anything is allocated.
pub fn apply(image: DynamicImage, options: &CompressOptions, policy: ResizePolicy) -> Result<DynamicImage, BackendError> {
    match plan((image.width(), image.height()), options, policy) {
        Some((w, h)) if u64::from(w) * u64::from(h) > MAX_OUTPUT_PIXELS => Err(BackendError::Encode(format!(
            "requested size too large: {}x{} exceeds {} pixels",
            w, h, MAX_OUTPUT_PIXELS
        ))),
        Some((w, h)) => {
            log::debug!("Resizing {}x{} to {}x{}", image.width(), image.height(), w, h);
            Ok(image.resize_exact(w, h, FilterType::Lanczos3))
        }
        None => Ok(image),
    }
}

//! Pure calculation functions for image dimensions.

/// Calculate the downscaled size of an image constrained to `max_width`.
///
/// Returns `None` when the image already fits. Otherwise the width becomes
/// exactly `max_width` and the height keeps the aspect ratio:
/// `round(height * max_width / width)`, never less than 1.
///
/// # Examples
/// ```
/// # use gazette::imaging::calculate_downscale;
/// assert_eq!(calculate_downscale((1200, 800), 600), Some((600, 400)));
/// assert_eq!(calculate_downscale((600, 900), 600), None);
/// ```
pub fn calculate_downscale(original: (u32, u32), max_width: u32) -> Option<(u32, u32)> {
    let (width, height) = original;
    if width <= max_width || width == 0 {
        return None;
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    Some((max_width, scaled.max(1)))
}

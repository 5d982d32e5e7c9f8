//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Output raster dimensions computed from the source and the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
}

impl TargetGeometry {
    pub fn long_side(self) -> u32 {
        self.width.max(self.height)
    }

    pub fn short_side(self) -> u32 {
        self.width.min(self.height)
    }
}

fn scale(dims: (u32, u32), factor: f64) -> (u32, u32) {
    (
        (dims.0 as f64 * factor).round() as u32,
        (dims.1 as f64 * factor).round() as u32,
    )
}

/// Calculate the output dimensions for an image.
///
/// Rules, in order:
/// 1. If the long side exceeds `max_long_side`, or the short side is below
///    both `target_min_short_side` and `max_long_side`, scale by
///    `max_long_side / long_side`, capped at 1.0.
/// 2. If that left the short side below `target_min_short_side` although the
///    original short side met it, scale back up to the target, then clamp the
///    long side down to `max_long_side` again. The long-side cap wins.
/// 3. Never exceed the original dimensions, never drop below 1px.
///
/// # Examples
/// ```
/// # use vision_prep::imaging::calculate_target_geometry;
/// let g = calculate_target_geometry((4000, 3000), 2048, 768);
/// assert_eq!((g.width, g.height), (2048, 1536));
///
/// // Already within bounds: untouched.
/// let g = calculate_target_geometry((300, 200), 2048, 768);
/// assert_eq!((g.width, g.height), (300, 200));
/// ```
pub fn calculate_target_geometry(
    original: (u32, u32),
    max_long_side: u32,
    target_min_short_side: u32,
) -> TargetGeometry {
    let (orig_w, orig_h) = original;
    let long_side = orig_w.max(orig_h);
    let short_side = orig_w.min(orig_h);

    let needs_adjustment = long_side > max_long_side
        || (short_side < target_min_short_side && short_side < max_long_side);

    if !needs_adjustment || long_side == 0 {
        return TargetGeometry {
            width: orig_w,
            height: orig_h,
        };
    }

    let down = (max_long_side as f64 / long_side as f64).min(1.0);
    let (mut w, mut h) = scale(original, down);

    let current_short = w.min(h);
    if current_short < target_min_short_side
        && short_side >= target_min_short_side
        && current_short > 0
    {
        let up = target_min_short_side as f64 / current_short as f64;
        (w, h) = scale((w, h), up);

        let new_long = w.max(h);
        if new_long > max_long_side {
            let back_off = max_long_side as f64 / new_long as f64;
            (w, h) = scale((w, h), back_off);
        }
    }

    TargetGeometry {
        width: w.clamp(1, orig_w.max(1)),
        height: h.clamp(1, orig_h.max(1)),
    }
}

/// Maximum number of sample points per axis when inspecting for transparency.
pub const SAMPLE_GRID: u32 = 100;

/// Sampling stride for one axis: `max(1, dimension / 100)`.
///
/// ```
/// # use vision_prep::imaging::sample_stride;
/// assert_eq!(sample_stride(50), 1);
/// assert_eq!(sample_stride(2048), 20);
/// ```
pub fn sample_stride(dimension: u32) -> u32 {
    (dimension / SAMPLE_GRID).max(1)
}

/// Sequence of qualities the compression loop will try after the first encode.
///
/// Each step is `max(previous - step, floor)`; the sequence ends once the
/// floor is reached. Empty when `initial <= floor`.
pub fn quality_schedule(initial: u32, floor: u32, step: u32) -> Vec<u32> {
    let step = step.max(1);
    let mut schedule = Vec::new();
    let mut current = initial;
    while current > floor {
        current = current.saturating_sub(step).max(floor);
        schedule.push(current);
    }
    schedule
}

//! Per-frame spot detection.
//!
//! Pipeline per frame: optional background subtraction → optional 3×3 median
//! → scale-normalized LoG response (σ = radius/√2 in pixels) → strict local
//! maxima → quadratic sub-pixel refinement → quality gate. A frame with no
//! surviving maxima yields an empty spot set, not an error.

mod filters;
mod refine;

pub use filters::{log_response, median_filter_3x3, subtract_background};
pub use refine::quadratic_refine;

use crate::config::TrackingConfig;
use crate::stack::FramePlane;

/// Floor on the LoG scale in pixels; below this the discrete kernel
/// degenerates.
const MIN_SIGMA_PX: f64 = 0.8;

/// A detected object candidate at one point in time.
///
/// Positions are in physical units (µm). Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Spot {
    /// Sub-pixel x position in µm.
    pub x_um: f64,
    /// Sub-pixel y position in µm.
    pub y_um: f64,
    /// 0-based frame index.
    pub frame: usize,
    /// Detection radius in µm this spot was found with.
    pub radius_um: f64,
    /// Detector confidence; higher is more confident.
    pub quality: f64,
}

impl Spot {
    /// Euclidean distance to another spot in µm.
    pub fn distance_to(&self, other: &Spot) -> f64 {
        let dx = self.x_um - other.x_um;
        let dy = self.y_um - other.y_um;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Detect spots in one frame.
///
/// The plane must satisfy the [`FrameStack`](crate::stack::FrameStack)
/// contract (validated by the caller once per stack); detection itself never
/// fails for a well-formed plane.
pub fn detect_frame(
    plane: &FramePlane,
    frame: usize,
    pixel_size_um: f64,
    config: &TrackingConfig,
) -> Vec<Spot> {
    let (w, h) = plane.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let mut processed: Option<FramePlane> = None;
    if config.background_radius_px > 0 {
        processed = Some(subtract_background(plane, config.background_radius_px));
    }
    if config.detector_median_filter {
        let filtered = median_filter_3x3(processed.as_ref().unwrap_or(plane));
        processed = Some(filtered);
    }
    let current = processed.as_ref().unwrap_or(plane);

    let radius_px = config.detector_radius / pixel_size_um;
    let sigma_px = (radius_px / std::f64::consts::SQRT_2).max(MIN_SIGMA_PX);
    let response = log_response(current, sigma_px);

    let mut spots = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let value = response.get_pixel(x, y)[0];
            if value <= 0.0 || !is_strict_local_max(&response, x, y) {
                continue;
            }
            let refined = quadratic_refine(&response, x, y);
            if refined.value < config.detector_threshold {
                continue;
            }
            spots.push(Spot {
                x_um: (x as f64 + refined.dx) * pixel_size_um,
                y_um: (y as f64 + refined.dy) * pixel_size_um,
                frame,
                radius_um: config.detector_radius,
                quality: refined.value,
            });
        }
    }
    spots
}

/// True when the response at `(x, y)` strictly exceeds all 8 neighbors.
fn is_strict_local_max(response: &FramePlane, x: u32, y: u32) -> bool {
    let center = response.get_pixel(x, y)[0];
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let v = response.get_pixel((x as i64 + dx) as u32, (y as i64 + dy) as u32)[0];
            if v >= center {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_util::{add_gaussian, blank_plane};
    use approx::assert_abs_diff_eq;

    /// Config tuned so a σ=2 px Gaussian blob is scale-matched at pixel size
    /// 1 µm: radius = σ·√2.
    fn test_config(threshold: f64) -> TrackingConfig {
        TrackingConfig {
            detector_radius: 2.0 * std::f64::consts::SQRT_2,
            detector_threshold: threshold,
            detector_median_filter: false,
            background_radius_px: 0,
            ..TrackingConfig::default()
        }
    }

    #[test]
    fn empty_frame_yields_empty_spot_set() {
        let plane = blank_plane(32, 32);
        let spots = detect_frame(&plane, 0, 1.0, &test_config(1.0));
        assert!(spots.is_empty());
    }

    #[test]
    fn single_blob_localized_subpixel() {
        let mut plane = blank_plane(41, 41);
        add_gaussian(&mut plane, 20.4, 17.7, 2.0, 100.0);
        let spots = detect_frame(&plane, 3, 1.0, &test_config(10.0));
        assert_eq!(spots.len(), 1);
        let spot = &spots[0];
        assert_eq!(spot.frame, 3);
        assert_abs_diff_eq!(spot.x_um, 20.4, epsilon = 0.25);
        assert_abs_diff_eq!(spot.y_um, 17.7, epsilon = 0.25);
        assert!(spot.quality > 10.0);
    }

    #[test]
    fn positions_scale_with_pixel_size() {
        let mut plane = blank_plane(41, 41);
        add_gaussian(&mut plane, 20.0, 20.0, 2.0, 100.0);
        let config = TrackingConfig {
            // same σ in pixels at 0.5 µm/px
            detector_radius: std::f64::consts::SQRT_2,
            detector_threshold: 10.0,
            detector_median_filter: false,
            background_radius_px: 0,
            ..TrackingConfig::default()
        };
        let spots = detect_frame(&plane, 0, 0.5, &config);
        assert_eq!(spots.len(), 1);
        assert_abs_diff_eq!(spots[0].x_um, 10.0, epsilon = 0.2);
    }

    #[test]
    fn quality_threshold_rejects_existing_maximum() {
        let mut plane = blank_plane(41, 41);
        add_gaussian(&mut plane, 20.0, 20.0, 2.0, 100.0);
        // maximum exists (quality ≈ 50) but the gate rejects it
        let spots = detect_frame(&plane, 0, 1.0, &test_config(1000.0));
        assert!(spots.is_empty());
        let spots = detect_frame(&plane, 0, 1.0, &test_config(10.0));
        assert_eq!(spots.len(), 1);
    }

    #[test]
    fn two_separated_blobs_give_two_spots() {
        let mut plane = blank_plane(61, 31);
        add_gaussian(&mut plane, 15.0, 15.0, 2.0, 100.0);
        add_gaussian(&mut plane, 45.0, 15.0, 2.0, 80.0);
        let mut spots = detect_frame(&plane, 0, 1.0, &test_config(10.0));
        spots.sort_by(|a, b| a.x_um.total_cmp(&b.x_um));
        assert_eq!(spots.len(), 2);
        assert!(spots[0].quality > spots[1].quality);
    }

    #[test]
    fn median_filter_suppresses_salt_noise() {
        let mut plane = blank_plane(41, 41);
        add_gaussian(&mut plane, 20.0, 20.0, 2.0, 100.0);
        // single hot pixel that would otherwise ring under the LoG
        plane.get_pixel_mut(5, 5)[0] = 5000.0;
        let mut config = test_config(10.0);
        config.detector_median_filter = true;
        let spots = detect_frame(&plane, 0, 1.0, &config);
        assert_eq!(spots.len(), 1);
        assert_abs_diff_eq!(spots[0].x_um, 20.0, epsilon = 0.3);
    }
}

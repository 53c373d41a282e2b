//! Image filters feeding the spot detector.
//!
//! All filters operate on f32 planes with clamp-to-edge boundary handling.
//! The LoG response is scale-normalized (multiplied by σ²) and negated so
//! that bright blobs of matching scale produce positive peaks whose height
//! tracks the blob amplitude; the detector uses that height as the quality
//! score.

use crate::stack::FramePlane;

/// 3×3 median filter, the standard pre-detection despeckle step.
pub fn median_filter_3x3(plane: &FramePlane) -> FramePlane {
    let (w, h) = plane.dimensions();
    let mut out = FramePlane::new(w, h);
    let mut window = [0.0f32; 9];
    for y in 0..h {
        for x in 0..w {
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    window[n] = plane.get_pixel(sx, sy)[0];
                    n += 1;
                }
            }
            window.sort_by(|a, b| a.total_cmp(b));
            out.get_pixel_mut(x, y)[0] = window[4];
        }
    }
    out
}

/// Subtract the local mean over a (2r+1)² window, computed with an integral
/// image so the cost is independent of the radius.
///
/// Approximates the rolling-ball background subtraction of the original
/// acquisition workflow; output values may be negative.
pub fn subtract_background(plane: &FramePlane, radius: u32) -> FramePlane {
    let (w, h) = plane.dimensions();
    if radius == 0 {
        return plane.clone();
    }
    let (wu, hu) = (w as usize, h as usize);

    // Integral image with a zero top row and left column.
    let mut integral = vec![0.0f64; (wu + 1) * (hu + 1)];
    for y in 0..hu {
        let mut row_sum = 0.0f64;
        for x in 0..wu {
            row_sum += plane.get_pixel(x as u32, y as u32)[0] as f64;
            integral[(y + 1) * (wu + 1) + (x + 1)] = integral[y * (wu + 1) + (x + 1)] + row_sum;
        }
    }
    let window_sum = |x0: usize, y0: usize, x1: usize, y1: usize| -> f64 {
        // inclusive corners
        integral[(y1 + 1) * (wu + 1) + (x1 + 1)] + integral[y0 * (wu + 1) + x0]
            - integral[y0 * (wu + 1) + (x1 + 1)]
            - integral[(y1 + 1) * (wu + 1) + x0]
    };

    let r = radius as usize;
    let mut out = FramePlane::new(w, h);
    for y in 0..hu {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(hu - 1);
        for x in 0..wu {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(wu - 1);
            let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f64;
            let mean = window_sum(x0, y0, x1, y1) / area;
            let v = plane.get_pixel(x as u32, y as u32)[0] as f64 - mean;
            out.get_pixel_mut(x as u32, y as u32)[0] = v as f32;
        }
    }
    out
}

/// Normalized 1-D Gaussian kernel with half-width ⌈3σ⌉.
fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let half = (3.0 * sigma).ceil().max(1.0) as i64;
    let mut weights: Vec<f64> = (-half..=half)
        .map(|i| (-(i as f64).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights.into_iter().map(|w| w as f32).collect()
}

/// Separable Gaussian blur with clamp-to-edge sampling.
pub fn gaussian_blur(plane: &FramePlane, sigma: f64) -> FramePlane {
    let (w, h) = plane.dimensions();
    let kernel = gaussian_kernel(sigma);
    let half = (kernel.len() / 2) as i64;

    let mut horizontal = FramePlane::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - half).clamp(0, w as i64 - 1) as u32;
                acc += weight * plane.get_pixel(sx, y)[0];
            }
            horizontal.get_pixel_mut(x, y)[0] = acc;
        }
    }

    let mut out = FramePlane::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - half).clamp(0, h as i64 - 1) as u32;
                acc += weight * horizontal.get_pixel(x, sy)[0];
            }
            out.get_pixel_mut(x, y)[0] = acc;
        }
    }
    out
}

/// Scale-normalized Laplacian-of-Gaussian response: `-σ² ∇²(G_σ ∗ I)`.
///
/// Border pixels are left at zero; the maxima scan skips them anyway.
pub fn log_response(plane: &FramePlane, sigma: f64) -> FramePlane {
    let (w, h) = plane.dimensions();
    let blurred = gaussian_blur(plane, sigma);
    let mut out = FramePlane::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }
    let norm = (sigma * sigma) as f32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = blurred.get_pixel(x, y)[0];
            let lap = blurred.get_pixel(x - 1, y)[0]
                + blurred.get_pixel(x + 1, y)[0]
                + blurred.get_pixel(x, y - 1)[0]
                + blurred.get_pixel(x, y + 1)[0]
                - 4.0 * c;
            out.get_pixel_mut(x, y)[0] = -norm * lap;
        }
    }
    out
}

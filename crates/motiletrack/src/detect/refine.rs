//! Sub-pixel localization by quadratic interpolation of the LoG response.

use nalgebra::{Matrix2, Vector2};

use crate::stack::FramePlane;

/// Sub-pixel offset and interpolated response value at a discrete maximum.
#[derive(Debug, Clone, Copy)]
pub struct Refined {
    /// Offset from the integer maximum along x, in pixels, within ±0.5.
    pub dx: f64,
    /// Offset from the integer maximum along y, in pixels, within ±0.5.
    pub dy: f64,
    /// Interpolated response at the refined location.
    pub value: f64,
}

/// Fit a 2-D quadratic to the 3×3 response neighborhood of `(x, y)` and take
/// one Newton step toward its apex.
///
/// Falls back to the discrete location when the Hessian is singular or the
/// step leaves the pixel (both indicate the quadratic model does not hold);
/// otherwise each offset component is clamped to ±0.5.
///
/// `(x, y)` must be an interior pixel.
pub fn quadratic_refine(response: &FramePlane, x: u32, y: u32) -> Refined {
    let at = |dx: i64, dy: i64| -> f64 {
        response.get_pixel((x as i64 + dx) as u32, (y as i64 + dy) as u32)[0] as f64
    };

    let center = at(0, 0);
    let gx = 0.5 * (at(1, 0) - at(-1, 0));
    let gy = 0.5 * (at(0, 1) - at(0, -1));
    let hxx = at(1, 0) - 2.0 * center + at(-1, 0);
    let hyy = at(0, 1) - 2.0 * center + at(0, -1);
    let hxy = 0.25 * (at(1, 1) - at(-1, 1) - at(1, -1) + at(-1, -1));

    let hessian = Matrix2::new(hxx, hxy, hxy, hyy);
    let gradient = Vector2::new(gx, gy);

    let fallback = Refined {
        dx: 0.0,
        dy: 0.0,
        value: center,
    };

    let Some(inv) = hessian.try_inverse() else {
        return fallback;
    };
    let step = -inv * gradient;
    if !(step.x.is_finite() && step.y.is_finite()) || step.x.abs() > 1.0 || step.y.abs() > 1.0 {
        return fallback;
    }

    let dx = step.x.clamp(-0.5, 0.5);
    let dy = step.y.clamp(-0.5, 0.5);
    Refined {
        dx,
        dy,
        value: center + 0.5 * (gx * dx + gy * dy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_util::blank_plane;
    use approx::assert_abs_diff_eq;

    /// Sample an analytic paraboloid with apex at (cx, cy).
    fn paraboloid_plane(cx: f64, cy: f64) -> FramePlane {
        let mut plane = blank_plane(7, 7);
        for y in 0..7u32 {
            for x in 0..7u32 {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                plane.get_pixel_mut(x, y)[0] = (10.0 - 0.5 * (dx * dx + dy * dy)) as f32;
            }
        }
        plane
    }

    #[test]
    fn recovers_fractional_apex() {
        let plane = paraboloid_plane(3.3, 2.8);
        let refined = quadratic_refine(&plane, 3, 3);
        assert_abs_diff_eq!(refined.dx, 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(refined.dy, -0.2, epsilon = 1e-6);
        assert!(refined.value > plane.get_pixel(3, 3)[0] as f64 - 1e-9);
    }

    #[test]
    fn integer_apex_stays_put() {
        let plane = paraboloid_plane(3.0, 3.0);
        let refined = quadratic_refine(&plane, 3, 3);
        assert_abs_diff_eq!(refined.dx, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(refined.dy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_neighborhood_falls_back() {
        let plane = blank_plane(5, 5);
        let refined = quadratic_refine(&plane, 2, 2);
        assert_eq!(refined.dx, 0.0);
        assert_eq!(refined.dy, 0.0);
    }
}

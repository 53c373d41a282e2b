//! Frame sequence model.
//!
//! A [`FrameStack`] is the input contract of the pipeline: an ordered list of
//! single-channel f32 intensity planes plus the physical calibration needed to
//! express positions in micrometers and times in seconds. The core never
//! decodes image file formats; the I/O collaborator (CLI or caller) builds the
//! stack.

use image::{ImageBuffer, Luma};

use crate::error::TrackingError;

/// Single-channel floating-point intensity plane.
pub type FramePlane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Ordered sequence of 2-D intensity frames with physical calibration.
///
/// Frame index is the 0-based time coordinate; multiply by
/// `frame_interval_s` to get seconds. Pixel coordinates multiply by
/// `pixel_size_um` to get micrometers.
#[derive(Debug, Clone)]
pub struct FrameStack {
    planes: Vec<FramePlane>,
    /// Physical pixel size in µm/pixel.
    pub pixel_size_um: f64,
    /// Time between consecutive frames in s/frame.
    pub frame_interval_s: f64,
}

impl FrameStack {
    /// Build a stack from pre-decoded planes.
    ///
    /// Calibration values must be positive and finite; this is a caller
    /// contract and violations surface as [`TrackingError::InvalidFrame`]
    /// from [`FrameStack::validate`].
    pub fn new(planes: Vec<FramePlane>, pixel_size_um: f64, frame_interval_s: f64) -> Self {
        Self {
            planes,
            pixel_size_um,
            frame_interval_s,
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// True when the stack holds no frames.
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Borrow the plane for one frame.
    pub fn plane(&self, frame: usize) -> &FramePlane {
        &self.planes[frame]
    }

    /// Borrow all planes in frame order.
    pub fn planes(&self) -> &[FramePlane] {
        &self.planes
    }

    /// Check the caller contract: every plane non-empty, all planes the same
    /// size, every pixel finite, calibration positive and finite.
    pub fn validate(&self) -> Result<(), TrackingError> {
        if !(self.pixel_size_um.is_finite() && self.pixel_size_um > 0.0) {
            return Err(TrackingError::InvalidFrame {
                frame: 0,
                reason: format!("pixel size {} is not positive finite", self.pixel_size_um),
            });
        }
        if !(self.frame_interval_s.is_finite() && self.frame_interval_s > 0.0) {
            return Err(TrackingError::InvalidFrame {
                frame: 0,
                reason: format!(
                    "frame interval {} is not positive finite",
                    self.frame_interval_s
                ),
            });
        }
        let dims = self.planes.first().map(|p| p.dimensions());
        for (idx, plane) in self.planes.iter().enumerate() {
            let (w, h) = plane.dimensions();
            if w == 0 || h == 0 {
                return Err(TrackingError::InvalidFrame {
                    frame: idx,
                    reason: format!("empty plane ({}x{})", w, h),
                });
            }
            if Some((w, h)) != dims {
                return Err(TrackingError::InvalidFrame {
                    frame: idx,
                    reason: format!(
                        "plane size {}x{} differs from frame 0 ({:?})",
                        w, h, dims
                    ),
                });
            }
            if let Some(pos) = plane.as_raw().iter().position(|v| !v.is_finite()) {
                return Err(TrackingError::InvalidFrame {
                    frame: idx,
                    reason: format!("non-finite pixel at linear index {}", pos),
                });
            }
        }
        Ok(())
    }

    /// Time of a frame in seconds.
    pub fn frame_time_s(&self, frame: usize) -> f64 {
        frame as f64 * self.frame_interval_s
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Build a zeroed plane of the given size.
    pub fn blank_plane(width: u32, height: u32) -> FramePlane {
        FramePlane::new(width, height)
    }

    /// Add an isotropic Gaussian blob to a plane.
    pub fn add_gaussian(plane: &mut FramePlane, cx: f64, cy: f64, sigma: f64, amplitude: f64) {
        let (w, h) = plane.dimensions();
        for y in 0..h {
            for x in 0..w {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                let v = amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                let p = plane.get_pixel_mut(x, y);
                p[0] += v as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::blank_plane;
    use super::*;

    #[test]
    fn validate_accepts_well_formed_stack() {
        let stack = FrameStack::new(vec![blank_plane(8, 8), blank_plane(8, 8)], 0.5, 0.1);
        assert!(stack.validate().is_ok());
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn validate_rejects_non_finite_pixels() {
        let mut plane = blank_plane(4, 4);
        plane.get_pixel_mut(1, 2)[0] = f32::NAN;
        let stack = FrameStack::new(vec![blank_plane(4, 4), plane], 1.0, 1.0);
        match stack.validate() {
            Err(TrackingError::InvalidFrame { frame, .. }) => assert_eq!(frame, 1),
            other => panic!("expected InvalidFrame, got {:?}", other.err()),
        }
    }

    #[test]
    fn validate_rejects_mismatched_dimensions() {
        let stack = FrameStack::new(vec![blank_plane(4, 4), blank_plane(5, 4)], 1.0, 1.0);
        assert!(matches!(
            stack.validate(),
            Err(TrackingError::InvalidFrame { frame: 1, .. })
        ));
    }

    #[test]
    fn frame_time_uses_interval() {
        let stack = FrameStack::new(vec![blank_plane(2, 2); 5], 1.0, 0.25);
        assert_eq!(stack.frame_time_s(4), 1.0);
    }
}

//! Tracking configuration.
//!
//! A [`TrackingConfig`] is built once per batch run and passed by shared
//! reference into every component; nothing mutates it during processing.
//! Configurations can be loaded from Java-style `.properties` files
//! (`KEY=value` lines, `#`/`!` comments), the format the acquisition side
//! already produces.

use std::collections::HashMap;
use std::path::Path;

use crate::error::TrackingError;

/// Parameter bundle governing detection, linking, filtering and
/// classification.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackingConfig {
    /// Expected object radius in µm; sets the LoG scale.
    pub detector_radius: f64,
    /// Quality threshold: candidates with refined quality below this are
    /// discarded, on top of local-maxima pruning.
    pub detector_threshold: f64,
    /// Apply a 3×3 median filter to each frame before detection.
    pub detector_median_filter: bool,
    /// Local-mean background subtraction radius in pixels; 0 disables the
    /// step.
    pub background_radius_px: u32,
    /// Maximum spot-to-spot distance (µm) for frame-to-frame linking.
    pub tracker_linking_max_distance: f64,
    /// Maximum endpoint distance (µm) when closing temporal gaps.
    pub tracker_gap_closing_max_distance: f64,
    /// Maximum temporal gap (frames) a track may bridge; 0 disables gap
    /// closing.
    pub tracker_max_frame_gap: u32,
    /// Minimum track duration in seconds; shorter tracks are removed.
    pub track_duration_min: f64,
    /// Mean-speed threshold (µm/s) for the MOTILE label.
    pub min_mean_speed: f64,
    /// Straight-line speed threshold (µm/s); recorded with the run but not
    /// used by the classifier.
    pub min_straight_speed: f64,
    /// Linearity threshold; recorded with the run but not used by the
    /// classifier.
    pub min_linearity: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detector_radius: 0.31,
            detector_threshold: 30.0,
            detector_median_filter: true,
            background_radius_px: 0,
            tracker_linking_max_distance: 1.0,
            tracker_gap_closing_max_distance: 1.0,
            tracker_max_frame_gap: 4,
            track_duration_min: 8.0,
            min_mean_speed: 5.0,
            min_straight_speed: 5.0,
            min_linearity: 0.1,
        }
    }
}

impl TrackingConfig {
    /// Load a configuration from a `.properties` file.
    ///
    /// Recognized keys are `DETECTOR_RADIUS`, `DETECTOR_THRESHOLD`,
    /// `DETECTOR_MEDIAN_FILTER`, `BACKGROUND_SUBTRACTION_RADIUS`,
    /// `TRACKER_LINKING_MAX_DISTANCE`, `TRACKER_GAP_CLOSING_MAX_DISTANCE`,
    /// `TRACKER_MAX_FRAME_GAP`, `TRACK_DURATION_MIN`, `MIN_MEAN_SPEED`,
    /// `MIN_STRAIGHT_SPEED`, `MIN_LINEARITY`. Absent keys keep their
    /// defaults; a present but unparseable value is a
    /// [`TrackingError::Configuration`]; unrecognized keys are warned about
    /// and skipped.
    pub fn from_properties_file(path: &Path) -> Result<Self, TrackingError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_properties_str(&text)
    }

    /// Parse a configuration from `.properties` text. See
    /// [`TrackingConfig::from_properties_file`].
    pub fn from_properties_str(text: &str) -> Result<Self, TrackingError> {
        let mut entries: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    entries.insert(key.trim(), value.trim());
                }
                None => {
                    return Err(TrackingError::Configuration(format!(
                        "malformed properties line: {:?}",
                        line
                    )))
                }
            }
        }

        let mut config = Self::default();
        for (key, value) in entries {
            match key {
                "DETECTOR_RADIUS" => config.detector_radius = parse_f64(key, value)?,
                "DETECTOR_THRESHOLD" => config.detector_threshold = parse_f64(key, value)?,
                "DETECTOR_MEDIAN_FILTER" => {
                    config.detector_median_filter = parse_bool(key, value)?
                }
                "BACKGROUND_SUBTRACTION_RADIUS" => {
                    config.background_radius_px = parse_u32(key, value)?
                }
                "TRACKER_LINKING_MAX_DISTANCE" => {
                    config.tracker_linking_max_distance = parse_f64(key, value)?
                }
                "TRACKER_GAP_CLOSING_MAX_DISTANCE" => {
                    config.tracker_gap_closing_max_distance = parse_f64(key, value)?
                }
                "TRACKER_MAX_FRAME_GAP" => config.tracker_max_frame_gap = parse_u32(key, value)?,
                "TRACK_DURATION_MIN" => config.track_duration_min = parse_f64(key, value)?,
                "MIN_MEAN_SPEED" => config.min_mean_speed = parse_f64(key, value)?,
                "MIN_STRAIGHT_SPEED" => config.min_straight_speed = parse_f64(key, value)?,
                "MIN_LINEARITY" => config.min_linearity = parse_f64(key, value)?,
                other => {
                    tracing::warn!("ignoring unrecognized configuration key {:?}", other);
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot drive a meaningful run.
    pub fn validate(&self) -> Result<(), TrackingError> {
        if !(self.detector_radius.is_finite() && self.detector_radius > 0.0) {
            return Err(TrackingError::Configuration(format!(
                "DETECTOR_RADIUS must be positive, got {}",
                self.detector_radius
            )));
        }
        if !self.detector_threshold.is_finite() {
            return Err(TrackingError::Configuration(
                "DETECTOR_THRESHOLD must be finite".into(),
            ));
        }
        for (name, v) in [
            (
                "TRACKER_LINKING_MAX_DISTANCE",
                self.tracker_linking_max_distance,
            ),
            (
                "TRACKER_GAP_CLOSING_MAX_DISTANCE",
                self.tracker_gap_closing_max_distance,
            ),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(TrackingError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, v
                )));
            }
        }
        if !(self.track_duration_min.is_finite() && self.track_duration_min >= 0.0) {
            return Err(TrackingError::Configuration(format!(
                "TRACK_DURATION_MIN must be non-negative, got {}",
                self.track_duration_min
            )));
        }
        Ok(())
    }

    /// Echo the effective parameters at info level, once per batch.
    pub fn log_config(&self) {
        tracing::info!("----- tracking config");
        tracing::info!("detector radius: {} um", self.detector_radius);
        tracing::info!("detector quality threshold: {}", self.detector_threshold);
        tracing::info!("detector median filter: {}", self.detector_median_filter);
        tracing::info!(
            "background subtraction radius: {} px",
            self.background_radius_px
        );
        tracing::info!(
            "max linking distance: {} um",
            self.tracker_linking_max_distance
        );
        tracing::info!(
            "max gap closing distance: {} um",
            self.tracker_gap_closing_max_distance
        );
        tracing::info!("max frame gap: {}", self.tracker_max_frame_gap);
        tracing::info!("min track duration: {} s", self.track_duration_min);
        tracing::info!("min mean speed: {} um/s", self.min_mean_speed);
        tracing::info!("----- end of config");
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, TrackingError> {
    value.parse::<f64>().map_err(|_| {
        TrackingError::Configuration(format!("{} has unparseable value {:?}", key, value))
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, TrackingError> {
    value.parse::<u32>().map_err(|_| {
        TrackingError::Configuration(format!("{} has unparseable value {:?}", key, value))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TrackingError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(TrackingError::Configuration(format!(
            "{} has unparseable value {:?} (expected true/false)",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = TrackingConfig::default();
        assert_eq!(config.detector_radius, 0.31);
        assert_eq!(config.detector_threshold, 30.0);
        assert!(config.detector_median_filter);
        assert_eq!(config.tracker_linking_max_distance, 1.0);
        assert_eq!(config.tracker_gap_closing_max_distance, 1.0);
        assert_eq!(config.tracker_max_frame_gap, 4);
        assert_eq!(config.track_duration_min, 8.0);
        assert_eq!(config.min_mean_speed, 5.0);
    }

    #[test]
    fn properties_override_defaults_and_keep_rest() {
        let text = "\
# acquisition A
DETECTOR_RADIUS=3.5
TRACKER_MAX_FRAME_GAP=5
DETECTOR_MEDIAN_FILTER=false
";
        let config = TrackingConfig::from_properties_str(text).unwrap();
        assert_eq!(config.detector_radius, 3.5);
        assert_eq!(config.tracker_max_frame_gap, 5);
        assert!(!config.detector_median_filter);
        // untouched key keeps its default
        assert_eq!(config.min_mean_speed, 5.0);
    }

    #[test]
    fn unparseable_value_is_configuration_error() {
        let err = TrackingConfig::from_properties_str("DETECTOR_RADIUS=wide\n").unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(_)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = TrackingConfig::from_properties_str("SCREENSHOT_DIR=/tmp\n").unwrap();
        assert_eq!(config, TrackingConfig::default());
    }

    #[test]
    fn non_positive_radius_rejected() {
        let err = TrackingConfig::from_properties_str("DETECTOR_RADIUS=0.0\n").unwrap_err();
        assert!(matches!(err, TrackingError::Configuration(_)));
    }
}

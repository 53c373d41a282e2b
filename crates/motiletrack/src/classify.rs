//! Track filtering and motility classification.
//!
//! Two-stage gate: the duration filter removes tracks from the output (the
//! only stage allowed to do so); the motility label annotates the survivors.
//! Labelling never removes a track, and a missing or non-numeric mean speed
//! leaves the label unset rather than guessing — "unknown" stays
//! distinguishable from "not motile".

use crate::config::TrackingConfig;
use crate::features::TrackFeatures;

/// Keep tracks whose duration meets the configured minimum.
///
/// Applied before export: it changes what exists in the table.
pub fn passes_duration_filter(features: &TrackFeatures, config: &TrackingConfig) -> bool {
    features.duration_s >= config.track_duration_min
}

/// MOTILE label: `Some(1)` when mean speed exceeds the threshold, `Some(0)`
/// when it does not, `None` when the speed is not a usable number.
pub fn motile_label(mean_speed: Option<f64>, config: &TrackingConfig) -> Option<u8> {
    let speed = mean_speed.filter(|s| s.is_finite())?;
    Some(if speed > config.min_mean_speed { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features_with(duration_s: f64, mean_speed: f64) -> TrackFeatures {
        TrackFeatures {
            number_spots: 10,
            number_gaps: 0,
            duration_s,
            displacement_um: 1.0,
            total_distance_um: 1.0,
            mean_speed,
            straight_line_speed: 1.0,
            linearity: 1.0,
            degenerate: false,
        }
    }

    #[test]
    fn duration_filter_is_inclusive_at_threshold() {
        let config = TrackingConfig {
            track_duration_min: 8.0,
            ..TrackingConfig::default()
        };
        assert!(passes_duration_filter(&features_with(8.0, 1.0), &config));
        assert!(!passes_duration_filter(&features_with(7.9, 1.0), &config));
    }

    #[test]
    fn duration_filter_is_monotone() {
        let durations = [1.0, 4.0, 8.0, 12.0, 20.0];
        let mut previous_survivors = usize::MAX;
        for min in [0.0, 5.0, 10.0, 25.0] {
            let config = TrackingConfig {
                track_duration_min: min,
                ..TrackingConfig::default()
            };
            let survivors = durations
                .iter()
                .filter(|&&d| passes_duration_filter(&features_with(d, 1.0), &config))
                .count();
            assert!(survivors <= previous_survivors);
            previous_survivors = survivors;
        }
    }

    #[test]
    fn motile_is_strict_greater_than() {
        let config = TrackingConfig {
            min_mean_speed: 5.0,
            ..TrackingConfig::default()
        };
        assert_eq!(motile_label(Some(5.1), &config), Some(1));
        assert_eq!(motile_label(Some(5.0), &config), Some(0));
        assert_eq!(motile_label(Some(0.0), &config), Some(0));
    }

    #[test]
    fn unusable_speed_leaves_label_unset() {
        let config = TrackingConfig::default();
        assert_eq!(motile_label(None, &config), None);
        assert_eq!(motile_label(Some(f64::NAN), &config), None);
        assert_eq!(motile_label(Some(f64::INFINITY), &config), None);
    }
}

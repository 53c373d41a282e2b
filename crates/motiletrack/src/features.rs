//! Kinematic summary features per track.
//!
//! Pure functions of a track's spot sequence and the stack calibration; no
//! external state. Zero-duration (single-spot) tracks use the speed-0
//! convention and carry a `degenerate` flag so downstream consumers can tell
//! "slow" from "undefined".

use crate::detect::Spot;
use crate::linking::Track;

/// Derived feature set of one track.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackFeatures {
    /// Number of spots in the track.
    pub number_spots: usize,
    /// Count of consecutive spot pairs whose frame difference exceeds 1.
    pub number_gaps: usize,
    /// Last spot time minus first spot time, seconds.
    pub duration_s: f64,
    /// Euclidean distance between first and last spot, µm.
    pub displacement_um: f64,
    /// Sum of step distances between consecutive spots, µm.
    pub total_distance_um: f64,
    /// Total distance / duration, µm/s; 0 for zero-duration tracks.
    pub mean_speed: f64,
    /// Displacement / duration, µm/s; 0 for zero-duration tracks.
    pub straight_line_speed: f64,
    /// Displacement / total distance, in [0, 1]; 0 when no distance was
    /// traveled.
    pub linearity: f64,
    /// True when duration is zero and the speed convention applied.
    pub degenerate: bool,
}

/// Compute the feature set for one track.
///
/// The track must be non-empty with strictly increasing frame indices; the
/// linker guarantees both.
pub fn compute_features(track: &Track, spots: &[Spot], frame_interval_s: f64) -> TrackFeatures {
    let members: Vec<&Spot> = track.spots.iter().map(|&i| &spots[i]).collect();
    let first = members[0];
    let last = members[members.len() - 1];

    let number_spots = members.len();
    let number_gaps = members
        .windows(2)
        .filter(|pair| pair[1].frame - pair[0].frame > 1)
        .count();
    let duration_s = (last.frame - first.frame) as f64 * frame_interval_s;
    let displacement_um = first.distance_to(last);
    let total_distance_um: f64 = members
        .windows(2)
        .map(|pair| pair[0].distance_to(pair[1]))
        .sum();

    let degenerate = duration_s == 0.0;
    let (mean_speed, straight_line_speed) = if degenerate {
        (0.0, 0.0)
    } else {
        (total_distance_um / duration_s, displacement_um / duration_s)
    };
    let linearity = if total_distance_um == 0.0 {
        0.0
    } else {
        displacement_um / total_distance_um
    };

    TrackFeatures {
        number_spots,
        number_gaps,
        duration_s,
        displacement_um,
        total_distance_um,
        mean_speed,
        straight_line_speed,
        linearity,
        degenerate,
    }
}

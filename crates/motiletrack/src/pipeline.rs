//! Single-image processing pipeline.
//!
//! Runs the full chain for one frame stack: validation, per-frame detection
//! (parallel across frames), linking, feature extraction, the duration
//! filter, and motility annotation. The output is the finished result table,
//! ready to be written by the caller.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::classify::{motile_label, passes_duration_filter};
use crate::config::TrackingConfig;
use crate::detect::detect_frame;
use crate::error::TrackingError;
use crate::features::compute_features;
use crate::linking::link_spots;
use crate::stack::FrameStack;
use crate::table::{TrackRow, TrackTable};

/// Process one validated stack into its result table.
///
/// Frames are detected independently and in parallel; everything downstream
/// of detection is deterministic in the per-frame spot sets, so the table is
/// identical run to run. An empty stack yields an empty table.
pub fn process_stack(
    stack: &FrameStack,
    config: &TrackingConfig,
) -> Result<TrackTable, TrackingError> {
    stack.validate()?;

    let per_frame: Vec<_> = stack
        .planes()
        .par_iter()
        .enumerate()
        .map(|(frame, plane)| detect_frame(plane, frame, stack.pixel_size_um, config))
        .collect();
    let total_spots: usize = per_frame.iter().map(Vec::len).sum();
    debug!(
        frames = stack.len(),
        spots = total_spots,
        "detection complete"
    );

    let linked = link_spots(per_frame, config);
    debug!(tracks = linked.tracks.len(), "linking complete");

    let mut rows = Vec::new();
    for track in &linked.tracks {
        let features = compute_features(track, &linked.spots, stack.frame_interval_s);
        if !passes_duration_filter(&features, config) {
            continue;
        }
        let mean_speed = (!features.degenerate).then_some(features.mean_speed);
        rows.push(TrackRow {
            label: format!("Track_{}", track.id),
            track_id: track.id,
            number_spots: features.number_spots,
            number_gaps: features.number_gaps,
            track_duration: features.duration_s,
            track_displacement: features.displacement_um,
            track_mean_speed: features.mean_speed,
            total_distance_traveled: features.total_distance_um,
            mean_straight_line_speed: features.straight_line_speed,
            linearity_of_forward_progression: features.linearity,
            motile: motile_label(mean_speed, config),
        });
    }
    info!(
        tracks = linked.tracks.len(),
        exported = rows.len(),
        "stack processed"
    );

    Ok(TrackTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_util::{add_gaussian, blank_plane};
    use crate::stack::FramePlane;
    use approx::assert_abs_diff_eq;

    /// σ=2 px blobs at 1 µm/px are scale-matched by radius = σ·√2.
    fn test_config() -> TrackingConfig {
        TrackingConfig {
            detector_radius: 2.0 * std::f64::consts::SQRT_2,
            detector_threshold: 10.0,
            detector_median_filter: false,
            background_radius_px: 0,
            tracker_linking_max_distance: 4.0,
            tracker_gap_closing_max_distance: 6.0,
            tracker_max_frame_gap: 4,
            track_duration_min: 0.0,
            min_mean_speed: 1.0,
            ..TrackingConfig::default()
        }
    }

    fn plane_with_blob(x: f64, y: f64) -> FramePlane {
        let mut plane = blank_plane(64, 64);
        add_gaussian(&mut plane, x, y, 2.0, 100.0);
        plane
    }

    #[test]
    fn empty_stack_produces_empty_table() {
        let stack = FrameStack::new(Vec::new(), 1.0, 1.0);
        let table = process_stack(&stack, &test_config()).unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn invalid_stack_is_rejected() {
        let stack = FrameStack::new(vec![blank_plane(8, 8)], 0.0, 1.0);
        assert!(matches!(
            process_stack(&stack, &test_config()),
            Err(TrackingError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn linear_mover_yields_one_motile_track() {
        // one blob moving 2 px per frame, 1 µm/px, 1 s/frame → 2 µm/s
        let planes: Vec<FramePlane> = (0..8)
            .map(|t| plane_with_blob(12.0 + 2.0 * t as f64, 30.0))
            .collect();
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let table = process_stack(&stack, &test_config()).unwrap();
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.label, "Track_0");
        assert_eq!(row.number_spots, 8);
        assert_eq!(row.number_gaps, 0);
        assert_abs_diff_eq!(row.track_duration, 7.0);
        assert_abs_diff_eq!(row.track_mean_speed, 2.0, epsilon = 0.15);
        assert_abs_diff_eq!(row.mean_straight_line_speed, 2.0, epsilon = 0.15);
        assert!(row.linearity_of_forward_progression > 0.95);
        assert_eq!(row.motile, Some(1));
    }

    #[test]
    fn slow_mover_is_labelled_non_motile() {
        let planes: Vec<FramePlane> = (0..6)
            .map(|t| plane_with_blob(20.0 + 0.3 * t as f64, 20.0))
            .collect();
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let table = process_stack(&stack, &test_config()).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].motile, Some(0));
    }

    #[test]
    fn missing_frame_counts_one_gap() {
        // blob present in frames 0,1,3,4
        let positions = [(0usize, 10.0), (1, 12.0), (3, 16.0), (4, 18.0)];
        let mut planes = vec![blank_plane(64, 64); 5];
        for &(frame, x) in &positions {
            planes[frame] = plane_with_blob(x, 30.0);
        }
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let table = process_stack(&stack, &test_config()).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].number_spots, 4);
        assert_eq!(table.rows[0].number_gaps, 1);
        assert_abs_diff_eq!(table.rows[0].track_duration, 4.0);
    }

    #[test]
    fn duration_filter_drops_short_tracks() {
        // long mover plus a blob present in a single frame
        let mut planes: Vec<FramePlane> = (0..8)
            .map(|t| plane_with_blob(12.0 + 2.0 * t as f64, 16.0))
            .collect();
        add_gaussian(&mut planes[3], 50.0, 50.0, 2.0, 100.0);
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let mut config = test_config();
        config.track_duration_min = 3.0;
        let table = process_stack(&stack, &config).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].number_spots, 8);
    }

    #[test]
    fn two_distant_movers_yield_two_tracks() {
        let planes: Vec<FramePlane> = (0..6)
            .map(|t| {
                let mut plane = blank_plane(64, 64);
                add_gaussian(&mut plane, 10.0 + 2.0 * t as f64, 12.0, 2.0, 100.0);
                add_gaussian(&mut plane, 10.0 + 2.0 * t as f64, 50.0, 2.0, 100.0);
                plane
            })
            .collect();
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let table = process_stack(&stack, &test_config()).unwrap();
        assert_eq!(table.rows.len(), 2);
        let ids: Vec<u64> = table.rows.iter().map(|r| r.track_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let planes: Vec<FramePlane> = (0..5)
            .map(|t| plane_with_blob(15.0 + 2.5 * t as f64, 25.0))
            .collect();
        let stack = FrameStack::new(planes, 1.0, 1.0);
        let a = process_stack(&stack, &test_config()).unwrap();
        let b = process_stack(&stack, &test_config()).unwrap();
        assert_eq!(a, b);
    }
}

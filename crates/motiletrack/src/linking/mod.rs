//! Particle linking: per-frame spot sets → track partition.
//!
//! Two-phase linear assignment after Jaqaman et al.:
//!
//! 1. **Frame-to-frame**: for each adjacent frame pair, a bipartite
//!    minimum-cost assignment over Euclidean distances, entries above
//!    `tracker_linking_max_distance` forbidden. Each pass is solved
//!    independently and fixed before the next.
//! 2. **Gap closing**: segment tails against segment heads across temporal
//!    gaps of 1..=`tracker_max_frame_gap` frames, bounded by
//!    `tracker_gap_closing_max_distance`.
//!
//! Splitting and merging are structurally impossible: one-to-one matching
//! gives every spot at most one incoming and one outgoing edge, so tracks
//! partition the spot arena. Spots nothing links to become singleton tracks.

mod assign;

pub use assign::{solve, CostMatrix};

use crate::config::TrackingConfig;
use crate::detect::Spot;

/// Infinitesimal per-frame-gap cost: breaks exact cost ties in favor of
/// temporally closer pairs without disturbing real distance ordering.
const GAP_TIE_EPSILON: f64 = 1e-9;

/// A maximal chain of linked spots, ordered by strictly increasing frame
/// index. Spots are arena indices into [`LinkResult::spots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Stable identifier, unique within one image.
    pub id: u64,
    /// Arena indices of member spots, sorted by frame.
    pub spots: Vec<usize>,
}

/// Output of linking: the spot arena and its partition into tracks.
#[derive(Debug, Clone)]
pub struct LinkResult {
    /// All detected spots of the image, flattened in frame order.
    pub spots: Vec<Spot>,
    /// Partition of the arena; every spot belongs to exactly one track.
    pub tracks: Vec<Track>,
}

/// Link per-frame spot sets into tracks.
///
/// `frames[t]` holds the spots detected in frame `t`. Frames with no spots
/// simply contribute no edges; an empty input produces zero tracks.
pub fn link_spots(frames: Vec<Vec<Spot>>, config: &TrackingConfig) -> LinkResult {
    // Flatten into the arena, remembering per-frame index ranges.
    let mut spots: Vec<Spot> = Vec::new();
    let mut by_frame: Vec<Vec<usize>> = Vec::with_capacity(frames.len());
    for frame_spots in frames {
        let start = spots.len();
        spots.extend(frame_spots);
        by_frame.push((start..spots.len()).collect());
    }

    let mut next: Vec<Option<usize>> = vec![None; spots.len()];
    let mut prev: Vec<Option<usize>> = vec![None; spots.len()];

    // Phase 1: frame-to-frame linking.
    for t in 0..by_frame.len().saturating_sub(1) {
        let sources = &by_frame[t];
        let targets = &by_frame[t + 1];
        if sources.is_empty() || targets.is_empty() {
            continue;
        }
        let mut costs = CostMatrix::new(sources.len(), targets.len());
        for (r, &src) in sources.iter().enumerate() {
            for (c, &dst) in targets.iter().enumerate() {
                let d = spots[src].distance_to(&spots[dst]);
                if d <= config.tracker_linking_max_distance {
                    costs.set(r, c, d);
                }
            }
        }
        for (r, col) in solve(&costs).into_iter().enumerate() {
            if let Some(c) = col {
                let (src, dst) = (sources[r], targets[c]);
                next[src] = Some(dst);
                prev[dst] = Some(src);
            }
        }
    }

    // Collect segments: chains started by spots with no predecessor.
    let mut segments: Vec<Vec<usize>> = Vec::new();
    for head in 0..spots.len() {
        if prev[head].is_some() {
            continue;
        }
        let mut chain = vec![head];
        let mut cursor = head;
        while let Some(n) = next[cursor] {
            chain.push(n);
            cursor = n;
        }
        segments.push(chain);
    }

    // Phase 2: gap closing over segment endpoints.
    let successor = close_gaps(&spots, &segments, config);

    // Merge chains of segments into tracks.
    let mut has_incoming = vec![false; segments.len()];
    for succ in successor.iter().flatten() {
        has_incoming[*succ] = true;
    }
    let mut tracks = Vec::new();
    for (seg_idx, incoming) in has_incoming.iter().enumerate() {
        if *incoming {
            continue;
        }
        let mut member_spots = Vec::new();
        let mut cursor = Some(seg_idx);
        while let Some(s) = cursor {
            member_spots.extend_from_slice(&segments[s]);
            cursor = successor[s];
        }
        tracks.push(Track {
            id: tracks.len() as u64,
            spots: member_spots,
        });
    }

    LinkResult { spots, tracks }
}

/// Solve the gap-closing assignment: rows are segment tails, columns are
/// segment heads. Returns, per segment, the index of the segment appended
/// after it, if any.
fn close_gaps(
    spots: &[Spot],
    segments: &[Vec<usize>],
    config: &TrackingConfig,
) -> Vec<Option<usize>> {
    let n = segments.len();
    if n == 0 || config.tracker_max_frame_gap == 0 {
        return vec![None; n];
    }

    let mut costs = CostMatrix::new(n, n);
    let mut any_feasible = false;
    for (r, tail_seg) in segments.iter().enumerate() {
        let Some(&tail_idx) = tail_seg.last() else {
            continue;
        };
        let tail = &spots[tail_idx];
        for (c, head_seg) in segments.iter().enumerate() {
            if r == c {
                continue;
            }
            let head = &spots[head_seg[0]];
            if head.frame <= tail.frame {
                continue;
            }
            let gap = head.frame - tail.frame;
            if gap > config.tracker_max_frame_gap as usize {
                continue;
            }
            let d = tail.distance_to(head);
            if d <= config.tracker_gap_closing_max_distance {
                costs.set(r, c, d + GAP_TIE_EPSILON * gap as f64);
                any_feasible = true;
            }
        }
    }
    if !any_feasible {
        return vec![None; n];
    }
    solve(&costs)
}

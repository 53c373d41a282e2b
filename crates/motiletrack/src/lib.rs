//! motiletrack — automated motility analysis for time-lapse microscopy.
//!
//! Turns directories of single-channel image stacks into per-track motility
//! tables. The pipeline stages are:
//!
//! 1. **Detect** – scale-normalized LoG blob detection with quadratic
//!    sub-pixel refinement, per frame.
//! 2. **Link** – two-phase linear-assignment tracking: frame-to-frame
//!    linking, then gap closing across short temporal gaps.
//! 3. **Features** – per-track kinematics (duration, displacement, speeds,
//!    linearity).
//! 4. **Classify** – duration filter plus a mean-speed motility label.
//! 5. **Export** – one `tracks_<name>.csv` per stack, written atomically;
//!    existing tables double as resume markers for interrupted batches.
//!
//! # Public API
//! [`BatchRunner`] over a [`StackSource`] is the primary entry point;
//! [`process_stack`] runs a single stack. All tunables live in
//! [`TrackingConfig`].
//!
//! All positions are micrometers and all times seconds; conversion from
//! pixels and frames happens once, at detection, using the calibration
//! carried by [`FrameStack`].

mod batch;
mod classify;
mod config;
mod detect;
mod error;
mod features;
mod linking;
mod pipeline;
mod stack;
mod table;

pub use batch::{BatchReport, BatchRunner, CancelToken, ImageState, StackSource};
pub use classify::{motile_label, passes_duration_filter};
pub use config::TrackingConfig;
pub use detect::{detect_frame, Spot};
pub use error::TrackingError;
pub use features::{compute_features, TrackFeatures};
pub use linking::{link_spots, LinkResult, Track};
pub use pipeline::process_stack;
pub use stack::{FramePlane, FrameStack};
pub use table::{TrackRow, TrackTable};

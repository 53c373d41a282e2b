//! Error taxonomy for the tracking pipeline.
//!
//! Errors local to one image's processing (`InvalidFrame`, `OutputWrite`) are
//! contained by the batch orchestrator and converted into a `Failed` state for
//! that image. `Configuration` and `Precondition` errors abort the whole run
//! before or at startup. An infeasible linking assignment is deliberately not
//! an error: affected spots remain as singleton tracks.

use std::path::PathBuf;

/// Errors that can occur while processing a batch of image stacks.
#[derive(Debug)]
pub enum TrackingError {
    /// Malformed pixel data reached the detector (empty plane, mismatched
    /// dimensions, non-finite values). Fatal for that image only.
    InvalidFrame {
        /// Frame index within the stack.
        frame: usize,
        /// Human-readable description of the violation.
        reason: String,
    },
    /// Missing or unparseable configuration value. Fatal at startup.
    Configuration(String),
    /// Failure to persist a result table. Fatal for that image only.
    OutputWrite {
        /// Path of the file being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The required output location could not be prepared. Fatal for the
    /// whole batch.
    Precondition(String),
}

impl std::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFrame { frame, reason } => {
                write!(f, "invalid frame {}: {}", frame, reason)
            }
            Self::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Self::OutputWrite { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::Precondition(msg) => write!(f, "precondition failed: {}", msg),
        }
    }
}

impl std::error::Error for TrackingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OutputWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl TrackingError {
    /// True when the error must abort the whole batch rather than a single
    /// image.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Precondition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_frame() {
        let err = TrackingError::InvalidFrame {
            frame: 3,
            reason: "non-finite pixel".into(),
        };
        assert_eq!(err.to_string(), "invalid frame 3: non-finite pixel");
    }

    #[test]
    fn batch_fatality_split() {
        assert!(TrackingError::Configuration("x".into()).is_fatal_for_batch());
        assert!(TrackingError::Precondition("x".into()).is_fatal_for_batch());
        assert!(!TrackingError::InvalidFrame {
            frame: 0,
            reason: String::new()
        }
        .is_fatal_for_batch());
    }
}

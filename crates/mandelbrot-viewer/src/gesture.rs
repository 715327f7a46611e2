//! Platform-neutral gesture events.
//!
//! Every factor carried here is incremental: a pinch reports the scale change since its
//! previous event, a rotate the angle change, a pan the translation change. Consumers never
//! need to reset a recognizer back to neutral.

use crate::viewport::ViewportState;
use planemap::{Point, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
}

/// Drag, in view points (not device pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanEvent {
    pub phase: GesturePhase,
    pub translation: Vector,
}

/// Pinch around `location`; `factor > 1` spreads the fingers and zooms in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchEvent {
    pub phase: GesturePhase,
    pub factor: f64,
    pub location: Point,
}

/// Two-finger twist around `location`, radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateEvent {
    pub phase: GesturePhase,
    pub angle: f64,
    pub location: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Pan(PanEvent),
    Pinch(PinchEvent),
    Rotate(RotateEvent),
    /// A complete zoom by `factor` (wheel notch), outside any pinch in progress.
    ZoomStep { factor: f64, location: Point },
    /// A complete rotation by `angle` radians (key press), outside any twist in progress.
    RotateStep { angle: f64, location: Point },
    DoubleTap,
}

/// Why a gesture was refused without touching the view.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GestureError {
    #[error("gesture carries a non-finite value")]
    NonFinite,
    #[error("pinch factor must be positive, got {0}")]
    NonPositiveFactor(f64),
}

/// What one event of a continuous gesture asks of the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TrackStep {
    /// Apply the event's delta.
    Apply,
    /// Put back the state captured when the gesture began.
    Restore(ViewportState),
    /// Cancelled with nothing to roll back.
    Discard,
}

/// Remembers the view state at the start of one continuous gesture.
#[derive(Debug, Default, Clone, Copy)]
pub struct GestureTrack {
    start: Option<ViewportState>,
}

impl GestureTrack {
    pub fn begin(&mut self, state: ViewportState) {
        self.start = Some(state);
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// Ends the gesture, returning the state captured at `begin`.
    pub fn finish(&mut self) -> Option<ViewportState> {
        self.start.take()
    }

    /// Bookkeeping shared by every continuous gesture.
    pub(crate) fn observe(&mut self, phase: GesturePhase, current: ViewportState) -> TrackStep {
        match phase {
            GesturePhase::Began => self.begin(current),
            GesturePhase::Changed => {
                if !self.is_active() {
                    self.begin(current);
                }
            }
            GesturePhase::Ended => {
                self.finish();
            }
            GesturePhase::Cancelled => {
                return match self.finish() {
                    Some(start) => TrackStep::Restore(start),
                    None => TrackStep::Discard,
                };
            }
        }
        TrackStep::Apply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planemap::DVec2;

    #[test]
    fn track_restores_start_only_on_cancel() {
        let start = ViewportState::new(DVec2::new(1.0, 2.0), 1e-3, 0.0);
        let later = ViewportState::new(DVec2::new(5.0, 2.0), 1e-3, 0.0);

        let mut track = GestureTrack::default();
        assert_eq!(track.observe(GesturePhase::Began, start), TrackStep::Apply);
        assert_eq!(track.observe(GesturePhase::Changed, later), TrackStep::Apply);
        assert!(track.is_active());
        assert_eq!(
            track.observe(GesturePhase::Cancelled, later),
            TrackStep::Restore(start)
        );
        assert!(!track.is_active());

        track.observe(GesturePhase::Began, start);
        assert_eq!(track.observe(GesturePhase::Ended, later), TrackStep::Apply);
        assert_eq!(track.observe(GesturePhase::Cancelled, later), TrackStep::Discard);
    }

    #[test]
    fn cancel_without_start_is_discarded() {
        let s = ViewportState::new(DVec2::ZERO, 1e-3, 0.0);
        let mut track = GestureTrack::default();
        assert_eq!(track.observe(GesturePhase::Cancelled, s), TrackStep::Discard);
        assert!(!track.is_active());
    }

    #[test]
    fn changed_without_began_starts_tracking() {
        let s = ViewportState::new(DVec2::ZERO, 1e-3, 0.0);
        let mut track = GestureTrack::default();
        track.observe(GesturePhase::Changed, s);
        assert_eq!(track.finish(), Some(s));
    }
}

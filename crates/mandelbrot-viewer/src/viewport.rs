//! Screen-to-plane view state and the gesture operations that mutate it.
//!
//! The derived map takes a drawable pixel to a point of the complex plane:
//! `map(p) = shift + scale * rotation(theta) * (p - drawable / 2)`, so the drawable's
//! centre pixel always lands on `shift`.

use crate::gesture::{Gesture, GestureError, GestureTrack, TrackStep};
use parking_lot::Mutex;
use planemap::{AffineMap, DVec2, Point, TransformError, Vector};
use std::sync::Arc;

/// Finest plane units per pixel; beyond this `f32` kernel arithmetic is pure noise.
pub const MIN_SCALE: f64 = 1e-8;
/// Coarsest plane units per pixel.
pub const MAX_SCALE: f64 = 1e-2;

/// Plane point shown at the drawable centre after a reset.
pub const HOME_CENTER: Point = DVec2::new(-0.6, 0.0);
/// Plane extent that a reset fits inside the drawable.
pub const HOME_EXTENT: DVec2 = DVec2::new(3.0, 2.0);

/// Position, zoom and rotation of the view. `scale` is plane units per device pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub shift: Point,
    scale: f64,
    pub theta: f64,
}

impl ViewportState {
    pub fn new(shift: Point, scale: f64, theta: f64) -> Self {
        let mut state = Self {
            shift,
            scale: MAX_SCALE,
            theta,
        };
        state.set_scale(scale);
        state
    }

    /// Fits `HOME_EXTENT` into `drawable`, centred on `HOME_CENTER`, unrotated.
    pub fn home(drawable: DVec2) -> Self {
        let fit = HOME_EXTENT / drawable;
        Self::new(HOME_CENTER, fit.x.max(fit.y), 0.0)
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Stores `scale` clamped to `[MIN_SCALE, MAX_SCALE]`. NaN is ignored.
    pub fn set_scale(&mut self, scale: f64) {
        if !scale.is_nan() {
            self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        }
    }

    pub fn is_finite(&self) -> bool {
        self.shift.is_finite() && self.scale.is_finite() && self.theta.is_finite()
    }

    /// Drawable pixel -> plane map for a drawable of the given size.
    pub fn map(&self, drawable: DVec2) -> AffineMap {
        AffineMap::from_translation(-drawable / 2.0)
            .then(AffineMap::from_scale(self.scale))
            .then(AffineMap::from_rotation(self.theta))
            .translate(self.shift)
    }
}

/// How view points relate to drawable pixels, and which gestures are honoured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportOptions {
    /// Device pixels per view point.
    pub content_scale: f64,
    /// When false, rotate gestures are ignored and `theta` stays at zero.
    pub rotation: bool,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            content_scale: 1.0,
            rotation: true,
        }
    }
}

/// Owns the view state; every mutation goes through the named operations below.
///
/// The drawable size is passed in on every call and never stored, so a resize between
/// events is always picked up.
#[derive(Debug, Clone)]
pub struct Viewport {
    state: ViewportState,
    options: ViewportOptions,
    pan: GestureTrack,
    pinch: GestureTrack,
    rotate: GestureTrack,
}

impl Viewport {
    pub fn new(options: ViewportOptions, drawable: DVec2) -> Self {
        Self {
            state: ViewportState::home(drawable),
            options,
            pan: GestureTrack::default(),
            pinch: GestureTrack::default(),
            rotate: GestureTrack::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn options(&self) -> ViewportOptions {
        self.options
    }

    pub fn map(&self, drawable: DVec2) -> AffineMap {
        self.state.map(drawable)
    }

    /// Plane point under a view-space location.
    pub fn plane_point(&self, location: Point, drawable: DVec2) -> Point {
        self.map(drawable).apply(location * self.options.content_scale)
    }

    /// View-space location of a plane point.
    pub fn view_point(&self, plane: Point, drawable: DVec2) -> Result<Point, TransformError> {
        let pixel = self.map(drawable).invert()?.apply(plane);
        Ok(pixel / self.options.content_scale)
    }

    /// Moves the view so content follows a drag of `delta` view points.
    pub fn apply_pan(&mut self, delta: Vector, drawable: DVec2) -> Result<(), GestureError> {
        if !delta.is_finite() {
            return Err(GestureError::NonFinite);
        }
        let step = self
            .map(drawable)
            .apply_linear(delta * self.options.content_scale);

        let mut next = self.state;
        next.shift -= step;
        self.commit(next)
    }

    /// Zooms by `factor` around `anchor`; `factor > 1` zooms in.
    pub fn apply_zoom(
        &mut self,
        factor: f64,
        anchor: Point,
        drawable: DVec2,
    ) -> Result<(), GestureError> {
        if !factor.is_finite() || !anchor.is_finite() {
            return Err(GestureError::NonFinite);
        }
        if factor <= 0.0 {
            return Err(GestureError::NonPositiveFactor(factor));
        }
        self.keep_anchor(anchor, drawable, |s| s.set_scale(s.scale / factor))
    }

    /// Rotates content by `angle` radians around `anchor`. No-op unless rotation is enabled.
    pub fn apply_rotate(
        &mut self,
        angle: f64,
        anchor: Point,
        drawable: DVec2,
    ) -> Result<(), GestureError> {
        if !angle.is_finite() || !anchor.is_finite() {
            return Err(GestureError::NonFinite);
        }
        if !self.options.rotation {
            return Ok(());
        }
        self.keep_anchor(anchor, drawable, |s| s.theta -= angle)
    }

    pub fn reset_home(&mut self, drawable: DVec2) {
        self.state = ViewportState::home(drawable);
        log::debug!("View reset to home: {:?}", self.state);
    }

    /// Applies one gesture event, including its phase bookkeeping.
    pub fn handle(&mut self, gesture: &Gesture, drawable: DVec2) -> Result<(), GestureError> {
        match *gesture {
            Gesture::Pan(e) => match self.pan.observe(e.phase, self.state) {
                TrackStep::Apply => self.apply_pan(e.translation, drawable),
                step => self.settle(step),
            },
            Gesture::Pinch(e) => match self.pinch.observe(e.phase, self.state) {
                TrackStep::Apply => self.apply_zoom(e.factor, e.location, drawable),
                step => self.settle(step),
            },
            Gesture::Rotate(e) => {
                if !self.options.rotation {
                    return Ok(());
                }
                match self.rotate.observe(e.phase, self.state) {
                    TrackStep::Apply => self.apply_rotate(e.angle, e.location, drawable),
                    step => self.settle(step),
                }
            }
            Gesture::ZoomStep { factor, location } => self.apply_zoom(factor, location, drawable),
            Gesture::RotateStep { angle, location } => self.apply_rotate(angle, location, drawable),
            Gesture::DoubleTap => {
                self.reset_home(drawable);
                Ok(())
            }
        }
    }

    /// Finishes a cancelled gesture without applying its delta.
    fn settle(&mut self, step: TrackStep) -> Result<(), GestureError> {
        if let TrackStep::Restore(start) = step {
            self.state = start;
        }
        Ok(())
    }

    /// Runs `update` on the state, then shifts so the plane point under `anchor` stays put.
    fn keep_anchor(
        &mut self,
        anchor: Point,
        drawable: DVec2,
        update: impl FnOnce(&mut ViewportState),
    ) -> Result<(), GestureError> {
        let pixel = anchor * self.options.content_scale;

        let mut next = self.state;
        let before = next.map(drawable).apply(pixel);
        update(&mut next);
        let after = next.map(drawable).apply(pixel);
        next.shift += before - after;

        self.commit(next)
    }

    fn commit(&mut self, next: ViewportState) -> Result<(), GestureError> {
        if !next.is_finite() {
            return Err(GestureError::NonFinite);
        }
        self.state = next;
        Ok(())
    }
}

/// A viewport mutated on the event thread and sampled on the frame thread.
#[derive(Debug, Clone)]
pub struct SharedViewport(Arc<Mutex<Viewport>>);

impl SharedViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self(Arc::new(Mutex::new(viewport)))
    }

    pub fn handle(&self, gesture: &Gesture, drawable: DVec2) -> Result<(), GestureError> {
        self.0.lock().handle(gesture, drawable)
    }

    /// The current map, copied out as one value.
    pub fn snapshot(&self, drawable: DVec2) -> AffineMap {
        self.0.lock().map(drawable)
    }

    pub fn state(&self) -> ViewportState {
        self.0.lock().state()
    }
}

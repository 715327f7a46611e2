//! Translates winit window events into viewport gestures.

use crate::gesture::{Gesture, GesturePhase, PanEvent, PinchEvent, RotateEvent};
use planemap::{DVec2, Point};
use std::time::{Duration, Instant};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Two presses closer than this (in time and space) form a double click.
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);
const DOUBLE_CLICK_SLOP_POINTS: f64 = 4.0;

/// Zoom factor per wheel line.
const WHEEL_ZOOM_BASE: f64 = 1.1;
/// Pixel-precise wheels report this many points per line.
const POINTS_PER_LINE: f64 = 120.0;

/// Rotation per Q/E press.
const KEY_ROTATE_STEP: f64 = std::f64::consts::PI / 36.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Gesture(Gesture),
    Quit,
}

pub struct InputController {
    dragging: bool,
    /// Cursor in view points.
    cursor: Option<Point>,
    last_press: Option<(Instant, Point)>,
    /// Device pixels per view point, from the window.
    scale_factor: f64,
    /// Window size in view points; keyboard rotation pivots on its centre.
    window_points: DVec2,
}

impl InputController {
    pub fn new(scale_factor: f64, window_pixels: DVec2) -> Self {
        Self {
            dragging: false,
            cursor: None,
            last_press: None,
            scale_factor,
            window_points: window_pixels / scale_factor,
        }
    }

    /// Handles one window event, returning what it means for the view, if anything.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<Command> {
        match event {
            WindowEvent::MouseInput { button, state, .. } if *button == MouseButton::Left => {
                match state {
                    ElementState::Pressed => self.press(Instant::now()),
                    ElementState::Released => self.release(),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(DVec2::new(position.x, position.y) / self.scale_factor)
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                None
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y as f64,
                    MouseScrollDelta::PixelDelta(pos) => pos.y / POINTS_PER_LINE,
                };
                self.scroll(lines)
            }
            WindowEvent::TouchpadMagnify { delta, phase, .. } => {
                self.magnify(*delta, gesture_phase(*phase))
            }
            WindowEvent::TouchpadRotate { delta, phase, .. } => {
                self.twist((*delta as f64).to_radians(), gesture_phase(*phase))
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed =>
            {
                match event.physical_key {
                    PhysicalKey::Code(code) => self.key(code),
                    PhysicalKey::Unidentified(_) => None,
                }
            }
            WindowEvent::Resized(size) => {
                self.window_points =
                    DVec2::new(size.width as f64, size.height as f64) / self.scale_factor;
                None
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let pixels = self.window_points * self.scale_factor;
                self.scale_factor = *scale_factor;
                self.window_points = pixels / *scale_factor;
                None
            }
            _ => None,
        }
    }

    fn press(&mut self, now: Instant) -> Option<Command> {
        let at = self.cursor?;

        if let Some((then, place)) = self.last_press.take() {
            if now.duration_since(then) <= DOUBLE_CLICK_WINDOW
                && at.distance(place) <= DOUBLE_CLICK_SLOP_POINTS
            {
                self.dragging = false;
                return Some(Command::Gesture(Gesture::DoubleTap));
            }
        }
        self.last_press = Some((now, at));

        self.dragging = true;
        Some(pan(GesturePhase::Began, DVec2::ZERO))
    }

    fn release(&mut self) -> Option<Command> {
        if !self.dragging {
            return None;
        }
        self.dragging = false;
        Some(pan(GesturePhase::Ended, DVec2::ZERO))
    }

    fn cursor_moved(&mut self, at: Point) -> Option<Command> {
        let previous = self.cursor.replace(at);
        match previous {
            Some(prev) if self.dragging => Some(pan(GesturePhase::Changed, at - prev)),
            _ => None,
        }
    }

    /// Each wheel notch is a complete zoom step around the cursor.
    fn scroll(&mut self, lines: f64) -> Option<Command> {
        if lines == 0.0 {
            return None;
        }
        Some(Command::Gesture(Gesture::ZoomStep {
            factor: WHEEL_ZOOM_BASE.powf(lines),
            location: self.anchor(),
        }))
    }

    fn magnify(&mut self, delta: f64, phase: GesturePhase) -> Option<Command> {
        Some(Command::Gesture(Gesture::Pinch(PinchEvent {
            phase,
            factor: 1.0 + delta,
            location: self.anchor(),
        })))
    }

    fn twist(&mut self, angle: f64, phase: GesturePhase) -> Option<Command> {
        Some(Command::Gesture(Gesture::Rotate(RotateEvent {
            phase,
            angle,
            location: self.anchor(),
        })))
    }

    fn key(&mut self, code: KeyCode) -> Option<Command> {
        match code {
            KeyCode::Escape if self.dragging => {
                self.dragging = false;
                Some(pan(GesturePhase::Cancelled, DVec2::ZERO))
            }
            KeyCode::Escape => Some(Command::Quit),
            KeyCode::KeyH | KeyCode::Home => Some(Command::Gesture(Gesture::DoubleTap)),
            KeyCode::KeyQ => self.key_rotate(KEY_ROTATE_STEP),
            KeyCode::KeyE => self.key_rotate(-KEY_ROTATE_STEP),
            _ => None,
        }
    }

    fn key_rotate(&mut self, angle: f64) -> Option<Command> {
        Some(Command::Gesture(Gesture::RotateStep {
            angle,
            location: self.window_points / 2.0,
        }))
    }

    /// Zoom and rotate pivot: the cursor, or the window centre when it is outside.
    fn anchor(&self) -> Point {
        self.cursor.unwrap_or(self.window_points / 2.0)
    }
}

fn pan(phase: GesturePhase, translation: DVec2) -> Command {
    Command::Gesture(Gesture::Pan(PanEvent { phase, translation }))
}

fn gesture_phase(phase: TouchPhase) -> GesturePhase {
    match phase {
        TouchPhase::Started => GesturePhase::Began,
        TouchPhase::Moved => GesturePhase::Changed,
        TouchPhase::Ended => GesturePhase::Ended,
        TouchPhase::Cancelled => GesturePhase::Cancelled,
    }
}

//! Pointer input.
//!
//! The engine samples a small [`PointerState`] once per step. Writes are
//! last-write-wins: several moves between two steps collapse into the latest
//! position plus a "moved" flag.
//!
//! Hosts built on winit can translate window events with
//! [`PointerEvent::from_window_event`]:
//!
//! ```ignore
//! if let Some(event) = PointerEvent::from_window_event(&event, scale, last_position) {
//!     session.pointer(event);
//! }
//! ```
//!
//! or hand the whole event to `LiveSession::window_event`.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton, WindowEvent};

/// A discrete pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    /// Pointer moved to a canvas position.
    Move {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
    },
    /// Pointer entered the canvas.
    Enter {
        /// Canvas x in pixels.
        x: f32,
        /// Canvas y in pixels.
        y: f32,
    },
    /// Pointer left the canvas.
    Leave,
}

impl PointerEvent {
    /// Translate a winit window event.
    ///
    /// `scale` converts physical window pixels to canvas pixels. Enter events
    /// from winit carry no position, so they reuse the last known one.
    pub fn from_window_event(event: &WindowEvent, scale: f32, last: Option<Vec2>) -> Option<Self> {
        match event {
            WindowEvent::CursorMoved { position, .. } => Some(PointerEvent::Move {
                x: position.x as f32 * scale,
                y: position.y as f32 * scale,
            }),
            WindowEvent::CursorEntered { .. } => {
                let at = last.unwrap_or(Vec2::ZERO);
                Some(PointerEvent::Enter { x: at.x, y: at.y })
            }
            WindowEvent::CursorLeft { .. } => Some(PointerEvent::Leave),
            _ => None,
        }
    }
}

/// Whether a winit event is a left-button press.
///
/// Hosts typically bind this to toggling the pointer force.
pub fn is_primary_press(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::MouseInput {
            state: ElementState::Pressed,
            button: MouseButton::Left,
            ..
        }
    )
}

/// Pointer state as seen by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Last known position in canvas pixels.
    position: Option<Vec2>,
    /// Whether the pointer is over the canvas.
    inside: bool,
    /// Whether the pointer moved since the last step.
    moved: bool,
}

impl PointerState {
    /// Create an idle pointer (outside, never seen).
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an input event.
    pub fn apply(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Move { x, y } => {
                self.position = Some(Vec2::new(x, y));
                self.inside = true;
                self.moved = true;
            }
            PointerEvent::Enter { x, y } => {
                self.position = Some(Vec2::new(x, y));
                self.inside = true;
            }
            PointerEvent::Leave => {
                self.inside = false;
                self.moved = false;
            }
        }
    }

    /// Last known position.
    #[inline]
    pub fn position(&self) -> Option<Vec2> {
        self.position
    }

    /// Whether the pointer is over the canvas.
    #[inline]
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Whether the pointer moved since the last step.
    #[inline]
    pub fn moved(&self) -> bool {
        self.moved
    }

    /// Position to apply forces at this step, if any.
    pub fn force_origin(&self, continuous: bool) -> Option<Vec2> {
        if !self.inside || !(self.moved || continuous) {
            return None;
        }
        self.position
    }

    /// Called by the engine once a step has sampled this state.
    pub(crate) fn end_step(&mut self) {
        self.moved = false;
    }
}

//! Gesture normalization.
//!
//! Each normalizer is a state machine holding at most one pointer session.
//! Time enters only through the `time_ms` of raw events and through
//! `advance(now_ms)`; pending timers are deadlines compared against that
//! clock, so the same code runs against host timers or a virtual clock.

mod mouse;
mod touch;

pub use mouse::MouseNormalizer;
pub use touch::TouchNormalizer;

use crate::events::{GestureEvent, GestureKind};
use crate::input::{InputModality, Modifiers, MouseButton};
use crate::points::GesturePoints;
use crate::surface::SurfaceRef;

fn mouse_event(
    kind: GestureKind,
    target: &SurfaceRef,
    button: Option<MouseButton>,
    modifiers: Modifiers,
    points: GesturePoints,
    time_ms: u64,
) -> GestureEvent {
    GestureEvent {
        kind,
        modality: InputModality::Mouse,
        target: target.clone(),
        button,
        touches: Vec::new(),
        modifiers,
        points,
        time_ms,
    }
}

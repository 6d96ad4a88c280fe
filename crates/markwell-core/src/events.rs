//! Named events produced by the engine and the bus that delivers them.

use crate::annotation::AnnotationRef;
use crate::input::{InputModality, Modifiers, MouseButton, TouchId};
use crate::points::{GesturePoints, SpacePoints};
use crate::surface::SurfaceRef;
use kurbo::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a recognized swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Semantic gesture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureKind {
    // Mouse
    Down,
    /// A `Down` no tool consumed; routed to annotation creation.
    DownActivate,
    /// Pointer moved with no button held.
    Move,
    /// Pointer (mouse or mean touch point) moved during a session.
    Drag,
    Up,
    Click,
    DoubleClick,
    Wheel { delta: Vec2 },
    // Touch
    Start,
    /// A `Start` no tool consumed.
    StartActivate,
    Press,
    Swipe { direction: SwipeDirection },
    End,
    Tap { count: u32 },
}

/// Per-contact data of a touch gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchContact {
    pub id: TouchId,
    pub point: SpacePoints,
    pub radius: Vec2,
    pub force: f64,
    pub rotation: f64,
}

/// A normalized gesture event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub modality: InputModality,
    pub target: SurfaceRef,
    /// Pressed button for mouse gestures.
    pub button: Option<MouseButton>,
    /// Active contacts for touch gestures.
    pub touches: Vec<TouchContact>,
    pub modifiers: Modifiers,
    /// For touch gestures these are mean points over the active contacts.
    pub points: GesturePoints,
    pub time_ms: u64,
}

impl GestureEvent {
    pub fn touch_ids(&self) -> Vec<TouchId> {
        self.touches.iter().map(|t| t.id).collect()
    }

    /// Same payload under a different kind.
    pub fn with_kind(&self, kind: GestureKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// Diff computed by the selection and lock registries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub added: Vec<AnnotationRef>,
    pub removed: Vec<AnnotationRef>,
    /// Full membership after the change.
    pub members: Vec<AnnotationRef>,
}

/// Payload of [`InteractionEvent::SelectionChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionChange {
    pub added: Vec<AnnotationRef>,
    pub removed: Vec<AnnotationRef>,
    pub selection: Vec<AnnotationRef>,
}

impl From<MembershipChange> for SelectionChange {
    fn from(change: MembershipChange) -> Self {
        Self {
            added: change.added,
            removed: change.removed,
            selection: change.members,
        }
    }
}

/// Payload of [`InteractionEvent::LockChanged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockChange {
    pub added: Vec<AnnotationRef>,
    pub removed: Vec<AnnotationRef>,
    pub locked: Vec<AnnotationRef>,
}

impl From<MembershipChange> for LockChange {
    fn from(change: MembershipChange) -> Self {
        Self {
            added: change.added,
            removed: change.removed,
            locked: change.members,
        }
    }
}

/// One tool finished painting its annotations on a surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRendered {
    pub target: SurfaceRef,
    pub tool_name: String,
}

/// Everything the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum InteractionEvent {
    Gesture(GestureEvent),
    SelectionChanged(SelectionChange),
    LockChanged(LockChange),
    AnnotationRendered(AnnotationRendered),
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&InteractionEvent)>;

/// Synchronous event target.
///
/// Listeners run inside `publish`, before the publishing call returns.
/// Every event is also queued for hosts that poll with [`EventBus::drain`].
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    pending: Vec<InteractionEvent>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&InteractionEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: InteractionEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        self.pending.push(event);
    }

    pub fn publish_gesture(&mut self, event: GestureEvent) {
        self.publish(InteractionEvent::Gesture(event));
    }

    /// Events published since the last drain.
    pub fn pending(&self) -> &[InteractionEvent] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<InteractionEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn change() -> InteractionEvent {
        InteractionEvent::LockChanged(LockChange {
            added: vec![],
            removed: vec![],
            locked: vec![],
        })
    }

    #[test]
    fn test_listeners_run_synchronously() {
        let seen = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = seen.clone();
        bus.subscribe(move |_| *counter.borrow_mut() += 1);

        bus.publish(change());
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(bus.pending().len(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut bus = EventBus::new();
        bus.publish(change());
        bus.publish(change());
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let seen = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = seen.clone();
        let id = bus.subscribe(move |_| *counter.borrow_mut() += 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.publish(change());
        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn test_serializes_with_tag() {
        let json = serde_json::to_string(&change()).unwrap();
        assert!(json.contains("\"event\":\"lock_changed\""));
        assert!(json.contains("\"locked\":[]"));
    }

    #[test]
    fn test_selection_payload_names_current_members() {
        let event = InteractionEvent::SelectionChanged(
            MembershipChange {
                added: vec![],
                removed: vec![],
                members: vec![],
            }
            .into(),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"selection_changed\""));
        assert!(json.contains("\"selection\":[]"));
        assert!(!json.contains("members"));
    }
}

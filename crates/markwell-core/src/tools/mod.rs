//! Tool collaborator interface, tool groups and the built-in marker tool.

mod group;
mod marker;

pub use group::{ToolGroup, ToolGroupRegistry};
pub use marker::MarkerTool;

use crate::annotation::{Annotation, AnnotationStore};
use crate::dispatch::HitTarget;
use crate::events::GestureEvent;
use crate::input::{InputModality, ModifierKey, Modifiers, MouseButton};
use crate::render::PaintError;
use crate::surface::Surface;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Interaction mode of a tool within a tool group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolMode {
    /// Receives no input and paints nothing.
    #[default]
    Disabled,
    /// Paints its annotations but receives no input.
    Enabled,
    /// Annotations can be selected and dragged with the primary button.
    Passive,
    /// Bound to specific buttons; can create new annotations.
    Active,
}

impl ToolMode {
    /// Modes whose tools paint during a frame drain.
    pub const PAINTING: [ToolMode; 3] = [ToolMode::Active, ToolMode::Passive, ToolMode::Enabled];
}

/// A button (and optional modifier) an Active tool responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolBinding {
    pub button: MouseButton,
    #[serde(default)]
    pub modifier: Option<ModifierKey>,
}

impl ToolBinding {
    pub fn new(button: MouseButton) -> Self {
        Self {
            button,
            modifier: None,
        }
    }

    pub fn with_modifier(button: MouseButton, modifier: ModifierKey) -> Self {
        Self {
            button,
            modifier: Some(modifier),
        }
    }

    /// A binding without a modifier matches regardless of held modifiers.
    pub fn matches(&self, button: MouseButton, modifiers: &Modifiers) -> bool {
        self.button == button && self.modifier.is_none_or(|key| modifiers.contains(key))
    }
}

/// Optional hooks a tool implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Gets the first look at a `Down` before hit-testing.
    PreDown,
    /// Gets a `Down` nothing was hit by.
    PostDown,
    /// Paints its annotations during frame drains.
    Paint,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Capability::PreDown => 1,
            Capability::PostDown => 1 << 1,
            Capability::Paint => 1 << 2,
        }
    }
}

/// Set of [`Capability`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// A handle matched by a hit-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleRef {
    /// Index into the annotation's handle list.
    pub index: usize,
    /// Handle position in world space at hit time.
    pub position: Point,
}

/// An interactive annotation tool.
///
/// Hooks guarded by a [`Capability`] are only called when the tool declares
/// that capability.
pub trait Tool {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn supports(&self, _modality: InputModality) -> bool {
        true
    }

    /// Tool-specific visibility filter applied before hit-testing.
    fn is_visible(&self, _surface: &dyn Surface, _annotation: &Annotation) -> bool {
        true
    }

    /// Handle of `annotation` within `proximity` canvas pixels of `canvas_point`.
    fn handle_near(
        &self,
        surface: &dyn Surface,
        annotation: &Annotation,
        canvas_point: Point,
        proximity: f64,
    ) -> Option<HandleRef>;

    /// Whether `canvas_point` is within `proximity` of the annotation as a whole.
    fn annotation_near(
        &self,
        surface: &dyn Surface,
        annotation: &Annotation,
        canvas_point: Point,
        proximity: f64,
    ) -> bool;

    /// Returns true when the tool starts a modify loop for this session.
    fn on_handle_selected(&mut self, _event: &GestureEvent, _target: &HitTarget) -> bool {
        false
    }

    /// Returns true when the tool starts a modify loop for this session.
    fn on_annotation_selected(&mut self, _event: &GestureEvent, _target: &HitTarget) -> bool {
        false
    }

    /// [`Capability::PreDown`]. Returns true to consume the event.
    fn pre_down(&mut self, _event: &GestureEvent) -> bool {
        false
    }

    /// [`Capability::PostDown`]. Returns true to consume the event.
    fn post_down(&mut self, _event: &GestureEvent) -> bool {
        false
    }

    /// Drag within a modify loop. Returns true when annotations changed.
    fn on_drag(&mut self, _event: &GestureEvent, _target: &HitTarget, _store: &mut AnnotationStore) -> bool {
        false
    }

    /// End of the session that owned a modify loop.
    fn on_release(&mut self, _event: &GestureEvent, _target: &HitTarget) {}

    /// [`Capability::Paint`]. Returns whether anything was drawn.
    fn render(&mut self, _surface: &dyn Surface, _annotations: &[&Annotation]) -> Result<bool, PaintError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let caps = Capabilities::empty().with(Capability::Paint);
        assert!(caps.contains(Capability::Paint));
        assert!(!caps.contains(Capability::PreDown));

        let caps: Capabilities = [Capability::PreDown, Capability::PostDown].into_iter().collect();
        assert!(caps.contains(Capability::PreDown));
        assert!(caps.contains(Capability::PostDown));
        assert!(!caps.contains(Capability::Paint));
    }

    #[test]
    fn test_binding_matches() {
        let plain = ToolBinding::new(MouseButton::Left);
        let shifted = ToolBinding::with_modifier(MouseButton::Left, ModifierKey::Shift);
        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };

        assert!(plain.matches(MouseButton::Left, &Modifiers::NONE));
        assert!(plain.matches(MouseButton::Left, &shift));
        assert!(!plain.matches(MouseButton::Right, &Modifiers::NONE));
        assert!(shifted.matches(MouseButton::Left, &shift));
        assert!(!shifted.matches(MouseButton::Left, &Modifiers::NONE));
    }
}

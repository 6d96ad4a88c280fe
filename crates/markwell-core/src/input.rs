//! Raw platform input records consumed by the gesture normalizers.

use crate::surface::SurfaceId;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// The conventional primary button. Passive tools only ever bind here.
    pub fn is_primary(self) -> bool {
        self == MouseButton::Left
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Whether a specific modifier is held.
    pub fn contains(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
            ModifierKey::Meta => self.meta,
        }
    }

    /// Whether the multi-select modifier (shift or ctrl) is held.
    pub fn is_multi_select(&self) -> bool {
        self.shift || self.ctrl
    }

    pub fn is_empty(&self) -> bool {
        !(self.shift || self.ctrl || self.alt || self.meta)
    }
}

/// A single modifier key, used in tool bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

/// Input modality of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputModality {
    Mouse,
    Touch,
}

/// A platform mouse event (down, move, up, wheel or double-click).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPointer {
    /// Surface the event was delivered on.
    pub surface: SurfaceId,
    /// Position relative to the document.
    pub page: Point,
    /// Position relative to the browser/window viewport.
    pub client: Point,
    /// Button that changed state. Ignored for moves.
    pub button: MouseButton,
    pub modifiers: Modifiers,
    /// Host timestamp in milliseconds.
    pub time_ms: u64,
}

impl RawPointer {
    /// Convenience constructor for a primary-button event where page and
    /// client coordinates coincide.
    pub fn at(surface: SurfaceId, position: Point, time_ms: u64) -> Self {
        Self {
            surface,
            page: position,
            client: position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            time_ms,
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Platform touch identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TouchId(pub u32);

/// A single touch contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTouch {
    pub id: TouchId,
    pub page: Point,
    pub client: Point,
    /// Contact ellipse radii.
    #[serde(default)]
    pub radius: Vec2,
    #[serde(default)]
    pub force: f64,
    /// Contact ellipse rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
}

impl RawTouch {
    pub fn at(id: u32, position: Point) -> Self {
        Self {
            id: TouchId(id),
            page: position,
            client: position,
            radius: Vec2::ZERO,
            force: 0.0,
            rotation: 0.0,
        }
    }
}

/// A platform touch event carrying the contacts that changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTouchEvent {
    pub surface: SurfaceId,
    pub touches: Vec<RawTouch>,
    #[serde(default)]
    pub modifiers: Modifiers,
    pub time_ms: u64,
}

impl RawTouchEvent {
    pub fn new(surface: SurfaceId, touches: Vec<RawTouch>, time_ms: u64) -> Self {
        Self {
            surface,
            touches,
            modifiers: Modifiers::NONE,
            time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_button() {
        assert!(MouseButton::Left.is_primary());
        assert!(!MouseButton::Right.is_primary());
        assert!(!MouseButton::Middle.is_primary());
    }

    #[test]
    fn test_modifier_queries() {
        let mods = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        assert!(mods.contains(ModifierKey::Shift));
        assert!(!mods.contains(ModifierKey::Alt));
        assert!(mods.is_multi_select());
        assert!(!mods.is_empty());
        assert!(Modifiers::NONE.is_empty());
    }
}

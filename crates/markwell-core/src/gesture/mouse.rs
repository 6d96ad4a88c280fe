//! Mouse down/move/up into Down, Drag, Up/Click.

use super::mouse_event;
use crate::config::InteractionConfig;
use crate::events::{GestureEvent, GestureKind};
use crate::input::{Modifiers, MouseButton, RawPointer};
use crate::points::{GesturePoints, SpaceDeltas, SpacePoints};
use crate::surface::{Surface, SurfaceId, SurfaceRef};
use kurbo::Vec2;

/// State between a mouse down and the matching up.
#[derive(Debug, Clone)]
struct MouseSession {
    target: SurfaceRef,
    button: MouseButton,
    modifiers: Modifiers,
    start: SpacePoints,
    current: SpacePoints,
    /// When the click-vs-drag timer fires.
    click_deadline_ms: u64,
    /// Still a click: timer not fired and no drag seen.
    is_click: bool,
}

impl MouseSession {
    fn points(&self, last: SpacePoints, current: SpacePoints) -> GesturePoints {
        GesturePoints {
            start: self.start,
            last,
            current,
            delta: SpaceDeltas::between(&last, &current),
        }
    }
}

/// Turns raw mouse events into gesture events.
///
/// While a session is live the normalizer is capturing: the host should
/// deliver moves and ups from anywhere in the document, not just the surface.
#[derive(Debug, Clone)]
pub struct MouseNormalizer {
    click_delay_ms: u64,
    session: Option<MouseSession>,
}

impl MouseNormalizer {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            click_delay_ms: config.click_delay_ms,
            session: None,
        }
    }

    /// Whether document-level move/up capture is installed.
    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    /// Surface owning the live session.
    pub fn session_surface(&self) -> Option<&SurfaceId> {
        self.session.as_ref().map(|s| &s.target.surface)
    }

    pub fn session_button(&self) -> Option<MouseButton> {
        self.session.as_ref().map(|s| s.button)
    }

    /// Fire the click-vs-drag timer if its deadline has passed.
    pub fn advance(&mut self, now_ms: u64) {
        if let Some(session) = &mut self.session {
            if session.is_click && now_ms >= session.click_deadline_ms {
                session.is_click = false;
            }
        }
    }

    /// Start a session. Ignored while another session is live.
    pub fn down(&mut self, surface: &dyn Surface, raw: &RawPointer) -> Option<GestureEvent> {
        self.advance(raw.time_ms);
        if let Some(session) = &self.session {
            log::debug!(
                "Ignoring {:?} down on {}: {:?} session already live on {}",
                raw.button,
                raw.surface,
                session.button,
                session.target.surface
            );
            return None;
        }

        let point = SpacePoints::resolve(surface, raw.page, raw.client);
        let session = MouseSession {
            target: surface.reference(),
            button: raw.button,
            modifiers: raw.modifiers,
            start: point,
            current: point,
            click_deadline_ms: raw.time_ms.saturating_add(self.click_delay_ms),
            is_click: true,
        };
        let event = mouse_event(
            GestureKind::Down,
            &session.target,
            Some(session.button),
            session.modifiers,
            GesturePoints::stationary(point),
            raw.time_ms,
        );
        self.session = Some(session);
        Some(event)
    }

    /// A move: `Drag` during a session, `Move` otherwise.
    ///
    /// During a session `surface` must be the session's surface; the last
    /// position is re-projected through its current view so the world delta
    /// stays correct when the camera changed between samples.
    pub fn moved(&mut self, surface: &dyn Surface, raw: &RawPointer) -> Option<GestureEvent> {
        self.advance(raw.time_ms);
        let point = SpacePoints::resolve(surface, raw.page, raw.client);

        let Some(session) = &mut self.session else {
            return Some(mouse_event(
                GestureKind::Move,
                &surface.reference(),
                None,
                raw.modifiers,
                GesturePoints::stationary(point),
                raw.time_ms,
            ));
        };

        let last = session.current.reproject(surface);
        if point.page == last.page {
            return None;
        }
        session.is_click = false;
        session.current = point;
        Some(mouse_event(
            GestureKind::Drag,
            &session.target,
            Some(session.button),
            raw.modifiers,
            session.points(last, point),
            raw.time_ms,
        ))
    }

    /// End the session with `Click` or `Up`.
    ///
    /// The session is torn down before the event is built, so no state or
    /// pending timer survives regardless of which kind is emitted.
    pub fn up(&mut self, surface: &dyn Surface, raw: &RawPointer) -> Option<GestureEvent> {
        self.advance(raw.time_ms);
        match &self.session {
            None => {
                log::debug!("Ignoring {:?} up on {}: no live session", raw.button, raw.surface);
                return None;
            }
            Some(session) if session.button != raw.button => {
                log::debug!(
                    "Ignoring {:?} up: session is bound to {:?}",
                    raw.button,
                    session.button
                );
                return None;
            }
            Some(_) => {}
        }
        let session = self.session.take()?;

        let point = SpacePoints::resolve(surface, raw.page, raw.client);
        let last = session.current.reproject(surface);
        let kind = if session.is_click {
            GestureKind::Click
        } else {
            GestureKind::Up
        };
        Some(mouse_event(
            kind,
            &session.target,
            Some(session.button),
            raw.modifiers,
            session.points(last, point),
            raw.time_ms,
        ))
    }

    /// Native double-click. Does not touch the session.
    pub fn double_click(&mut self, surface: &dyn Surface, raw: &RawPointer) -> GestureEvent {
        self.advance(raw.time_ms);
        let point = SpacePoints::resolve(surface, raw.page, raw.client);
        mouse_event(
            GestureKind::DoubleClick,
            &surface.reference(),
            Some(raw.button),
            raw.modifiers,
            GesturePoints::stationary(point),
            raw.time_ms,
        )
    }

    pub fn wheel(&mut self, surface: &dyn Surface, raw: &RawPointer, delta: Vec2) -> GestureEvent {
        self.advance(raw.time_ms);
        let point = SpacePoints::resolve(surface, raw.page, raw.client);
        mouse_event(
            GestureKind::Wheel { delta },
            &surface.reference(),
            None,
            raw.modifiers,
            GesturePoints::stationary(point),
            raw.time_ms,
        )
    }

    /// Drop any live session and its timer without emitting anything.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("Cancelled mouse session on {}", session.target.surface);
        }
    }
}

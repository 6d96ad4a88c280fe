//! Multi-touch start/move/end into Start, Drag, Press, Swipe, End and Tap.

use crate::config::InteractionConfig;
use crate::events::{GestureEvent, GestureKind, SwipeDirection, TouchContact};
use crate::input::{InputModality, Modifiers, RawTouch, RawTouchEvent, TouchId};
use crate::points::{GesturePoints, SpaceDeltas, SpacePoints};
use crate::surface::{Surface, SurfaceId, SurfaceRef};

/// One active contact.
#[derive(Debug, Clone)]
struct TouchTrack {
    raw: RawTouch,
    current: SpacePoints,
}

impl TouchTrack {
    fn contact(&self) -> TouchContact {
        TouchContact {
            id: self.raw.id,
            point: self.current,
            radius: self.raw.radius,
            force: self.raw.force,
            rotation: self.raw.rotation,
        }
    }
}

/// State between the first contact and the last lift.
#[derive(Debug, Clone)]
struct TouchSession {
    target: SurfaceRef,
    modifiers: Modifiers,
    started_ms: u64,
    tracks: Vec<TouchTrack>,
    start_mean: SpacePoints,
    current_mean: SpacePoints,
    /// Pending long-press deadline; cleared once fired or cancelled.
    press_deadline_ms: Option<u64>,
    /// Net movement of the mean point since start, in page pixels.
    movement: f64,
    swiped: bool,
}

impl TouchSession {
    fn mean(&self) -> SpacePoints {
        let points: Vec<SpacePoints> = self.tracks.iter().map(|t| t.current).collect();
        SpacePoints::mean(&points)
    }

    fn event(&self, kind: GestureKind, last: SpacePoints, time_ms: u64) -> GestureEvent {
        GestureEvent {
            kind,
            modality: InputModality::Touch,
            target: self.target.clone(),
            button: None,
            touches: self.tracks.iter().map(TouchTrack::contact).collect(),
            modifiers: self.modifiers,
            points: GesturePoints {
                start: self.start_mean,
                last,
                current: self.current_mean,
                delta: SpaceDeltas::between(&last, &self.current_mean),
            },
            time_ms,
        }
    }
}

/// Consecutive taps near the same point of one surface.
#[derive(Debug, Clone)]
struct TapChain {
    target: SurfaceRef,
    modifiers: Modifiers,
    point: SpacePoints,
    count: u32,
    deadline_ms: u64,
}

/// Turns raw touch events into gesture events.
///
/// Holds at most one touch session; contacts arriving while it is live join
/// it. The tap chain outlives sessions so consecutive taps can be counted.
#[derive(Debug, Clone)]
pub struct TouchNormalizer {
    config: InteractionConfig,
    session: Option<TouchSession>,
    tap_chain: Option<TapChain>,
}

impl TouchNormalizer {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            config: config.clone(),
            session: None,
            tap_chain: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_surface(&self) -> Option<&SurfaceId> {
        self.session.as_ref().map(|s| &s.target.surface)
    }

    pub fn active_touches(&self) -> Vec<TouchId> {
        self.session
            .as_ref()
            .map(|s| s.tracks.iter().map(|t| t.raw.id).collect())
            .unwrap_or_default()
    }

    /// Taps counted so far in the open chain.
    pub fn pending_taps(&self) -> Option<u32> {
        self.tap_chain.as_ref().map(|c| c.count)
    }

    /// Fire due timers: the long press and the tap-chain timeout.
    pub fn advance(&mut self, now_ms: u64) -> Vec<GestureEvent> {
        let mut events = Vec::new();

        if let Some(session) = &mut self.session {
            if session.press_deadline_ms.is_some_and(|deadline| now_ms >= deadline) {
                session.press_deadline_ms = None;
                if session.movement < self.config.long_press_max_movement_px {
                    let current = session.current_mean;
                    events.push(session.event(GestureKind::Press, current, now_ms));
                }
            }
        }

        if self.tap_chain.as_ref().is_some_and(|c| now_ms >= c.deadline_ms) {
            if let Some(chain) = self.tap_chain.take() {
                events.push(GestureEvent {
                    kind: GestureKind::Tap { count: chain.count },
                    modality: InputModality::Touch,
                    target: chain.target,
                    button: None,
                    touches: Vec::new(),
                    modifiers: chain.modifiers,
                    points: GesturePoints::stationary(chain.point),
                    time_ms: now_ms,
                });
            }
        }

        events
    }

    /// New contacts. The first starts a session; later ones join it.
    pub fn start(&mut self, surface: &dyn Surface, raw: &RawTouchEvent) -> Vec<GestureEvent> {
        let mut events = self.advance(raw.time_ms);
        let tracks: Vec<TouchTrack> = raw
            .touches
            .iter()
            .map(|t| TouchTrack {
                raw: t.clone(),
                current: SpacePoints::resolve(surface, t.page, t.client),
            })
            .collect();
        if tracks.is_empty() {
            return events;
        }

        if let Some(session) = &mut self.session {
            if &session.target.surface != surface.id() {
                log::debug!(
                    "Ignoring touch start on {}: session live on {}",
                    surface.id(),
                    session.target.surface
                );
                return events;
            }
            for track in tracks {
                match session.tracks.iter_mut().find(|t| t.raw.id == track.raw.id) {
                    Some(existing) => *existing = track,
                    None => session.tracks.push(track),
                }
            }
            // Re-base so the changed contact set causes no jump.
            session.current_mean = session.mean();
            return events;
        }

        let mut session = TouchSession {
            target: surface.reference(),
            modifiers: raw.modifiers,
            started_ms: raw.time_ms,
            tracks,
            start_mean: SpacePoints::default(),
            current_mean: SpacePoints::default(),
            press_deadline_ms: Some(raw.time_ms.saturating_add(self.config.long_press_delay_ms)),
            movement: 0.0,
            swiped: false,
        };
        session.start_mean = session.mean();
        session.current_mean = session.start_mean;
        events.push(session.event(GestureKind::Start, session.start_mean, raw.time_ms));
        self.session = Some(session);
        events
    }

    /// Moved contacts: emits `Drag` for the mean point and at most one
    /// `Swipe` per session.
    pub fn moved(&mut self, surface: &dyn Surface, raw: &RawTouchEvent) -> Vec<GestureEvent> {
        let mut events = self.advance(raw.time_ms);
        let Some(session) = &mut self.session else {
            return events;
        };

        for touch in &raw.touches {
            if let Some(track) = session.tracks.iter_mut().find(|t| t.raw.id == touch.id) {
                track.raw = touch.clone();
                track.current = SpacePoints::resolve(surface, touch.page, touch.client);
            }
        }

        let last = session.current_mean.reproject(surface);
        session.current_mean = session.mean();
        if session.current_mean.page == last.page {
            return events;
        }

        session.movement += last.page.distance(session.current_mean.page);
        if session.movement >= self.config.long_press_max_movement_px {
            session.press_deadline_ms = None;
        }
        events.push(session.event(GestureKind::Drag, last, raw.time_ms));

        let elapsed = raw.time_ms.saturating_sub(session.started_ms);
        if !session.swiped && elapsed <= self.config.swipe_tolerance_ms {
            let offset = session.current_mean.page - session.start_mean.page;
            let threshold = self.config.swipe_distance_px;
            let direction = if offset.x.abs() > threshold {
                Some(if offset.x > 0.0 {
                    SwipeDirection::Right
                } else {
                    SwipeDirection::Left
                })
            } else if offset.y.abs() > threshold {
                Some(if offset.y > 0.0 {
                    SwipeDirection::Down
                } else {
                    SwipeDirection::Up
                })
            } else {
                None
            };
            if let Some(direction) = direction {
                session.swiped = true;
                events.push(session.event(GestureKind::Swipe { direction }, last, raw.time_ms));
            }
        }

        events
    }

    /// Lifted contacts. The last lift ends the session with `End` and feeds
    /// the tap chain.
    pub fn end(&mut self, surface: &dyn Surface, raw: &RawTouchEvent) -> Vec<GestureEvent> {
        let mut events = self.advance(raw.time_ms);
        let Some(session) = &mut self.session else {
            return events;
        };

        let lifted: Vec<TouchId> = raw.touches.iter().map(|t| t.id).collect();
        session.tracks.retain(|t| !lifted.contains(&t.raw.id));
        if !session.tracks.is_empty() {
            session.current_mean = session.mean();
            return events;
        }

        // Teardown first: no timer of this session can fire after this point.
        let Some(session) = self.session.take() else {
            return events;
        };
        let last = session.current_mean.reproject(surface);
        events.push(session.event(GestureKind::End, last, raw.time_ms));

        let elapsed = raw.time_ms.saturating_sub(session.started_ms);
        if elapsed < self.config.tap_tolerance_ms && session.movement < self.config.tap_max_distance_px {
            self.record_tap(&session, raw.time_ms);
        }
        events
    }

    fn record_tap(&mut self, session: &TouchSession, now_ms: u64) {
        let point = session.start_mean;
        let deadline_ms = now_ms.saturating_add(self.config.tap_tolerance_ms);

        if let Some(chain) = &mut self.tap_chain {
            if chain.target.surface != session.target.surface {
                log::debug!(
                    "Ignoring tap on {}: tap chain open on {}",
                    session.target.surface,
                    chain.target.surface
                );
                return;
            }
            if chain.point.page.distance(point.page) <= self.config.tap_max_distance_px {
                chain.count += 1;
                chain.deadline_ms = deadline_ms;
                return;
            }
            log::debug!("Tap too far from chain; starting a new chain");
        }

        self.tap_chain = Some(TapChain {
            target: session.target.clone(),
            modifiers: session.modifiers,
            point,
            count: 1,
            deadline_ms,
        });
    }

    /// Drop the session and the tap chain without emitting anything.
    pub fn cancel(&mut self) {
        self.session = None;
        self.tap_chain = None;
    }
}

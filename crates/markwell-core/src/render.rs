//! Frame-batched repaint scheduling.
//!
//! Any number of `mark_dirty` calls between two refreshes collapse into a
//! single paint per surface. The host's per-refresh primitive sits behind
//! [`FrameHost`], so the same scheduler runs on a display link, an event
//! loop task, or a test driving frames by hand.

use crate::annotation::{Annotation, AnnotationStore};
use crate::error::{InteractionError, InteractionResult};
use crate::events::{AnnotationRendered, EventBus, InteractionEvent};
use crate::surface::{Surface, SurfaceId};
use crate::tools::{Capability, ToolGroup, ToolMode};
use std::collections::HashSet;
use thiserror::Error;

/// Failure reported by a tool's paint routine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaintError {
    #[error("Render context lost: {0}")]
    ContextLost(String),

    #[error("Paint failed: {0}")]
    Failed(String),
}

/// Host primitive that runs deferred work once per display refresh.
pub trait FrameHost {
    /// Ask for one frame callback; returns a handle for cancellation.
    fn request_frame(&mut self) -> u64;

    fn cancel_frame(&mut self, handle: u64);
}

/// Frame host that only records requests. The owner fires frames itself.
#[derive(Debug, Default)]
pub struct ManualFrameHost {
    next_handle: u64,
    pending: Option<u64>,
    requested: usize,
    cancelled: Vec<u64>,
}

impl ManualFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the outstanding request, if any.
    pub fn pending(&self) -> Option<u64> {
        self.pending
    }

    /// Consume the outstanding request, as the host does when it fires.
    pub fn take_pending(&mut self) -> Option<u64> {
        self.pending.take()
    }

    /// Total number of frames requested.
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn cancelled(&self) -> &[u64] {
        &self.cancelled
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&mut self) -> u64 {
        self.next_handle += 1;
        self.requested += 1;
        self.pending = Some(self.next_handle);
        self.next_handle
    }

    fn cancel_frame(&mut self, handle: u64) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
        self.cancelled.push(handle);
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Draining,
    Destroyed,
}

/// Dirty set plus the one outstanding frame request.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    dirty: HashSet<SurfaceId>,
    pending_frame: Option<u64>,
    draining: bool,
    destroyed: bool,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        if self.destroyed {
            SchedulerState::Destroyed
        } else if self.draining {
            SchedulerState::Draining
        } else if self.pending_frame.is_some() {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_dirty(&self, surface: &SurfaceId) -> bool {
        self.dirty.contains(surface)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Mark a surface stale. Requests a frame unless one is pending or a
    /// drain is running; marks made during a drain are requested afterwards.
    pub fn mark_dirty(&mut self, surface: &SurfaceId, host: &mut dyn FrameHost) -> InteractionResult<()> {
        if self.destroyed {
            return Err(InteractionError::SchedulerDestroyed);
        }
        self.dirty.insert(surface.clone());
        if !self.draining && self.pending_frame.is_none() {
            self.pending_frame = Some(host.request_frame());
        }
        Ok(())
    }

    /// Drain the dirty set for one frame.
    ///
    /// `known` lists the surfaces currently registered, in paint order; dirty
    /// surfaces not among them are dropped. `paint` gets the scheduler back
    /// so a paint routine can mark further surfaces, which then wait for the
    /// next frame. Returns how many surfaces were painted.
    pub fn on_frame<F>(
        &mut self,
        known: &[SurfaceId],
        host: &mut dyn FrameHost,
        mut paint: F,
    ) -> InteractionResult<usize>
    where
        F: FnMut(&SurfaceId, &mut RenderScheduler, &mut dyn FrameHost),
    {
        if self.destroyed {
            return Err(InteractionError::SchedulerDestroyed);
        }
        self.pending_frame = None;
        self.draining = true;
        let mut snapshot = std::mem::take(&mut self.dirty);

        let mut painted = 0;
        for surface in known {
            if snapshot.remove(surface) {
                paint(surface, &mut *self, &mut *host);
                painted += 1;
            }
        }
        for stale in snapshot {
            log::debug!("Dropping dirty mark for unknown surface {stale}");
        }

        self.draining = false;
        if !self.destroyed && !self.dirty.is_empty() && self.pending_frame.is_none() {
            self.pending_frame = Some(host.request_frame());
        }
        Ok(painted)
    }

    /// Terminal: cancel the pending frame and reject further use.
    pub fn destroy(&mut self, host: &mut dyn FrameHost) {
        if let Some(handle) = self.pending_frame.take() {
            host.cancel_frame(handle);
        }
        self.dirty.clear();
        self.destroyed = true;
        log::debug!("Render scheduler destroyed");
    }
}

/// Paint every tool of `group` on `surface`.
///
/// Tools in a painting mode with the [`Capability::Paint`] capability are
/// asked in registration order; each successful paint publishes
/// [`InteractionEvent::AnnotationRendered`]. A disabled surface is skipped
/// and a failing tool is logged without stopping the others. Returns how
/// many tools painted.
pub fn paint_surface(
    surface: &dyn Surface,
    group: &mut ToolGroup,
    store: &AnnotationStore,
    bus: &mut EventBus,
) -> usize {
    if !surface.is_enabled() {
        log::warn!("Skipping paint of {}: surface is disabled", surface.id());
        return 0;
    }

    let frame = surface.frame_of_reference();
    let mut painted = 0;
    for name in group.tools_in_modes(&ToolMode::PAINTING) {
        let Some(tool) = group.tool_mut(&name) else {
            log::warn!("Tool {name} has no instance; skipping paint");
            continue;
        };
        if !tool.capabilities().contains(Capability::Paint) {
            continue;
        }
        let annotations: Vec<&Annotation> = store
            .for_tool(frame, &name)
            .filter(|a| tool.is_visible(surface, a))
            .collect();
        match tool.render(surface, &annotations) {
            Ok(true) => {
                painted += 1;
                bus.publish(InteractionEvent::AnnotationRendered(AnnotationRendered {
                    target: surface.reference(),
                    tool_name: name,
                }));
            }
            Ok(false) => {}
            Err(e) => log::error!("Tool {name} failed to paint {}: {e}", surface.id()),
        }
    }
    painted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ViewSurface;
    use crate::tools::{MarkerTool, Tool};
    use kurbo::Point;

    fn id(name: &str) -> SurfaceId {
        SurfaceId::new(name)
    }

    #[test]
    fn test_marks_coalesce_into_one_frame() {
        let mut host = ManualFrameHost::new();
        let mut scheduler = RenderScheduler::new();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        for _ in 0..5 {
            scheduler.mark_dirty(&id("a"), &mut host).unwrap();
        }
        assert_eq!(host.requested(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);

        let mut paints = Vec::new();
        let painted = scheduler
            .on_frame(&[id("a")], &mut host, |s, _, _| paints.push(s.clone()))
            .unwrap();
        assert_eq!(painted, 1);
        assert_eq!(paints, vec![id("a")]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(host.requested(), 1);
    }

    #[test]
    fn test_remark_during_paint_waits_for_next_frame() {
        let mut host = ManualFrameHost::new();
        let mut scheduler = RenderScheduler::new();
        scheduler.mark_dirty(&id("a"), &mut host).unwrap();

        let mut paints = 0;
        scheduler
            .on_frame(&[id("a")], &mut host, |s, sched, host| {
                paints += 1;
                assert_eq!(sched.state(), SchedulerState::Draining);
                sched.mark_dirty(s, host).unwrap();
            })
            .unwrap();
        assert_eq!(paints, 1);
        // One request up front, one after the drain.
        assert_eq!(host.requested(), 2);
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert!(scheduler.is_dirty(&id("a")));

        let painted = scheduler.on_frame(&[id("a")], &mut host, |_, _, _| {}).unwrap();
        assert_eq!(painted, 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_paints_in_registry_order_and_drops_unknown() {
        let mut host = ManualFrameHost::new();
        let mut scheduler = RenderScheduler::new();
        scheduler.mark_dirty(&id("b"), &mut host).unwrap();
        scheduler.mark_dirty(&id("gone"), &mut host).unwrap();
        scheduler.mark_dirty(&id("a"), &mut host).unwrap();

        let mut order = Vec::new();
        scheduler
            .on_frame(&[id("a"), id("b"), id("c")], &mut host, |s, _, _| order.push(s.clone()))
            .unwrap();
        assert_eq!(order, vec![id("a"), id("b")]);
        assert_eq!(scheduler.dirty_count(), 0);
    }

    #[test]
    fn test_destroy_cancels_and_rejects() {
        let mut host = ManualFrameHost::new();
        let mut scheduler = RenderScheduler::new();
        scheduler.mark_dirty(&id("a"), &mut host).unwrap();
        let handle = host.pending().unwrap();

        scheduler.destroy(&mut host);
        assert_eq!(scheduler.state(), SchedulerState::Destroyed);
        assert_eq!(host.cancelled(), &[handle]);
        assert_eq!(host.pending(), None);
        assert_eq!(
            scheduler.mark_dirty(&id("a"), &mut host),
            Err(InteractionError::SchedulerDestroyed)
        );
        assert!(scheduler.on_frame(&[id("a")], &mut host, |_, _, _| {}).is_err());
    }

    struct FailingTool;

    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "Broken"
        }

        fn capabilities(&self) -> crate::tools::Capabilities {
            crate::tools::Capabilities::empty().with(Capability::Paint)
        }

        fn handle_near(
            &self,
            _: &dyn Surface,
            _: &Annotation,
            _: Point,
            _: f64,
        ) -> Option<crate::tools::HandleRef> {
            None
        }

        fn annotation_near(&self, _: &dyn Surface, _: &Annotation, _: Point, _: f64) -> bool {
            false
        }

        fn render(&mut self, _: &dyn Surface, _: &[&Annotation]) -> Result<bool, PaintError> {
            Err(PaintError::ContextLost("gl context".into()))
        }
    }

    fn painting_group() -> (ToolGroup, AnnotationStore) {
        let mut group = ToolGroup::new("default");
        group.add_tool(Box::new(FailingTool));
        group.add_tool(Box::new(MarkerTool::new("Length")));
        group.add_tool(Box::new(MarkerTool::new("Angle")));
        group.set_tool_enabled("Broken").unwrap();
        group.set_tool_passive("Length").unwrap();

        let mut store = AnnotationStore::new();
        store.add(Annotation::new("Length", "FOR", vec![Point::new(0.0, 0.0)]));
        store.add(Annotation::new("Angle", "FOR", vec![Point::new(0.0, 0.0)]));
        (group, store)
    }

    #[test]
    fn test_paint_surface_skips_failures_and_disabled_tools() {
        let surface = ViewSurface::new("a", "FOR");
        let (mut group, store) = painting_group();
        let mut bus = EventBus::new();

        // Broken fails, Length paints, Angle is disabled.
        assert_eq!(paint_surface(&surface, &mut group, &store, &mut bus), 1);
        let events = bus.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            InteractionEvent::AnnotationRendered(r) => {
                assert_eq!(r.tool_name, "Length");
                assert_eq!(r.target.surface, id("a"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_paint_surface_disabled_surface() {
        let surface = ViewSurface::new("a", "FOR");
        surface.set_enabled(false);
        let (mut group, store) = painting_group();
        let mut bus = EventBus::new();

        assert_eq!(paint_surface(&surface, &mut group, &store, &mut bus), 0);
        assert!(bus.drain().is_empty());
    }
}

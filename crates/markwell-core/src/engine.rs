//! The interaction engine: one context object owning every registry.
//!
//! Hosts feed raw input and frame callbacks in; gesture, selection, lock and
//! render events come out on the engine's [`EventBus`]. Several engines can
//! live side by side, one per embedded viewer.

use crate::annotation::{Annotation, AnnotationId, AnnotationRef, AnnotationStore};
use crate::config::InteractionConfig;
use crate::dispatch::{DispatchContext, DispatchOutcome, ToolDispatcher};
use crate::error::{InteractionError, InteractionResult};
use crate::events::{EventBus, GestureEvent, GestureKind, InteractionEvent, ListenerId};
use crate::gesture::{MouseNormalizer, TouchNormalizer};
use crate::input::{InputModality, RawPointer, RawTouchEvent};
use crate::registry::{LockRegistry, SelectMode, SelectionRegistry};
use crate::render::{FrameHost, ManualFrameHost, RenderScheduler, SchedulerState, paint_surface};
use crate::surface::{Surface, SurfaceId, SurfaceRegistry};
use crate::tools::{ToolBinding, ToolGroup, ToolGroupRegistry, ToolMode};
use kurbo::Vec2;

/// Interaction session for a set of surfaces.
pub struct InteractionEngine<H: FrameHost = ManualFrameHost> {
    config: InteractionConfig,
    host: H,
    bus: EventBus,
    selection: SelectionRegistry,
    locks: LockRegistry,
    scheduler: RenderScheduler,
    dispatcher: ToolDispatcher,
    mouse: MouseNormalizer,
    touch: TouchNormalizer,
    surfaces: SurfaceRegistry,
    tool_groups: ToolGroupRegistry,
    store: AnnotationStore,
}

impl<H: FrameHost> InteractionEngine<H> {
    pub fn new(config: InteractionConfig, host: H) -> Self {
        Self {
            mouse: MouseNormalizer::new(&config),
            touch: TouchNormalizer::new(&config),
            config,
            host,
            bus: EventBus::new(),
            selection: SelectionRegistry::new(),
            locks: LockRegistry::new(),
            scheduler: RenderScheduler::new(),
            dispatcher: ToolDispatcher::new(),
            surfaces: SurfaceRegistry::new(),
            tool_groups: ToolGroupRegistry::new(),
            store: AnnotationStore::new(),
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // --- Surfaces and tool groups ---

    pub fn register_surface(&mut self, surface: Box<dyn Surface>) {
        log::debug!("Registered surface {}", surface.id());
        self.surfaces.register(surface);
    }

    /// Remove a surface, dropping any pointer session or modify loop bound
    /// to it.
    pub fn remove_surface(&mut self, id: &SurfaceId) -> Option<Box<dyn Surface>> {
        let removed = self.surfaces.remove(id)?;
        if self.mouse.session_surface() == Some(id) {
            self.mouse.cancel();
        }
        if self.touch.session_surface() == Some(id) {
            self.touch.cancel();
        }
        if self.dispatcher.interaction_surface() == Some(id) {
            self.dispatcher.cancel();
        }
        self.tool_groups.forget_surface(id);
        log::debug!("Removed surface {id}");
        Some(removed)
    }

    pub fn surface(&self, id: &SurfaceId) -> Option<&dyn Surface> {
        self.surfaces.get(id)
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn create_tool_group(&mut self, id: impl Into<String>) -> InteractionResult<&mut ToolGroup> {
        self.tool_groups.create_group(id)
    }

    pub fn tool_group(&self, id: &str) -> Option<&ToolGroup> {
        self.tool_groups.group(id)
    }

    pub fn tool_group_mut(&mut self, id: &str) -> Option<&mut ToolGroup> {
        self.tool_groups.group_mut(id)
    }

    pub fn tool_groups(&self) -> &ToolGroupRegistry {
        &self.tool_groups
    }

    /// Change a tool's mode and repaint every surface of its group.
    /// `bindings` only applies to [`ToolMode::Active`].
    pub fn set_tool_mode(
        &mut self,
        group_id: &str,
        tool: &str,
        mode: ToolMode,
        bindings: &[ToolBinding],
    ) -> InteractionResult<()> {
        let group = self
            .tool_groups
            .group_mut(group_id)
            .ok_or_else(|| InteractionError::UnknownToolGroup(group_id.to_string()))?;
        match mode {
            ToolMode::Active => group.set_tool_active(tool, bindings)?,
            ToolMode::Passive => group.set_tool_passive(tool)?,
            ToolMode::Enabled => group.set_tool_enabled(tool)?,
            ToolMode::Disabled => group.set_tool_disabled(tool)?,
        }
        log::info!("Tool {tool} in group {group_id} is now {mode:?}");

        let members = group.surfaces().to_vec();
        for surface in members.iter().filter(|s| self.surfaces.contains(s)) {
            self.scheduler.mark_dirty(surface, &mut self.host)?;
        }
        Ok(())
    }

    // --- Annotations ---

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.store.get(id)
    }

    /// Store an annotation and repaint the surfaces showing its frame.
    pub fn add_annotation(&mut self, annotation: Annotation) -> InteractionResult<AnnotationRef> {
        let frame = annotation.frame_of_reference.clone();
        let reference = self.store.add(annotation);
        self.mark_frame_dirty(&frame)?;
        Ok(reference)
    }

    /// Remove an annotation, dropping it from the selection and lock sets.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> InteractionResult<Option<Annotation>> {
        let Some(annotation) = self.store.remove(id) else {
            return Ok(None);
        };
        self.selection.deselect(id, &mut self.bus);
        self.locks.unlock(id, &mut self.bus);
        self.mark_frame_dirty(&annotation.frame_of_reference)?;
        Ok(Some(annotation))
    }

    fn mark_frame_dirty(&mut self, frame: &str) -> InteractionResult<()> {
        let showing: Vec<SurfaceId> = self
            .surfaces
            .iter()
            .filter(|s| s.frame_of_reference() == frame)
            .map(|s| s.id().clone())
            .collect();
        for surface in &showing {
            self.scheduler.mark_dirty(surface, &mut self.host)?;
        }
        Ok(())
    }

    /// Repaint the surfaces showing `id`, if it is still stored.
    fn mark_annotation_dirty(&mut self, id: AnnotationId) -> InteractionResult<()> {
        match self.store.get(id).map(|a| a.frame_of_reference.clone()) {
            Some(frame) => self.mark_frame_dirty(&frame),
            None => Ok(()),
        }
    }

    // --- Selection and locks ---

    pub fn selection(&self) -> &SelectionRegistry {
        &self.selection
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn select(&mut self, annotation: AnnotationRef, mode: SelectMode) -> InteractionResult<bool> {
        let id = annotation.id;
        let changed = self.selection.select(annotation, mode, &mut self.bus);
        if changed {
            self.mark_annotation_dirty(id)?;
        }
        Ok(changed)
    }

    pub fn deselect(&mut self, id: AnnotationId) -> InteractionResult<bool> {
        let changed = self.selection.deselect(id, &mut self.bus);
        if changed {
            self.mark_annotation_dirty(id)?;
        }
        Ok(changed)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.selection.clear(&mut self.bus)
    }

    pub fn lock(&mut self, annotation: AnnotationRef) -> bool {
        self.locks.lock(annotation, &mut self.bus)
    }

    pub fn unlock(&mut self, id: AnnotationId) -> bool {
        self.locks.unlock(id, &mut self.bus)
    }

    pub fn unlock_all(&mut self) -> bool {
        self.locks.unlock_all(&mut self.bus)
    }

    // --- Events ---

    pub fn subscribe(&mut self, listener: impl FnMut(&InteractionEvent) + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Events published since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<InteractionEvent> {
        self.bus.drain()
    }

    /// Whether moves and ups should be routed here from anywhere in the
    /// document.
    pub fn is_capturing_mouse(&self) -> bool {
        self.mouse.is_capturing()
    }

    pub fn is_interacting(&self) -> bool {
        self.dispatcher.is_interacting()
    }

    // --- Input ---

    fn dispatch_down(&mut self, event: &GestureEvent) -> InteractionResult<DispatchOutcome> {
        let id = &event.target.surface;
        let surface = lookup(&self.surfaces, id)?;
        let group = self.tool_groups.group_for_surface_mut(id)?;
        let (proximity, activate) = match event.modality {
            InputModality::Mouse => (self.config.hit_proximity_px, GestureKind::DownActivate),
            InputModality::Touch => (self.config.touch_hit_proximity_px, GestureKind::StartActivate),
        };

        let outcome = self.dispatcher.on_down(
            event,
            group,
            DispatchContext {
                surface,
                store: &self.store,
                selection: &mut self.selection,
                locks: &self.locks,
                bus: &mut self.bus,
                proximity,
            },
        );
        match &outcome {
            DispatchOutcome::Unhandled => self.bus.publish_gesture(event.with_kind(activate)),
            DispatchOutcome::HandleSelected(_) | DispatchOutcome::AnnotationSelected(_) => {
                self.scheduler.mark_dirty(id, &mut self.host)?;
            }
            _ => {}
        }
        Ok(outcome)
    }

    fn route_drag(&mut self, event: &GestureEvent) -> InteractionResult<()> {
        if !self.dispatcher.is_interacting() {
            return Ok(());
        }
        let id = &event.target.surface;
        let group = match self.tool_groups.group_for_surface_mut(id) {
            Ok(group) => group,
            Err(e) => {
                log::warn!("Dropping drag: {e}");
                return Ok(());
            }
        };
        if self.dispatcher.on_drag(event, group, &mut self.store) {
            self.scheduler.mark_dirty(id, &mut self.host)?;
        }
        Ok(())
    }

    fn release(&mut self, event: &GestureEvent) -> InteractionResult<()> {
        let group = self.tool_groups.group_for_surface_mut(&event.target.surface).ok();
        if let Some(surface) = self.dispatcher.release(event, group) {
            if self.surfaces.contains(&surface) {
                self.scheduler.mark_dirty(&surface, &mut self.host)?;
            }
        }
        Ok(())
    }

    /// Mouse button pressed. Returns the dispatch outcome, or `None` when
    /// the press was ignored because a session is already live.
    pub fn mouse_down(&mut self, raw: &RawPointer) -> InteractionResult<Option<DispatchOutcome>> {
        let surface = input_surface(&self.surfaces, &self.tool_groups, &raw.surface)?;
        let Some(event) = self.mouse.down(surface, raw) else {
            return Ok(None);
        };
        self.bus.publish_gesture(event.clone());
        self.dispatch_down(&event).map(Some)
    }

    /// Pointer moved. While a button is held the move belongs to the session
    /// surface, wherever the pointer is.
    pub fn mouse_move(&mut self, raw: &RawPointer) -> InteractionResult<()> {
        let id = self.mouse.session_surface().unwrap_or(&raw.surface).clone();
        let surface = lookup(&self.surfaces, &id)?;
        let Some(event) = self.mouse.moved(surface, raw) else {
            return Ok(());
        };
        self.bus.publish_gesture(event.clone());
        if event.kind == GestureKind::Drag {
            self.route_drag(&event)?;
        }
        Ok(())
    }

    pub fn mouse_up(&mut self, raw: &RawPointer) -> InteractionResult<()> {
        let id = self.mouse.session_surface().unwrap_or(&raw.surface).clone();
        let surface = lookup(&self.surfaces, &id)?;
        let Some(event) = self.mouse.up(surface, raw) else {
            return Ok(());
        };
        self.bus.publish_gesture(event.clone());
        self.release(&event)
    }

    pub fn double_click(&mut self, raw: &RawPointer) -> InteractionResult<()> {
        let surface = lookup(&self.surfaces, &raw.surface)?;
        let event = self.mouse.double_click(surface, raw);
        self.bus.publish_gesture(event);
        Ok(())
    }

    pub fn wheel(&mut self, raw: &RawPointer, delta: Vec2) -> InteractionResult<()> {
        let surface = lookup(&self.surfaces, &raw.surface)?;
        let event = self.mouse.wheel(surface, raw, delta);
        self.bus.publish_gesture(event);
        Ok(())
    }

    /// New contacts. Returns the dispatch outcome when a touch session
    /// started.
    pub fn touch_start(&mut self, raw: &RawTouchEvent) -> InteractionResult<Option<DispatchOutcome>> {
        let surface = input_surface(&self.surfaces, &self.tool_groups, &raw.surface)?;
        let events = self.touch.start(surface, raw);
        let mut outcome = None;
        for event in events {
            self.bus.publish_gesture(event.clone());
            if event.kind == GestureKind::Start {
                outcome = Some(self.dispatch_down(&event)?);
            }
        }
        Ok(outcome)
    }

    pub fn touch_move(&mut self, raw: &RawTouchEvent) -> InteractionResult<()> {
        let id = self.touch.session_surface().unwrap_or(&raw.surface).clone();
        let surface = lookup(&self.surfaces, &id)?;
        let events = self.touch.moved(surface, raw);
        let mut routed = Ok(());
        for event in events {
            self.bus.publish_gesture(event.clone());
            if event.kind == GestureKind::Drag && routed.is_ok() {
                routed = self.route_drag(&event);
            }
        }
        routed
    }

    pub fn touch_end(&mut self, raw: &RawTouchEvent) -> InteractionResult<()> {
        let id = self.touch.session_surface().unwrap_or(&raw.surface).clone();
        let surface = lookup(&self.surfaces, &id)?;
        let events = self.touch.end(surface, raw);
        for event in events {
            self.bus.publish_gesture(event.clone());
            if event.kind == GestureKind::End {
                self.release(&event)?;
            }
        }
        Ok(())
    }

    /// Advance the gesture clock, firing due click, press and tap timers.
    pub fn tick(&mut self, now_ms: u64) {
        self.mouse.advance(now_ms);
        for event in self.touch.advance(now_ms) {
            self.bus.publish_gesture(event);
        }
    }

    // --- Rendering ---

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_dirty(&self, surface: &SurfaceId) -> bool {
        self.scheduler.is_dirty(surface)
    }

    pub fn mark_dirty(&mut self, surface: &SurfaceId) -> InteractionResult<()> {
        if !self.surfaces.contains(surface) {
            return Err(InteractionError::UnknownSurface(surface.clone()));
        }
        self.scheduler.mark_dirty(surface, &mut self.host)
    }

    /// The host's frame callback: paint every dirty surface once.
    pub fn on_frame(&mut self) -> InteractionResult<usize> {
        let known = self.surfaces.ids();
        let Self {
            scheduler,
            host,
            surfaces,
            tool_groups,
            store,
            bus,
            ..
        } = self;
        scheduler.on_frame(&known, host, |id, _, _| {
            let Some(surface) = surfaces.get(id) else {
                log::warn!("Skipping paint of {id}: surface went away");
                return;
            };
            match tool_groups.group_for_surface_mut(id) {
                Ok(group) => {
                    paint_surface(surface, group, store, bus);
                }
                Err(e) => log::warn!("Skipping paint of {id}: {e}"),
            }
        })
    }

    /// Stop rendering for good; a new engine is needed afterwards.
    pub fn destroy_scheduler(&mut self) {
        self.scheduler.destroy(&mut self.host);
    }
}

fn lookup<'a>(surfaces: &'a SurfaceRegistry, id: &SurfaceId) -> InteractionResult<&'a dyn Surface> {
    surfaces
        .get(id)
        .ok_or_else(|| InteractionError::UnknownSurface(id.clone()))
}

/// Surface for a `Down`/`Start`: registered, enabled and bound to a group.
fn input_surface<'a>(
    surfaces: &'a SurfaceRegistry,
    tool_groups: &ToolGroupRegistry,
    id: &SurfaceId,
) -> InteractionResult<&'a dyn Surface> {
    let surface = lookup(surfaces, id)?;
    if !surface.is_enabled() {
        return Err(InteractionError::SurfaceDisabled(id.clone()));
    }
    tool_groups.group_for_surface(id)?;
    Ok(surface)
}

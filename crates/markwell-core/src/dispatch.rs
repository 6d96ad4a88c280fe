//! Tool dispatch and hit-test resolution for `Down`-class gestures.
//!
//! Resolution order: pre-hook of the primary Active tool, handle hit-test,
//! whole-annotation hit-test, post-hook. The first step that consumes the
//! event ends the pass. A matched annotation is selected as a side effect.

use crate::annotation::{Annotation, AnnotationRef, AnnotationStore};
use crate::events::{EventBus, GestureEvent};
use crate::input::{InputModality, MouseButton};
use crate::registry::{LockRegistry, SelectMode, SelectionRegistry};
use crate::surface::{Surface, SurfaceId};
use crate::tools::{Capability, HandleRef, ToolGroup, ToolMode};
use serde::{Deserialize, Serialize};

/// What a hit-test matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitTarget {
    pub tool_name: String,
    pub annotation: AnnotationRef,
    /// `None` for a whole-annotation match.
    pub handle: Option<HandleRef>,
}

/// Result of a dispatch pass.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A modify loop is already running.
    Ignored,
    PreHookConsumed,
    HandleSelected(HitTarget),
    AnnotationSelected(HitTarget),
    PostHookConsumed,
    /// Nothing took the event; it goes to annotation creation.
    Unhandled,
}

impl DispatchOutcome {
    pub fn is_unhandled(&self) -> bool {
        matches!(self, DispatchOutcome::Unhandled)
    }
}

/// Shared state a dispatch pass reads and mutates.
pub struct DispatchContext<'a> {
    pub surface: &'a dyn Surface,
    pub store: &'a AnnotationStore,
    pub selection: &'a mut SelectionRegistry,
    pub locks: &'a LockRegistry,
    pub bus: &'a mut EventBus,
    /// Hit proximity in canvas pixels.
    pub proximity: f64,
}

/// A running modify loop. Only gestures of the modality that started it
/// steer or end it.
#[derive(Debug, Clone, PartialEq)]
struct Interaction {
    surface: SurfaceId,
    modality: InputModality,
    target: HitTarget,
}

/// Resolves `Down`/`Start` gestures to tools and tracks the modify loop
/// a tool starts in response.
#[derive(Debug, Default)]
pub struct ToolDispatcher {
    interaction: Option<Interaction>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tool's modify loop is running.
    pub fn is_interacting(&self) -> bool {
        self.interaction.is_some()
    }

    pub fn interaction_target(&self) -> Option<&HitTarget> {
        self.interaction.as_ref().map(|i| &i.target)
    }

    pub fn interaction_surface(&self) -> Option<&SurfaceId> {
        self.interaction.as_ref().map(|i| &i.surface)
    }

    /// Run a dispatch pass for a `Down` (mouse) or `Start` (touch) event.
    pub fn on_down(
        &mut self,
        event: &GestureEvent,
        group: &mut ToolGroup,
        mut ctx: DispatchContext<'_>,
    ) -> DispatchOutcome {
        if let Some(interaction) = &self.interaction {
            log::debug!(
                "Ignoring {:?} on {}: {} is interacting",
                event.kind,
                event.target.surface,
                interaction.target.tool_name
            );
            return DispatchOutcome::Ignored;
        }

        // Touch contacts act as the primary button.
        let button = event.button.unwrap_or(MouseButton::Left);
        let primary = group.primary_active_tool(button, &event.modifiers, event.modality);

        if let Some(name) = &primary {
            match group.tool_mut(name) {
                Some(tool) if tool.capabilities().contains(Capability::PreDown) => {
                    if tool.pre_down(event) {
                        log::debug!("{name} consumed {:?} in pre-hook", event.kind);
                        return DispatchOutcome::PreHookConsumed;
                    }
                }
                Some(_) => {}
                None => log::warn!("Primary tool {name} has no instance; skipping pre-hook"),
            }
        }

        let candidates = group.tools_bound_to(
            &[ToolMode::Active, ToolMode::Passive],
            button,
            &event.modifiers,
            event.modality,
        );
        let canvas_point = event.points.current.canvas;
        let frame = ctx.surface.frame_of_reference();

        // Per-tool visible annotations, dropping tools with none.
        let mut filtered: Vec<(&str, Vec<&Annotation>)> = Vec::new();
        for name in &candidates {
            let Some(tool) = group.tool(name) else {
                log::warn!("Tool {name} is bound in group {} but has no instance", group.id());
                continue;
            };
            let annotations: Vec<&Annotation> = ctx
                .store
                .for_tool(frame, name)
                .filter(|a| tool.is_visible(ctx.surface, a))
                .collect();
            if !annotations.is_empty() {
                filtered.push((name.as_str(), annotations));
            }
        }

        let handle_hit = Self::find_handle(group, &filtered, &ctx, canvas_point);
        let hit = handle_hit.or_else(|| Self::find_annotation(group, &filtered, &ctx, canvas_point));

        if let Some(target) = hit {
            let mode = if event.modifiers.is_multi_select() {
                SelectMode::Toggle
            } else {
                SelectMode::Replace
            };
            ctx.selection.select(target.annotation.clone(), mode, ctx.bus);

            let locked = ctx.locks.is_locked(target.annotation.id);
            let started = match group.tool_mut(&target.tool_name) {
                Some(tool) if target.handle.is_some() => tool.on_handle_selected(event, &target),
                Some(tool) => {
                    let started = tool.on_annotation_selected(event, &target);
                    // Locked annotations can be selected but never moved.
                    if started && locked {
                        log::debug!("{} is locked; not modifying", target.annotation.id);
                        tool.on_release(event, &target);
                        false
                    } else {
                        started
                    }
                }
                None => false,
            };
            if started {
                log::debug!(
                    "{} started modifying {} on {}",
                    target.tool_name,
                    target.annotation.id,
                    event.target.surface
                );
                self.interaction = Some(Interaction {
                    surface: event.target.surface.clone(),
                    modality: event.modality,
                    target: target.clone(),
                });
            }
            return if target.handle.is_some() {
                DispatchOutcome::HandleSelected(target)
            } else {
                DispatchOutcome::AnnotationSelected(target)
            };
        }

        if let Some(name) = &primary {
            if let Some(tool) = group.tool_mut(name) {
                if tool.capabilities().contains(Capability::PostDown) && tool.post_down(event) {
                    log::debug!("{name} consumed {:?} in post-hook", event.kind);
                    return DispatchOutcome::PostHookConsumed;
                }
            }
        }

        DispatchOutcome::Unhandled
    }

    /// First unlocked handle within proximity; locked annotations never match.
    fn find_handle(
        group: &ToolGroup,
        filtered: &[(&str, Vec<&Annotation>)],
        ctx: &DispatchContext<'_>,
        canvas_point: kurbo::Point,
    ) -> Option<HitTarget> {
        for (name, annotations) in filtered {
            let Some(tool) = group.tool(name) else {
                continue;
            };
            for annotation in annotations {
                if ctx.locks.is_locked(annotation.id) {
                    continue;
                }
                if let Some(handle) = tool.handle_near(ctx.surface, annotation, canvas_point, ctx.proximity) {
                    return Some(HitTarget {
                        tool_name: (*name).to_string(),
                        annotation: annotation.reference(),
                        handle: Some(handle),
                    });
                }
            }
        }
        None
    }

    /// First unlocked annotation within proximity, else the first match.
    fn find_annotation(
        group: &ToolGroup,
        filtered: &[(&str, Vec<&Annotation>)],
        ctx: &DispatchContext<'_>,
        canvas_point: kurbo::Point,
    ) -> Option<HitTarget> {
        let mut first_locked: Option<HitTarget> = None;
        for (name, annotations) in filtered {
            let Some(tool) = group.tool(name) else {
                continue;
            };
            for annotation in annotations {
                if !tool.annotation_near(ctx.surface, annotation, canvas_point, ctx.proximity) {
                    continue;
                }
                let target = HitTarget {
                    tool_name: (*name).to_string(),
                    annotation: annotation.reference(),
                    handle: None,
                };
                if !ctx.locks.is_locked(annotation.id) {
                    return Some(target);
                }
                first_locked.get_or_insert(target);
            }
        }
        first_locked
    }

    /// Route a `Drag` to the tool owning the modify loop. Returns whether the
    /// tool changed any annotation.
    pub fn on_drag(&mut self, event: &GestureEvent, group: &mut ToolGroup, store: &mut AnnotationStore) -> bool {
        let Some(interaction) = &self.interaction else {
            return false;
        };
        if interaction.surface != event.target.surface || interaction.modality != event.modality {
            return false;
        }
        match group.tool_mut(&interaction.target.tool_name) {
            Some(tool) => tool.on_drag(event, &interaction.target, store),
            None => {
                log::warn!(
                    "Tool {} went away mid-interaction",
                    interaction.target.tool_name
                );
                false
            }
        }
    }

    /// End the modify loop if `event` comes from the modality that started
    /// it. Returns the surface it ran on.
    pub fn release(&mut self, event: &GestureEvent, group: Option<&mut ToolGroup>) -> Option<SurfaceId> {
        if self.interaction.as_ref()?.modality != event.modality {
            return None;
        }
        let interaction = self.interaction.take()?;
        match group.and_then(|g| g.tool_mut(&interaction.target.tool_name)) {
            Some(tool) => tool.on_release(event, &interaction.target),
            None => log::warn!(
                "Tool {} went away before release",
                interaction.target.tool_name
            ),
        }
        Some(interaction.surface)
    }

    /// Drop the modify loop without notifying the tool.
    pub fn cancel(&mut self) {
        self.interaction = None;
    }
}

//! Trace format and replay driver.
//!
//! A trace declares surfaces, tools and annotations, then lists input steps
//! with explicit timestamps. Replaying feeds each step to an engine and
//! collects the events it published.

use kurbo::{Point, Vec2};
use markwell_core::{
    Annotation, InteractionConfig, InteractionEngine, InteractionError, InteractionEvent,
    ManualFrameHost, MarkerTool, Modifiers, MouseButton, RawPointer, RawTouch, RawTouchEvent,
    SurfaceId, ToolBinding, ToolMode, ViewSurface,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid trace: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] markwell_core::ConfigError),

    #[error("Step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: InteractionError,
    },

    #[error("Step {step}: unknown surface {surface}")]
    UnknownSurface { step: usize, surface: SurfaceId },
}

pub type ReplayResult<T> = Result<T, ReplayError>;

#[derive(Debug, Deserialize)]
pub struct Trace {
    #[serde(default)]
    pub config: InteractionConfig,
    pub surfaces: Vec<SurfaceDef>,
    #[serde(default)]
    pub tools: Vec<ToolDef>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDef>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct SurfaceDef {
    pub id: SurfaceId,
    pub frame_of_reference: String,
    #[serde(default)]
    pub viewport_id: Option<String>,
    #[serde(default)]
    pub engine_id: Option<String>,
    #[serde(default)]
    pub origin: Option<Point>,
}

/// A marker tool in the single tool group every surface joins.
#[derive(Debug, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub mode: ToolMode,
    #[serde(default)]
    pub bindings: Vec<ToolBinding>,
}

#[derive(Debug, Deserialize)]
pub struct AnnotationDef {
    pub tool_name: String,
    pub frame_of_reference: String,
    pub handles: Vec<Point>,
    #[serde(default)]
    pub plane: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointerStep {
    pub surface: SurfaceId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub button: Option<MouseButton>,
    #[serde(default)]
    pub modifiers: Modifiers,
    pub time_ms: u64,
}

impl PointerStep {
    fn raw(&self) -> RawPointer {
        RawPointer::at(self.surface.clone(), Point::new(self.x, self.y), self.time_ms)
            .with_button(self.button.unwrap_or(MouseButton::Left))
            .with_modifiers(self.modifiers)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TouchPoint {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TouchStep {
    pub surface: SurfaceId,
    pub touches: Vec<TouchPoint>,
    pub time_ms: u64,
}

impl TouchStep {
    fn raw(&self) -> RawTouchEvent {
        let touches = self
            .touches
            .iter()
            .map(|t| RawTouch::at(t.id, Point::new(t.x, t.y)))
            .collect();
        RawTouchEvent::new(self.surface.clone(), touches, self.time_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    MouseDown(PointerStep),
    MouseMove(PointerStep),
    MouseUp(PointerStep),
    DoubleClick(PointerStep),
    Wheel {
        #[serde(flatten)]
        pointer: PointerStep,
        delta: Vec2,
    },
    TouchStart(TouchStep),
    TouchMove(TouchStep),
    TouchEnd(TouchStep),
    Tick {
        now_ms: u64,
    },
    /// Fire the pending display refresh, if any.
    Frame,
    Pan {
        surface: SurfaceId,
        delta: Vec2,
    },
    Zoom {
        surface: SurfaceId,
        at: Point,
        factor: f64,
    },
    SetEnabled {
        surface: SurfaceId,
        enabled: bool,
    },
}

const GROUP: &str = "default";

impl Trace {
    pub fn from_json_str(json: &str) -> ReplayResult<Self> {
        let trace: Self = serde_json::from_str(json)?;
        trace.config.validate()?;
        Ok(trace)
    }

    pub fn load(path: impl AsRef<Path>) -> ReplayResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Engine plus host-side handles to its surfaces.
pub struct Replay {
    engine: InteractionEngine,
    views: HashMap<SurfaceId, ViewSurface>,
}

impl Replay {
    /// Build the engine described by the trace header.
    pub fn new(trace: &Trace) -> ReplayResult<Self> {
        let setup = |source| ReplayError::Step { step: 0, source };
        let mut engine = InteractionEngine::new(trace.config.clone(), ManualFrameHost::new());
        let mut views = HashMap::new();

        let group = engine.create_tool_group(GROUP).map_err(setup)?;
        for tool in &trace.tools {
            group.add_tool(Box::new(MarkerTool::new(tool.name.clone())));
        }
        for def in &trace.surfaces {
            group.add_surface(def.id.clone());
        }

        for def in &trace.surfaces {
            let mut view = ViewSurface::new(def.id.clone(), def.frame_of_reference.clone());
            if let (Some(viewport), Some(engine_id)) = (&def.viewport_id, &def.engine_id) {
                view = view.with_viewport(viewport.clone(), engine_id.clone());
            }
            if let Some(origin) = def.origin {
                view = view.with_origin(origin);
            }
            engine.register_surface(Box::new(view.clone()));
            views.insert(def.id.clone(), view);
        }

        for tool in &trace.tools {
            engine
                .set_tool_mode(GROUP, &tool.name, tool.mode, &tool.bindings)
                .map_err(setup)?;
        }

        for def in &trace.annotations {
            let mut annotation =
                Annotation::new(def.tool_name.clone(), def.frame_of_reference.clone(), def.handles.clone());
            if let Some(plane) = &def.plane {
                annotation = annotation.with_plane(plane.clone());
            }
            let reference = engine.add_annotation(annotation).map_err(setup)?;
            if def.locked {
                engine.lock(reference);
            }
        }

        log::info!(
            "Replay set up: {} surfaces, {} tools, {} annotations",
            trace.surfaces.len(),
            trace.tools.len(),
            trace.annotations.len()
        );
        Ok(Self { engine, views })
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    fn view(&self, step: usize, surface: &SurfaceId) -> ReplayResult<&ViewSurface> {
        self.views.get(surface).ok_or_else(|| ReplayError::UnknownSurface {
            step,
            surface: surface.clone(),
        })
    }

    /// Apply one step (1-based index for diagnostics) and return the events
    /// it produced.
    pub fn apply(&mut self, index: usize, step: &Step) -> ReplayResult<Vec<InteractionEvent>> {
        let fail = |source| ReplayError::Step { step: index, source };
        let engine = &mut self.engine;
        match step {
            Step::MouseDown(p) => {
                engine.mouse_down(&p.raw()).map_err(fail)?;
            }
            Step::MouseMove(p) => engine.mouse_move(&p.raw()).map_err(fail)?,
            Step::MouseUp(p) => engine.mouse_up(&p.raw()).map_err(fail)?,
            Step::DoubleClick(p) => engine.double_click(&p.raw()).map_err(fail)?,
            Step::Wheel { pointer, delta } => engine.wheel(&pointer.raw(), *delta).map_err(fail)?,
            Step::TouchStart(t) => {
                engine.touch_start(&t.raw()).map_err(fail)?;
            }
            Step::TouchMove(t) => engine.touch_move(&t.raw()).map_err(fail)?,
            Step::TouchEnd(t) => engine.touch_end(&t.raw()).map_err(fail)?,
            Step::Tick { now_ms } => engine.tick(*now_ms),
            Step::Frame => {
                if engine.host_mut().take_pending().is_some() {
                    engine.on_frame().map_err(fail)?;
                }
            }
            Step::Pan { surface, delta } => {
                self.view(index, surface)?.pan(*delta);
                self.engine.mark_dirty(surface).map_err(fail)?;
            }
            Step::Zoom { surface, at, factor } => {
                self.view(index, surface)?.zoom_at(*at, *factor);
                self.engine.mark_dirty(surface).map_err(fail)?;
            }
            Step::SetEnabled { surface, enabled } => {
                self.view(index, surface)?.set_enabled(*enabled);
            }
        }
        Ok(self.engine.drain_events())
    }

    /// Run every step, handing each event to `sink` in publish order.
    pub fn run(&mut self, steps: &[Step], mut sink: impl FnMut(&InteractionEvent)) -> ReplayResult<()> {
        // Setup events (mode changes, initial locks) come first.
        for event in self.engine.drain_events() {
            sink(&event);
        }
        for (i, step) in steps.iter().enumerate() {
            for event in self.apply(i + 1, step)? {
                sink(&event);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markwell_core::GestureKind;
    use std::io::Write;

    const TRACE: &str = r#"{
        "config": { "click_delay_ms": 200 },
        "surfaces": [{ "id": "axial", "frame_of_reference": "FOR-1" }],
        "tools": [{ "name": "Length", "mode": "Passive" }],
        "annotations": [
            { "tool_name": "Length", "frame_of_reference": "FOR-1",
              "handles": [{ "x": 10.0, "y": 10.0 }, { "x": 100.0, "y": 10.0 }] }
        ],
        "steps": [
            { "type": "frame" },
            { "type": "mouse_down", "surface": "axial", "x": 10.0, "y": 10.0, "time_ms": 0 },
            { "type": "mouse_move", "surface": "axial", "x": 20.0, "y": 30.0, "time_ms": 10 },
            { "type": "mouse_up", "surface": "axial", "x": 20.0, "y": 30.0, "time_ms": 20 },
            { "type": "frame" },
            { "type": "wheel", "surface": "axial", "x": 0.0, "y": 0.0, "time_ms": 30,
              "delta": { "x": 0.0, "y": -3.0 } }
        ]
    }"#;

    fn gestures(events: &[InteractionEvent]) -> Vec<GestureKind> {
        events
            .iter()
            .filter_map(|e| match e {
                InteractionEvent::Gesture(g) => Some(g.kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_replay_drag_trace() {
        let trace = Trace::from_json_str(TRACE).unwrap();
        let mut replay = Replay::new(&trace).unwrap();
        let mut events = Vec::new();
        replay.run(&trace.steps, |e| events.push(e.clone())).unwrap();

        assert_eq!(
            gestures(&events),
            vec![
                GestureKind::Down,
                GestureKind::Drag,
                GestureKind::Up,
                GestureKind::Wheel {
                    delta: Vec2::new(0.0, -3.0)
                }
            ]
        );
        let rendered = events
            .iter()
            .filter(|e| matches!(e, InteractionEvent::AnnotationRendered(_)))
            .count();
        assert_eq!(rendered, 2);

        let stored: Vec<_> = replay.engine().store().for_tool("FOR-1", "Length").collect();
        assert_eq!(stored[0].handles[0], Point::new(20.0, 30.0));
    }

    #[test]
    fn test_unknown_surface_reports_step() {
        let json = r#"{
            "surfaces": [{ "id": "axial", "frame_of_reference": "FOR-1" }],
            "steps": [
                { "type": "tick", "now_ms": 5 },
                { "type": "mouse_down", "surface": "sagittal", "x": 0.0, "y": 0.0, "time_ms": 10 }
            ]
        }"#;
        let trace = Trace::from_json_str(json).unwrap();
        let mut replay = Replay::new(&trace).unwrap();
        let err = replay.run(&trace.steps, |_| {}).unwrap_err();
        assert!(matches!(err, ReplayError::Step { step: 2, .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let json = r#"{ "config": { "hit_proximity_px": 0.0 }, "surfaces": [], "steps": [] }"#;
        assert!(matches!(Trace::from_json_str(json), Err(ReplayError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRACE.as_bytes()).unwrap();
        let trace = Trace::load(file.path()).unwrap();
        assert_eq!(trace.steps.len(), 6);
        assert_eq!(trace.tools[0].mode, ToolMode::Passive);
    }
}

//! Markwell Core Library
//!
//! Platform-agnostic interaction engine for on-screen annotation tools:
//! gesture normalization, tool dispatch and hit-testing, selection/lock
//! registries, and frame-batched repaint scheduling.

pub mod annotation;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod gesture;
pub mod input;
pub mod points;
pub mod registry;
pub mod render;
pub mod surface;
pub mod tools;

pub use annotation::{Annotation, AnnotationId, AnnotationRef, AnnotationStore};
pub use config::{ConfigError, InteractionConfig};
pub use dispatch::{DispatchContext, DispatchOutcome, HitTarget, ToolDispatcher};
pub use engine::InteractionEngine;
pub use error::{InteractionError, InteractionResult};
pub use events::{
    AnnotationRendered, EventBus, GestureEvent, GestureKind, InteractionEvent, ListenerId,
    LockChange, MembershipChange, SelectionChange, SwipeDirection, TouchContact,
};
pub use gesture::{MouseNormalizer, TouchNormalizer};
pub use input::{
    InputModality, ModifierKey, Modifiers, MouseButton, RawPointer, RawTouch, RawTouchEvent, TouchId,
};
pub use points::{GesturePoints, SpaceDeltas, SpacePoints};
pub use registry::{LockRegistry, SelectMode, SelectionRegistry};
pub use render::{
    FrameHost, ManualFrameHost, PaintError, RenderScheduler, SchedulerState, paint_surface,
};
pub use surface::{Surface, SurfaceId, SurfaceRef, SurfaceRegistry, ViewSurface, ViewTransform};
pub use tools::{
    Capabilities, Capability, HandleRef, MarkerTool, Tool, ToolBinding, ToolGroup,
    ToolGroupRegistry, ToolMode,
};

//! Rendering surfaces and the coordinate transforms they own.
//!
//! A surface is one interactive view. It converts client (viewport-relative)
//! coordinates into surface-local canvas coordinates, and canvas coordinates
//! into world coordinates through its current view transform.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier of a rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SurfaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Surface/viewport/engine identifiers carried by every event payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceRef {
    pub surface: SurfaceId,
    pub viewport_id: String,
    pub engine_id: String,
}

/// Collaborator interface for a rendering surface.
pub trait Surface {
    fn id(&self) -> &SurfaceId;

    fn viewport_id(&self) -> &str;

    fn engine_id(&self) -> &str;

    /// Coordinate frame of reference of the data shown on this surface.
    fn frame_of_reference(&self) -> &str;

    /// Whether the surface still has an enabled rendering context.
    fn is_enabled(&self) -> bool;

    /// Convert a client (viewport-relative) point to surface-local canvas space.
    fn client_to_canvas(&self, client: Point) -> Point;

    /// Unproject a canvas point to world space using the current view.
    fn canvas_to_world(&self, canvas: Point) -> Point;

    /// Project a world point to canvas space using the current view.
    fn world_to_canvas(&self, world: Point) -> Point;

    fn reference(&self) -> SurfaceRef {
        SurfaceRef {
            surface: self.id().clone(),
            viewport_id: self.viewport_id().to_string(),
            engine_id: self.engine_id().to_string(),
        }
    }
}

/// Pan/zoom transform between world and canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Current translation offset (pan), in canvas pixels.
    pub offset: Vec2,
    /// Canvas pixels per world unit.
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.05,
            max_zoom: 50.0,
        }
    }
}

impl ViewTransform {
    /// World to canvas.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Canvas to world.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn canvas_to_world(&self, canvas: Point) -> Point {
        self.inverse_transform() * canvas
    }

    pub fn world_to_canvas(&self, world: Point) -> Point {
        self.transform() * world
    }

    /// Pan by a delta in canvas pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom keeping the given canvas point fixed.
    pub fn zoom_at(&mut self, canvas_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let world_point = self.canvas_to_world(canvas_point);
        self.zoom = new_zoom;

        let moved = self.world_to_canvas(world_point);
        self.offset += canvas_point - moved;
    }
}

/// A surface backed by a pan/zoom view.
///
/// Clones share the view and the enabled flag, so a host can keep a handle
/// and change the camera or tear the surface down while the engine holds
/// another clone.
#[derive(Debug, Clone)]
pub struct ViewSurface {
    id: SurfaceId,
    viewport_id: String,
    engine_id: String,
    frame_of_reference: String,
    /// Client-space position of the canvas top-left corner.
    origin: Point,
    view: Rc<Cell<ViewTransform>>,
    enabled: Rc<Cell<bool>>,
}

impl ViewSurface {
    pub fn new(id: impl Into<SurfaceId>, frame_of_reference: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            viewport_id: id.0.clone(),
            engine_id: "default".to_string(),
            id,
            frame_of_reference: frame_of_reference.into(),
            origin: Point::ZERO,
            view: Rc::new(Cell::new(ViewTransform::default())),
            enabled: Rc::new(Cell::new(true)),
        }
    }

    pub fn with_viewport(mut self, viewport_id: impl Into<String>, engine_id: impl Into<String>) -> Self {
        self.viewport_id = viewport_id.into();
        self.engine_id = engine_id.into();
        self
    }

    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn view(&self) -> ViewTransform {
        self.view.get()
    }

    pub fn set_view(&self, view: ViewTransform) {
        self.view.set(view);
    }

    pub fn pan(&self, delta: Vec2) {
        let mut view = self.view.get();
        view.pan(delta);
        self.view.set(view);
    }

    pub fn zoom_at(&self, canvas_point: Point, factor: f64) {
        let mut view = self.view.get();
        view.zoom_at(canvas_point, factor);
        self.view.set(view);
    }

    /// Enable or tear down the rendering context.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

impl Surface for ViewSurface {
    fn id(&self) -> &SurfaceId {
        &self.id
    }

    fn viewport_id(&self) -> &str {
        &self.viewport_id
    }

    fn engine_id(&self) -> &str {
        &self.engine_id
    }

    fn frame_of_reference(&self) -> &str {
        &self.frame_of_reference
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn client_to_canvas(&self, client: Point) -> Point {
        (client - self.origin).to_point()
    }

    fn canvas_to_world(&self, canvas: Point) -> Point {
        self.view.get().canvas_to_world(canvas)
    }

    fn world_to_canvas(&self, world: Point) -> Point {
        self.view.get().world_to_canvas(world)
    }
}

/// Surfaces currently known to the engine, in registration order.
#[derive(Default)]
pub struct SurfaceRegistry {
    surfaces: Vec<Box<dyn Surface>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a surface, replacing any surface with the same id in place.
    pub fn register(&mut self, surface: Box<dyn Surface>) {
        if let Some(slot) = self.surfaces.iter_mut().find(|s| s.id() == surface.id()) {
            *slot = surface;
        } else {
            self.surfaces.push(surface);
        }
    }

    pub fn remove(&mut self, id: &SurfaceId) -> Option<Box<dyn Surface>> {
        let index = self.surfaces.iter().position(|s| s.id() == id)?;
        Some(self.surfaces.remove(index))
    }

    pub fn get(&self, id: &SurfaceId) -> Option<&dyn Surface> {
        self.surfaces.iter().find(|s| s.id() == id).map(|s| s.as_ref())
    }

    pub fn contains(&self, id: &SurfaceId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<SurfaceId> {
        self.surfaces.iter().map(|s| s.id().clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Surface> {
        self.surfaces.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

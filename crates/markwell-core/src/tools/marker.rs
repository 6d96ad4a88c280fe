//! Point/polyline measurement marker.

use super::{Capabilities, Capability, HandleRef, Tool};
use crate::annotation::{Annotation, AnnotationStore};
use crate::dispatch::HitTarget;
use crate::events::GestureEvent;
use crate::render::PaintError;
use crate::surface::{Surface, SurfaceRef};
use kurbo::{Line, ParamCurveNearest, Point};

type VisibilityFn = Box<dyn Fn(&dyn Surface, &Annotation) -> bool>;
type PaintFn = Box<dyn FnMut(&SurfaceRef, &Annotation, &[Point])>;

/// A marker whose handles are joined by straight segments.
///
/// Dragging a handle moves that handle; dragging the body moves every handle.
pub struct MarkerTool {
    name: String,
    capabilities: Capabilities,
    visibility: Option<VisibilityFn>,
    painter: Option<PaintFn>,
}

impl MarkerTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::empty().with(Capability::Paint),
            visibility: None,
            painter: None,
        }
    }

    /// Only hit-test and paint annotations the predicate accepts.
    pub fn with_visibility(mut self, visibility: impl Fn(&dyn Surface, &Annotation) -> bool + 'static) -> Self {
        self.visibility = Some(Box::new(visibility));
        self
    }

    /// Drawing callback, given the annotation's handles in canvas space.
    pub fn with_painter(mut self, painter: impl FnMut(&SurfaceRef, &Annotation, &[Point]) + 'static) -> Self {
        self.painter = Some(Box::new(painter));
        self
    }

    fn canvas_handles(surface: &dyn Surface, annotation: &Annotation) -> Vec<Point> {
        annotation
            .handles
            .iter()
            .map(|&h| surface.world_to_canvas(h))
            .collect()
    }
}

impl Tool for MarkerTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn is_visible(&self, surface: &dyn Surface, annotation: &Annotation) -> bool {
        self.visibility.as_ref().is_none_or(|f| f(surface, annotation))
    }

    fn handle_near(
        &self,
        surface: &dyn Surface,
        annotation: &Annotation,
        canvas_point: Point,
        proximity: f64,
    ) -> Option<HandleRef> {
        annotation.handles.iter().enumerate().find_map(|(index, &world)| {
            let canvas = surface.world_to_canvas(world);
            (canvas.distance(canvas_point) <= proximity).then_some(HandleRef {
                index,
                position: world,
            })
        })
    }

    fn annotation_near(
        &self,
        surface: &dyn Surface,
        annotation: &Annotation,
        canvas_point: Point,
        proximity: f64,
    ) -> bool {
        let points = Self::canvas_handles(surface, annotation);
        match points.as_slice() {
            [] => false,
            [single] => single.distance(canvas_point) <= proximity,
            _ => points.windows(2).any(|pair| {
                let nearest = Line::new(pair[0], pair[1]).nearest(canvas_point, 1e-6);
                nearest.distance_sq <= proximity * proximity
            }),
        }
    }

    fn on_handle_selected(&mut self, _event: &GestureEvent, target: &HitTarget) -> bool {
        log::debug!("{}: dragging handle {:?} of {}", self.name, target.handle, target.annotation.id);
        true
    }

    fn on_annotation_selected(&mut self, _event: &GestureEvent, target: &HitTarget) -> bool {
        log::debug!("{}: moving {}", self.name, target.annotation.id);
        true
    }

    fn on_drag(&mut self, event: &GestureEvent, target: &HitTarget, store: &mut AnnotationStore) -> bool {
        let Some(annotation) = store.get_mut(target.annotation.id) else {
            log::warn!("{}: annotation {} vanished mid-drag", self.name, target.annotation.id);
            return false;
        };
        let delta = event.points.delta.world;
        match target.handle {
            Some(handle) => match annotation.handles.get_mut(handle.index) {
                Some(position) => *position += delta,
                None => return false,
            },
            None => {
                for position in &mut annotation.handles {
                    *position += delta;
                }
            }
        }
        true
    }

    fn render(&mut self, surface: &dyn Surface, annotations: &[&Annotation]) -> Result<bool, PaintError> {
        let Some(painter) = self.painter.as_mut() else {
            return Ok(!annotations.is_empty());
        };
        let target = surface.reference();
        for annotation in annotations {
            let points = Self::canvas_handles(surface, annotation);
            painter(&target, annotation, &points);
        }
        Ok(!annotations.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ViewSurface, ViewTransform};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn line() -> Annotation {
        Annotation::new("Length", "FOR", vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)])
    }

    #[test]
    fn test_handle_near() {
        let surface = ViewSurface::new("a", "FOR");
        let tool = MarkerTool::new("Length");
        let annotation = line();

        let hit = tool.handle_near(&surface, &annotation, Point::new(98.0, 3.0), 6.0).unwrap();
        assert_eq!(hit.index, 1);
        assert!(tool.handle_near(&surface, &annotation, Point::new(50.0, 0.0), 6.0).is_none());
    }

    #[test]
    fn test_handle_near_respects_zoom() {
        let surface = ViewSurface::new("a", "FOR");
        surface.set_view(ViewTransform {
            zoom: 2.0,
            ..ViewTransform::default()
        });
        let tool = MarkerTool::new("Length");
        // World (100, 0) is canvas (200, 0).
        assert!(tool.handle_near(&surface, &line(), Point::new(197.0, 0.0), 6.0).is_some());
        assert!(tool.handle_near(&surface, &line(), Point::new(100.0, 0.0), 6.0).is_none());
    }

    #[test]
    fn test_annotation_near_segment() {
        let surface = ViewSurface::new("a", "FOR");
        let tool = MarkerTool::new("Length");
        assert!(tool.annotation_near(&surface, &line(), Point::new(50.0, 5.0), 6.0));
        assert!(!tool.annotation_near(&surface, &line(), Point::new(50.0, 7.0), 6.0));
        assert!(!tool.annotation_near(&surface, &line(), Point::new(120.0, 0.0), 6.0));
    }

    #[test]
    fn test_visibility_predicate() {
        let surface = ViewSurface::new("a", "FOR");
        let tool = MarkerTool::new("Length").with_visibility(|_, a| a.plane.as_deref() == Some("slice-3"));
        assert!(!tool.is_visible(&surface, &line()));
        assert!(tool.is_visible(&surface, &line().with_plane("slice-3")));
    }

    #[test]
    fn test_render_calls_painter_in_canvas_space() {
        let surface = ViewSurface::new("a", "FOR").with_origin(Point::new(10.0, 10.0));
        surface.set_view(ViewTransform {
            zoom: 2.0,
            ..ViewTransform::default()
        });
        let drawn = Rc::new(RefCell::new(Vec::new()));
        let sink = drawn.clone();
        let mut tool = MarkerTool::new("Length").with_painter(move |_, _, points| {
            sink.borrow_mut().extend_from_slice(points);
        });

        let annotation = line();
        assert!(tool.render(&surface, &[&annotation]).unwrap());
        assert_eq!(*drawn.borrow(), vec![Point::new(0.0, 0.0), Point::new(200.0, 0.0)]);
        assert!(!tool.render(&surface, &[]).unwrap());
    }
}

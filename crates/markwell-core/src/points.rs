//! Points expressed in the four coordinate spaces every gesture carries.

use crate::surface::Surface;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// One point in page, client, canvas and world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpacePoints {
    /// Raw device/page position.
    pub page: Point,
    /// Viewport-relative position.
    pub client: Point,
    /// Surface-local position.
    pub canvas: Point,
    /// Unprojected world position.
    pub world: Point,
}

impl SpacePoints {
    /// Resolve canvas and world positions through the surface.
    pub fn resolve(surface: &dyn Surface, page: Point, client: Point) -> Self {
        let canvas = surface.client_to_canvas(client);
        Self {
            page,
            client,
            canvas,
            world: surface.canvas_to_world(canvas),
        }
    }

    /// Recompute the world position with the surface's current view.
    pub fn reproject(&self, surface: &dyn Surface) -> Self {
        Self {
            world: surface.canvas_to_world(self.canvas),
            ..*self
        }
    }

    /// Component-wise mean of a set of points. Empty input yields the origin.
    pub fn mean(points: &[SpacePoints]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let n = points.len() as f64;
        let avg = |f: fn(&SpacePoints) -> Point| {
            let sum = points
                .iter()
                .fold(Vec2::ZERO, |acc, p| acc + f(p).to_vec2());
            (sum / n).to_point()
        };
        Self {
            page: avg(|p| p.page),
            client: avg(|p| p.client),
            canvas: avg(|p| p.canvas),
            world: avg(|p| p.world),
        }
    }
}

/// Per-space difference between two [`SpacePoints`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpaceDeltas {
    pub page: Vec2,
    pub client: Vec2,
    pub canvas: Vec2,
    pub world: Vec2,
}

impl SpaceDeltas {
    /// `to - from` in every space.
    pub fn between(from: &SpacePoints, to: &SpacePoints) -> Self {
        Self {
            page: to.page - from.page,
            client: to.client - from.client,
            canvas: to.canvas - from.canvas,
            world: to.world - from.world,
        }
    }
}

/// Start/last/current points of a gesture and the last-to-current delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GesturePoints {
    pub start: SpacePoints,
    pub last: SpacePoints,
    pub current: SpacePoints,
    pub delta: SpaceDeltas,
}

impl GesturePoints {
    /// Points for a gesture that has not moved.
    pub fn stationary(point: SpacePoints) -> Self {
        Self {
            start: point,
            last: point,
            current: point,
            delta: SpaceDeltas::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ViewSurface, ViewTransform};

    #[test]
    fn test_resolve_all_spaces() {
        let surface = ViewSurface::new("a", "FOR").with_origin(Point::new(100.0, 0.0));
        surface.set_view(ViewTransform {
            zoom: 2.0,
            ..ViewTransform::default()
        });
        let p = SpacePoints::resolve(&surface, Point::new(130.0, 40.0), Point::new(120.0, 40.0));
        assert_eq!(p.page, Point::new(130.0, 40.0));
        assert_eq!(p.canvas, Point::new(20.0, 40.0));
        assert!((p.world.x - 10.0).abs() < 1e-10);
        assert!((p.world.y - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_mean() {
        let a = SpacePoints {
            page: Point::new(0.0, 0.0),
            client: Point::new(0.0, 0.0),
            canvas: Point::new(0.0, 0.0),
            world: Point::new(0.0, 0.0),
        };
        let b = SpacePoints {
            page: Point::new(10.0, 20.0),
            client: Point::new(10.0, 20.0),
            canvas: Point::new(10.0, 20.0),
            world: Point::new(4.0, 8.0),
        };
        let mean = SpacePoints::mean(&[a, b]);
        assert!((mean.page.x - 5.0).abs() < f64::EPSILON);
        assert!((mean.page.y - 10.0).abs() < f64::EPSILON);
        assert!((mean.world.y - 4.0).abs() < f64::EPSILON);
        assert_eq!(SpacePoints::mean(&[]), SpacePoints::default());
    }

    #[test]
    fn test_reproject_uses_current_view() {
        let surface = ViewSurface::new("a", "FOR");
        let p = SpacePoints::resolve(&surface, Point::new(10.0, 10.0), Point::new(10.0, 10.0));
        surface.pan(Vec2::new(10.0, 0.0));
        let moved = p.reproject(&surface);
        assert_eq!(moved.canvas, p.canvas);
        assert!((moved.world.x - 0.0).abs() < 1e-10);
    }
}

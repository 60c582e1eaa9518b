use std::f64::consts::PI;

use crate::graph::Coordinates;

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Integer pixel position on the drawing surface. Several nodes may share one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProjectedPoint {
    pub x: i32,
    pub y: i32,
}

impl ProjectedPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

pub trait Projector {
    fn project(&self, location: Coordinates) -> ProjectedPoint;
}

impl<F> Projector for F
where
    F: Fn(Coordinates) -> ProjectedPoint,
{
    fn project(&self, location: Coordinates) -> ProjectedPoint {
        self(location)
    }
}

/// Visible map window: geographic center, fractional zoom level and pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: Coordinates,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const MIN_ZOOM: f64 = 2.0;
    pub const MAX_ZOOM: f64 = 19.0;

    pub fn new(center: Coordinates, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM),
            width,
            height,
        }
    }

    /// Moves the center by a screen-space delta in pixels.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (x, y) = world_pixel(self.center, self.zoom);
        self.center = unproject_world_pixel(x + dx, y + dy, self.zoom);
    }

    /// Zooms around `anchor` (screen pixels) so the location under it stays put.
    pub fn zoom_around(&mut self, delta: f64, anchor: (f64, f64)) {
        let zoom = (self.zoom + delta).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        if (zoom - self.zoom).abs() <= f64::EPSILON {
            return;
        }

        let (cx, cy) = world_pixel(self.center, self.zoom);
        let anchor_world = (
            cx + anchor.0 - self.width / 2.0,
            cy + anchor.1 - self.height / 2.0,
        );
        let anchored = unproject_world_pixel(anchor_world.0, anchor_world.1, self.zoom);

        self.zoom = zoom;
        let (ax, ay) = world_pixel(anchored, zoom);
        self.center = unproject_world_pixel(
            ax - anchor.0 + self.width / 2.0,
            ay - anchor.1 + self.height / 2.0,
            zoom,
        );
    }
}

/// Web-Mercator projection into the pixel space of a [`Viewport`].
#[derive(Clone, Copy, Debug)]
pub struct MercatorProjector {
    viewport: Viewport,
    center_px: (f64, f64),
}

impl MercatorProjector {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            center_px: world_pixel(viewport.center, viewport.zoom),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl Projector for MercatorProjector {
    fn project(&self, location: Coordinates) -> ProjectedPoint {
        let (x, y) = world_pixel(location, self.viewport.zoom);
        let screen_x = x - self.center_px.0 + self.viewport.width / 2.0;
        let screen_y = y - self.center_px.1 + self.viewport.height / 2.0;
        ProjectedPoint::new(screen_x.round() as i32, screen_y.round() as i32)
    }
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

fn world_pixel(location: Coordinates, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = location.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (location.lon + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

fn unproject_world_pixel(x: f64, y: f64, zoom: f64) -> Coordinates {
    let size = world_size(zoom);
    let lon = x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let lat = n.sinh().atan().to_degrees();
    Coordinates::new(lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leuven() -> Coordinates {
        Coordinates::new(50.8798, 4.7005)
    }

    #[test]
    fn center_projects_to_middle_of_viewport() {
        let projector = MercatorProjector::new(Viewport::new(leuven(), 14.0, 800.0, 600.0));
        assert_eq!(projector.project(leuven()), ProjectedPoint::new(400, 300));
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let projector = MercatorProjector::new(Viewport::new(leuven(), 14.0, 800.0, 600.0));
        let north_east = projector.project(Coordinates::new(50.89, 4.71));
        assert!(north_east.x > 400);
        assert!(north_east.y < 300);
    }

    #[test]
    fn pan_round_trips() {
        let mut viewport = Viewport::new(leuven(), 12.0, 800.0, 600.0);
        viewport.pan_by(120.0, -45.0);
        viewport.pan_by(-120.0, 45.0);
        assert!((viewport.center.lat - leuven().lat).abs() < 1e-9);
        assert!((viewport.center.lon - leuven().lon).abs() < 1e-9);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut viewport = Viewport::new(leuven(), 12.0, 800.0, 600.0);
        let target = Coordinates::new(50.885, 4.71);
        let before = MercatorProjector::new(viewport).project(target);

        viewport.zoom_around(1.5, (before.x as f64, before.y as f64));
        let after = MercatorProjector::new(viewport).project(target);

        assert!((before.x - after.x).abs() <= 2);
        assert!((before.y - after.y).abs() <= 2);
        assert_eq!(viewport.zoom, 13.5);
    }

    #[test]
    fn offset_saturates_instead_of_wrapping() {
        let corner = ProjectedPoint::new(i32::MAX, i32::MIN);
        assert_eq!(corner.offset(5, -5), corner);
        assert_eq!(corner.offset(-5, 5), ProjectedPoint::new(i32::MAX - 5, i32::MIN + 5));
    }

    #[test]
    fn huge_longitude_projects_without_overflow() {
        let projector = MercatorProjector::new(Viewport::new(leuven(), 14.0, 800.0, 600.0));
        let point = projector.project(Coordinates::new(0.0, 1e300));
        assert_eq!(point.x, i32::MAX);
        assert_eq!(point.offset(3, 0).x, i32::MAX);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewport = Viewport::new(leuven(), 40.0, 800.0, 600.0);
        assert_eq!(viewport.zoom, Viewport::MAX_ZOOM);
        viewport.zoom_around(-100.0, (0.0, 0.0));
        assert_eq!(viewport.zoom, Viewport::MIN_ZOOM);
    }
}

use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke};

use grid_overlay::graph::Coordinates;
use grid_overlay::projection::Projector;

const GRID_STEP: f32 = 64.0;

/// Dark backdrop with a pixel grid anchored to the map so it follows panning.
pub(super) fn draw_background(painter: &Painter, rect: Rect, projector: &dyn Projector) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let anchor = projector.project(Coordinates::new(0.0, 0.0));
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (anchor.x as f32).rem_euclid(GRID_STEP);
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            stroke,
        );
        x += GRID_STEP;
    }

    let mut y = rect.top() + (anchor.y as f32).rem_euclid(GRID_STEP);
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            stroke,
        );
        y += GRID_STEP;
    }
}

use eframe::egui::{Align2, Color32, FontId, Painter, Rect, Stroke, pos2};

use crate::projection::ProjectedPoint;

/// The drawing primitives an overlay layer needs.
pub trait DrawSurface {
    /// Outlined circle whose bounding square has its top-left corner at `origin`.
    fn draw_circle(
        &mut self,
        origin: ProjectedPoint,
        diameter: i32,
        stroke_width: f32,
        color: Color32,
    );

    /// Text whose baseline starts at `at`.
    fn draw_text(&mut self, at: ProjectedPoint, text: &str, color: Color32);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Circle {
        origin: ProjectedPoint,
        diameter: i32,
        stroke_width: f32,
        color: Color32,
    },
    Text {
        at: ProjectedPoint,
        text: String,
        color: Color32,
    },
}

/// Surface that keeps every call, for headless rendering and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circles(&self) -> impl Iterator<Item = (ProjectedPoint, i32, f32, Color32)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Circle {
                origin,
                diameter,
                stroke_width,
                color,
            } => Some((*origin, *diameter, *stroke_width, *color)),
            DrawCommand::Text { .. } => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = (ProjectedPoint, &str, Color32)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { at, text, color } => Some((*at, text.as_str(), *color)),
            DrawCommand::Circle { .. } => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl DrawSurface for RecordingSurface {
    fn draw_circle(
        &mut self,
        origin: ProjectedPoint,
        diameter: i32,
        stroke_width: f32,
        color: Color32,
    ) {
        self.commands.push(DrawCommand::Circle {
            origin,
            diameter,
            stroke_width,
            color,
        });
    }

    fn draw_text(&mut self, at: ProjectedPoint, text: &str, color: Color32) {
        self.commands.push(DrawCommand::Text {
            at,
            text: text.to_owned(),
            color,
        });
    }
}

/// Adapts an egui painter; projected points are relative to the top-left of `rect`.
pub struct PainterSurface<'a> {
    painter: &'a Painter,
    rect: Rect,
    font: FontId,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a Painter, rect: Rect) -> Self {
        Self {
            painter,
            rect,
            font: FontId::proportional(12.0),
        }
    }
}

impl DrawSurface for PainterSurface<'_> {
    fn draw_circle(
        &mut self,
        origin: ProjectedPoint,
        diameter: i32,
        stroke_width: f32,
        color: Color32,
    ) {
        let radius = diameter as f32 / 2.0;
        let center = pos2(
            self.rect.left() + origin.x as f32 + radius,
            self.rect.top() + origin.y as f32 + radius,
        );
        self.painter.circle_stroke(center, radius, Stroke::new(stroke_width, color));
    }

    fn draw_text(&mut self, at: ProjectedPoint, text: &str, color: Color32) {
        let position = pos2(self.rect.left() + at.x as f32, self.rect.top() + at.y as f32);
        self.painter.text(position, Align2::LEFT_BOTTOM, text, self.font.clone(), color);
    }
}

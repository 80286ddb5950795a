//! Skeletal overlay drawing.
//!
//! Layers are applied in a fixed order: source frame, landmark points, then
//! connection lines, so lines are never hidden under points.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use lammah_common::error::LammahResult;
use lammah_motion_model::pose::{Landmark, POSE_CONNECTIONS};

use crate::surface::Surface;

/// Colors and sizes of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    pub point_radius: i32,
    pub point_color: Rgb<u8>,
    pub line_width: u32,
    pub line_color: Rgb<u8>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            point_radius: 4,
            point_color: Rgb([0, 255, 0]),
            line_width: 2,
            line_color: Rgb([255, 0, 0]),
        }
    }
}

/// Draws landmarks and their connections over a frame.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    style: OverlayStyle,
    connections: Vec<(usize, usize)>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            connections: POSE_CONNECTIONS.to_vec(),
        }
    }

    /// Use a custom connection table.
    pub fn with_connections(mut self, connections: Vec<(usize, usize)>) -> Self {
        self.connections = connections;
        self
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Draw `frame` onto the surface, then the skeleton on top of it.
    pub fn render_frame(
        &self,
        surface: &mut Surface,
        frame: &RgbImage,
        landmarks: &[Landmark],
    ) -> LammahResult<()> {
        surface.draw_frame(frame)?;
        self.draw_skeleton(surface.canvas_mut()?, landmarks);
        Ok(())
    }

    /// Draw points, then connections. Connections that reference a missing
    /// landmark are skipped.
    pub fn draw_skeleton(&self, canvas: &mut RgbImage, landmarks: &[Landmark]) {
        for landmark in landmarks {
            draw_filled_circle_mut(
                canvas,
                landmark.to_pixel(),
                self.style.point_radius,
                self.style.point_color,
            );
        }

        for &(from, to) in &self.connections {
            let (Some(a), Some(b)) = (landmarks.get(from), landmarks.get(to)) else {
                continue;
            };
            self.draw_thick_line(canvas, a, b);
        }
    }

    fn draw_thick_line(&self, canvas: &mut RgbImage, a: &Landmark, b: &Landmark) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let length = (dx * dx + dy * dy).sqrt();
        // Unit normal; degenerate segments get a horizontal spread.
        let (nx, ny) = if length > f64::EPSILON {
            (-dy / length, dx / length)
        } else {
            (0.0, 1.0)
        };

        let width = self.style.line_width.max(1);
        let center = (width - 1) as f64 / 2.0;
        for k in 0..width {
            let offset = k as f64 - center;
            let (ox, oy) = (nx * offset, ny * offset);
            draw_line_segment_mut(
                canvas,
                ((a.x + ox) as f32, (a.y + oy) as f32),
                ((b.x + ox) as f32, (b.y + oy) as f32),
                self.style.line_color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(100, 100, BACKGROUND)
    }

    #[test]
    fn test_points_are_drawn_in_point_color() {
        let renderer = OverlayRenderer::default();
        let mut img = canvas();
        renderer.draw_skeleton(&mut img, &[Landmark::new(20.0, 20.0)]);
        assert_eq!(*img.get_pixel(20, 20), Rgb([0, 255, 0]));
        assert_eq!(*img.get_pixel(23, 20), Rgb([0, 255, 0]));
        assert_eq!(*img.get_pixel(30, 20), BACKGROUND);
    }

    #[test]
    fn test_lines_are_drawn_over_points() {
        let renderer = OverlayRenderer::new(OverlayStyle::default()).with_connections(vec![(0, 1)]);
        let mut img = canvas();
        let landmarks = [Landmark::new(10.0, 50.0), Landmark::new(90.0, 50.0)];
        renderer.draw_skeleton(&mut img, &landmarks);

        // Endpoint pixel lies under both the point and the line.
        assert_eq!(*img.get_pixel(10, 50), Rgb([255, 0, 0]));
        assert_eq!(*img.get_pixel(50, 50), Rgb([255, 0, 0]));
        // Off-line point pixel keeps the point color.
        assert_eq!(*img.get_pixel(10, 53), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_out_of_range_connection_is_skipped() {
        let renderer =
            OverlayRenderer::new(OverlayStyle::default()).with_connections(vec![(0, 13), (42, 1)]);
        let mut img = canvas();
        renderer.draw_skeleton(&mut img, &[Landmark::new(50.0, 50.0)]);
        assert_eq!(*img.get_pixel(50, 50), Rgb([0, 255, 0]));
        assert_eq!(*img.get_pixel(80, 80), BACKGROUND);
    }

    #[test]
    fn test_render_frame_layers_frame_first() {
        let renderer = OverlayRenderer::default();
        let mut surface = Surface::new(100, 100).unwrap();
        let frame = RgbImage::from_pixel(100, 100, Rgb([5, 6, 7]));
        renderer
            .render_frame(&mut surface, &frame, &[Landmark::new(50.0, 50.0)])
            .unwrap();
        assert_eq!(*surface.canvas().get_pixel(0, 0), Rgb([5, 6, 7]));
        assert_eq!(*surface.canvas().get_pixel(50, 50), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_landmarks_outside_canvas_do_not_panic() {
        let renderer = OverlayRenderer::default();
        let mut img = RgbImage::from_pixel(10, 10, BACKGROUND);
        let landmarks = vec![Landmark::new(-50.0, -50.0); 13];
        renderer.draw_skeleton(&mut img, &landmarks);
    }
}

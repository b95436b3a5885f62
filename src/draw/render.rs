use crate::draw::composite::blend_pixel;
use crate::draw::model::{Color, Point, Stroke, StrokeTool};
use crate::draw::surface::PixelSurface;

/// Smallest brush radius. Every point lies within `sqrt(0.5)` of some pixel
/// center, so a radius above that always covers at least one pixel.
const MIN_BRUSH_RADIUS: f32 = 0.75;
/// Target length in pixels of one flattened piece of a smoothed curve.
const CURVE_STEP_PX: f32 = 2.0;
const MAX_CURVE_STEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DirtyRect {
    /// Whole area of a `width` x `height` surface.
    pub fn covering(width: u32, height: u32) -> DirtyRect {
        DirtyRect {
            x: 0,
            y: 0,
            width: width.min(i32::MAX as u32) as i32,
            height: height.min(i32::MAX as u32) as i32,
        }
    }

    pub fn area(self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}

pub fn brush_radius(stroke_width: u32) -> f32 {
    (stroke_width.max(1) as f32 * 0.5).max(MIN_BRUSH_RADIUS)
}

/// Centerline the stroke is rasterized along.
///
/// Unsmoothed strokes use straight segments between samples. Smoothed strokes
/// with three or more samples use quadratic curves whose control points are
/// the samples and whose end points are the midpoints between samples; the
/// last curve ends on the final sample itself.
pub fn stroke_path(stroke: &Stroke) -> Vec<Point> {
    if stroke.smoothed && stroke.can_smooth() {
        smoothed_path(&stroke.points)
    } else {
        stroke.points.clone()
    }
}

fn smoothed_path(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    let mut path = vec![points[0]];
    let mut current = points[0];
    for i in 1..n - 2 {
        let end = points[i].midpoint(points[i + 1]);
        flatten_quadratic(current, points[i], end, &mut path);
        current = end;
    }
    flatten_quadratic(current, points[n - 2], points[n - 1], &mut path);
    path
}

fn flatten_quadratic(start: Point, control: Point, end: Point, out: &mut Vec<Point>) {
    let hull = start.distance_sq(control).sqrt() + control.distance_sq(end).sqrt();
    let steps = ((hull / CURVE_STEP_PX).ceil() as usize).clamp(1, MAX_CURVE_STEPS);
    for step in 1..=steps {
        let t = step as f32 / steps as f32;
        let u = 1.0 - t;
        out.push(Point::new(
            u * u * start.x + 2.0 * u * t * control.x + t * t * end.x,
            u * u * start.y + 2.0 * u * t * control.y + t * t * end.y,
        ));
    }
}

/// Pixels within `radius` of `path`, limited to `clip`. The bounds are
/// computed in float space and clipped before conversion, so far-off points
/// and huge widths cannot overflow.
fn clipped_bounds(path: &[Point], radius: f32, clip: DirtyRect) -> Option<DirtyRect> {
    let first = path.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in path.iter().skip(1) {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    let left = (min_x - radius).floor().max(clip.x as f32);
    let top = (min_y - radius).floor().max(clip.y as f32);
    let right = ((max_x + radius).ceil() + 1.0).min(clip.x.saturating_add(clip.width) as f32);
    let bottom = ((max_y + radius).ceil() + 1.0).min(clip.y.saturating_add(clip.height) as f32);
    if !(right > left && bottom > top) {
        return None;
    }
    Some(DirtyRect {
        x: left as i32,
        y: top as i32,
        width: (right - left) as i32,
        height: (bottom - top) as i32,
    })
}

/// Pixels covered by a stroke, collected before any write so overlapping
/// segments touch each pixel once.
struct CoverageMask {
    rect: DirtyRect,
    covered: Vec<bool>,
}

impl CoverageMask {
    fn new(rect: DirtyRect) -> Self {
        Self {
            rect,
            covered: vec![false; rect.area()],
        }
    }

    /// Round-capped segment: every pixel whose center lies within `radius` of
    /// the segment. Consecutive capsules give round joins.
    fn mark_capsule(&mut self, start: Point, end: Point, radius: f32) {
        let Some(clip) = clipped_bounds(&[start, end], radius, self.rect) else {
            return;
        };
        let radius_sq = radius * radius;
        for y in clip.y..(clip.y + clip.height) {
            for x in clip.x..(clip.x + clip.width) {
                let center = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if point_segment_distance_sq(center, start, end) <= radius_sq {
                    let idx = ((y - self.rect.y) * self.rect.width + (x - self.rect.x)) as usize;
                    self.covered[idx] = true;
                }
            }
        }
    }

    fn covered_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let rect = self.rect;
        self.covered
            .iter()
            .enumerate()
            .filter(|(_, covered)| **covered)
            .map(move |(idx, _)| {
                let idx = idx as i32;
                (
                    (rect.x + idx % rect.width) as u32,
                    (rect.y + idx / rect.width) as u32,
                )
            })
    }
}

fn point_segment_distance_sq(point: Point, start: Point, end: Point) -> f32 {
    let vx = end.x - start.x;
    let vy = end.y - start.y;
    let wx = point.x - start.x;
    let wy = point.y - start.y;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return point.distance_sq(start);
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    point.distance_sq(Point::new(start.x + vx * t, start.y + vy * t))
}

/// Rasterizes `stroke` onto `surface`. Pen strokes composite their color
/// source-over; eraser strokes make covered pixels fully transparent. Parts
/// of the stroke outside the surface are dropped. Returns the clamped area
/// that was written, if any.
pub fn render_stroke(surface: &mut PixelSurface, stroke: &Stroke) -> Option<DirtyRect> {
    let path = stroke_path(stroke);
    let radius = brush_radius(stroke.width);
    let rect = clipped_bounds(&path, radius, DirtyRect::covering(surface.width(), surface.height()))?;

    let mut mask = CoverageMask::new(rect);
    if path.len() == 1 {
        mask.mark_capsule(path[0], path[0], radius);
    }
    for segment in path.windows(2) {
        mask.mark_capsule(segment[0], segment[1], radius);
    }

    let source = stroke.color;
    let mut writes: usize = 0;
    for (x, y) in mask.covered_pixels() {
        let idx = surface.offset(x, y);
        let pixels = surface.pixels_mut();
        let written = match stroke.tool {
            StrokeTool::Pen => {
                let dst = Color::from_rgba_array([
                    pixels[idx],
                    pixels[idx + 1],
                    pixels[idx + 2],
                    pixels[idx + 3],
                ]);
                blend_pixel(dst, source)
            }
            StrokeTool::Eraser => Color::TRANSPARENT,
        };
        pixels[idx..idx + 4].copy_from_slice(&written.to_rgba_array());
        writes += 1;
    }

    tracing::trace!(
        tool = ?stroke.tool,
        points = stroke.points.len(),
        smoothed = stroke.smoothed,
        writes,
        "rendered stroke"
    );
    Some(rect)
}

use crate::draw::error::DrawError;
use crate::draw::model::Color;
use crate::draw::render::DirtyRect;
use std::sync::Arc;

/// Fixed-size straight-alpha RGBA raster. The buffer is always
/// `width * height * 4` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Read-only copy of a surface buffer. Clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn to_surface(&self) -> PixelSurface {
        PixelSurface {
            width: self.width,
            height: self.height,
            pixels: self.pixels.to_vec(),
        }
    }
}

impl PixelSurface {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        assert!(width > 0 && height > 0, "surface dimensions must be positive");
        let mut pixels = vec![0u8; (width as usize) * (height as usize) * 4];
        for chunk in pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&fill.to_rgba_array());
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Opaque white surface, the default canvas background.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, Color::WHITE)
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DrawError> {
        let expected = (width as usize) * (height as usize) * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(DrawError::DimensionMismatch {
                expected: (width, height),
                actual: (width, (pixels.len() / 4 / (width.max(1) as usize)) as u32),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> Result<usize, DrawError> {
        if !self.in_bounds(x, y) {
            return Err(DrawError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(((y as usize) * (self.width as usize) + x as usize) * 4)
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Color, DrawError> {
        let idx = self.index(x, y)?;
        Ok(Color::rgba(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> Result<(), DrawError> {
        let idx = self.index(x, y)?;
        self.pixels[idx..idx + 4].copy_from_slice(&color.to_rgba_array());
        Ok(())
    }

    /// Writes `color` over the half-open rectangle spanned by the two corners,
    /// clamped to the surface. Returns the area actually written.
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) -> Option<DirtyRect> {
        let bounds = DirtyRect::covering(self.width, self.height);
        let left = x0.min(x1).clamp(0, bounds.width);
        let right = x0.max(x1).clamp(0, bounds.width);
        let top = y0.min(y1).clamp(0, bounds.height);
        let bottom = y0.max(y1).clamp(0, bounds.height);
        if right <= left || bottom <= top {
            return None;
        }
        let rect = DirtyRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        };

        let rgba = color.to_rgba_array();
        let stride = self.width as usize * 4;
        for y in rect.y..(rect.y + rect.height) {
            let row = y as usize * stride;
            let start = row + rect.x as usize * 4;
            let end = start + rect.width as usize * 4;
            for px in self.pixels[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
        Some(rect)
    }

    pub fn clear(&mut self, color: Color) {
        let _ = self.fill_rect(0, 0, self.width as i32, self.height as i32, color);
    }

    pub fn is_uniform(&self, color: Color) -> bool {
        let rgba = color.to_rgba_array();
        self.pixels.chunks_exact(4).all(|px| px == rgba)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.width,
            height: self.height,
            pixels: Arc::from(self.pixels.as_slice()),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), DrawError> {
        if snapshot.size() != self.size() {
            return Err(DrawError::DimensionMismatch {
                expected: self.size(),
                actual: snapshot.size(),
            });
        }
        self.pixels.copy_from_slice(snapshot.pixels());
        Ok(())
    }

    pub fn matches_snapshot(&self, snapshot: &Snapshot) -> bool {
        snapshot.size() == self.size() && snapshot.pixels() == self.pixels.as_slice()
    }

    /// Copies `source` onto this surface with its top-left corner at the
    /// origin, cropping whatever falls outside. Pixels not covered keep their
    /// current value.
    pub fn draw_surface_at_origin(&mut self, source: &PixelSurface) {
        let rows = self.height.min(source.height) as usize;
        let cols = self.width.min(source.width) as usize;
        let dst_stride = self.width as usize * 4;
        let src_stride = source.width as usize * 4;
        for y in 0..rows {
            let dst = y * dst_stride;
            let src = y * src_stride;
            self.pixels[dst..dst + cols * 4].copy_from_slice(&source.pixels[src..src + cols * 4]);
        }
    }

    /// Raw byte offset of an in-bounds pixel. Callers that already clipped
    /// their coordinates use this to skip the checked accessors.
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::PixelSurface;
    use crate::draw::error::DrawError;
    use crate::draw::model::Color;

    const RED: Color = Color::rgb(255, 0, 0);

    #[test]
    fn new_surface_has_expected_buffer_length_and_fill() {
        let surface = PixelSurface::new(3, 2, RED);
        assert_eq!(surface.pixels().len(), 3 * 2 * 4);
        assert!(surface.is_uniform(RED));
        assert!(PixelSurface::blank(1, 1).is_uniform(Color::WHITE));
    }

    #[test]
    fn pixel_access_rejects_out_of_range_coordinates() {
        let mut surface = PixelSurface::blank(4, 4);
        assert_eq!(
            surface.get_pixel(4, 0),
            Err(DrawError::OutOfBounds {
                x: 4,
                y: 0,
                width: 4,
                height: 4
            })
        );
        assert!(surface.get_pixel(-1, 2).is_err());
        assert!(surface.set_pixel(0, 4, RED).is_err());
        assert!(surface.is_uniform(Color::WHITE));
    }

    #[test]
    fn set_then_get_returns_written_color() {
        let mut surface = PixelSurface::blank(4, 4);
        surface.set_pixel(3, 1, RED).expect("in bounds");
        assert_eq!(surface.get_pixel(3, 1), Ok(RED));
        assert_eq!(surface.get_pixel(2, 1), Ok(Color::WHITE));
    }

    #[test]
    fn fill_rect_clamps_to_surface_bounds() {
        let mut surface = PixelSurface::blank(4, 4);
        let rect = surface.fill_rect(2, -3, 10, 2, RED).expect("overlaps surface");
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (2, 0, 2, 2));
        assert_eq!(surface.get_pixel(3, 1), Ok(RED));
        assert_eq!(surface.get_pixel(1, 1), Ok(Color::WHITE));
        assert_eq!(surface.get_pixel(3, 2), Ok(Color::WHITE));

        assert!(surface.fill_rect(5, 5, 9, 9, RED).is_none());
    }

    #[test]
    fn fill_rect_with_extreme_corners_does_not_overflow() {
        let mut surface = PixelSurface::blank(4, 4);
        let rect = surface
            .fill_rect(i32::MIN, i32::MIN, i32::MAX, i32::MAX, RED)
            .expect("covers surface");
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (0, 0, 4, 4));
        assert!(surface.is_uniform(RED));
    }

    #[test]
    fn snapshot_restore_roundtrip_is_pixel_identical() {
        let mut surface = PixelSurface::blank(5, 5);
        surface.set_pixel(1, 1, RED).expect("in bounds");
        let before = surface.clone();
        let snapshot = surface.snapshot();

        surface.clear(Color::BLACK);
        assert_ne!(surface, before);

        surface.restore(&snapshot).expect("same size");
        assert_eq!(surface, before);
        assert!(surface.matches_snapshot(&snapshot));
    }

    #[test]
    fn restore_rejects_snapshot_of_other_size() {
        let mut surface = PixelSurface::blank(5, 5);
        let other = PixelSurface::blank(4, 5).snapshot();
        assert_eq!(
            surface.restore(&other),
            Err(DrawError::DimensionMismatch {
                expected: (5, 5),
                actual: (4, 5)
            })
        );
    }

    #[test]
    fn from_pixels_validates_length() {
        assert!(PixelSurface::from_pixels(2, 2, vec![0; 16]).is_ok());
        assert!(PixelSurface::from_pixels(2, 2, vec![0; 15]).is_err());
        assert!(PixelSurface::from_pixels(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn drawing_a_larger_source_crops_at_the_edges() {
        let mut target = PixelSurface::blank(2, 2);
        let source = PixelSurface::new(3, 1, RED);
        target.draw_surface_at_origin(&source);
        assert_eq!(target.get_pixel(0, 0), Ok(RED));
        assert_eq!(target.get_pixel(1, 0), Ok(RED));
        assert_eq!(target.get_pixel(0, 1), Ok(Color::WHITE));
    }
}

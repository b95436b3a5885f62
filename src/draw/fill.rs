use crate::draw::error::DrawError;
use crate::draw::model::Color;
use crate::draw::surface::PixelSurface;

/// Recolors the 4-connected region of pixels that exactly match the color at
/// `(x, y)`. Returns the changed pixels in fill order.
///
/// Filling with the color already under the origin changes nothing. The
/// traversal keeps its own stack so region size is bounded by memory, not by
/// call depth.
pub fn flood_fill(
    surface: &mut PixelSurface,
    x: i32,
    y: i32,
    fill: Color,
) -> Result<Vec<(u32, u32)>, DrawError> {
    let target = surface.get_pixel(x, y)?.to_rgba_array();
    let replacement = fill.to_rgba_array();
    if target == replacement {
        return Ok(Vec::new());
    }

    let (width, height) = surface.size();
    let mut changed = Vec::new();
    let mut stack: Vec<(i32, i32)> = vec![(x, y)];

    while let Some((px, py)) = stack.pop() {
        if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
            continue;
        }
        let idx = surface.offset(px as u32, py as u32);
        let pixels = surface.pixels_mut();
        if pixels[idx..idx + 4] != target {
            continue;
        }
        pixels[idx..idx + 4].copy_from_slice(&replacement);
        changed.push((px as u32, py as u32));

        stack.push((px + 1, py));
        stack.push((px - 1, py));
        stack.push((px, py + 1));
        stack.push((px, py - 1));
    }

    tracing::trace!(x, y, changed = changed.len(), "flood fill");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::flood_fill;
    use crate::draw::error::DrawError;
    use crate::draw::model::Color;
    use crate::draw::surface::PixelSurface;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    #[test]
    fn fills_whole_uniform_surface() {
        let mut surface = PixelSurface::new(5, 5, RED);
        let changed = flood_fill(&mut surface, 2, 2, BLUE).expect("in bounds");
        assert_eq!(changed.len(), 25);
        assert!(surface.is_uniform(BLUE));
    }

    #[test]
    fn same_color_fill_is_a_no_op() {
        let mut surface = PixelSurface::new(5, 5, Color::TRANSPARENT);
        let changed = flood_fill(&mut surface, 0, 0, Color::TRANSPARENT).expect("in bounds");
        assert!(changed.is_empty());
        assert!(surface.is_uniform(Color::TRANSPARENT));
    }

    #[test]
    fn isolated_pixel_changes_exactly_one_pixel() {
        let mut surface = PixelSurface::new(3, 3, RED);
        surface.set_pixel(1, 1, Color::WHITE).expect("in bounds");
        let changed = flood_fill(&mut surface, 1, 1, BLUE).expect("in bounds");
        assert_eq!(changed, vec![(1, 1)]);
        assert_eq!(surface.get_pixel(0, 0), Ok(RED));
    }

    #[test]
    fn fill_is_idempotent() {
        let mut surface = PixelSurface::blank(6, 6);
        surface.fill_rect(0, 3, 6, 4, RED);
        let first = flood_fill(&mut surface, 0, 0, BLUE).expect("in bounds");
        let after_first = surface.clone();
        let second = flood_fill(&mut surface, 0, 0, BLUE).expect("in bounds");
        assert_eq!(first.len(), 18);
        assert!(second.is_empty());
        assert_eq!(surface, after_first);
    }

    #[test]
    fn diagonal_neighbors_are_not_connected() {
        // W R
        // R W
        let mut surface = PixelSurface::blank(2, 2);
        surface.set_pixel(1, 0, RED).expect("in bounds");
        surface.set_pixel(0, 1, RED).expect("in bounds");
        let changed = flood_fill(&mut surface, 0, 0, BLUE).expect("in bounds");
        assert_eq!(changed.len(), 1);
        assert_eq!(surface.get_pixel(1, 1), Ok(Color::WHITE));
    }

    #[test]
    fn exact_match_stops_at_near_colors() {
        let mut surface = PixelSurface::blank(3, 1);
        surface
            .set_pixel(1, 0, Color::rgba(255, 255, 255, 254))
            .expect("in bounds");
        let changed = flood_fill(&mut surface, 0, 0, BLUE).expect("in bounds");
        assert_eq!(changed, vec![(0, 0)]);
    }

    #[test]
    fn out_of_bounds_origin_fails_without_mutation() {
        let mut surface = PixelSurface::blank(3, 3);
        let result = flood_fill(&mut surface, 3, 0, BLUE);
        assert!(matches!(result, Err(DrawError::OutOfBounds { .. })));
        assert!(surface.is_uniform(Color::WHITE));
    }

    #[test]
    fn large_region_does_not_exhaust_the_stack() {
        let mut surface = PixelSurface::blank(512, 512);
        let changed = flood_fill(&mut surface, 511, 511, RED).expect("in bounds");
        assert_eq!(changed.len(), 512 * 512);
    }
}

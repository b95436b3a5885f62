use crate::draw::layers::Transform;
use crate::draw::model::Color;
use crate::draw::surface::PixelSurface;

/// Output of compositing: a plain RGBA buffer, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
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

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let idx = ((y * self.width + x) * 4) as usize;
        Color::rgba(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        )
    }
}

/// Draws `layer` over `base` through `transform`: output pixel `(ox, oy)`
/// samples the layer at `((ox + 0.5 - tx) / scale, (oy + 0.5 - ty) / scale)`
/// with nearest-neighbour lookup. Samples outside the layer contribute
/// nothing.
pub fn composite_layer(base: &mut RgbaBuffer, layer: &PixelSurface, transform: Transform) {
    if transform.is_identity() && layer.size() == (base.width, base.height) {
        blend_in_place(&mut base.pixels, layer.pixels());
        return;
    }

    let scale = transform.scale;
    let (layer_w, layer_h) = layer.size();
    // Only the destination rows/columns the scaled layer can reach.
    let x0 = transform.x.floor().max(0.0) as u32;
    let y0 = transform.y.floor().max(0.0) as u32;
    let x1 = ((transform.x + layer_w as f32 * scale).ceil().max(0.0) as u32).min(base.width);
    let y1 = ((transform.y + layer_h as f32 * scale).ceil().max(0.0) as u32).min(base.height);

    for oy in y0..y1 {
        let sy = ((oy as f32 + 0.5 - transform.y) / scale).floor();
        if sy < 0.0 || sy >= layer_h as f32 {
            continue;
        }
        for ox in x0..x1 {
            let sx = ((ox as f32 + 0.5 - transform.x) / scale).floor();
            if sx < 0.0 || sx >= layer_w as f32 {
                continue;
            }
            let src = layer.offset(sx as u32, sy as u32);
            let top = Color::from_rgba_array([
                layer.pixels()[src],
                layer.pixels()[src + 1],
                layer.pixels()[src + 2],
                layer.pixels()[src + 3],
            ]);
            if top.a == 0 {
                continue;
            }
            let dst = ((oy * base.width + ox) * 4) as usize;
            let bottom = Color::from_rgba_array([
                base.pixels[dst],
                base.pixels[dst + 1],
                base.pixels[dst + 2],
                base.pixels[dst + 3],
            ]);
            base.pixels[dst..dst + 4].copy_from_slice(&blend_pixel(bottom, top).to_rgba_array());
        }
    }
}

/// Layer-space pixel under an output position, if the transform maps it onto
/// the layer.
pub fn inverse_map(layer_size: (u32, u32), transform: Transform, x: f32, y: f32) -> Option<(u32, u32)> {
    let sx = ((x - transform.x) / transform.scale).floor();
    let sy = ((y - transform.y) / transform.scale).floor();
    if sx < 0.0 || sy < 0.0 || sx >= layer_size.0 as f32 || sy >= layer_size.1 as f32 {
        return None;
    }
    Some((sx as u32, sy as u32))
}

fn blend_in_place(base: &mut [u8], top: &[u8]) {
    for (dst, src) in base.chunks_exact_mut(4).zip(top.chunks_exact(4)) {
        if src[3] == 0 {
            continue;
        }
        let blended = blend_pixel(
            Color::rgba(dst[0], dst[1], dst[2], dst[3]),
            Color::rgba(src[0], src[1], src[2], src[3]),
        );
        dst.copy_from_slice(&blended.to_rgba_array());
    }
}

/// Straight-alpha source-over.
pub(crate) fn blend_pixel(bottom: Color, top: Color) -> Color {
    if top.a == 255 {
        return top;
    }
    let sa = top.a as f32 / 255.0;
    let da = bottom.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return Color::TRANSPARENT;
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Color {
        r: blend(top.r, bottom.r),
        g: blend(top.g, bottom.g),
        b: blend(top.b, bottom.b),
        a: (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    }
}

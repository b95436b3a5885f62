use crate::draw::composite::RgbaBuffer;
use crate::draw::surface::PixelSurface;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPORT_SUBDIR: &str = "creations";
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub fn encode_rgba_png(width: u32, height: u32, pixels: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(pixels, width, height, ColorType::Rgba8)
        .with_context(|| format!("encode {width}x{height} png"))?;
    Ok(bytes)
}

pub fn encode_png(surface: &PixelSurface) -> Result<Vec<u8>> {
    encode_rgba_png(surface.width(), surface.height(), surface.pixels())
}

pub fn encode_composite_png(buffer: &RgbaBuffer) -> Result<Vec<u8>> {
    encode_rgba_png(buffer.width, buffer.height, &buffer.pixels)
}

pub fn to_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

/// `data:image/png;base64,` URL of a composite, the format gallery entries
/// are stored in.
pub fn composite_data_url(buffer: &RgbaBuffer) -> Result<String> {
    Ok(to_data_url(&encode_composite_png(buffer)?))
}

pub fn exe_relative_output_folder_from_path(exe_path: &Path) -> Result<PathBuf> {
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(EXPORT_SUBDIR))
}

pub fn ensure_output_folder() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("resolve current executable")?;
    let output = exe_relative_output_folder_from_path(&exe_path)?;
    fs::create_dir_all(&output)
        .with_context(|| format!("create export folder {}", output.display()))?;
    Ok(output)
}

pub fn timestamped_stem(now: chrono::DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn build_filename(stem: &str, suffix: &str) -> String {
    format!("{}_{}.png", stem, suffix)
}

/// Writes `buffer` as `<timestamp>_creation.png` into `output_dir`.
pub fn export_png(
    buffer: &RgbaBuffer,
    output_dir: &Path,
    now: chrono::DateTime<Local>,
) -> Result<PathBuf> {
    let path = output_dir.join(build_filename(&timestamped_stem(now), "creation"));
    let bytes = encode_composite_png(buffer)?;
    fs::write(&path, bytes).with_context(|| format!("write export {}", path.display()))?;
    tracing::info!(path = %path.display(), "exported creation");
    Ok(path)
}

/// Exports into the folder next to the executable.
pub fn export_creation(buffer: &RgbaBuffer) -> Result<PathBuf> {
    let output_dir = ensure_output_folder()?;
    export_png(buffer, &output_dir, Local::now())
}

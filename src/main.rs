use anyhow::{anyhow, bail, Context, Result};
use layer_studio::analyze::{AnalyzeImageInput, GeminiAnalyzer, ImageAnalyzer};
use layer_studio::draw::decode::{apply_completion, DecodeQueue, SeedSlot};
use layer_studio::draw::input::CanvasInput;
use layer_studio::draw::layers::LayerStack;
use layer_studio::draw::model::Point;
use layer_studio::draw::save::export_creation;
use layer_studio::draw::scene::{zones_for_analysis, Wanderer};
use layer_studio::gallery::GalleryStore;
use layer_studio::settings::{resolve_settings_path, StudioSettings};
use std::time::Duration;

const USAGE: &str = "usage: layer_studio <gallery | export <index> | remove <index> | \
sketch <x,y>... | scene <index> <ticks> | analyze <url>>";

fn main() -> Result<()> {
    let settings_path = resolve_settings_path()?;
    let settings = StudioSettings::load(&settings_path)?;
    layer_studio::logging::init(settings.debug_logging, settings.log_file.as_deref())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let gallery_path = settings.resolved_gallery_path(&settings_path);

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["gallery"] => {
            let gallery = GalleryStore::load(&gallery_path)?;
            println!("{} saved creations in {}", gallery.len(), gallery.path().display());
            for (index, entry) in gallery.list().iter().enumerate() {
                println!("{index}: {} bytes", entry.len());
            }
        }
        ["export", index] => {
            let gallery = GalleryStore::load(&gallery_path)?;
            let stack = load_creation(&gallery, parse_index(index)?, &settings)?;
            let path = export_creation(&stack.composite_for_display(settings.blank_fill))?;
            println!("exported {}", path.display());
        }
        ["sketch", points @ ..] if !points.is_empty() => {
            let points = points
                .iter()
                .map(|raw| parse_point(raw))
                .collect::<Result<Vec<_>>>()?;
            let mut stack = LayerStack::from_settings(&settings)?;
            stack.add_layer(None);
            let mut input = CanvasInput::from_settings(stack, &settings);

            let (first, rest) = points.split_first().context("sketch needs a point")?;
            input.pointer_down(*first)?;
            for point in rest {
                input.pointer_move(*point);
            }
            input.pointer_up(rest.last().copied().unwrap_or(*first))?;
            // With the fill tool configured the gesture is a click instead.
            input.click(*first)?;

            let mut gallery = GalleryStore::load(&gallery_path)?;
            gallery.save_creation(&input.preview(settings.blank_fill))?;
            println!("saved sketch as creation 0 of {}", gallery.len());
        }
        ["scene", index, ticks] => {
            let ticks: usize = ticks
                .parse()
                .with_context(|| format!("invalid tick count {ticks}"))?;
            let gallery = GalleryStore::load(&gallery_path)?;
            let mut stack = load_creation(&gallery, parse_index(index)?, &settings)?;
            let mut wanderer = Wanderer::new(settings.wander);
            let moved: usize = (0..ticks).map(|_| wanderer.tick(&mut stack)).sum();
            let path = export_creation(&stack.composite_for_display(settings.blank_fill))?;
            println!("{moved} layer moves, exported {}", path.display());
        }
        ["remove", index] => {
            let index = parse_index(index)?;
            let mut gallery = GalleryStore::load(&gallery_path)?;
            gallery.remove(index)?;
            println!("removed creation {index}");
        }
        ["analyze", url] => {
            let analyzer = GeminiAnalyzer::from_settings(&settings.analysis)?;
            let output = analyzer.analyze(&AnalyzeImageInput::new(*url)?)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            let zones: Vec<&str> = zones_for_analysis(&output)
                .into_iter()
                .map(|zone| zone.label())
                .collect();
            println!("fits zones: {}", zones.join(", "));
        }
        _ => bail!(USAGE),
    }
    Ok(())
}

/// Decodes a saved creation into a new layer of a stack built from settings.
fn load_creation(
    gallery: &GalleryStore,
    index: usize,
    settings: &StudioSettings,
) -> Result<LayerStack> {
    let seed = gallery
        .seed(index)
        .ok_or_else(|| anyhow!("no creation at index {index}"))?;
    let mut queue = DecodeQueue::new();
    queue.submit(SeedSlot::NewLayer, seed);
    let completion = queue
        .wait(Duration::from_secs(30))
        .context("timed out decoding creation")?;
    let mut stack = LayerStack::from_settings(settings)?;
    apply_completion(&mut stack, completion)?;
    Ok(stack)
}

fn parse_point(raw: &str) -> Result<Point> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("point {raw} is not x,y"))?;
    let x = x.trim().parse().with_context(|| format!("invalid x in {raw}"))?;
    let y = y.trim().parse().with_context(|| format!("invalid y in {raw}"))?;
    Ok(Point::new(x, y))
}

fn parse_index(raw: &str) -> Result<usize> {
    raw.parse()
        .with_context(|| format!("invalid gallery index {raw}"))
}

use crate::draw::composite::{composite_layer, inverse_map, RgbaBuffer};
use crate::draw::error::DrawError;
use crate::draw::fill::flood_fill;
use crate::draw::history::{HistoryEntry, HistoryLog};
use crate::draw::model::{Color, FillOp, Stroke};
use crate::draw::render::render_stroke;
use crate::draw::surface::PixelSurface;
use crate::settings::StudioSettings;
use serde::{Deserialize, Serialize};

pub type LayerId = u32;

/// Placement of a layer in output space: layer pixel `(lx, ly)` lands at
/// `(x + lx * scale, y + ly * scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.scale == 1.0
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    fn validate(&self) -> Result<(), DrawError> {
        if !(self.scale.is_finite() && self.scale > 0.0) || !self.x.is_finite() || !self.y.is_finite()
        {
            return Err(DrawError::InvalidTransform { scale: self.scale });
        }
        Ok(())
    }
}

/// How gestures are recorded in a layer's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStrategy {
    /// Every gesture stores the whole buffer.
    Snapshots,
    /// Strokes and fills are stored as geometry and replayed.
    #[default]
    Replay,
}

#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    name: String,
    visible: bool,
    transform: Transform,
    surface: PixelSurface,
    history: HistoryLog,
    strategy: RecordingStrategy,
    blank_fill: Color,
}

impl Layer {
    fn new(
        id: LayerId,
        surface: PixelSurface,
        strategy: RecordingStrategy,
        checkpoint_interval: usize,
        blank_fill: Color,
    ) -> Self {
        let history =
            HistoryLog::new(surface.snapshot()).with_checkpoint_interval(checkpoint_interval);
        Self {
            id,
            name: format!("Layer {id}"),
            visible: true,
            transform: Transform::default(),
            surface,
            history,
            strategy,
            blank_fill,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn strategy(&self) -> RecordingStrategy {
        self.strategy
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Draws a finished stroke and records it. Returns whether history grew.
    pub fn apply_stroke(&mut self, stroke: Stroke) -> Result<bool, DrawError> {
        match self.strategy {
            RecordingStrategy::Replay => {
                self.history.commit(HistoryEntry::Stroke(stroke.clone()))?;
                render_stroke(&mut self.surface, &stroke);
                Ok(true)
            }
            RecordingStrategy::Snapshots => {
                if stroke.points.is_empty() || stroke.width == 0 {
                    return Err(DrawError::InvalidHistoryOperation(
                        "stroke needs at least one point and a positive width".to_string(),
                    ));
                }
                render_stroke(&mut self.surface, &stroke);
                self.commit_snapshot()
            }
        }
    }

    /// Flood fills from `(x, y)`. A fill that changes nothing is not recorded.
    pub fn apply_fill(&mut self, x: i32, y: i32, color: Color) -> Result<bool, DrawError> {
        let changed = flood_fill(&mut self.surface, x, y, color)?;
        if changed.is_empty() {
            tracing::debug!(layer = self.id, x, y, "fill changed nothing");
            return Ok(false);
        }
        match self.strategy {
            RecordingStrategy::Replay => self
                .history
                .commit(HistoryEntry::Fill(FillOp::new(x, y, color))),
            RecordingStrategy::Snapshots => self.commit_snapshot(),
        }
    }

    /// Resets the layer to its blank fill.
    pub fn clear(&mut self) -> Result<bool, DrawError> {
        self.surface.clear(self.blank_fill);
        self.commit_snapshot()
    }

    /// Replaces the layer's pixels with `image` placed at the origin and
    /// cropped to the layer. Pixels the image does not cover become
    /// transparent.
    pub fn replace_content(&mut self, image: &PixelSurface) -> Result<bool, DrawError> {
        self.surface.clear(Color::TRANSPARENT);
        self.surface.draw_surface_at_origin(image);
        self.commit_snapshot()
    }

    pub fn undo(&mut self) -> Result<bool, DrawError> {
        if !self.history.undo() {
            return Ok(false);
        }
        self.sync_from_history()?;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, DrawError> {
        if !self.history.redo() {
            return Ok(false);
        }
        self.sync_from_history()?;
        Ok(true)
    }

    pub fn mark_smoothed(&mut self, index: usize) -> Result<(), DrawError> {
        self.history.mark_smoothed(index)?;
        self.sync_from_history()
    }

    /// Smooths the most recent stroke that has enough points. Returns
    /// `false` when there is nothing to smooth.
    pub fn smooth_last_stroke(&mut self) -> Result<bool, DrawError> {
        let Some(index) = self.history.last_smoothable_stroke() else {
            return Ok(false);
        };
        self.mark_smoothed(index)?;
        Ok(true)
    }

    fn commit_snapshot(&mut self) -> Result<bool, DrawError> {
        let snapshot = self.surface.snapshot();
        self.history.commit(HistoryEntry::Snapshot(snapshot))
    }

    fn sync_from_history(&mut self) -> Result<(), DrawError> {
        let state = self.history.reconstruct()?;
        self.surface.clone_from(state);
        Ok(())
    }
}

/// Bottom-to-top collection of layers sharing one size.
#[derive(Debug, Clone)]
pub struct LayerStack {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    active: Option<LayerId>,
    blank_fill: Color,
    strategy: RecordingStrategy,
    checkpoint_interval: usize,
}

impl LayerStack {
    /// Empty stack for a `width` x `height` canvas. Both sides must be
    /// non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, DrawError> {
        if width == 0 || height == 0 {
            return Err(DrawError::EmptySurface { width, height });
        }
        Ok(Self {
            width,
            height,
            layers: Vec::new(),
            active: None,
            blank_fill: Color::WHITE,
            strategy: RecordingStrategy::default(),
            checkpoint_interval: 0,
        })
    }

    /// Stack sized and configured from the studio settings: canvas size,
    /// blank fill, recording strategy and checkpoint interval.
    pub fn from_settings(settings: &StudioSettings) -> Result<Self, DrawError> {
        Ok(Self::new(settings.canvas_width, settings.canvas_height)?
            .with_blank_fill(settings.blank_fill)
            .with_strategy(settings.recording_strategy)
            .with_checkpoint_interval(settings.checkpoint_interval))
    }

    pub fn with_blank_fill(mut self, fill: Color) -> Self {
        self.blank_fill = fill;
        self
    }

    pub fn with_strategy(mut self, strategy: RecordingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(Layer::id).collect()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active?;
        self.layer_mut(id)
    }

    /// Active layer, if it is visible. Hidden layers take no raster edits.
    pub fn drawable_layer_mut(&mut self) -> Option<&mut Layer> {
        self.active_layer_mut().filter(|layer| layer.visible)
    }

    /// Creates a layer on top of the stack and makes it active.
    ///
    /// The layer starts from the blank fill; `seed` is drawn over it at the
    /// origin and cropped to the stack size.
    pub fn add_layer(&mut self, seed: Option<&PixelSurface>) -> LayerId {
        let id = self.layers.iter().map(Layer::id).max().unwrap_or(0) + 1;
        let mut surface = PixelSurface::new(self.width, self.height, self.blank_fill);
        if let Some(seed) = seed {
            surface.draw_surface_at_origin(seed);
        }
        self.layers.push(Layer::new(
            id,
            surface,
            self.strategy,
            self.checkpoint_interval,
            self.blank_fill,
        ));
        self.active = Some(id);
        tracing::debug!(layer = id, seeded = seed.is_some(), "added layer");
        id
    }

    /// Removes a layer. If it was active, the topmost remaining layer becomes
    /// active, or none when the stack is empty.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<(), DrawError> {
        let position = self.position(id)?;
        self.layers.remove(position);
        if self.active == Some(id) {
            self.active = self.layers.last().map(Layer::id);
        }
        tracing::debug!(layer = id, active = ?self.active, "deleted layer");
        Ok(())
    }

    pub fn set_active(&mut self, id: LayerId) -> Result<(), DrawError> {
        self.position(id)?;
        self.active = Some(id);
        Ok(())
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<(), DrawError> {
        let position = self.position(id)?;
        self.layers[position].visible = visible;
        Ok(())
    }

    pub fn set_transform(&mut self, id: LayerId, transform: Transform) -> Result<(), DrawError> {
        transform.validate()?;
        let position = self.position(id)?;
        self.layers[position].transform = transform;
        Ok(())
    }

    /// Moves a layer to `index` in paint order, clamped to the top.
    pub fn move_layer(&mut self, id: LayerId, index: usize) -> Result<(), DrawError> {
        let position = self.position(id)?;
        let layer = self.layers.remove(position);
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Topmost visible layer with a non-transparent pixel under `(x, y)`.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<LayerId> {
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.visible)
            .find(|layer| {
                inverse_map(layer.surface.size(), layer.transform, x, y)
                    .and_then(|(lx, ly)| layer.surface.get_pixel(lx as i32, ly as i32).ok())
                    .is_some_and(|color| color.a > 0)
            })
            .map(Layer::id)
    }

    /// Visible layers alpha-composited bottom to top over `background`.
    pub fn composite_for_display(&self, background: Color) -> RgbaBuffer {
        self.composite_with_override(background, None)
    }

    /// Like [`composite_for_display`](Self::composite_for_display) but draws
    /// `replacement` in place of one layer's surface. Used for previews of
    /// uncommitted gestures.
    pub fn composite_with_override(
        &self,
        background: Color,
        replacement: Option<(LayerId, &PixelSurface)>,
    ) -> RgbaBuffer {
        let mut output = RgbaBuffer::new(self.width, self.height, background);
        for layer in self.layers.iter().filter(|layer| layer.visible) {
            let surface = match replacement {
                Some((id, surface)) if id == layer.id => surface,
                _ => &layer.surface,
            };
            composite_layer(&mut output, surface, layer.transform);
        }
        output
    }

    fn position(&self, id: LayerId) -> Result<usize, DrawError> {
        self.layers
            .iter()
            .position(|layer| layer.id == id)
            .ok_or(DrawError::UnknownLayer(id))
    }
}

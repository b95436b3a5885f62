use crate::draw::composite::RgbaBuffer;
use crate::draw::error::DrawError;
use crate::draw::layers::{LayerId, LayerStack};
use crate::draw::model::{Color, Point, Stroke, StrokeTool, Tool};
use crate::draw::render::render_stroke;
use crate::settings::StudioSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Undo,
    Redo,
    Clear,
    SmoothLastStroke,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveStroke {
    layer: LayerId,
    stroke: Stroke,
}

/// Turns pointer gestures into engine calls against the active layer.
#[derive(Debug, Clone)]
pub struct CanvasInput {
    tool: Tool,
    color: Color,
    width: u32,
    active: Option<ActiveStroke>,
    stack: LayerStack,
}

impl CanvasInput {
    pub fn new(stack: LayerStack, tool: Tool, color: Color, width: u32) -> Self {
        Self {
            tool,
            color,
            width: width.max(1),
            active: None,
            stack,
        }
    }

    /// Input over `stack` with the configured default tool, color and pen
    /// width.
    pub fn from_settings(stack: LayerStack, settings: &StudioSettings) -> Self {
        Self::new(
            stack,
            settings.default_tool,
            settings.default_color,
            settings.default_pen_width,
        )
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn set_width(&mut self, width: u32) {
        self.width = width.max(1);
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    pub fn in_progress(&self) -> Option<&Stroke> {
        self.active.as_ref().map(|active| &active.stroke)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.active_layer().is_some_and(|layer| layer.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.stack.active_layer().is_some_and(|layer| layer.can_redo())
    }

    /// Starts a stroke with the pen or eraser. A stroke still in progress,
    /// e.g. after a missed pointer-up, is committed first. Returns `false`
    /// when there is no visible active layer or the fill tool is selected.
    pub fn pointer_down(&mut self, point: Point) -> Result<bool, DrawError> {
        self.finish_stroke()?;
        let Some(tool) = StrokeTool::from_tool(self.tool) else {
            return Ok(false);
        };
        let Some(layer) = self.stack.drawable_layer_mut() else {
            tracing::debug!("pointer down without a drawable layer");
            return Ok(false);
        };
        let color = match tool {
            StrokeTool::Pen => self.color,
            StrokeTool::Eraser => Color::TRANSPARENT,
        };
        self.active = Some(ActiveStroke {
            layer: layer.id(),
            stroke: Stroke::new(tool, color, self.width, point),
        });
        Ok(true)
    }

    pub fn pointer_move(&mut self, point: Point) {
        if let Some(active) = self.active.as_mut() {
            if should_append_point(active.stroke.points.last().copied(), point) {
                active.stroke.points.push(point);
            }
        }
    }

    /// Ends the gesture at `point` and commits it. Returns whether the
    /// layer's history grew.
    pub fn pointer_up(&mut self, point: Point) -> Result<bool, DrawError> {
        self.pointer_move(point);
        self.finish_stroke()
    }

    /// Pointer left the canvas: commits what was drawn so far.
    pub fn pointer_leave(&mut self) -> Result<bool, DrawError> {
        self.finish_stroke()
    }

    /// Click with the fill tool floods the region under `point`.
    pub fn click(&mut self, point: Point) -> Result<bool, DrawError> {
        if self.tool != Tool::Fill {
            return Ok(false);
        }
        let color = self.color;
        let Some(layer) = self.stack.drawable_layer_mut() else {
            return Ok(false);
        };
        let (x, y) = point.pixel();
        layer.apply_fill(x, y, color)
    }

    pub fn command(&mut self, command: InputCommand) -> Result<bool, DrawError> {
        self.finish_stroke()?;
        let layer = match command {
            InputCommand::Undo | InputCommand::Redo => self.stack.active_layer_mut(),
            InputCommand::Clear | InputCommand::SmoothLastStroke => {
                self.stack.drawable_layer_mut()
            }
        };
        let Some(layer) = layer else {
            return Ok(false);
        };
        let changed = match command {
            InputCommand::Undo => layer.undo()?,
            InputCommand::Redo => layer.redo()?,
            InputCommand::Clear => layer.clear()?,
            InputCommand::SmoothLastStroke => layer.smooth_last_stroke()?,
        };
        tracing::debug!(?command, changed, "input command");
        Ok(changed)
    }

    /// Display composite with the in-progress stroke drawn on its layer.
    /// Nothing is committed.
    pub fn preview(&self, background: Color) -> RgbaBuffer {
        let Some(active) = self.active.as_ref() else {
            return self.stack.composite_for_display(background);
        };
        let Some(layer) = self.stack.layer(active.layer) else {
            return self.stack.composite_for_display(background);
        };
        let mut scratch = layer.surface().clone();
        render_stroke(&mut scratch, &active.stroke);
        self.stack
            .composite_with_override(background, Some((active.layer, &scratch)))
    }

    fn finish_stroke(&mut self) -> Result<bool, DrawError> {
        let Some(active) = self.active.take() else {
            return Ok(false);
        };
        match self.stack.layer_mut(active.layer) {
            Some(layer) => layer.apply_stroke(active.stroke),
            None => {
                tracing::warn!(layer = active.layer, "stroke target layer was deleted");
                Ok(false)
            }
        }
    }
}

fn should_append_point(last: Option<Point>, point: Point) -> bool {
    last != Some(point)
}

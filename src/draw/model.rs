use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub fn to_rgba_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_rgba_array(color: [u8; 4]) -> Self {
        Self::rgba(color[0], color[1], color[2], color[3])
    }

    /// Parses `#rrggbb` (opaque) or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().strip_prefix('#')?;
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Pointer position in surface coordinates. Pixel `(x, y)` spans
/// `[x, x + 1) × [y, y + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Integer pixel containing this point.
    pub fn pixel(self) -> (i32, i32) {
        (self.x.floor() as i32, self.y.floor() as i32)
    }
}

impl From<(i32, i32)> for Point {
    fn from(value: (i32, i32)) -> Self {
        Point::new(value.0 as f32, value.1 as f32)
    }
}

/// Tool selected in the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Pen,
    Fill,
    Eraser,
}

/// Composite mode a recorded stroke was drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeTool {
    Pen,
    Eraser,
}

impl StrokeTool {
    pub fn from_tool(tool: Tool) -> Option<Self> {
        match tool {
            Tool::Pen => Some(StrokeTool::Pen),
            Tool::Eraser => Some(StrokeTool::Eraser),
            Tool::Fill => None,
        }
    }
}

/// Freehand stroke geometry as recorded in history.
///
/// `points` always holds the raw pointer samples; `smoothed` only changes how
/// they are rendered, so un-smoothing or re-smoothing is a replay from the
/// same geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub tool: StrokeTool,
    pub color: Color,
    pub width: u32,
    pub points: Vec<Point>,
    #[serde(default)]
    pub smoothed: bool,
}

impl Stroke {
    pub fn new(tool: StrokeTool, color: Color, width: u32, start: Point) -> Self {
        Self {
            tool,
            color,
            width,
            points: vec![start],
            smoothed: false,
        }
    }

    pub fn pen(color: Color, width: u32, points: Vec<Point>) -> Self {
        Self {
            tool: StrokeTool::Pen,
            color,
            width,
            points,
            smoothed: false,
        }
    }

    pub fn eraser(width: u32, points: Vec<Point>) -> Self {
        Self {
            tool: StrokeTool::Eraser,
            color: Color::TRANSPARENT,
            width,
            points,
            smoothed: false,
        }
    }

    pub fn can_smooth(&self) -> bool {
        self.points.len() >= 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOp {
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl FillOp {
    pub const fn new(x: i32, y: i32, color: Color) -> Self {
        Self { x, y, color }
    }
}

#[cfg(test)]
mod tests {
    use super::{Color, Point, StrokeTool, Tool};

    #[test]
    fn hex_colors_parse_with_and_without_alpha() {
        assert_eq!(Color::from_hex("#000000"), Some(Color::BLACK));
        assert_eq!(
            Color::from_hex("#ff8000"),
            Some(Color::rgba(255, 128, 0, 255))
        );
        assert_eq!(
            Color::from_hex("#0a0b0c80"),
            Some(Color::rgba(10, 11, 12, 128))
        );
        assert_eq!(Color::from_hex("ff8000"), None);
        assert_eq!(Color::from_hex("#ff80"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn hex_output_drops_alpha_when_opaque() {
        assert_eq!(Color::rgb(1, 2, 3).to_hex(), "#010203");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_hex(), "#01020304");
    }

    #[test]
    fn point_pixel_floors_fractional_coordinates() {
        assert_eq!(Point::new(2.9, 0.1).pixel(), (2, 0));
        assert_eq!(Point::new(-0.5, 3.0).pixel(), (-1, 3));
        assert_eq!(
            Point::new(0.0, 0.0).midpoint(Point::new(4.0, 2.0)),
            Point::new(2.0, 1.0)
        );
    }

    #[test]
    fn fill_tool_has_no_stroke_mode() {
        assert_eq!(StrokeTool::from_tool(Tool::Pen), Some(StrokeTool::Pen));
        assert_eq!(StrokeTool::from_tool(Tool::Eraser), Some(StrokeTool::Eraser));
        assert_eq!(StrokeTool::from_tool(Tool::Fill), None);
    }
}

pub mod composite;
pub mod decode;
pub mod error;
pub mod fill;
pub mod history;
pub mod input;
pub mod layers;
pub mod model;
pub mod render;
pub mod save;
pub mod scene;
pub mod surface;

pub use composite::RgbaBuffer;
pub use decode::{apply_completion, DecodeQueue, EncodedImage, SeedSlot};
pub use error::DrawError;
pub use fill::flood_fill;
pub use history::{HistoryEntry, HistoryLog};
pub use input::{CanvasInput, InputCommand};
pub use layers::{Layer, LayerId, LayerStack, RecordingStrategy, Transform};
pub use model::{Color, FillOp, Point, Stroke, StrokeTool, Tool};
pub use render::render_stroke;
pub use surface::{PixelSurface, Snapshot};

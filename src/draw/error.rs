use crate::draw::layers::LayerId;

/// Failures reported by the raster engine. None of them are fatal; each is
/// local to the operation that returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawError {
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    DecodeFailure(String),
    InvalidHistoryOperation(String),
    UnknownLayer(LayerId),
    InvalidTransform {
        scale: f32,
    },
    EmptySurface {
        width: u32,
        height: u32,
    },
}

impl std::fmt::Display for DrawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawError::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(f, "pixel ({x}, {y}) is outside the {width}x{height} surface"),
            DrawError::DimensionMismatch { expected, actual } => write!(
                f,
                "expected a {}x{} raster but got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            DrawError::DecodeFailure(reason) => write!(f, "image decode failed: {reason}"),
            DrawError::InvalidHistoryOperation(reason) => {
                write!(f, "invalid history operation: {reason}")
            }
            DrawError::UnknownLayer(id) => write!(f, "no layer with id {id}"),
            DrawError::InvalidTransform { scale } => {
                write!(f, "layer scale must be positive, got {scale}")
            }
            DrawError::EmptySurface { width, height } => {
                write!(f, "surface size {width}x{height} has no pixels")
            }
        }
    }
}

impl std::error::Error for DrawError {}

use crate::foundation::error::{VisageError, VisageResult};

pub use kurbo::{Point, Rect, Vec2};

/// Pixel dimensions of the photo being edited. The photo buffer itself is
/// supplied by the host and never owned by the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PhotoSize {
    pub width: u32,
    pub height: u32,
}

impl PhotoSize {
    pub fn new(width: u32, height: u32) -> VisageResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisageError::validation("photo width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    pub fn bounds(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

pub fn clamp01_f32(x: f32) -> f32 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}

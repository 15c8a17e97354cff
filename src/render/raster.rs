use crate::{
    foundation::core::PhotoSize,
    foundation::error::{VisageError, VisageResult},
    project::color::Rgba8,
};

/// Owned straight-alpha RGBA8 image buffer, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRgba8 {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageRgba8 {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn filled(width: u32, height: u32, color: Rgba8) -> Self {
        let mut img = Self::new(width, height);
        for px in img.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        img
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> VisageResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(VisageError::validation(format!(
                "raw buffer length {} does not match {width}x{height} rgba8 ({expected})",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn size(&self) -> PhotoSize {
        PhotoSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }
}

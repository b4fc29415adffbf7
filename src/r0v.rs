//! `.r0v` 15-bit raster images.
//!
//! ```text
//! [0x00] width   u16 BE
//! [0x02] height  u16 BE
//! [0x04] width * height pixel words, u16 BE, top row first
//! ```
//!
//! Pixel word: `f rrrrr ggggg bbbbb`, the top bit is a flag and is ignored.

use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

pub const HEADER_SIZE: usize = 4;

/// Largest width or height accepted; anything above is a misidentified record.
pub const MAX_DIMENSION: u16 = 4096;

#[derive(Debug)]
pub enum R0vError {
    IoError(std::io::Error),
    TruncatedImage{ needed: usize, available: usize },
    InvalidDimensions{ width: u16, height: u16 },
}

impl From<std::io::Error> for R0vError {
    fn from(error: std::io::Error) -> Self {
       R0vError::IoError(error)
    }
}

impl fmt::Display for R0vError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            R0vError::IoError(e) => write!(f, "I/O error: {}", e),
            R0vError::TruncatedImage{ needed, available } =>
                write!(f, "truncated image: need {} bytes, have {}", needed, available),
            R0vError::InvalidDimensions{ width, height } =>
                write!(f, "invalid dimensions {}x{}", width, height),
        }
    }
}

impl std::error::Error for R0vError {}

#[derive(Debug,PartialEq,Eq,Clone,Copy)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub fn scale_channel(value: u8) -> u8 {
    let value = value & 0x1f;
    (value << 3) | (value >> 2)
}

pub fn word_to_rgb(word: u16) -> Rgb {
    Rgb{
        r: scale_channel(((word >> 10) & 0x1f) as u8),
        g: scale_channel(((word >> 5) & 0x1f) as u8),
        b: scale_channel((word & 0x1f) as u8),
    }
}

#[derive(Debug,PartialEq,Eq,Clone)]
pub struct RasterImage {
    pub width: u16,
    pub height: u16,
    /// Row-major, `width * height` entries.
    pub pixels: Vec<Rgb>,
}

impl RasterImage {
    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn to_bmp(&self) -> bmp::Image {
        let mut image = bmp::Image::new(self.width.into(), self.height.into());
        for (n, px) in self.pixels.iter().enumerate() {
            let x = (n % self.width as usize) as u32;
            let y = (n / self.width as usize) as u32;
            image.set_pixel(x, y, bmp::Pixel::new(px.r, px.g, px.b));
        }
        image
    }
}

pub fn pixel_data_size(width: u16, height: u16) -> usize {
    width as usize * height as usize * 2
}

pub fn decode(data: &[u8]) -> Result<RasterImage, R0vError> {
    if data.len() < HEADER_SIZE {
        return Err(R0vError::TruncatedImage{ needed: HEADER_SIZE, available: data.len() });
    }

    let mut rdr = Cursor::new(data);
    let width = rdr.read_u16::<BigEndian>()?;
    let height = rdr.read_u16::<BigEndian>()?;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(R0vError::InvalidDimensions{ width, height });
    }

    let needed = HEADER_SIZE + pixel_data_size(width, height);
    if data.len() < needed {
        return Err(R0vError::TruncatedImage{ needed, available: data.len() });
    }

    let count = width as usize * height as usize;
    let mut pixels = Vec::with_capacity(count);
    for _ in 0..count {
        let word = rdr.read_u16::<BigEndian>()?;
        pixels.push(word_to_rgb(word));
    }
    Ok(RasterImage{ width, height, pixels })
}

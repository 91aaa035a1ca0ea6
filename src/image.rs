//! Image source boundary.
//!
//! The printer only needs the image size and a way to render one row at
//! a time into a full-width 1-bit-per-pixel buffer (MSB = leftmost dot,
//! set bit = black).  Where the pixels come from is up to the caller.

use crate::config::ROW_BYTES;

pub trait ImageSource {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    /// Render row `y` into `out`, zero-padding anything past the image
    /// width.  `y` is always below [`ImageSource::height`].
    fn decode_row(&self, y: u16, out: &mut [u8; ROW_BYTES]);
}

/// Packed 1bpp bitmap borrowed from flash or RAM.
///
/// Rows are `ceil(width / 8)` bytes each, back to back.  Pixels past the
/// printhead width are cropped.
#[derive(Clone, Copy, Debug)]
pub struct PackedImage<'a> {
    width: u16,
    height: u16,
    data: &'a [u8],
}

impl<'a> PackedImage<'a> {
    /// Returns `None` if `data` is shorter than `width x height` needs.
    pub fn new(width: u16, height: u16, data: &'a [u8]) -> Option<Self> {
        let stride = (width as usize).div_ceil(8);
        if data.len() < stride * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    fn stride(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }
}

impl ImageSource for PackedImage<'_> {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn decode_row(&self, y: u16, out: &mut [u8; ROW_BYTES]) {
        out.fill(0);
        let stride = self.stride();
        let start = y as usize * stride;
        let Some(row) = self.data.get(start..start + stride) else {
            return;
        };
        let n = stride.min(ROW_BYTES);
        out[..n].copy_from_slice(&row[..n]);

        // Clear padding bits in a partial last byte.
        let width = self.width as usize;
        if width < ROW_BYTES * 8 && width % 8 != 0 {
            out[width / 8] &= 0xFFu8 << (8 - width % 8);
        }
    }
}

/// Rectangular frame `border` dots thick, generated on the fly.  Used
/// as the built-in test label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorderLabel {
    pub width: u16,
    pub height: u16,
    pub border: u16,
}

impl ImageSource for BorderLabel {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn decode_row(&self, y: u16, out: &mut [u8; ROW_BYTES]) {
        out.fill(0);
        let width = self.width.min((ROW_BYTES * 8) as u16);
        let edge = y < self.border || y + self.border >= self.height;
        for x in 0..width {
            let side = x < self.border || x + self.border >= width;
            if edge || side {
                out[x as usize / 8] |= 0x80 >> (x % 8);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_data() {
        assert!(PackedImage::new(16, 3, &[0u8; 5]).is_none());
        assert!(PackedImage::new(16, 3, &[0u8; 6]).is_some());
    }

    #[test]
    fn narrow_image_is_zero_padded() {
        let data = [0xFF, 0xFF, 0x0F, 0xF0];
        let img = PackedImage::new(12, 2, &data).unwrap();
        let mut row = [0xAAu8; ROW_BYTES];
        img.decode_row(0, &mut row);
        assert_eq!(row[0], 0xFF);
        assert_eq!(row[1], 0xF0);
        assert!(row[2..].iter().all(|&b| b == 0));

        img.decode_row(1, &mut row);
        assert_eq!(&row[..2], &[0x0F, 0xF0]);
    }

    #[test]
    fn wide_image_is_cropped_to_printhead() {
        let data = [0x81u8; 64];
        let img = PackedImage::new(512, 1, &data).unwrap();
        let mut row = [0u8; ROW_BYTES];
        img.decode_row(0, &mut row);
        assert!(row.iter().all(|&b| b == 0x81));
    }

    #[test]
    fn border_label_outlines_the_label() {
        let label = BorderLabel {
            width: 384,
            height: 240,
            border: 2,
        };
        let mut row = [0u8; ROW_BYTES];
        label.decode_row(0, &mut row);
        assert!(row.iter().all(|&b| b == 0xFF));

        label.decode_row(100, &mut row);
        assert_eq!(row[0], 0xC0);
        assert_eq!(row[ROW_BYTES - 1], 0x03);
        assert!(row[1..ROW_BYTES - 1].iter().all(|&b| b == 0));

        label.decode_row(239, &mut row);
        assert!(row.iter().all(|&b| b == 0xFF));
    }
}

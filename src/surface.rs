//! The surface model decoders write into.
//!
//! A [`Surface`] is a forgiving pixel sink: writes outside the allocated area
//! are clamped or dropped rather than reported, so decoders can stream rows
//! without per-write error plumbing. Anything that can genuinely fail
//! (allocation, palette sizing) returns `bool` and decoders translate a
//! `false` into an error.

/// Pixel layouts a decoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One palette index per pixel, palette of up to 256 RGB entries.
    Indexed8,
    /// Packed 24-bit RGB.
    Rgb888,
    /// Packed 32-bit RGBA.
    Rgba8888,
}

impl PixelFormat {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Indexed8 => 1,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgba8888 => 4,
        }
    }
}

/// What a sub-rectangle represents inside an atlas surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRectKind {
    /// An independent image placed in the atlas (icons).
    Sprite,
    /// A page or frame of a multi-image document (DCX).
    Frame,
}

/// A region of an atlas surface holding one decoded sub-image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub kind: SubRectKind,
    /// Decoder-assigned index of the sub-image within its container.
    pub user_tag: u32,
}

/// Pixel sink written by decoders.
///
/// Out-of-range writes clamp to the surface and never panic; `y` outside the
/// image drops the write entirely.
pub trait Surface {
    /// Allocate pixel storage. Returns `false` for zero dimensions or if the
    /// pixel buffer would exceed 1 GiB. On success the pixels are zeroed and
    /// any previous palette and sub-rects are cleared.
    fn set_size(&mut self, width: u32, height: u32, format: PixelFormat) -> bool;

    /// Copy `data` into row `y` starting at byte offset `byte_x`, clamped to
    /// the row.
    fn write_pixels(&mut self, byte_x: usize, y: u32, data: &[u8]);

    /// Store a single palette index at `(x, y)`. Indexed surfaces only.
    fn write_pixel(&mut self, x: u32, y: u32, index: u8);

    /// Size the palette to `count` entries (valid range `1..=256`), new
    /// entries zero-filled.
    fn set_palette_size(&mut self, count: usize) -> bool;

    /// Write RGB triples into the palette starting at entry `start`, clamped
    /// to the palette size.
    fn write_palette(&mut self, start: usize, rgb: &[u8]);

    /// Record a sub-image region (atlas decoders).
    fn add_subrect(&mut self, rect: SubRect);
}

const MAX_SURFACE_BYTES: usize = 1 << 30;

/// Heap-backed [`Surface`] with read access for consumers.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    palette: Vec<u8>,
    subrects: Vec<SubRect>,
}

impl MemorySurface {
    pub fn new() -> Self {
        MemorySurface {
            width: 0,
            height: 0,
            format: PixelFormat::Indexed8,
            pixels: Vec::new(),
            palette: Vec::new(),
            subrects: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row-major pixel bytes, stride `width * bytes_per_pixel`.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Palette as RGB triples (empty for direct-color surfaces).
    pub fn palette(&self) -> &[u8] {
        &self.palette
    }

    pub fn subrects(&self) -> &[SubRect] {
        &self.subrects
    }

    /// Byte stride of one row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Pixel bytes of row `y`, or an empty slice when out of range.
    pub fn row(&self, y: u32) -> &[u8] {
        if y >= self.height {
            return &[];
        }
        let stride = self.stride();
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    /// The pixel at `(x, y)` as one/three/four bytes depending on format.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let row = self.row(y);
        if x >= self.width {
            return &[];
        }
        &row[x as usize * bpp..x as usize * bpp + bpp]
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        MemorySurface::new()
    }
}

impl Surface for MemorySurface {
    fn set_size(&mut self, width: u32, height: u32, format: PixelFormat) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let bpp = format.bytes_per_pixel();
        let bytes = match (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(bpp))
        {
            Some(n) if n <= MAX_SURFACE_BYTES => n,
            _ => return false,
        };
        self.width = width;
        self.height = height;
        self.format = format;
        self.pixels.clear();
        self.pixels.resize(bytes, 0);
        self.palette.clear();
        self.subrects.clear();
        true
    }

    fn write_pixels(&mut self, byte_x: usize, y: u32, data: &[u8]) {
        if y >= self.height {
            return;
        }
        let stride = self.stride();
        if byte_x >= stride {
            return;
        }
        let count = data.len().min(stride - byte_x);
        let start = y as usize * stride + byte_x;
        self.pixels[start..start + count].copy_from_slice(&data[..count]);
    }

    fn write_pixel(&mut self, x: u32, y: u32, index: u8) {
        if self.format != PixelFormat::Indexed8 || x >= self.width || y >= self.height {
            return;
        }
        let offset = y as usize * self.stride() + x as usize;
        self.pixels[offset] = index;
    }

    fn set_palette_size(&mut self, count: usize) -> bool {
        if count == 0 || count > 256 {
            return false;
        }
        self.palette.resize(count * 3, 0);
        true
    }

    fn write_palette(&mut self, start: usize, rgb: &[u8]) {
        let byte_start = start * 3;
        if byte_start >= self.palette.len() {
            return;
        }
        let count = rgb.len().min(self.palette.len() - byte_start);
        self.palette[byte_start..byte_start + count].copy_from_slice(&rgb[..count]);
    }

    fn add_subrect(&mut self, rect: SubRect) {
        self.subrects.push(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_size_rejects_degenerate() {
        let mut s = MemorySurface::new();
        assert!(!s.set_size(0, 10, PixelFormat::Rgb888));
        assert!(!s.set_size(10, 0, PixelFormat::Rgb888));
        // 1 GiB cap: 20000 * 20000 * 4 > 2^30
        assert!(!s.set_size(20000, 20000, PixelFormat::Rgba8888));
        assert!(s.set_size(4, 2, PixelFormat::Rgb888));
        assert_eq!(s.pixels().len(), 4 * 2 * 3);
    }

    #[test]
    fn set_size_resets_palette_and_subrects() {
        let mut s = MemorySurface::new();
        assert!(s.set_size(2, 2, PixelFormat::Indexed8));
        assert!(s.set_palette_size(2));
        s.add_subrect(SubRect {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            kind: SubRectKind::Sprite,
            user_tag: 0,
        });
        assert!(s.set_size(2, 2, PixelFormat::Indexed8));
        assert!(s.palette().is_empty());
        assert!(s.subrects().is_empty());
    }

    #[test]
    fn write_pixels_clamps() {
        let mut s = MemorySurface::new();
        assert!(s.set_size(2, 2, PixelFormat::Rgb888));
        // Row is 6 bytes; write 8 starting at 4: only 2 land.
        s.write_pixels(4, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(s.row(0), &[0, 0, 0, 0, 1, 2]);
        // Out-of-range row is dropped.
        s.write_pixels(0, 5, &[9, 9, 9]);
        // Offset past the row is dropped.
        s.write_pixels(6, 1, &[9]);
        assert_eq!(s.row(1), &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn write_pixel_indexed_only() {
        let mut s = MemorySurface::new();
        assert!(s.set_size(2, 1, PixelFormat::Rgb888));
        s.write_pixel(0, 0, 7);
        assert_eq!(s.row(0), &[0, 0, 0, 0, 0, 0]);
        assert!(s.set_size(2, 1, PixelFormat::Indexed8));
        s.write_pixel(1, 0, 7);
        assert_eq!(s.row(0), &[0, 7]);
    }

    #[test]
    fn palette_clamping() {
        let mut s = MemorySurface::new();
        assert!(s.set_size(1, 1, PixelFormat::Indexed8));
        assert!(!s.set_palette_size(0));
        assert!(!s.set_palette_size(257));
        assert!(s.set_palette_size(2));
        s.write_palette(1, &[10, 20, 30, 40, 50, 60]);
        assert_eq!(s.palette(), &[0, 0, 0, 10, 20, 30]);
        s.write_palette(5, &[1, 2, 3]);
        assert_eq!(s.palette().len(), 6);
    }
}

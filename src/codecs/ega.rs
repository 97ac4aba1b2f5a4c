//! Raw EGA data decoding.
//!
//! These images carry no header at all, so they cannot be sniffed; callers
//! supply the dimensions and layout and call [`decode_ega_raw`] directly.
//! EGA stores up to 4 one-bit color planes (blue, green, red, intensity).
//!
//! Reference: <https://moddingwiki.shikadi.net/wiki/Raw_EGA_data>

use crate::error::{Error, Result};
use crate::palette::EGA_DEFAULT_PALETTE;
use crate::surface::{PixelFormat, Surface};

/// Arrangement of the stored planes. Standard EGA is blue-green-red-intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EgaPlaneOrder {
    #[default]
    Bgri,
    Rgbi,
    Irgb,
    /// 3-plane, 8 colors.
    Bgr,
    /// 3-plane, 8 colors, red first.
    Rgb,
}

impl EgaPlaneOrder {
    /// Bit position in the final pixel value that a stored plane feeds.
    fn plane_bit(self, plane: usize) -> u32 {
        match self {
            EgaPlaneOrder::Bgri | EgaPlaneOrder::Bgr => plane as u32,
            EgaPlaneOrder::Rgbi => match plane {
                0 => 2,
                1 => 1,
                2 => 0,
                _ => 3,
            },
            EgaPlaneOrder::Irgb => match plane {
                0 => 3,
                1 => 2,
                2 => 1,
                _ => 0,
            },
            EgaPlaneOrder::Rgb => match plane {
                0 => 2,
                1 => 1,
                _ => 0,
            },
        }
    }
}

/// How the raw bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EgaFormat {
    /// All rows of plane 0, then all of plane 1, and so on.
    GraphicPlanar,
    /// For each row, one full row per plane in sequence.
    #[default]
    RowPlanar,
    /// For each 8-pixel block, one byte per plane.
    BytePlanar,
    /// Packed nibbles, two 4-bit pixels per byte.
    Linear,
}

/// Decode parameters for raw EGA data.
#[derive(Debug, Clone, Copy)]
pub struct EgaRawOptions {
    pub width: u32,
    pub height: u32,
    pub format: EgaFormat,
    pub plane_order: EgaPlaneOrder,
    /// 4 planes for 16 colors, 3 for 8, 2 for 4, 1 for 2.
    pub num_planes: u32,
    /// For [`EgaFormat::Linear`]: high nibble is the first pixel.
    pub high_nibble_first: bool,
}

impl Default for EgaRawOptions {
    fn default() -> Self {
        EgaRawOptions {
            width: 320,
            height: 200,
            format: EgaFormat::default(),
            plane_order: EgaPlaneOrder::default(),
            num_planes: 4,
            high_nibble_first: true,
        }
    }
}

/// Exact byte count a raw EGA image of the given shape occupies.
pub fn ega_raw_data_size(width: u32, height: u32, format: EgaFormat, num_planes: u32) -> usize {
    if width == 0 || height == 0 || num_planes == 0 {
        return 0;
    }
    let (w, h, planes) = (width as usize, height as usize, num_planes as usize);
    match format {
        EgaFormat::GraphicPlanar | EgaFormat::RowPlanar | EgaFormat::BytePlanar => {
            ((w + 7) / 8) * h * planes
        }
        EgaFormat::Linear => ((w + 1) / 2) * h,
    }
}

fn validate(width: u32, height: u32, num_planes: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidFormat("Invalid dimensions".into()));
    }
    if !(1..=4).contains(&num_planes) {
        return Err(Error::InvalidFormat("Invalid plane count".into()));
    }
    Ok(())
}

fn setup_surface(
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
    num_planes: u32,
) -> Result<()> {
    if !surface.set_size(width, height, PixelFormat::Indexed8) {
        return Err(Error::Internal("Failed to allocate surface".into()));
    }
    let num_colors = 1usize << num_planes;
    surface.set_palette_size(num_colors);
    surface.write_palette(0, &EGA_DEFAULT_PALETTE[..num_colors * 3]);
    Ok(())
}

fn get_bit(byte: u8, bit_index: usize) -> u8 {
    (byte >> (7 - bit_index)) & 1
}

/// Decodes graphic-planar data: each plane stored as a full image.
pub fn decode_ega_graphic_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
    num_planes: u32,
    plane_order: EgaPlaneOrder,
) -> Result<()> {
    validate(width, height, num_planes)?;

    let w = width as usize;
    let bytes_per_row = (w + 7) / 8;
    let plane_size = bytes_per_row * height as usize;
    if data.len() < plane_size * num_planes as usize {
        return Err(Error::TruncatedData(
            "EGA graphic-planar data too small".into(),
        ));
    }

    setup_surface(surface, width, height, num_planes)?;

    let mut row = vec![0u8; w];
    for y in 0..height as usize {
        row.fill(0);
        for plane in 0..num_planes as usize {
            let bit_pos = plane_order.plane_bit(plane);
            let row_offset = plane * plane_size + y * bytes_per_row;
            for (x, out) in row.iter_mut().enumerate() {
                if get_bit(data[row_offset + x / 8], x % 8) != 0 {
                    *out |= 1 << bit_pos;
                }
            }
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes row-planar data: planes interleaved per scanline.
pub fn decode_ega_row_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
    num_planes: u32,
    plane_order: EgaPlaneOrder,
) -> Result<()> {
    validate(width, height, num_planes)?;

    let w = width as usize;
    let bytes_per_row = (w + 7) / 8;
    let row_size = bytes_per_row * num_planes as usize;
    if data.len() < row_size * height as usize {
        return Err(Error::TruncatedData("EGA row-planar data too small".into()));
    }

    setup_surface(surface, width, height, num_planes)?;

    let mut row = vec![0u8; w];
    for y in 0..height as usize {
        row.fill(0);
        let row_offset = y * row_size;
        for plane in 0..num_planes as usize {
            let bit_pos = plane_order.plane_bit(plane);
            let plane_offset = row_offset + plane * bytes_per_row;
            for (x, out) in row.iter_mut().enumerate() {
                if get_bit(data[plane_offset + x / 8], x % 8) != 0 {
                    *out |= 1 << bit_pos;
                }
            }
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes byte-planar data: one byte per plane for every 8-pixel block.
pub fn decode_ega_byte_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
    num_planes: u32,
    plane_order: EgaPlaneOrder,
) -> Result<()> {
    validate(width, height, num_planes)?;

    let w = width as usize;
    let bytes_per_row = (w + 7) / 8;
    if data.len() < bytes_per_row * height as usize * num_planes as usize {
        return Err(Error::TruncatedData(
            "EGA byte-planar data too small".into(),
        ));
    }

    setup_surface(surface, width, height, num_planes)?;

    let mut row = vec![0u8; w];
    let mut src_pos = 0;
    for y in 0..height as usize {
        row.fill(0);
        for byte_x in 0..bytes_per_row {
            for plane in 0..num_planes as usize {
                let plane_byte = data[src_pos];
                src_pos += 1;
                let bit_pos = plane_order.plane_bit(plane);
                for bit in 0..8 {
                    let x = byte_x * 8 + bit;
                    if x < w && get_bit(plane_byte, bit) != 0 {
                        row[x] |= 1 << bit_pos;
                    }
                }
            }
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes linear data: packed 4-bit pixels, always 16 colors.
pub fn decode_ega_linear(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
    high_nibble_first: bool,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidFormat("Invalid dimensions".into()));
    }

    let w = width as usize;
    let bytes_per_row = (w + 1) / 2;
    if data.len() < bytes_per_row * height as usize {
        return Err(Error::TruncatedData("EGA linear data too small".into()));
    }

    setup_surface(surface, width, height, 4)?;

    let mut row = vec![0u8; w];
    let mut src_pos = 0;
    for y in 0..height as usize {
        let mut x = 0;
        while x < w {
            let byte = data[src_pos];
            src_pos += 1;
            let (pixel0, pixel1) = if high_nibble_first {
                ((byte >> 4) & 0x0F, byte & 0x0F)
            } else {
                (byte & 0x0F, (byte >> 4) & 0x0F)
            };
            row[x] = pixel0;
            if x + 1 < w {
                row[x + 1] = pixel1;
            }
            x += 2;
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes raw EGA data with the layout described by `opts`.
pub fn decode_ega_raw(data: &[u8], surface: &mut dyn Surface, opts: &EgaRawOptions) -> Result<()> {
    match opts.format {
        EgaFormat::GraphicPlanar => decode_ega_graphic_planar(
            data,
            surface,
            opts.width,
            opts.height,
            opts.num_planes,
            opts.plane_order,
        ),
        EgaFormat::RowPlanar => decode_ega_row_planar(
            data,
            surface,
            opts.width,
            opts.height,
            opts.num_planes,
            opts.plane_order,
        ),
        EgaFormat::BytePlanar => decode_ega_byte_planar(
            data,
            surface,
            opts.width,
            opts.height,
            opts.num_planes,
            opts.plane_order,
        ),
        EgaFormat::Linear => decode_ega_linear(
            data,
            surface,
            opts.width,
            opts.height,
            opts.high_nibble_first,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn graphic_planar_combines_planes() {
        // 8x1, 4 planes of 1 byte: pixel 0 set in planes 0 and 3 -> index 9
        let data = [0x80, 0x00, 0x00, 0x80];
        let mut surface = MemorySurface::new();
        decode_ega_graphic_planar(&data, &mut surface, 8, 1, 4, EgaPlaneOrder::Bgri).unwrap();
        assert_eq!(surface.pixel(0, 0), &[9]);
        assert_eq!(surface.palette().len(), 16 * 3);
    }

    #[test]
    fn plane_order_remaps_bits() {
        // Same data, IRGB order: plane 0 -> bit 3, plane 3 -> bit 0.
        let data = [0x80, 0x00, 0x00, 0x80];
        let mut surface = MemorySurface::new();
        decode_ega_graphic_planar(&data, &mut surface, 8, 1, 4, EgaPlaneOrder::Irgb).unwrap();
        assert_eq!(surface.pixel(0, 0), &[9]); // bits 3 and 0 again, symmetric
        let data2 = [0x80, 0x00, 0x00, 0x00];
        decode_ega_graphic_planar(&data2, &mut surface, 8, 1, 4, EgaPlaneOrder::Irgb).unwrap();
        assert_eq!(surface.pixel(0, 0), &[8]);
    }

    #[test]
    fn row_planar_layout() {
        // 8x2, 2 planes per row.
        let data = [0x80, 0x80, 0x00, 0x80];
        let mut surface = MemorySurface::new();
        decode_ega_row_planar(&data, &mut surface, 8, 2, 2, EgaPlaneOrder::Bgri).unwrap();
        assert_eq!(surface.pixel(0, 0), &[3]);
        assert_eq!(surface.pixel(0, 1), &[2]);
        assert_eq!(surface.palette().len(), 4 * 3);
    }

    #[test]
    fn byte_planar_interleaves_blocks() {
        // 16x1, 2 planes: block 0 planes (0x80, 0x00), block 1 (0x00, 0x80).
        let data = [0x80, 0x00, 0x00, 0x80];
        let mut surface = MemorySurface::new();
        decode_ega_byte_planar(&data, &mut surface, 16, 1, 2, EgaPlaneOrder::Bgri).unwrap();
        assert_eq!(surface.pixel(0, 0), &[1]);
        assert_eq!(surface.pixel(8, 0), &[2]);
    }

    #[test]
    fn linear_nibble_order() {
        let data = [0x12, 0x34];
        let mut surface = MemorySurface::new();
        decode_ega_linear(&data, &mut surface, 4, 1, true).unwrap();
        assert_eq!(surface.row(0), &[1, 2, 3, 4]);
        decode_ega_linear(&data, &mut surface, 4, 1, false).unwrap();
        assert_eq!(surface.row(0), &[2, 1, 4, 3]);
    }

    #[test]
    fn short_data_is_truncated() {
        let data = [0u8; 3];
        let mut surface = MemorySurface::new();
        let err =
            decode_ega_graphic_planar(&data, &mut surface, 8, 1, 4, EgaPlaneOrder::Bgri)
                .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::TruncatedData);
    }

    #[test]
    fn data_size_helper() {
        assert_eq!(ega_raw_data_size(320, 200, EgaFormat::RowPlanar, 4), 32000);
        assert_eq!(ega_raw_data_size(320, 200, EgaFormat::Linear, 4), 32000);
        assert_eq!(ega_raw_data_size(0, 200, EgaFormat::Linear, 4), 0);
    }
}

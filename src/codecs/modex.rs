//! Raw VGA Mode X data decoding.
//!
//! Mode X spreads consecutive pixels across 4 byte planes (pixel x lives in
//! plane `x & 3` at offset `x >> 2`). Like raw EGA these images have no
//! header, so callers pass dimensions and layout explicitly. Output is
//! always 256-color indexed with the default VGA palette.

use crate::error::{Error, Result};
use crate::palette::vga_default_palette;
use crate::surface::{PixelFormat, Surface};

/// How the raw Mode X bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModexFormat {
    /// Each plane stored as a full image.
    GraphicPlanar,
    /// All 4 planes for row 0, then row 1, and so on.
    #[default]
    RowPlanar,
    /// One byte per plane for every 4-pixel group.
    BytePlanar,
    /// Plain chunky bytes, one pixel each.
    Linear,
}

/// Decode parameters for raw Mode X data.
#[derive(Debug, Clone, Copy)]
pub struct ModexRawOptions {
    pub width: u32,
    pub height: u32,
    pub format: ModexFormat,
}

impl Default for ModexRawOptions {
    fn default() -> Self {
        ModexRawOptions {
            width: 320,
            height: 200,
            format: ModexFormat::default(),
        }
    }
}

fn plane_for_x(x: usize) -> usize {
    x & 3
}

fn offset_for_x(x: usize) -> usize {
    x >> 2
}

fn setup_surface(surface: &mut dyn Surface, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidFormat("Invalid dimensions".into()));
    }
    if !surface.set_size(width, height, PixelFormat::Indexed8) {
        return Err(Error::Internal("Failed to allocate surface".into()));
    }
    let palette = vga_default_palette();
    surface.set_palette_size(256);
    surface.write_palette(0, &palette);
    Ok(())
}

/// Decodes graphic-planar Mode X data.
pub fn decode_modex_graphic_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
) -> Result<()> {
    let w = width as usize;
    let bytes_per_plane_row = (w + 3) / 4;
    let plane_size = bytes_per_plane_row * height as usize;
    if width > 0 && data.len() < plane_size * 4 {
        return Err(Error::TruncatedData(
            "Mode X graphic-planar data too small".into(),
        ));
    }
    setup_surface(surface, width, height)?;

    let mut row = vec![0u8; w];
    for y in 0..height as usize {
        for (x, out) in row.iter_mut().enumerate() {
            *out = data[plane_for_x(x) * plane_size + y * bytes_per_plane_row + offset_for_x(x)];
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes row-planar Mode X data.
pub fn decode_modex_row_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
) -> Result<()> {
    let w = width as usize;
    let bytes_per_plane_row = (w + 3) / 4;
    let row_size = bytes_per_plane_row * 4;
    if width > 0 && data.len() < row_size * height as usize {
        return Err(Error::TruncatedData(
            "Mode X row-planar data too small".into(),
        ));
    }
    setup_surface(surface, width, height)?;

    let mut row = vec![0u8; w];
    for y in 0..height as usize {
        let row_offset = y * row_size;
        for (x, out) in row.iter_mut().enumerate() {
            *out = data[row_offset + plane_for_x(x) * bytes_per_plane_row + offset_for_x(x)];
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes byte-planar Mode X data: 4 bytes per 4-pixel group.
pub fn decode_modex_byte_planar(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
) -> Result<()> {
    let w = width as usize;
    let groups_per_row = (w + 3) / 4;
    if width > 0 && data.len() < groups_per_row * 4 * height as usize {
        return Err(Error::TruncatedData(
            "Mode X byte-planar data too small".into(),
        ));
    }
    setup_surface(surface, width, height)?;

    let mut row = vec![0u8; w];
    let mut src_pos = 0;
    for y in 0..height as usize {
        let mut x = 0;
        for _ in 0..groups_per_row {
            for _ in 0..4 {
                let value = data[src_pos];
                src_pos += 1;
                if x < w {
                    row[x] = value;
                    x += 1;
                }
            }
        }
        surface.write_pixels(0, y as u32, &row);
    }
    Ok(())
}

/// Decodes linear (chunky) data, one byte per pixel.
pub fn decode_modex_linear(
    data: &[u8],
    surface: &mut dyn Surface,
    width: u32,
    height: u32,
) -> Result<()> {
    let w = width as usize;
    if width > 0 && data.len() < w * height as usize {
        return Err(Error::TruncatedData("Mode X linear data too small".into()));
    }
    setup_surface(surface, width, height)?;

    for y in 0..height as usize {
        surface.write_pixels(0, y as u32, &data[y * w..y * w + w]);
    }
    Ok(())
}

/// Decodes raw Mode X data with the layout described by `opts`.
pub fn decode_modex_raw(
    data: &[u8],
    surface: &mut dyn Surface,
    opts: &ModexRawOptions,
) -> Result<()> {
    match opts.format {
        ModexFormat::GraphicPlanar => {
            decode_modex_graphic_planar(data, surface, opts.width, opts.height)
        }
        ModexFormat::RowPlanar => decode_modex_row_planar(data, surface, opts.width, opts.height),
        ModexFormat::BytePlanar => decode_modex_byte_planar(data, surface, opts.width, opts.height),
        ModexFormat::Linear => decode_modex_linear(data, surface, opts.width, opts.height),
    }
}

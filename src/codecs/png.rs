//! PNG decode and re-encode, backed by the `png` crate.
//!
//! Decoding always produces RGBA. Before handing data to the inflater the
//! IHDR dimensions are checked against the decode limits so oversized images
//! are rejected without allocating anything.

use std::io::Cursor;
use std::path::Path;

use crate::bytes::read_be32;
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{MemorySurface, PixelFormat, Surface};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const IHDR_LENGTH_OFFSET: usize = 8;
const IHDR_TYPE_OFFSET: usize = 12;
const IHDR_WIDTH_OFFSET: usize = 16;
const IHDR_HEIGHT_OFFSET: usize = 20;
const MIN_SIZE_FOR_DIMENSIONS: usize = 24;
const IHDR_TYPE: u32 = 0x4948_4452; // "IHDR"
const IHDR_LENGTH: u32 = 13;

pub struct PngDecoder;

impl Decoder for PngDecoder {
    fn name(&self) -> &'static str {
        "png"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= PNG_SIGNATURE.len() && data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid PNG file".into()));
        }

        // Pre-decode dimension check straight from the IHDR chunk. If the
        // chunk doesn't look right, fall through and let the decoder complain.
        if data.len() >= MIN_SIZE_FOR_DIMENSIONS
            && read_be32(data, IHDR_LENGTH_OFFSET) == IHDR_LENGTH
            && read_be32(data, IHDR_TYPE_OFFSET) == IHDR_TYPE
        {
            let width = read_be32(data, IHDR_WIDTH_OFFSET);
            let height = read_be32(data, IHDR_HEIGHT_OFFSET);
            validate_dimensions(width, height, options)?;
        }

        let mut decoder = png::Decoder::new(Cursor::new(data));
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::InvalidFormat(format!("PNG decode error: {e}")))?;

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| Error::InvalidFormat(format!("PNG decode error: {e}")))?;

        let width = info.width;
        let height = info.height;
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Rgba8888) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let w = width as usize;
        let src = &buf[..info.buffer_size()];
        let mut row = vec![0u8; w * 4];

        for y in 0..height {
            match info.color_type {
                png::ColorType::Rgba => {
                    let start = y as usize * w * 4;
                    surface.write_pixels(0, y, &src[start..start + w * 4]);
                    continue;
                }
                png::ColorType::Rgb => {
                    let start = y as usize * w * 3;
                    for x in 0..w {
                        row[x * 4..x * 4 + 3]
                            .copy_from_slice(&src[start + x * 3..start + x * 3 + 3]);
                        row[x * 4 + 3] = 0xFF;
                    }
                }
                png::ColorType::GrayscaleAlpha => {
                    let start = y as usize * w * 2;
                    for x in 0..w {
                        let g = src[start + x * 2];
                        row[x * 4..x * 4 + 4].copy_from_slice(&[g, g, g, src[start + x * 2 + 1]]);
                    }
                }
                _ => {
                    // Grayscale; indexed is expanded by the transformations.
                    let start = y as usize * w;
                    for x in 0..w {
                        let g = src[start + x];
                        row[x * 4..x * 4 + 4].copy_from_slice(&[g, g, g, 0xFF]);
                    }
                }
            }
            surface.write_pixels(0, y, &row);
        }

        Ok(())
    }
}

/// Encodes a surface as an RGBA PNG. Indexed surfaces are expanded through
/// their palette; entries past the end of the palette come out black.
pub fn encode_png(surface: &MemorySurface) -> Result<Vec<u8>> {
    if surface.width() == 0 || surface.height() == 0 {
        return Err(Error::InvalidFormat("Cannot encode an empty surface".into()));
    }

    let w = surface.width() as usize;
    let h = surface.height() as usize;
    let pixels = surface.pixels();

    let rgba: Vec<u8> = match surface.format() {
        PixelFormat::Rgba8888 => pixels.to_vec(),
        PixelFormat::Rgb888 => {
            let mut out = vec![0u8; w * h * 4];
            for i in 0..w * h {
                out[i * 4..i * 4 + 3].copy_from_slice(&pixels[i * 3..i * 3 + 3]);
                out[i * 4 + 3] = 255;
            }
            out
        }
        PixelFormat::Indexed8 => {
            let palette = surface.palette();
            let mut out = vec![0u8; w * h * 4];
            for i in 0..w * h {
                let pal_offset = pixels[i] as usize * 3;
                if pal_offset + 2 < palette.len() {
                    out[i * 4..i * 4 + 3].copy_from_slice(&palette[pal_offset..pal_offset + 3]);
                }
                out[i * 4 + 3] = 255;
            }
            out
        }
    };

    let mut png_data = Vec::new();
    {
        let mut encoder =
            png::Encoder::new(&mut png_data, surface.width(), surface.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::Internal(format!("PNG encode error: {e}")))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| Error::Internal(format!("PNG encode error: {e}")))?;
    }

    Ok(png_data)
}

/// Encodes a surface and writes it to `path`.
pub fn save_png(surface: &MemorySurface, path: impl AsRef<Path>) -> Result<()> {
    let png_data = encode_png(surface)?;
    std::fs::write(path, png_data)?;
    Ok(())
}

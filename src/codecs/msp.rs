//! Microsoft Paint (MSP) decoder, versions 1 and 2.
//!
//! Both versions are 1-bit monochrome; v2 adds per-scanline RLE. A set bit is
//! black (palette index 0), a clear bit white.

use crate::bytes::read_le16;
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const HEADER_SIZE: usize = 32;

// Magic words "DanM" (v1) and "LinS" (v2) as LE16 pairs.
const V1_KEY1: u16 = 0x6144;
const V1_KEY2: u16 = 0x4D6E;
const V2_KEY1: u16 = 0x694C;
const V2_KEY2: u16 = 0x536E;

fn version(data: &[u8]) -> Option<u8> {
    if data.len() < 4 {
        return None;
    }
    let key1 = read_le16(data, 0);
    let key2 = read_le16(data, 2);
    if key1 == V1_KEY1 && key2 == V1_KEY2 {
        Some(1)
    } else if key1 == V2_KEY1 && key2 == V2_KEY2 {
        Some(2)
    } else {
        None
    }
}

fn write_row(surface: &mut dyn Surface, y: u32, packed: &[u8], width: usize, row: &mut [u8]) {
    for (x, out) in row.iter_mut().enumerate().take(width) {
        let bit = (packed[x / 8] >> (7 - (x % 8))) & 1;
        *out = if bit != 0 { 0 } else { 1 };
    }
    surface.write_pixels(0, y, &row[..width]);
}

pub struct MspDecoder;

impl Decoder for MspDecoder {
    fn name(&self) -> &'static str {
        "msp"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["msp"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        version(data).is_some()
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        let version = version(data)
            .ok_or_else(|| Error::InvalidFormat("Not a valid MSP file".into()))?;
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedData("MSP header incomplete".into()));
        }

        let width = read_le16(data, 4) as u32;
        let height = read_le16(data, 6) as u32;
        if width == 0 || height == 0 {
            return Err(Error::InvalidFormat("Invalid MSP dimensions".into()));
        }
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        surface.set_palette_size(2);
        surface.write_palette(0, &[0, 0, 0, 255, 255, 255]);

        let row_bytes = (width as usize + 7) / 8;
        let mut row = vec![0u8; width as usize];

        if version == 1 {
            let needed = HEADER_SIZE + row_bytes * height as usize;
            if data.len() < needed {
                return Err(Error::TruncatedData("MSP pixel data incomplete".into()));
            }
            for y in 0..height {
                let start = HEADER_SIZE + y as usize * row_bytes;
                write_row(surface, y, &data[start..start + row_bytes], width as usize, &mut row);
            }
            return Ok(());
        }

        // v2: a map of LE16 scanline byte counts, then RLE per scanline.
        let map_size = height as usize * 2;
        if data.len() < HEADER_SIZE + map_size {
            return Err(Error::TruncatedData("MSP scanline map incomplete".into()));
        }

        let mut src = HEADER_SIZE + map_size;
        let mut packed = vec![0u8; row_bytes];
        for y in 0..height {
            let line_size = read_le16(data, HEADER_SIZE + y as usize * 2) as usize;
            if src + line_size > data.len() {
                return Err(Error::TruncatedData("MSP scanline data incomplete".into()));
            }
            let line = &data[src..src + line_size];
            src += line_size;

            let mut pos = 0usize;
            let mut out = 0usize;
            while pos < line.len() && out < row_bytes {
                let run_type = line[pos];
                pos += 1;
                if run_type == 0 {
                    if pos + 2 > line.len() {
                        return Err(Error::UnsupportedEncoding(
                            "MSP RLE decompression failed".into(),
                        ));
                    }
                    let count = line[pos] as usize;
                    let value = line[pos + 1];
                    pos += 2;
                    let n = count.min(row_bytes - out);
                    packed[out..out + n].fill(value);
                    out += n;
                } else {
                    let count = run_type as usize;
                    if pos + count > line.len() {
                        return Err(Error::UnsupportedEncoding(
                            "MSP RLE decompression failed".into(),
                        ));
                    }
                    let n = count.min(row_bytes - out);
                    packed[out..out + n].copy_from_slice(&line[pos..pos + n]);
                    pos += count;
                    out += n;
                }
            }
            if out < row_bytes {
                return Err(Error::UnsupportedEncoding(
                    "MSP RLE decompression failed".into(),
                ));
            }
            write_row(surface, y, &packed, width as usize, &mut row);
        }

        Ok(())
    }
}

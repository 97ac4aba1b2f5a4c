//! PC Paint / Pictor (.pic) decoder.
//!
//! Single-plane 1/2/4/8 bpp and planar EGA (4x1 bpp) images with optional
//! marker-based RLE blocks. Palette handling covers the CGA, EGA and VGA
//! palette records plus sensible defaults when none is stored.

use crate::bytes::{extract_pixel, read_le16};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const PICTOR_MAGIC: u16 = 0x1234;
const HEADER_SIZE: usize = 17;

const PAL_CGA: u16 = 1;
const PAL_EGA: u16 = 3;
const PAL_VGA: u16 = 4;

// Full 64-color EGA palette (2 bits per component), RGB packed.
const EGA_PALETTE_64: [u32; 64] = [
    0x000000, 0x0000AA, 0x00AA00, 0x00AAAA, 0xAA0000, 0xAA00AA, 0xAAAA00, 0xAAAAAA,
    0x000055, 0x0000FF, 0x00AA55, 0x00AAFF, 0xAA0055, 0xAA00FF, 0xAAAA55, 0xAAAAFF,
    0x005500, 0x0055AA, 0x00FF00, 0x00FFAA, 0xAA5500, 0xAA55AA, 0xAAFF00, 0xAAFFAA,
    0x005555, 0x0055FF, 0x00FF55, 0x00FFFF, 0xAA5555, 0xAA55FF, 0xAAFF55, 0xAAFFFF,
    0x550000, 0x5500AA, 0x55AA00, 0x55AAAA, 0xFF0000, 0xFF00AA, 0xFFAA00, 0xFFAAAA,
    0x550055, 0x5500FF, 0x55AA55, 0x55AAFF, 0xFF0055, 0xFF00FF, 0xFFAA55, 0xFFAAFF,
    0x555500, 0x5555AA, 0x55FF00, 0x55FFAA, 0xFF5500, 0xFF55AA, 0xFFFF00, 0xFFFFAA,
    0x555555, 0x5555FF, 0x55FF55, 0x55FFFF, 0xFF5555, 0xFF55FF, 0xFFFF55, 0xFFFFFF,
];

const CGA_PALETTE_16: [u32; 16] = [
    0x000000, 0x0000AA, 0x00AA00, 0x00AAAA, 0xAA0000, 0xAA00AA, 0xAA5500, 0xAAAAAA,
    0x555555, 0x5555FF, 0x55FF55, 0x55FFFF, 0xFF5555, 0xFF55FF, 0xFFFF55, 0xFFFFFF,
];

// CGA mode 4/5 index tables: palette#1/#2/mode5 at low then high intensity.
const CGA_MODE45_INDEX: [[u8; 4]; 6] = [
    [0, 3, 5, 7],
    [0, 2, 4, 6],
    [0, 3, 4, 7],
    [0, 11, 13, 15],
    [0, 10, 12, 14],
    [0, 11, 12, 15],
];

struct PicInfo {
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    num_planes: u32,
    palette_type: u16,
    palette_size: u16,
}

fn parse_header(data: &[u8]) -> Option<PicInfo> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    if read_le16(data, 0) != PICTOR_MAGIC {
        return None;
    }
    let plane_info = data[10];
    Some(PicInfo {
        width: read_le16(data, 2) as u32,
        height: read_le16(data, 4) as u32,
        bits_per_pixel: (plane_info & 0x0F) as u32,
        num_planes: ((plane_info >> 4) & 0x0F) as u32 + 1,
        palette_type: read_le16(data, 13),
        palette_size: read_le16(data, 15),
    })
}

fn write_rgb(palette: &mut [u8], i: usize, color: u32) {
    palette[i * 3] = (color >> 16) as u8;
    palette[i * 3 + 1] = (color >> 8) as u8;
    palette[i * 3 + 2] = color as u8;
}

fn scale_6bit(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

// Decodes one RLE block. Returns the number of source bytes consumed,
// or 0 when the block header is unusable.
fn decode_rle_block(src: &[u8], dest: &mut Vec<u8>, max_pixels: usize) -> usize {
    if src.len() < 5 {
        return 0;
    }
    let block_size = read_le16(src, 0) as usize;
    let run_length = read_le16(src, 2) as usize;
    let run_marker = src[4];
    if block_size < 5 || block_size > src.len() {
        return 0;
    }

    let block = &src[..block_size];
    let mut pos = 5usize;
    let mut pixels_decoded = 0usize;

    while pos < block.len() && pixels_decoded < run_length && dest.len() < max_pixels {
        let byte = block[pos];
        pos += 1;

        if byte == run_marker {
            if pos >= block.len() {
                break;
            }
            let count_byte = block[pos];
            pos += 1;

            let count = if count_byte == 0 {
                // extended run, 16-bit count
                if pos + 2 > block.len() {
                    break;
                }
                let count = read_le16(block, pos) as usize;
                pos += 2;
                count
            } else {
                count_byte as usize
            };
            if pos >= block.len() {
                break;
            }
            let value = block[pos];
            pos += 1;

            for _ in 0..count {
                if dest.len() >= max_pixels {
                    break;
                }
                dest.push(value);
                pixels_decoded += 1;
            }
        } else {
            dest.push(byte);
            pixels_decoded += 1;
        }
    }

    block_size
}

fn build_palette(data: &[u8], info: &PicInfo, num_colors: usize) -> Vec<u8> {
    let mut palette = vec![0u8; num_colors * 3];
    let pal_data = &data[HEADER_SIZE..];
    let pal_size = info.palette_size as usize;

    if info.palette_type == PAL_VGA && pal_size >= 768 {
        for i in 0..256.min(num_colors) {
            palette[i * 3] = scale_6bit(pal_data[i * 3]);
            palette[i * 3 + 1] = scale_6bit(pal_data[i * 3 + 1]);
            palette[i * 3 + 2] = scale_6bit(pal_data[i * 3 + 2]);
        }
    } else if info.palette_type == PAL_EGA && pal_size >= 16 {
        // 16 bytes, each a 6-bit index into the 64-color EGA palette.
        for i in 0..16.min(num_colors) {
            write_rgb(&mut palette, i, EGA_PALETTE_64[(pal_data[i] & 0x3F) as usize]);
        }
    } else if info.palette_type == PAL_CGA && pal_size >= 1 {
        let mut idx = pal_data[0] as usize;
        if idx >= 6 {
            idx = 0;
        }
        for i in 0..4.min(num_colors) {
            write_rgb(
                &mut palette,
                i,
                CGA_PALETTE_16[CGA_MODE45_INDEX[idx][i] as usize],
            );
        }
    } else if pal_size >= num_colors * 3 {
        // generic 6-bit RGB palette
        for i in 0..num_colors {
            palette[i * 3] = scale_6bit(pal_data[i * 3]);
            palette[i * 3 + 1] = scale_6bit(pal_data[i * 3 + 1]);
            palette[i * 3 + 2] = scale_6bit(pal_data[i * 3 + 2]);
        }
    } else if num_colors == 2 {
        palette[3..6].fill(0xFF);
    } else if num_colors == 4 {
        for i in 0..4 {
            write_rgb(
                &mut palette,
                i,
                CGA_PALETTE_16[CGA_MODE45_INDEX[0][i] as usize],
            );
        }
    } else if num_colors == 16 {
        for i in 0..16 {
            write_rgb(&mut palette, i, EGA_PALETTE_64[i]);
        }
    } else {
        for i in 0..num_colors {
            let gray = ((i * 255) / (num_colors - 1)) as u8;
            palette[i * 3..i * 3 + 3].fill(gray);
        }
    }

    palette
}

pub struct PictorDecoder;

impl Decoder for PictorDecoder {
    fn name(&self) -> &'static str {
        "pictor"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pic", "clp"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0x34 && data[1] == 0x12
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid PICTOR file".into()));
        }
        let info = parse_header(data)
            .ok_or_else(|| Error::InvalidFormat("Failed to parse PICTOR header".into()))?;

        if info.width == 0 || info.height == 0 {
            return Err(Error::InvalidFormat("Invalid image dimensions".into()));
        }
        validate_dimensions(info.width, info.height, options)?;

        match (info.num_planes, info.bits_per_pixel) {
            (1, 1 | 2 | 4 | 8) | (4, 1) => {}
            (1, bpp) => {
                return Err(Error::InvalidFormat(format!(
                    "Unsupported bits per pixel: {bpp}"
                )))
            }
            (4, bpp) => {
                return Err(Error::InvalidFormat(format!(
                    "Unsupported planar format: {bpp} bpp x 4 planes"
                )))
            }
            (planes, _) => {
                return Err(Error::InvalidFormat(format!(
                    "Unsupported number of planes: {planes}"
                )))
            }
        }

        let total_bpp = info.bits_per_pixel * info.num_planes;
        let pixel_offset = HEADER_SIZE + info.palette_size as usize;
        if pixel_offset + 2 > data.len() {
            return Err(Error::TruncatedData(
                "PICTOR data truncated: incomplete file header".into(),
            ));
        }

        let num_colors = 1usize << total_bpp;
        let palette = build_palette(data, &info, num_colors);

        let block_count = read_le16(data, pixel_offset);
        let mut src = &data[pixel_offset + 2..];

        let width = info.width as usize;
        let height = info.height as usize;
        let row_bytes = (width * info.bits_per_pixel as usize + 7) / 8;
        let plane_size = row_bytes * height;
        let total_size = plane_size * info.num_planes as usize;

        let mut decompressed = Vec::with_capacity(total_size);
        if block_count == 0 {
            let to_copy = src.len().min(total_size);
            decompressed.extend_from_slice(&src[..to_copy]);
        } else {
            for _ in 0..block_count {
                if src.is_empty() {
                    break;
                }
                let consumed = decode_rle_block(src, &mut decompressed, total_size);
                if consumed == 0 {
                    break;
                }
                src = &src[consumed..];
            }
        }
        decompressed.resize(total_size, 0);

        if !surface.set_size(info.width, info.height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        surface.set_palette_size(num_colors);
        surface.write_palette(0, &palette);

        // Scanlines are stored bottom-up.
        let mut row = vec![0u8; width];
        if info.num_planes == 1 {
            for y in 0..height {
                let src_row = &decompressed[y * row_bytes..y * row_bytes + row_bytes];
                let dest_y = (height - 1 - y) as u32;
                for x in 0..width {
                    row[x] = extract_pixel(src_row, x, info.bits_per_pixel);
                }
                surface.write_pixels(0, dest_y, &row);
            }
        } else {
            // EGA planar: each plane stored contiguously, bits OR together
            // into a 4-bit index.
            for y in 0..height {
                row.fill(0);
                let dest_y = (height - 1 - y) as u32;
                for plane in 0..4usize {
                    let start = plane * plane_size + y * row_bytes;
                    let plane_row = &decompressed[start..start + row_bytes];
                    for x in 0..width {
                        let bit = (plane_row[x / 8] >> (7 - (x % 8))) & 1;
                        row[x] |= bit << plane;
                    }
                }
                surface.write_pixels(0, dest_y, &row);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::surface::MemorySurface;

    fn header(
        width: u16,
        height: u16,
        bpp: u8,
        planes: u8,
        palette_type: u16,
        palette_size: u16,
    ) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[0] = 0x34;
        data[1] = 0x12;
        data[2..4].copy_from_slice(&width.to_le_bytes());
        data[4..6].copy_from_slice(&height.to_le_bytes());
        data[10] = ((planes - 1) << 4) | (bpp & 0x0F);
        data[13..15].copy_from_slice(&palette_type.to_le_bytes());
        data[15..17].copy_from_slice(&palette_size.to_le_bytes());
        data
    }

    #[test]
    fn uncompressed_8bit_flips_rows() {
        let mut data = header(2, 2, 8, 1, 0, 0);
        data.extend_from_slice(&0u16.to_le_bytes()); // block count 0
        data.extend_from_slice(&[1, 2, 3, 4]); // bottom row first
        let mut surface = MemorySurface::new();
        PictorDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.row(0), &[3, 4]);
        assert_eq!(surface.row(1), &[1, 2]);
    }

    #[test]
    fn rle_block_runs() {
        let mut data = header(4, 1, 8, 1, 0, 0);
        data.extend_from_slice(&1u16.to_le_bytes()); // one RLE block
        // block: size=9, run_length=4, marker=0xAA, then marker count=3 value=7,
        // then literal 9
        let block = [9u8, 0, 4, 0, 0xAA, 0xAA, 3, 7, 9];
        data.extend_from_slice(&block);
        let mut surface = MemorySurface::new();
        PictorDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.row(0), &[7, 7, 7, 9]);
    }

    #[test]
    fn extended_run_count() {
        let mut dest = Vec::new();
        // marker, count_byte 0, LE16 count 300, value 5
        let mut block = vec![0u8, 0, 44, 1, 0xFE, 0xFE, 0];
        block.extend_from_slice(&300u16.to_le_bytes());
        block.push(5);
        block[0] = block.len() as u8;
        let consumed = decode_rle_block(&block, &mut dest, 400);
        assert_eq!(consumed, block.len());
        assert_eq!(dest.len(), 300);
        assert!(dest.iter().all(|&b| b == 5));
    }

    #[test]
    fn cga_palette_selection() {
        // 2bpp, CGA palette record selecting variant 3 (palette#1, high).
        let mut data = header(4, 1, 2, 1, PAL_CGA, 1);
        data.push(3);
        data.extend_from_slice(&0u16.to_le_bytes());
        data.push(0b00_01_10_11); // pixels 0,1,2,3
        let mut surface = MemorySurface::new();
        PictorDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        // variant 3 maps pixel 1 -> CGA color 11 (0x55FFFF)
        assert_eq!(surface.palette()[3..6], [0x55, 0xFF, 0xFF]);
        assert_eq!(surface.row(0), &[0, 1, 2, 3]);
    }

    #[test]
    fn planar_ega_combines_planes() {
        let mut data = header(8, 1, 1, 4, 0, 0);
        data.extend_from_slice(&0u16.to_le_bytes());
        // 4 planes of 1 byte each: pixel 0 set in planes 0 and 2 -> index 5
        data.extend_from_slice(&[0x80, 0x00, 0x80, 0x00]);
        let mut surface = MemorySurface::new();
        PictorDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[5]);
        assert_eq!(surface.pixel(1, 0), &[0]);
        // default 16-color palette comes from the EGA table
        assert_eq!(surface.palette()[..3], [0, 0, 0]);
        assert_eq!(surface.palette()[3..6], [0x00, 0x00, 0xAA]);
    }

    #[test]
    fn unsupported_plane_count() {
        let mut data = header(4, 1, 1, 3, 0, 0);
        data.extend_from_slice(&0u16.to_le_bytes());
        let mut surface = MemorySurface::new();
        let err = PictorDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }
}

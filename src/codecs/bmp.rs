//! Windows/OS2 BMP decoder.
//!
//! Handles the core (12-byte), OS/2 v2 (64-byte) and Windows (40+ byte) info
//! headers, BI_RGB, BI_RLE8, BI_RLE4 and BI_BITFIELDS compression, and bit
//! depths 1/4/8/16/24/32. Indexed output keeps the palette; everything else
//! decodes to RGBA.

use crate::bytes::{extract_pixel, read_le16, read_le32, read_le32_signed, row_stride_4byte};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const BI_RGB: u32 = 0;
const BI_RLE8: u32 = 1;
const BI_RLE4: u32 = 2;
const BI_BITFIELDS: u32 = 3;

const FILE_HEADER_SIZE: usize = 14;

#[derive(Default)]
struct BmpInfo {
    width: i32,
    height: i32,
    bits_per_pixel: u32,
    compression: u32,
    colors_used: u32,
    data_offset: u32,
    header_size: u32,
    palette_entry_size: usize,
    top_down: bool,

    red_mask: u32,
    green_mask: u32,
    blue_mask: u32,
    alpha_mask: u32,
    red_shift: u32,
    green_shift: u32,
    blue_shift: u32,
    red_scale: u32,
    green_scale: u32,
    blue_scale: u32,
}

fn parse_header(data: &[u8]) -> Option<BmpInfo> {
    if data.len() < FILE_HEADER_SIZE + 12 {
        return None;
    }

    let mut info = BmpInfo {
        palette_entry_size: 4,
        ..BmpInfo::default()
    };
    info.data_offset = read_le32(data, 10);

    let header_size = read_le32(data, FILE_HEADER_SIZE);
    info.header_size = header_size;

    let h = FILE_HEADER_SIZE;
    if header_size == 12 {
        // OS/2 1.x BITMAPCOREHEADER: 16-bit dimensions, 3-byte palette entries.
        let height = read_le16(data, h + 6) as i16 as i32;
        info.width = read_le16(data, h + 4) as i16 as i32;
        info.height = height.abs();
        info.top_down = height < 0;
        info.bits_per_pixel = read_le16(data, h + 10) as u32;
        info.compression = BI_RGB;
        info.palette_entry_size = 3;

        // No colors_used field; infer the count from the gap before the
        // pixel data.
        if info.bits_per_pixel <= 8 {
            let palette_start = (FILE_HEADER_SIZE + 12) as u32;
            let palette_bytes = info.data_offset.saturating_sub(palette_start);
            info.colors_used = palette_bytes / 3;
            let max_colors = 1u32 << info.bits_per_pixel;
            if info.colors_used > max_colors {
                info.colors_used = max_colors;
            }
        }
    } else if header_size == 64 {
        // OS/2 2.x, always bottom-up.
        if data.len() < h + 64 {
            return None;
        }
        info.width = read_le32_signed(data, h + 4);
        info.height = read_le32_signed(data, h + 8);
        info.top_down = false;
        info.bits_per_pixel = read_le16(data, h + 14) as u32;
        info.compression = read_le32(data, h + 16);
        info.colors_used = read_le32(data, h + 32);

        if info.colors_used == 0 && info.bits_per_pixel <= 8 {
            info.colors_used = 1u32 << info.bits_per_pixel;
        }

        // OS/2 2.x palettes can be 3 or 4 bytes per entry; infer from the
        // space reserved before the pixel data.
        if info.bits_per_pixel <= 8 && info.colors_used > 0 {
            let palette_start = (FILE_HEADER_SIZE + 64) as u32;
            let palette_bytes = info.data_offset.saturating_sub(palette_start);
            let bytes_per_color = palette_bytes / info.colors_used;
            info.palette_entry_size = if bytes_per_color >= 4 { 4 } else { 3 };
        }
    } else if header_size >= 40 {
        // Windows BITMAPINFOHEADER or later.
        if data.len() < h + 40 {
            return None;
        }
        let height = read_le32_signed(data, h + 8);
        info.width = read_le32_signed(data, h + 4);
        info.height = height.abs();
        info.top_down = height < 0;
        info.bits_per_pixel = read_le16(data, h + 14) as u32;
        info.compression = read_le32(data, h + 16);
        info.colors_used = read_le32(data, h + 32);

        // v2 (52) adds RGB masks, v3 (56) the alpha mask, v4/v5 (108+) keep
        // them at the same offsets.
        if header_size >= 52 && data.len() >= h + 52 {
            info.red_mask = read_le32(data, h + 40);
            info.green_mask = read_le32(data, h + 44);
            info.blue_mask = read_le32(data, h + 48);
        }
        if header_size >= 56 && data.len() >= h + 56 {
            info.alpha_mask = read_le32(data, h + 52);
        }

        if info.colors_used == 0 && info.bits_per_pixel <= 8 {
            info.colors_used = 1u32 << info.bits_per_pixel;
        }
    } else {
        return None;
    }

    if info.compression == BI_BITFIELDS {
        // Masks may follow a bare 40-byte header instead of living in it.
        if info.red_mask == 0 && info.green_mask == 0 && info.blue_mask == 0 {
            let mask_offset = h + header_size as usize;
            if data.len() >= mask_offset + 12 {
                info.red_mask = read_le32(data, mask_offset);
                info.green_mask = read_le32(data, mask_offset + 4);
                info.blue_mask = read_le32(data, mask_offset + 8);
            }
        }

        info.red_shift = info.red_mask.trailing_zeros().min(31);
        info.green_shift = info.green_mask.trailing_zeros().min(31);
        info.blue_shift = info.blue_mask.trailing_zeros().min(31);
        info.red_scale = 8u32.saturating_sub(info.red_mask.count_ones());
        info.green_scale = 8u32.saturating_sub(info.green_mask.count_ones());
        info.blue_scale = 8u32.saturating_sub(info.blue_mask.count_ones());
    } else if info.bits_per_pixel == 16 {
        // Default 16-bit layout is 5-5-5.
        info.red_mask = 0x7C00;
        info.green_mask = 0x03E0;
        info.blue_mask = 0x001F;
        info.red_shift = 10;
        info.green_shift = 5;
        info.blue_shift = 0;
        info.red_scale = 3;
        info.green_scale = 3;
        info.blue_scale = 3;
    }

    Some(info)
}

fn decode_rle8(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut indices = vec![0u8; width * height];
    let mut pos = 0;
    let mut x = 0usize;
    let mut y = 0usize;

    while pos + 1 < src.len() && y < height {
        let count = src[pos];
        let value = src[pos + 1];
        pos += 2;

        if count == 0 {
            match value {
                0 => {
                    // end of line
                    x = 0;
                    y += 1;
                }
                1 => break, // end of bitmap
                2 => {
                    if pos + 1 < src.len() {
                        x += src[pos] as usize;
                        y += src[pos + 1] as usize;
                        pos += 2;
                    }
                }
                _ => {
                    // absolute mode, word aligned
                    for _ in 0..value {
                        if pos >= src.len() || y >= height {
                            break;
                        }
                        if x < width {
                            indices[y * width + x] = src[pos];
                            x += 1;
                        }
                        pos += 1;
                    }
                    if value & 1 != 0 {
                        pos += 1;
                    }
                }
            }
        } else {
            for _ in 0..count {
                if y >= height {
                    break;
                }
                if x < width {
                    indices[y * width + x] = value;
                    x += 1;
                }
            }
        }
    }
    indices
}

fn decode_rle4(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut indices = vec![0u8; width * height];
    let mut pos = 0;
    let mut x = 0usize;
    let mut y = 0usize;

    while pos + 1 < src.len() && y < height {
        let count = src[pos];
        let value = src[pos + 1];
        pos += 2;

        if count == 0 {
            match value {
                0 => {
                    x = 0;
                    y += 1;
                }
                1 => break,
                2 => {
                    if pos + 1 < src.len() {
                        x += src[pos] as usize;
                        y += src[pos + 1] as usize;
                        pos += 2;
                    }
                }
                _ => {
                    // absolute mode: packed nibbles, word aligned
                    for i in 0..value as usize {
                        if y >= height {
                            break;
                        }
                        if i % 2 == 0 && pos >= src.len() {
                            break;
                        }
                        let nibble = if i % 2 == 0 {
                            (src[pos] >> 4) & 0x0F
                        } else {
                            let n = src[pos] & 0x0F;
                            pos += 1;
                            n
                        };
                        if x < width {
                            indices[y * width + x] = nibble;
                            x += 1;
                        }
                    }
                    if value % 2 == 1 {
                        pos += 1;
                    }
                    let bytes_read = (value as usize + 1) / 2;
                    if bytes_read & 1 != 0 {
                        pos += 1;
                    }
                }
            }
        } else {
            let hi = (value >> 4) & 0x0F;
            let lo = value & 0x0F;
            for i in 0..count as usize {
                if y >= height {
                    break;
                }
                if x < width {
                    indices[y * width + x] = if i % 2 == 0 { hi } else { lo };
                    x += 1;
                }
            }
        }
    }
    indices
}

pub struct BmpDecoder;

impl Decoder for BmpDecoder {
    fn name(&self) -> &'static str {
        "bmp"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["bmp", "dib"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == b'B' && data[1] == b'M'
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid BMP file".into()));
        }

        let info = parse_header(data)
            .ok_or_else(|| Error::InvalidFormat("Failed to parse BMP header".into()))?;

        if info.width <= 0 || info.height <= 0 {
            return Err(Error::InvalidFormat("Invalid image dimensions".into()));
        }
        let width = info.width as u32;
        let height = info.height as u32;
        validate_dimensions(width, height, options)?;

        if !matches!(info.bits_per_pixel, 1 | 4 | 8 | 16 | 24 | 32) {
            return Err(Error::UnsupportedBitDepth(format!(
                "Unsupported BMP bit depth: {}",
                info.bits_per_pixel
            )));
        }
        if info.compression > BI_BITFIELDS {
            return Err(Error::UnsupportedEncoding(format!(
                "Unsupported BMP compression: {}",
                info.compression
            )));
        }

        if info.data_offset as usize >= data.len() {
            return Err(Error::TruncatedData("Invalid data offset".into()));
        }
        let pixel_data = &data[info.data_offset as usize..];

        // Palette sits between the info header and the pixel data, BGR(A).
        let mut palette = Vec::new();
        if info.bits_per_pixel <= 8 && info.colors_used > 0 {
            let palette_offset = FILE_HEADER_SIZE + info.header_size as usize;
            let palette_size = info.colors_used as usize * info.palette_entry_size;
            if palette_offset + palette_size <= info.data_offset as usize
                && palette_offset + palette_size <= data.len()
            {
                palette.resize(info.colors_used as usize * 3, 0);
                for i in 0..info.colors_used as usize {
                    let entry = palette_offset + i * info.palette_entry_size;
                    palette[i * 3] = data[entry + 2];
                    palette[i * 3 + 1] = data[entry + 1];
                    palette[i * 3 + 2] = data[entry];
                }
            }
        }

        let out_format = if info.bits_per_pixel <= 8 && !palette.is_empty() {
            PixelFormat::Indexed8
        } else {
            PixelFormat::Rgba8888
        };

        if !surface.set_size(width, height, out_format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        if out_format == PixelFormat::Indexed8 {
            surface.set_palette_size(info.colors_used as usize);
            surface.write_palette(0, &palette);
        }

        let w = width as usize;
        let h = height as usize;

        if info.compression == BI_RLE8 || info.compression == BI_RLE4 {
            let indices = if info.compression == BI_RLE8 {
                decode_rle8(pixel_data, w, h)
            } else {
                decode_rle4(pixel_data, w, h)
            };
            // RLE is always stored bottom-up.
            for y in 0..h {
                let src_y = h - 1 - y;
                surface.write_pixels(0, y as u32, &indices[src_y * w..src_y * w + w]);
            }
            return Ok(());
        }

        let src_row_size = row_stride_4byte(width, info.bits_per_pixel);
        let mut row = vec![0u8; w * 4];

        for y in 0..h {
            let src_y = if info.top_down { y } else { h - 1 - y };
            let start = src_y * src_row_size;
            if start + src_row_size > pixel_data.len() {
                return Err(Error::TruncatedData("Unexpected end of data".into()));
            }
            let src_row = &pixel_data[start..start + src_row_size];

            match info.bits_per_pixel {
                1 | 4 | 8 => {
                    for x in 0..w {
                        row[x] = extract_pixel(src_row, x, info.bits_per_pixel);
                    }
                    surface.write_pixels(0, y as u32, &row[..w]);
                }
                16 => {
                    for x in 0..w {
                        let pixel = read_le16(src_row, x * 2) as u32;
                        let r = ((pixel & info.red_mask) >> info.red_shift) << info.red_scale;
                        let g = ((pixel & info.green_mask) >> info.green_shift) << info.green_scale;
                        let b = ((pixel & info.blue_mask) >> info.blue_shift) << info.blue_scale;
                        row[x * 4..x * 4 + 4].copy_from_slice(&[r as u8, g as u8, b as u8, 0xFF]);
                    }
                    surface.write_pixels(0, y as u32, &row[..w * 4]);
                }
                24 => {
                    for x in 0..w {
                        row[x * 4] = src_row[x * 3 + 2];
                        row[x * 4 + 1] = src_row[x * 3 + 1];
                        row[x * 4 + 2] = src_row[x * 3];
                        row[x * 4 + 3] = 0xFF;
                    }
                    surface.write_pixels(0, y as u32, &row[..w * 4]);
                }
                _ => {
                    for x in 0..w {
                        row[x * 4] = src_row[x * 4 + 2];
                        row[x * 4 + 1] = src_row[x * 4 + 1];
                        row[x * 4 + 2] = src_row[x * 4];
                        row[x * 4 + 3] = if info.alpha_mask != 0 {
                            src_row[x * 4 + 3]
                        } else {
                            0xFF
                        };
                    }
                    surface.write_pixels(0, y as u32, &row[..w * 4]);
                }
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

    fn file_header(data_offset: u32) -> Vec<u8> {
        let mut data = vec![b'B', b'M'];
        data.extend_from_slice(&0u32.to_le_bytes()); // file size, unused
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved
        data.extend_from_slice(&data_offset.to_le_bytes());
        data
    }

    fn info_header(width: i32, height: i32, bpp: u16, compression: u32, colors: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // planes
        data.extend_from_slice(&bpp.to_le_bytes());
        data.extend_from_slice(&compression.to_le_bytes());
        data.extend_from_slice(&[0u8; 12]); // image size, resolution
        data.extend_from_slice(&colors.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // important colors
        data
    }

    #[test]
    fn indexed_8bit_bottom_up() {
        // 2x2, palette of 2 BGRA entries, bottom-up rows.
        let mut data = file_header(14 + 40 + 8);
        data.extend_from_slice(&info_header(2, 2, 8, BI_RGB, 2));
        data.extend_from_slice(&[255, 0, 0, 0]); // index 0: blue in BGR
        data.extend_from_slice(&[0, 0, 255, 0]); // index 1: red
        data.extend_from_slice(&[0, 1, 0, 0]); // bottom row
        data.extend_from_slice(&[1, 0, 0, 0]); // top row
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Indexed8);
        assert_eq!(surface.palette()[..6], [0, 0, 255, 255, 0, 0]);
        assert_eq!(surface.pixel(0, 0), &[1]);
        assert_eq!(surface.pixel(0, 1), &[0]);
        assert_eq!(surface.pixel(1, 1), &[1]);
    }

    #[test]
    fn rgb24_bgr_order() {
        let mut data = file_header(14 + 40);
        data.extend_from_slice(&info_header(1, 1, 24, BI_RGB, 0));
        data.extend_from_slice(&[10, 20, 30, 0]); // BGR + stride pad
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[30, 20, 10, 0xFF]);
    }

    #[test]
    fn top_down_height() {
        let mut data = file_header(14 + 40);
        data.extend_from_slice(&info_header(1, -2, 24, BI_RGB, 0));
        data.extend_from_slice(&[0, 0, 1, 0]); // first row: red=1
        data.extend_from_slice(&[0, 0, 2, 0]); // second row: red=2
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[1, 0, 0, 0xFF]);
        assert_eq!(surface.pixel(0, 1), &[2, 0, 0, 0xFF]);
    }

    #[test]
    fn default_16bit_is_555() {
        let mut data = file_header(14 + 40);
        data.extend_from_slice(&info_header(1, 1, 16, BI_RGB, 0));
        // 0x7C00 = red mask fully set
        data.extend_from_slice(&0x7C00u16.to_le_bytes());
        data.extend_from_slice(&[0, 0]); // stride pad
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[0xF8, 0, 0, 0xFF]);
    }

    #[test]
    fn bitfields_565() {
        let mut data = file_header(14 + 40 + 12);
        data.extend_from_slice(&info_header(1, 1, 16, BI_BITFIELDS, 0));
        data.extend_from_slice(&0xF800u32.to_le_bytes());
        data.extend_from_slice(&0x07E0u32.to_le_bytes());
        data.extend_from_slice(&0x001Fu32.to_le_bytes());
        data.extend_from_slice(&0x07E0u16.to_le_bytes()); // green fully set
        data.extend_from_slice(&[0, 0]);
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[0, 0xFC, 0, 0xFF]);
    }

    #[test]
    fn rle8_runs_and_escapes() {
        // 4x2 indexed: row 0 (stored last, bottom-up) run of 4x value 1,
        // row 1 run of 2x value 2 then end of line.
        let mut data = file_header(14 + 40 + 8);
        data.extend_from_slice(&info_header(4, 2, 8, BI_RLE8, 2));
        data.extend_from_slice(&[0, 0, 0, 0, 255, 255, 255, 0]);
        data.extend_from_slice(&[2, 2, 0, 0]); // bottom row: 2 2 then EOL
        data.extend_from_slice(&[4, 1, 0, 1]); // top row: 1 1 1 1 then EOB
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.row(0), &[1, 1, 1, 1]);
        assert_eq!(surface.row(1), &[2, 2, 0, 0]);
    }

    #[test]
    fn os2_core_header() {
        // 12-byte header, 3-byte palette entries.
        let mut data = file_header(14 + 12 + 6);
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&1i16.to_le_bytes());
        data.extend_from_slice(&1i16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // planes
        data.extend_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]); // BGR entry 0
        data.extend_from_slice(&[4, 5, 6]); // BGR entry 1
        data.extend_from_slice(&[1, 0, 0, 0]);
        let mut surface = MemorySurface::new();
        BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Indexed8);
        assert_eq!(surface.palette()[3..6], [6, 5, 4]);
        assert_eq!(surface.pixel(0, 0), &[1]);
    }

    #[test]
    fn bad_data_offset_is_truncated() {
        let mut data = file_header(9999);
        data.extend_from_slice(&info_header(1, 1, 24, BI_RGB, 0));
        let mut surface = MemorySurface::new();
        let err = BmpDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }
}

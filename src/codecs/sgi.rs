//! SGI image (.sgi/.rgb) decoder: verbatim and RLE storage, 8- and 16-bit
//! samples, 1-4 channels, stored bottom-up.

use crate::bytes::{read_be16, read_be32};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const SGI_HEADER_SIZE: usize = 512;
const STORAGE_RLE: u8 = 1;

struct SgiInfo {
    width: u32,
    height: u32,
    channels: usize,
    bpc: u8,
    storage: u8,
    colormap: u32,
}

fn parse_header(data: &[u8]) -> Option<SgiInfo> {
    if data.len() < SGI_HEADER_SIZE {
        return None;
    }
    if read_be16(data, 0) != 474 {
        return None;
    }
    Some(SgiInfo {
        storage: data[2],
        bpc: data[3],
        width: read_be16(data, 6) as u32,
        height: read_be16(data, 8) as u32,
        channels: read_be16(data, 10) as usize,
        colormap: read_be32(data, 104),
    })
}

fn decode_rle_scanline_8(src: &[u8], dest: &mut [u8]) -> bool {
    let mut src_pos = 0;
    let mut dest_pos = 0;
    while src_pos < src.len() && dest_pos < dest.len() {
        let ctrl = src[src_pos];
        src_pos += 1;
        let count = (ctrl & 0x7F) as usize;
        if count == 0 {
            break;
        }
        if ctrl & 0x80 != 0 {
            if src_pos + count > src.len() || dest_pos + count > dest.len() {
                return false;
            }
            dest[dest_pos..dest_pos + count].copy_from_slice(&src[src_pos..src_pos + count]);
            src_pos += count;
        } else {
            if src_pos >= src.len() || dest_pos + count > dest.len() {
                return false;
            }
            dest[dest_pos..dest_pos + count].fill(src[src_pos]);
            src_pos += 1;
        }
        dest_pos += count;
    }
    dest[dest_pos..].fill(0);
    true
}

fn decode_rle_scanline_16(src: &[u8], dest: &mut [u16]) -> bool {
    let mut src_pos = 0;
    let mut dest_pos = 0;
    while src_pos + 1 < src.len() && dest_pos < dest.len() {
        let ctrl = read_be16(src, src_pos);
        src_pos += 2;
        let count = (ctrl & 0x7F) as usize;
        if count == 0 {
            break;
        }
        if ctrl & 0x80 != 0 {
            if src_pos + count * 2 > src.len() || dest_pos + count > dest.len() {
                return false;
            }
            for _ in 0..count {
                dest[dest_pos] = read_be16(src, src_pos);
                src_pos += 2;
                dest_pos += 1;
            }
        } else {
            if src_pos + 1 >= src.len() || dest_pos + count > dest.len() {
                return false;
            }
            let value = read_be16(src, src_pos);
            src_pos += 2;
            dest[dest_pos..dest_pos + count].fill(value);
            dest_pos += count;
        }
    }
    dest[dest_pos..].fill(0);
    true
}

/// Scatter one decoded channel into the interleaved row buffer.
fn store_channel(row: &mut [u8], samples: &[u8], channels: usize, c: usize, out_bpp: usize) {
    match channels {
        1 => {
            for (x, &v) in samples.iter().enumerate() {
                row[x * 3] = v;
                row[x * 3 + 1] = v;
                row[x * 3 + 2] = v;
            }
        }
        2 => {
            if c == 0 {
                for (x, &v) in samples.iter().enumerate() {
                    row[x * 4] = v;
                    row[x * 4 + 1] = v;
                    row[x * 4 + 2] = v;
                }
            } else {
                for (x, &v) in samples.iter().enumerate() {
                    row[x * 4 + 3] = v;
                }
            }
        }
        _ => {
            for (x, &v) in samples.iter().enumerate() {
                row[x * out_bpp + c] = v;
            }
        }
    }
}

pub struct SgiDecoder;

impl Decoder for SgiDecoder {
    fn name(&self) -> &'static str {
        "sgi"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["sgi", "rgb", "rgba", "bw"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0x01 && data[1] == 0xDA
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid SGI file".into()));
        }
        let info = parse_header(data)
            .ok_or_else(|| Error::InvalidFormat("Failed to parse SGI header".into()))?;

        if info.width == 0 || info.height == 0 {
            return Err(Error::InvalidFormat("Invalid image dimensions".into()));
        }
        if info.bpc != 1 && info.bpc != 2 {
            return Err(Error::UnsupportedBitDepth(format!(
                "Unsupported bytes per channel: {}",
                info.bpc
            )));
        }
        if info.channels < 1 || info.channels > 4 {
            return Err(Error::InvalidFormat(format!(
                "Unsupported number of channels: {}",
                info.channels
            )));
        }
        if info.colormap != 0 {
            return Err(Error::UnsupportedEncoding(format!(
                "Unsupported colormap type: {}",
                info.colormap
            )));
        }

        validate_dimensions(info.width, info.height, options)?;

        let out_format = match info.channels {
            1 | 3 => PixelFormat::Rgb888,
            _ => PixelFormat::Rgba8888,
        };
        if !surface.set_size(info.width, info.height, out_format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let width = info.width as usize;
        let height = info.height as usize;
        let out_bpp = out_format.bytes_per_pixel();

        let mut scanline = vec![0u8; width];
        let mut scanline16 = vec![0u16; width];
        let mut samples = vec![0u8; width];
        let mut row = vec![0u8; width * out_bpp];

        if info.storage == STORAGE_RLE {
            let table_entries = height * info.channels;
            let tables_size = table_entries * 4 * 2;
            if data.len() < SGI_HEADER_SIZE + tables_size {
                return Err(Error::TruncatedData(
                    "SGI data truncated: incomplete RLE offset tables".into(),
                ));
            }
            let start_table = SGI_HEADER_SIZE;
            let len_table = start_table + table_entries * 4;

            for y in 0..height {
                // Stored bottom-up; flip while writing.
                let dest_y = (height - 1 - y) as u32;
                if out_format == PixelFormat::Rgba8888 {
                    for x in 0..width {
                        row[x * 4 + 3] = 255;
                    }
                }

                for c in 0..info.channels {
                    let table_idx = y + c * height;
                    let offset = read_be32(data, start_table + table_idx * 4) as usize;
                    let length = read_be32(data, len_table + table_idx * 4) as usize;
                    if offset.checked_add(length).map_or(true, |end| end > data.len()) {
                        return Err(Error::TruncatedData(
                            "SGI data truncated: RLE data exceeds file size".into(),
                        ));
                    }
                    let rle = &data[offset..offset + length];

                    if info.bpc == 1 {
                        if !decode_rle_scanline_8(rle, &mut scanline) {
                            return Err(Error::InvalidFormat(
                                "SGI RLE decode failed: invalid compressed data".into(),
                            ));
                        }
                        samples.copy_from_slice(&scanline);
                    } else {
                        if !decode_rle_scanline_16(rle, &mut scanline16) {
                            return Err(Error::InvalidFormat(
                                "SGI RLE decode failed: invalid 16-bit compressed data".into(),
                            ));
                        }
                        for (s, &v) in samples.iter_mut().zip(scanline16.iter()) {
                            *s = (v >> 8) as u8;
                        }
                    }
                    store_channel(&mut row, &samples, info.channels, c, out_bpp);
                }
                surface.write_pixels(0, dest_y, &row);
            }
        } else {
            let scanline_size = width * info.bpc as usize;
            let channel_size = scanline_size * height;
            let expected = SGI_HEADER_SIZE + channel_size * info.channels;
            if data.len() < expected {
                return Err(Error::TruncatedData(
                    "SGI data truncated: incomplete image data".into(),
                ));
            }

            for y in 0..height {
                let dest_y = (height - 1 - y) as u32;
                if out_format == PixelFormat::Rgba8888 {
                    for x in 0..width {
                        row[x * 4 + 3] = 255;
                    }
                }
                for c in 0..info.channels {
                    let start = SGI_HEADER_SIZE + c * channel_size + y * scanline_size;
                    let src_row = &data[start..start + scanline_size];
                    if info.bpc == 1 {
                        samples.copy_from_slice(src_row);
                    } else {
                        // Keep the high (big-endian) byte.
                        for (s, chunk) in samples.iter_mut().zip(src_row.chunks_exact(2)) {
                            *s = chunk[0];
                        }
                    }
                    store_channel(&mut row, &samples, info.channels, c, out_bpp);
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
    use crate::surface::MemorySurface;

    fn header(width: u16, height: u16, channels: u16, bpc: u8, storage: u8) -> Vec<u8> {
        let mut data = vec![0u8; SGI_HEADER_SIZE];
        data[0] = 0x01;
        data[1] = 0xDA;
        data[2] = storage;
        data[3] = bpc;
        data[4..6].copy_from_slice(&2u16.to_be_bytes());
        data[6..8].copy_from_slice(&width.to_be_bytes());
        data[8..10].copy_from_slice(&height.to_be_bytes());
        data[10..12].copy_from_slice(&channels.to_be_bytes());
        data
    }

    #[test]
    fn verbatim_rgb_flips_rows() {
        let mut data = header(2, 2, 3, 1, 0);
        // Channel-planar: R plane rows bottom-up in file order.
        data.extend_from_slice(&[1, 2, 3, 4]); // R
        data.extend_from_slice(&[5, 6, 7, 8]); // G
        data.extend_from_slice(&[9, 10, 11, 12]); // B
        let mut surface = MemorySurface::new();
        SgiDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        // File row 0 is the bottom row of the image.
        assert_eq!(surface.pixel(0, 1), &[1, 5, 9]);
        assert_eq!(surface.pixel(1, 1), &[2, 6, 10]);
        assert_eq!(surface.pixel(0, 0), &[3, 7, 11]);
    }

    #[test]
    fn grayscale_expands_to_rgb() {
        let mut data = header(2, 1, 1, 1, 0);
        data.extend_from_slice(&[0x40, 0x80]);
        let mut surface = MemorySurface::new();
        SgiDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Rgb888);
        assert_eq!(surface.pixel(0, 0), &[0x40, 0x40, 0x40]);
    }

    #[test]
    fn rle_scanline_repeat_and_literal() {
        let mut dest = vec![0u8; 6];
        // repeat 3x 0xAA, literal 2 bytes, end
        assert!(decode_rle_scanline_8(&[0x03, 0xAA, 0x82, 1, 2, 0x00], &mut dest));
        assert_eq!(dest, vec![0xAA, 0xAA, 0xAA, 1, 2, 0]);
        // overrun fails
        let mut dest = vec![0u8; 2];
        assert!(!decode_rle_scanline_8(&[0x03, 0xAA], &mut dest));
    }

    #[test]
    fn sixteen_bit_samples_take_high_byte() {
        let mut data = header(1, 1, 1, 2, 0);
        data.extend_from_slice(&[0xAB, 0xCD]);
        let mut surface = MemorySurface::new();
        SgiDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0), &[0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn colormap_images_unsupported() {
        let mut data = header(1, 1, 1, 1, 0);
        data[104..108].copy_from_slice(&1u32.to_be_bytes());
        data.push(0);
        let mut surface = MemorySurface::new();
        let err = SgiDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedEncoding);
    }
}

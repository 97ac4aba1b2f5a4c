//! Windows ICO/CUR decoder.
//!
//! Every usable directory entry is decoded (classic DIB with XOR/AND masks
//! or an embedded PNG) and the results are stacked vertically into one RGBA
//! atlas, one `Sprite` sub-rect per icon tagged with its entry index. The
//! dimension fallback for icon content is 256 rather than the general limit.

use log::warn;

use crate::bytes::{extract_pixel, read_le16, read_le32, read_le32_signed, row_stride_4byte};
use crate::codecs::png::PngDecoder;
use crate::error::{Error, Result};
use crate::options::DecodeOptions;
use crate::registry::Decoder;
use crate::surface::{MemorySurface, PixelFormat, SubRect, SubRectKind, Surface};

const BI_RGB: u32 = 0;
const DIR_ENTRY_SIZE: usize = 16;

pub(crate) struct DecodedIcon {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>, // RGBA
}

struct IcoHeader {
    count: u16,
}

fn parse_ico_header(data: &[u8]) -> Option<IcoHeader> {
    if data.len() < 6 {
        return None;
    }
    let reserved = read_le16(data, 0);
    let kind = read_le16(data, 2);
    if reserved != 0 || !(kind == 1 || kind == 2) {
        return None;
    }
    Some(IcoHeader {
        count: read_le16(data, 4),
    })
}

struct DibHeader {
    size: u32,
    width: i32,
    height: i32,
    bit_count: u16,
    compression: u32,
    clr_used: u32,
}

fn parse_dib_header(data: &[u8]) -> Option<DibHeader> {
    if data.len() < 40 {
        return None;
    }
    let size = read_le32(data, 0);
    if size < 40 {
        return None;
    }
    Some(DibHeader {
        size,
        width: read_le32_signed(data, 4),
        height: read_le32_signed(data, 8),
        bit_count: read_le16(data, 14),
        compression: read_le32(data, 16),
        clr_used: read_le32(data, 32),
    })
}

// AND mask: 1 bit per pixel, set means transparent.
fn and_mask_bit(and_mask: &[u8], width: u32, x: usize, y: usize) -> bool {
    let and_stride = row_stride_4byte(width, 1);
    (and_mask[y * and_stride + x / 8] >> (7 - (x % 8))) & 1 != 0
}

/// Decodes a single icon payload, either a classic DIB or an embedded PNG,
/// into RGBA pixels. Returns `None` for anything unusable so callers can
/// skip the entry.
pub(crate) fn decode_icon_image(data: &[u8], max_w: u32, max_h: u32) -> Option<DecodedIcon> {
    if data.len() < 8 {
        return None;
    }

    // PNG-compressed icon (Vista style).
    if data[0] == 0x89 && &data[1..4] == b"PNG" {
        let opts = DecodeOptions::with_limits(max_w, max_h);
        let mut temp = MemorySurface::new();
        PngDecoder.decode(data, &mut temp, &opts).ok()?;
        if temp.format() != PixelFormat::Rgba8888 {
            return None;
        }
        return Some(DecodedIcon {
            width: temp.width(),
            height: temp.height(),
            pixels: temp.pixels().to_vec(),
        });
    }

    let header = parse_dib_header(data)?;
    if header.compression != BI_RGB {
        return None;
    }
    if !matches!(header.bit_count, 1 | 4 | 8 | 16 | 24 | 32) {
        return None;
    }

    // Icon height is doubled: XOR image plus AND mask.
    let abs_height = header.height.unsigned_abs();
    if abs_height < 2 || abs_height % 2 != 0 {
        return None;
    }
    if header.width <= 0 {
        return None;
    }
    let width = header.width as u32;
    let height = abs_height / 2;
    if width > 256 || height > 256 {
        return None;
    }

    let xor_stride = row_stride_4byte(width, header.bit_count as u32);
    let and_stride = row_stride_4byte(width, 1);
    let xor_size = xor_stride * height as usize;
    let mut and_size = and_stride * height as usize;

    let max_palette_colors = if header.bit_count <= 8 {
        1u32 << header.bit_count
    } else {
        0
    };
    let mut palette_colors = header.clr_used;
    if palette_colors == 0 {
        palette_colors = max_palette_colors;
    } else if max_palette_colors > 0 && palette_colors > max_palette_colors {
        palette_colors = max_palette_colors;
    }

    if header.size as usize > data.len() {
        return None;
    }
    let header_and_palette = header.size as usize + palette_colors as usize * 4;

    let fits = |needed: Option<usize>| needed.map_or(false, |n| n <= data.len());
    if !fits(header_and_palette.checked_add(xor_size + and_size)) {
        // Retry without the AND mask.
        if !fits(header_and_palette.checked_add(xor_size)) {
            return None;
        }
        and_size = 0;
    }

    let palette = &data[header.size as usize..header_and_palette];
    let xor_data = &data[header_and_palette..];
    let and_data = (and_size > 0).then(|| &xor_data[xor_size..]);

    let w = width as usize;
    let h = height as usize;
    let mut pixels = vec![0u8; w * h * 4];

    for y in 0..h {
        let src_y = h - 1 - y; // DIB rows are bottom-up
        let src_row = &xor_data[src_y * xor_stride..src_y * xor_stride + xor_stride];

        for x in 0..w {
            let dst = (y * w + x) * 4;
            let (mut r, mut g, mut b, mut a) = (0u8, 0u8, 0u8, 0xFFu8);

            if header.bit_count <= 8 {
                let idx = extract_pixel(src_row, x, header.bit_count as u32) as u32;
                if idx < palette_colors {
                    let pal = idx as usize * 4;
                    b = palette[pal];
                    g = palette[pal + 1];
                    r = palette[pal + 2];
                }
            } else if header.bit_count == 16 {
                let pixel = read_le16(src_row, x * 2);
                r = (((pixel >> 10) & 0x1F) << 3) as u8;
                g = (((pixel >> 5) & 0x1F) << 3) as u8;
                b = ((pixel & 0x1F) << 3) as u8;
            } else if header.bit_count == 24 {
                b = src_row[x * 3];
                g = src_row[x * 3 + 1];
                r = src_row[x * 3 + 2];
            } else {
                b = src_row[x * 4];
                g = src_row[x * 4 + 1];
                r = src_row[x * 4 + 2];
                a = src_row[x * 4 + 3];
            }

            if header.bit_count < 32 {
                if let Some(mask) = and_data {
                    if and_mask_bit(mask, width, x, src_y) {
                        a = 0;
                    }
                }
            }

            pixels[dst..dst + 4].copy_from_slice(&[r, g, b, a]);
        }
    }

    Some(DecodedIcon {
        width,
        height,
        pixels,
    })
}

/// Stacks decoded icons vertically into an RGBA atlas with one sub-rect per
/// icon. Height is checked incrementally before the surface is allocated.
pub(crate) fn create_icon_atlas(
    icons: &[DecodedIcon],
    surface: &mut dyn Surface,
    max_w: u32,
    max_h: u32,
) -> Result<()> {
    if icons.is_empty() {
        return Err(Error::InvalidFormat("No valid icons".into()));
    }

    let mut atlas_width: u32 = 0;
    let mut atlas_height: u64 = 0;
    for icon in icons {
        atlas_width = atlas_width.max(icon.width);
        atlas_height += icon.height as u64;
        if atlas_height > max_h as u64 {
            return Err(Error::DimensionsExceeded {
                width: atlas_width,
                height: atlas_height as u32,
                max_width: max_w,
                max_height: max_h,
            });
        }
    }
    if atlas_width > max_w {
        return Err(Error::DimensionsExceeded {
            width: atlas_width,
            height: atlas_height as u32,
            max_width: max_w,
            max_height: max_h,
        });
    }

    if !surface.set_size(atlas_width, atlas_height as u32, PixelFormat::Rgba8888) {
        return Err(Error::Internal("Failed to allocate surface".into()));
    }

    let mut y_offset: u32 = 0;
    for (i, icon) in icons.iter().enumerate() {
        let row_bytes = icon.width as usize * 4;
        for y in 0..icon.height {
            let start = y as usize * row_bytes;
            surface.write_pixels(0, y_offset + y, &icon.pixels[start..start + row_bytes]);
        }
        surface.add_subrect(SubRect {
            x: 0,
            y: y_offset,
            width: icon.width,
            height: icon.height,
            kind: SubRectKind::Sprite,
            user_tag: i as u32,
        });
        y_offset += icon.height;
    }

    Ok(())
}

pub struct IcoDecoder;

impl Decoder for IcoDecoder {
    fn name(&self) -> &'static str {
        "ico"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ico", "cur"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        parse_ico_header(data).is_some_and(|h| h.count > 0)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        let header = parse_ico_header(data)
            .ok_or_else(|| Error::InvalidFormat("Invalid ICO header".into()))?;
        if header.count == 0 {
            return Err(Error::InvalidFormat("ICO file has no images".into()));
        }

        let (max_w, max_h) = options.icon_limits();

        struct Entry {
            index: u16,
            size: u32,
            offset: u32,
        }
        let mut entries = Vec::with_capacity(header.count as usize);
        let mut dir_offset = 6;
        for index in 0..header.count {
            if dir_offset + DIR_ENTRY_SIZE > data.len() {
                break;
            }
            let e = &data[dir_offset..dir_offset + DIR_ENTRY_SIZE];
            dir_offset += DIR_ENTRY_SIZE;

            // A zero width/height byte means 256.
            let w = if e[0] == 0 { 256 } else { e[0] as u32 };
            let h = if e[1] == 0 { 256 } else { e[1] as u32 };
            let size = read_le32(e, 8);
            let offset = read_le32(e, 12);
            if w <= max_w && h <= max_h && (offset as usize) < data.len() && size > 0 {
                entries.push(Entry {
                    index,
                    size,
                    offset,
                });
            } else {
                warn!("skipping ICO entry {index}: bad directory entry");
            }
        }

        if entries.is_empty() {
            return Err(Error::InvalidFormat("No valid icon entries".into()));
        }

        let mut icons = Vec::with_capacity(entries.len());
        for entry in &entries {
            let end = entry.offset as usize + entry.size as usize;
            if end > data.len() {
                warn!("skipping ICO entry {}: truncated image data", entry.index);
                continue;
            }
            let icon_data = &data[entry.offset as usize..end];
            match decode_icon_image(icon_data, max_w, max_h) {
                Some(icon) => icons.push(icon),
                None => warn!("skipping ICO entry {}: undecodable image", entry.index),
            }
        }

        create_icon_atlas(&icons, surface, max_w, max_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // Builds a DIB icon payload: 40-byte header, 4-entry palette, solid
    // XOR image of `index`, empty AND mask.
    pub(crate) fn dib_icon(width: u32, height: u32, index: u8) -> Vec<u8> {
        let mut dib = Vec::new();
        dib.extend_from_slice(&40u32.to_le_bytes());
        dib.extend_from_slice(&(width as i32).to_le_bytes());
        dib.extend_from_slice(&((height * 2) as i32).to_le_bytes());
        dib.extend_from_slice(&1u16.to_le_bytes());
        dib.extend_from_slice(&8u16.to_le_bytes()); // bit count
        dib.extend_from_slice(&BI_RGB.to_le_bytes());
        dib.extend_from_slice(&[0u8; 12]);
        dib.extend_from_slice(&4u32.to_le_bytes()); // clr_used
        dib.extend_from_slice(&0u32.to_le_bytes());
        for i in 0..4u8 {
            dib.extend_from_slice(&[i * 10, i * 20, i * 30, 0]); // BGRA
        }
        let xor_stride = row_stride_4byte(width, 8);
        for _ in 0..height {
            let mut row = vec![index; width as usize];
            row.resize(xor_stride, 0);
            dib.extend_from_slice(&row);
        }
        let and_stride = row_stride_4byte(width, 1);
        dib.extend(std::iter::repeat(0u8).take(and_stride * height as usize));
        dib
    }

    pub(crate) fn ico_file(images: &[Vec<u8>]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&(images.len() as u16).to_le_bytes());
        let mut offset = 6 + images.len() * DIR_ENTRY_SIZE;
        for image in images {
            // width/height bytes left zero (=256) keeps entries valid
            let mut entry = vec![0u8; 8];
            entry[4..6].copy_from_slice(&1u16.to_le_bytes());
            data.extend_from_slice(&entry);
            data.extend_from_slice(&(image.len() as u32).to_le_bytes());
            data.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += image.len();
        }
        for image in images {
            data.extend_from_slice(image);
        }
        data
    }

    #[test]
    fn three_icons_stack_with_tags() {
        let data = ico_file(&[dib_icon(8, 8, 1), dib_icon(4, 4, 2), dib_icon(8, 2, 3)]);
        let mut surface = MemorySurface::new();
        IcoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.width(), 8);
        assert_eq!(surface.height(), 14);
        let rects = surface.subrects();
        assert_eq!(rects.len(), 3);
        assert_eq!(
            rects.iter().map(|r| r.user_tag).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!((rects[1].y, rects[1].width, rects[1].height), (8, 4, 4));
        assert_eq!(rects[0].kind, SubRectKind::Sprite);
        // icon 1 uses palette entry 1 (BGR 10,20,30 -> RGB 30,20,10)
        assert_eq!(surface.pixel(0, 0), &[30, 20, 10, 0xFF]);
        // icon 2 uses entry 2
        assert_eq!(surface.pixel(0, 8), &[60, 40, 20, 0xFF]);
    }

    #[test]
    fn and_mask_marks_transparent() {
        let mut icon = dib_icon(8, 1, 1);
        // Set the first AND mask bit: pixel (0, 0) becomes transparent.
        let and_offset = icon.len() - row_stride_4byte(8, 1);
        icon[and_offset] = 0x80;
        let data = ico_file(&[icon]);
        let mut surface = MemorySurface::new();
        IcoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(0, 0)[3], 0);
        assert_eq!(surface.pixel(1, 0)[3], 0xFF);
    }

    #[test]
    fn bad_entries_are_skipped() {
        // One good icon and one whose payload is garbage.
        let data = ico_file(&[dib_icon(4, 4, 1), vec![0xAB; 64]]);
        let mut surface = MemorySurface::new();
        IcoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.height(), 4);
        assert_eq!(surface.subrects().len(), 1);
    }

    struct CaptureLogger {
        records: std::sync::Mutex<Vec<String>>,
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.records
                    .lock()
                    .unwrap()
                    .push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger {
        records: std::sync::Mutex::new(Vec::new()),
    };

    #[test]
    fn skipped_entries_are_logged() {
        log::set_logger(&CAPTURE).unwrap();
        log::set_max_level(log::LevelFilter::Warn);

        let data = ico_file(&[dib_icon(4, 4, 1), vec![0xAB; 64]]);
        let mut surface = MemorySurface::new();
        IcoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();

        let records = CAPTURE.records.lock().unwrap();
        assert!(records
            .iter()
            .any(|m| m == "skipping ICO entry 1: undecodable image"));
    }

    #[test]
    fn empty_ico_is_invalid() {
        let data = ico_file(&[]);
        let mut surface = MemorySurface::new();
        let err = IcoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn wrong_reserved_field_fails_sniff() {
        let mut data = ico_file(&[dib_icon(4, 4, 1)]);
        data[0] = 1;
        assert!(!IcoDecoder.sniff(&data));
    }
}

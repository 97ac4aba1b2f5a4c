//! ZSoft PCX decoder.
//!
//! Handles 1/2/4/8 bits per pixel across 1-4 planes, with the quirks real
//! files rely on: RLE is decoded regardless of the header's encoding flag,
//! the VGA palette lives in the last 769 bytes, and CGA files pick their
//! 4-color palette from the selector byte.

use crate::bytes::read_le16;
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const HEADER_SIZE: usize = 128;
const VGA_PALETTE_SIZE: usize = 769; // marker byte + 768 color bytes
const VGA_PALETTE_MARKER: u8 = 0x0C;
const RLE_MASK: u8 = 0xC0;
const RLE_COUNT_MASK: u8 = 0x3F;

pub(crate) struct HeaderInfo {
    pub(crate) version: u8,
    pub(crate) bits_per_pixel: u8,
    pub(crate) num_planes: usize,
    pub(crate) bytes_per_line: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

pub(crate) fn parse_header(data: &[u8], options: &DecodeOptions) -> Result<HeaderInfo> {
    if data.len() < HEADER_SIZE {
        return Err(Error::TruncatedData(
            "PCX file too small: expected at least 128 bytes".into(),
        ));
    }

    let x_min = read_le16(data, 4) as i32;
    let y_min = read_le16(data, 6) as i32;
    let x_max = read_le16(data, 8) as i32;
    let y_max = read_le16(data, 10) as i32;
    let width = x_max - x_min + 1;
    let height = y_max - y_min + 1;
    if width <= 0 || height <= 0 {
        return Err(Error::InvalidFormat("Invalid image dimensions".into()));
    }
    validate_dimensions(width as u32, height as u32, options)?;

    let bits_per_pixel = data[3];
    if !matches!(bits_per_pixel, 1 | 2 | 4 | 8) {
        return Err(Error::UnsupportedBitDepth(
            "Unsupported bits per pixel".into(),
        ));
    }
    let num_planes = data[65] as usize;
    if !(1..=4).contains(&num_planes) {
        return Err(Error::UnsupportedEncoding(
            "Unsupported number of color planes".into(),
        ));
    }

    Ok(HeaderInfo {
        version: data[1],
        bits_per_pixel,
        num_planes,
        bytes_per_line: read_le16(data, 66) as usize,
        width: width as u32,
        height: height as u32,
    })
}

fn has_vga_palette_slot(info: &HeaderInfo) -> bool {
    info.version == 5 && info.bits_per_pixel == 8 && info.num_planes == 1
}

fn decode_scanlines(data: &[u8], info: &HeaderInfo, surface: &mut dyn Surface) -> Result<()> {
    let scan_line_length = info.bytes_per_line * info.num_planes;
    let width = info.width as usize;

    // A row must actually fit in the declared scanline.
    let required = match (info.num_planes, info.bits_per_pixel) {
        (1, 8) => width,
        (3, 8) => info.bytes_per_line * 2 + width,
        (1, 1) => (width + 7) / 8,
        (1, 4) => (width + 1) / 2,
        (1, 2) => (width + 3) / 4,
        (planes, 1) => (width + 7) / 8 + (planes - 1) * info.bytes_per_line,
        _ => 0,
    };
    if required > scan_line_length {
        return Err(Error::InvalidFormat(
            "PCX scanline shorter than image width".into(),
        ));
    }

    let mut scan_line = vec![0u8; scan_line_length];

    let mut src = HEADER_SIZE;
    let mut src_end = data.len();
    // Keep the RLE reader out of the trailing VGA palette.
    if has_vga_palette_slot(info) && data.len() >= VGA_PALETTE_SIZE {
        src_end = data.len() - VGA_PALETTE_SIZE;
    }

    let mut rgb_row = vec![0u8; width * 3];

    for y in 0..info.height {
        let mut line_pos = 0usize;
        while line_pos < scan_line_length && src < src_end {
            let byte = data[src];
            src += 1;
            if (byte & RLE_MASK) == RLE_MASK {
                let count = (byte & RLE_COUNT_MASK) as usize;
                if src >= src_end {
                    return Err(Error::TruncatedData(
                        "PCX data truncated: incomplete RLE sequence".into(),
                    ));
                }
                let value = data[src];
                src += 1;
                let to_write = count.min(scan_line_length - line_pos);
                scan_line[line_pos..line_pos + to_write].fill(value);
                line_pos += to_write;
            } else {
                scan_line[line_pos] = byte;
                line_pos += 1;
            }
        }
        if line_pos < scan_line_length {
            return Err(Error::TruncatedData("Truncated PCX scanline".into()));
        }

        match (info.num_planes, info.bits_per_pixel) {
            (1, 8) => surface.write_pixels(0, y, &scan_line[..width]),
            (3, 8) => {
                for x in 0..width {
                    rgb_row[x * 3] = scan_line[x];
                    rgb_row[x * 3 + 1] = scan_line[x + info.bytes_per_line];
                    rgb_row[x * 3 + 2] = scan_line[x + info.bytes_per_line * 2];
                }
                surface.write_pixels(0, y, &rgb_row);
            }
            (1, 1) => {
                for x in 0..width {
                    let pixel = (scan_line[x / 8] >> (7 - (x % 8))) & 1;
                    surface.write_pixel(x as u32, y, pixel);
                }
            }
            (1, 4) => {
                for x in 0..width {
                    let byte = scan_line[x / 2];
                    let pixel = if x % 2 == 0 { (byte >> 4) & 0x0F } else { byte & 0x0F };
                    surface.write_pixel(x as u32, y, pixel);
                }
            }
            (planes @ (2 | 3 | 4), 1) => {
                for x in 0..width {
                    let byte_idx = x / 8;
                    let bit_idx = 7 - (x % 8);
                    let mut pixel = 0u8;
                    for plane in 0..planes {
                        let bit =
                            (scan_line[byte_idx + plane * info.bytes_per_line] >> bit_idx) & 1;
                        pixel |= bit << plane;
                    }
                    surface.write_pixel(x as u32, y, pixel);
                }
            }
            (1, 2) => {
                for x in 0..width {
                    let shift = 6 - (x % 4) * 2;
                    let pixel = (scan_line[x / 4] >> shift) & 0x03;
                    surface.write_pixel(x as u32, y, pixel);
                }
            }
            _ => {
                return Err(Error::UnsupportedEncoding(
                    "Unsupported PCX format combination".into(),
                ))
            }
        }
    }

    Ok(())
}

fn apply_ega_palette(data: &[u8], surface: &mut dyn Surface) {
    // 16 RGB triples at header offset 16.
    surface.set_palette_size(16);
    surface.write_palette(0, &data[16..64]);
}

fn apply_cga_palette(data: &[u8], surface: &mut dyn Surface) {
    // Background index in the upper nibble of byte 16; selector at byte 19:
    // bit 5 picks the palette, bit 4 is inverted intensity.
    const CGA_16_COLORS: [[u8; 3]; 16] = [
        [0, 0, 0],
        [0, 0, 170],
        [0, 170, 0],
        [0, 170, 170],
        [170, 0, 0],
        [170, 0, 170],
        [170, 85, 0],
        [170, 170, 170],
        [85, 85, 85],
        [85, 85, 255],
        [85, 255, 85],
        [85, 255, 255],
        [255, 85, 85],
        [255, 85, 255],
        [255, 255, 85],
        [255, 255, 255],
    ];
    // [palette][intensity][color]: 0 = cyan/magenta/white, 1 = green/red/brown.
    const CGA_PALETTES: [[[[u8; 3]; 3]; 2]; 2] = [
        [
            [[0, 170, 170], [170, 0, 170], [170, 170, 170]],
            [[85, 255, 255], [255, 85, 255], [255, 255, 255]],
        ],
        [
            [[0, 170, 0], [170, 0, 0], [170, 85, 0]],
            [[85, 255, 85], [255, 85, 85], [255, 255, 85]],
        ],
    ];

    let selector = data[19];
    let palette = ((selector >> 5) & 1) as usize;
    let intensity = 1 - ((selector >> 4) & 1) as usize;
    let bg_index = (data[16] >> 4) as usize;

    let mut pal = [0u8; 12];
    pal[..3].copy_from_slice(&CGA_16_COLORS[bg_index]);
    for i in 0..3 {
        pal[(i + 1) * 3..(i + 2) * 3].copy_from_slice(&CGA_PALETTES[palette][intensity][i]);
    }
    surface.set_palette_size(4);
    surface.write_palette(0, &pal);
}

fn apply_vga_palette(data: &[u8], surface: &mut dyn Surface) -> Result<()> {
    if data.len() < VGA_PALETTE_SIZE {
        return Err(Error::TruncatedData(
            "PCX file too small: missing VGA palette".into(),
        ));
    }
    let palette_offset = data.len() - VGA_PALETTE_SIZE;
    surface.set_palette_size(256);
    if data[palette_offset] != VGA_PALETTE_MARKER {
        // No palette tail: grayscale identity ramp.
        let mut palette = [0u8; 768];
        for i in 0..256 {
            palette[i * 3] = i as u8;
            palette[i * 3 + 1] = i as u8;
            palette[i * 3 + 2] = i as u8;
        }
        surface.write_palette(0, &palette);
    } else {
        surface.write_palette(0, &data[palette_offset + 1..palette_offset + VGA_PALETTE_SIZE]);
    }
    Ok(())
}

pub struct PcxDecoder;

impl Decoder for PcxDecoder {
    fn name(&self) -> &'static str {
        "pcx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pcx", "pcc"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < HEADER_SIZE {
            return false;
        }
        data[0] == 0x0A
            && matches!(data[1], 0 | 2 | 3 | 4 | 5)
            && data[2] <= 1
            && matches!(data[3], 1 | 2 | 4 | 8)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid PCX file".into()));
        }
        let info = parse_header(data, options)?;

        let format = if info.num_planes == 3 && info.bits_per_pixel == 8 {
            PixelFormat::Rgb888
        } else {
            PixelFormat::Indexed8
        };
        if !surface.set_size(info.width, info.height, format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        decode_scanlines(data, &info, surface)?;

        if format == PixelFormat::Indexed8 {
            if has_vga_palette_slot(&info) {
                apply_vga_palette(data, surface)?;
            } else if info.bits_per_pixel == 2 && info.num_planes == 1 {
                apply_cga_palette(data, surface);
            } else {
                apply_ega_palette(data, surface);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn build_header(
    width: u16,
    height: u16,
    bits_per_pixel: u8,
    num_planes: u8,
    version: u8,
) -> Vec<u8> {
    let mut header = vec![0u8; HEADER_SIZE];
    header[0] = 0x0A;
    header[1] = version;
    header[2] = 1; // RLE
    header[3] = bits_per_pixel;
    header[8..10].copy_from_slice(&(width - 1).to_le_bytes());
    header[10..12].copy_from_slice(&(height - 1).to_le_bytes());
    header[65] = num_planes;
    let bytes_per_line =
        ((width as usize * bits_per_pixel as usize + 15) / 16 * 16 / 8) as u16;
    header[66..68].copy_from_slice(&bytes_per_line.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn decode(data: &[u8]) -> Result<MemorySurface> {
        let mut surface = MemorySurface::new();
        PcxDecoder.decode(data, &mut surface, &DecodeOptions::default())?;
        Ok(surface)
    }

    #[test]
    fn vga_8bit_with_palette_tail() {
        let mut data = build_header(4, 1, 8, 1, 5);
        // bytes_per_line for 4px/8bpp rounds to 4
        data[66..68].copy_from_slice(&4u16.to_le_bytes());
        // one literal scanline
        data.extend_from_slice(&[0, 1, 2, 3]);
        data.push(VGA_PALETTE_MARKER);
        let mut pal = vec![0u8; 768];
        pal[3..6].copy_from_slice(&[255, 128, 64]); // color 1
        data.extend_from_slice(&pal);

        let surface = decode(&data).unwrap();
        assert_eq!(surface.format(), PixelFormat::Indexed8);
        assert_eq!(surface.row(0), &[0, 1, 2, 3]);
        assert_eq!(&surface.palette()[3..6], &[255, 128, 64]);
    }

    #[test]
    fn missing_marker_gives_grayscale() {
        let mut data = build_header(2, 1, 8, 1, 5);
        data[66..68].copy_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[0xC2, 9]); // RLE run of 2
        data.push(0); // wrong marker
        data.extend_from_slice(&vec![0u8; 768]);

        let surface = decode(&data).unwrap();
        assert_eq!(surface.row(0), &[9, 9]);
        assert_eq!(&surface.palette()[9 * 3..9 * 3 + 3], &[9, 9, 9]);
    }

    #[test]
    fn rgb_plane_interleave() {
        let mut data = build_header(2, 1, 8, 3, 5);
        data[66..68].copy_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[10, 11, 20, 21, 30, 31]); // R R G G B B
        let surface = decode(&data).unwrap();
        assert_eq!(surface.format(), PixelFormat::Rgb888);
        assert_eq!(surface.pixel(0, 0), &[10, 20, 30]);
        assert_eq!(surface.pixel(1, 0), &[11, 21, 31]);
    }

    #[test]
    fn ega_planar_4x1() {
        let mut data = build_header(8, 1, 1, 4, 5);
        data[66..68].copy_from_slice(&1u16.to_le_bytes());
        // planes: plane0 = 0x80 (pixel 0 bit), plane1 = 0x80, plane2 = 0, plane3 = 0x80
        data.extend_from_slice(&[0x80, 0x80, 0x00, 0x80]);
        // header EGA palette: color 11 (0b1011)
        let surface = decode(&data).unwrap();
        assert_eq!(surface.pixel(0, 0), &[11]);
        assert_eq!(surface.pixel(1, 0), &[0]);
    }

    #[test]
    fn cga_packed_palette_selection() {
        let mut data = build_header(4, 1, 2, 1, 2);
        data[66..68].copy_from_slice(&1u16.to_le_bytes());
        data[16] = 0x30; // background = CGA color 3 (cyan)
        data[19] = 0x20; // palette 1, intensity bit clear -> high
        data.extend_from_slice(&[0b00_01_10_11]);
        let surface = decode(&data).unwrap();
        assert_eq!(surface.pixel(0, 0), &[0]);
        assert_eq!(surface.pixel(3, 0), &[3]);
        let pal = surface.palette();
        assert_eq!(&pal[..3], &[0, 170, 170]); // background cyan
        assert_eq!(&pal[3..6], &[85, 255, 85]); // light green
    }

    #[test]
    fn truncated_rle_scanline() {
        let mut data = build_header(8, 2, 8, 1, 2);
        data[66..68].copy_from_slice(&8u16.to_le_bytes());
        data.extend_from_slice(&[0xC8]); // run missing its value byte
        let err = decode(&data).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::TruncatedData);
    }
}

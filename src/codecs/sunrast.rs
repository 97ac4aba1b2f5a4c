//! Sun Raster (.ras) decoder: depths 1/4/8/24/32, optional byte RLE, planar
//! RGB colormap, BGR sample order unless the type says RGB.

use crate::bytes::{read_be32, row_stride_2byte};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const RAS_MAGIC: u32 = 0x59A6_6A95;
const RT_BYTE_ENCODED: u32 = 2;
const RT_RGB: u32 = 3;
const RMT_EQUAL_RGB: u32 = 1;
const RLE_FLAG: u8 = 0x80;
const HEADER_SIZE: usize = 32;

struct RasInfo {
    width: u32,
    height: u32,
    depth: u32,
    #[allow(dead_code)]
    length: u32,
    kind: u32,
    colormap_type: u32,
    colormap_length: u32,
    is_rgb: bool,
}

fn parse_header(data: &[u8]) -> Option<RasInfo> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    if read_be32(data, 0) != RAS_MAGIC {
        return None;
    }
    let kind = read_be32(data, 20);
    Some(RasInfo {
        width: read_be32(data, 4),
        height: read_be32(data, 8),
        depth: read_be32(data, 12),
        length: read_be32(data, 16),
        kind,
        colormap_type: read_be32(data, 24),
        colormap_length: read_be32(data, 28),
        is_rgb: kind == RT_RGB,
    })
}

fn decode_rle(src: &[u8], dest_size: usize) -> Option<Vec<u8>> {
    let mut dest = Vec::with_capacity(dest_size);
    let mut pos = 0;
    while pos < src.len() && dest.len() < dest_size {
        let byte = src[pos];
        pos += 1;
        if byte == RLE_FLAG {
            if pos >= src.len() {
                return None;
            }
            let count = src[pos];
            pos += 1;
            if count == 0 {
                dest.push(RLE_FLAG);
            } else {
                if pos >= src.len() {
                    return None;
                }
                let value = src[pos];
                pos += 1;
                let run = (count as usize + 1).min(dest_size - dest.len());
                dest.extend(std::iter::repeat(value).take(run));
            }
        } else {
            dest.push(byte);
        }
    }
    (dest.len() == dest_size).then_some(dest)
}

pub struct SunRastDecoder;

impl Decoder for SunRastDecoder {
    fn name(&self) -> &'static str {
        "sunrast"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ras", "sun"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 4 && read_be32(data, 0) == RAS_MAGIC
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid Sun Raster file".into()));
        }
        let info = parse_header(data)
            .ok_or_else(|| Error::InvalidFormat("Failed to parse Sun Raster header".into()))?;

        if info.width == 0 || info.height == 0 {
            return Err(Error::InvalidFormat("Invalid image dimensions".into()));
        }
        validate_dimensions(info.width, info.height, options)?;

        if !matches!(info.depth, 1 | 4 | 8 | 24 | 32) {
            return Err(Error::InvalidFormat(format!(
                "Unsupported bit depth: {}",
                info.depth
            )));
        }
        if info.kind > RT_RGB {
            return Err(Error::InvalidFormat(format!(
                "Unsupported raster type: {}",
                info.kind
            )));
        }

        let pixel_offset = HEADER_SIZE + info.colormap_length as usize;
        if pixel_offset > data.len() {
            return Err(Error::TruncatedData(
                "Sun Raster data truncated: incomplete file header".into(),
            ));
        }

        // Colormap is stored as separate R, G, B planes.
        let mut palette = Vec::new();
        if info.colormap_type == RMT_EQUAL_RGB && info.colormap_length > 0 {
            let num_colors = info.colormap_length as usize / 3;
            let cmap = &data[HEADER_SIZE..pixel_offset];
            palette.resize(num_colors * 3, 0);
            for i in 0..num_colors {
                palette[i * 3] = cmap[i];
                palette[i * 3 + 1] = cmap[num_colors + i];
                palette[i * 3 + 2] = cmap[num_colors * 2 + i];
            }
        }

        let stride = row_stride_2byte(info.width, info.depth);
        let expected = stride * info.height as usize;

        let decompressed;
        let pixel_data: &[u8] = if info.kind == RT_BYTE_ENCODED {
            decompressed = decode_rle(&data[pixel_offset..], expected).ok_or_else(|| {
                Error::TruncatedData("RLE decompression failed - truncated data".into())
            })?;
            &decompressed
        } else {
            &data[pixel_offset..]
        };

        let out_format = if info.depth <= 8 {
            if palette.is_empty() {
                if info.depth == 1 {
                    palette = vec![0, 0, 0, 255, 255, 255];
                    PixelFormat::Indexed8
                } else {
                    PixelFormat::Rgba8888
                }
            } else {
                PixelFormat::Indexed8
            }
        } else {
            PixelFormat::Rgba8888
        };

        if !surface.set_size(info.width, info.height, out_format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        if out_format == PixelFormat::Indexed8 && !palette.is_empty() {
            surface.set_palette_size(palette.len() / 3);
            surface.write_palette(0, &palette);
        }

        let width = info.width as usize;
        let mut row = vec![0u8; width * 4];

        for y in 0..info.height {
            let start = y as usize * stride;
            if start + stride > pixel_data.len() {
                return Err(Error::TruncatedData("Unexpected end of data".into()));
            }
            let src_row = &pixel_data[start..start + stride];

            match info.depth {
                1 => {
                    for x in 0..width {
                        row[x] = (src_row[x / 8] >> (7 - (x % 8))) & 0x01;
                    }
                    surface.write_pixels(0, y, &row[..width]);
                }
                4 => {
                    for x in 0..width {
                        let byte = src_row[x / 2];
                        row[x] = if x % 2 == 0 { (byte >> 4) & 0x0F } else { byte & 0x0F };
                    }
                    surface.write_pixels(0, y, &row[..width]);
                }
                8 => {
                    surface.write_pixels(0, y, &src_row[..width]);
                }
                24 => {
                    for x in 0..width {
                        let (r, g, b) = if info.is_rgb {
                            (src_row[x * 3], src_row[x * 3 + 1], src_row[x * 3 + 2])
                        } else {
                            (src_row[x * 3 + 2], src_row[x * 3 + 1], src_row[x * 3])
                        };
                        row[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, 0xFF]);
                    }
                    surface.write_pixels(0, y, &row[..width * 4]);
                }
                _ => {
                    // 32-bit: first byte is padding (XBGR or XRGB).
                    for x in 0..width {
                        let (r, g, b) = if info.is_rgb {
                            (src_row[x * 4 + 1], src_row[x * 4 + 2], src_row[x * 4 + 3])
                        } else {
                            (src_row[x * 4 + 3], src_row[x * 4 + 2], src_row[x * 4 + 1])
                        };
                        row[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, 0xFF]);
                    }
                    surface.write_pixels(0, y, &row[..width * 4]);
                }
            }
        }

        Ok(())
    }
}

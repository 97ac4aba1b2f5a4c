//! QOI (Quite OK Image) decoder.

use crate::bytes::read_be32;
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const QOI_HEADER_SIZE: usize = 14;
const QOI_END_MARKER_SIZE: usize = 8;

const QOI_OP_INDEX: u8 = 0x00;
const QOI_OP_DIFF: u8 = 0x40;
const QOI_OP_LUMA: u8 = 0x80;
const QOI_OP_RUN: u8 = 0xC0;
const QOI_OP_RGB: u8 = 0xFE;
const QOI_OP_RGBA: u8 = 0xFF;
const QOI_MASK_2: u8 = 0xC0;

const MAX_PIXELS: u64 = 400_000_000;

#[derive(Clone, Copy, Default)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

fn color_hash(px: Rgba) -> usize {
    (px.r as usize * 3 + px.g as usize * 5 + px.b as usize * 7 + px.a as usize * 11) % 64
}

pub struct QoiDecoder;

impl Decoder for QoiDecoder {
    fn name(&self) -> &'static str {
        "qoi"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["qoi"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < QOI_HEADER_SIZE {
            return false;
        }
        if &data[..4] != b"qoif" {
            return false;
        }
        let width = read_be32(data, 4);
        let height = read_be32(data, 8);
        if width == 0 || height == 0 {
            return false;
        }
        let channels = data[12];
        if channels != 3 && channels != 4 {
            return false;
        }
        data[13] <= 1
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() < QOI_HEADER_SIZE + QOI_END_MARKER_SIZE {
            return Err(Error::TruncatedData("QOI file too small".into()));
        }
        if &data[..4] != b"qoif" {
            return Err(Error::InvalidFormat("Invalid QOI magic".into()));
        }

        let width = read_be32(data, 4);
        let height = read_be32(data, 8);
        let channels = data[12];

        if width == 0 || height == 0 {
            return Err(Error::InvalidFormat("Invalid QOI dimensions".into()));
        }
        if channels != 3 && channels != 4 {
            return Err(Error::InvalidFormat("Invalid QOI channel count".into()));
        }

        validate_dimensions(width, height, options)?;

        let total_pixels = width as u64 * height as u64;
        if total_pixels > MAX_PIXELS {
            return Err(Error::DimensionsExceeded {
                width,
                height,
                max_width: options.limits().0,
                max_height: options.limits().1,
            });
        }

        let format = if channels == 4 {
            PixelFormat::Rgba8888
        } else {
            PixelFormat::Rgb888
        };
        if !surface.set_size(width, height, format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let mut index = [Rgba::default(); 64];
        let mut px = Rgba {
            r: 0,
            g: 0,
            b: 0,
            a: 255,
        };

        let bpp = channels as usize;
        let pixel_count = total_pixels as usize;
        let mut pixels = vec![0u8; pixel_count * bpp];

        let mut src_pos = QOI_HEADER_SIZE;
        let src_end = data.len() - QOI_END_MARKER_SIZE;
        let mut dst_pos = 0usize;
        let mut run = 0u32;

        for _ in 0..pixel_count {
            if run > 0 {
                run -= 1;
            } else if src_pos < src_end {
                let b1 = data[src_pos];
                src_pos += 1;

                if b1 == QOI_OP_RGB {
                    if src_pos + 3 > src_end {
                        return Err(Error::TruncatedData("QOI RGB chunk truncated".into()));
                    }
                    px.r = data[src_pos];
                    px.g = data[src_pos + 1];
                    px.b = data[src_pos + 2];
                    src_pos += 3;
                } else if b1 == QOI_OP_RGBA {
                    if src_pos + 4 > src_end {
                        return Err(Error::TruncatedData("QOI RGBA chunk truncated".into()));
                    }
                    px.r = data[src_pos];
                    px.g = data[src_pos + 1];
                    px.b = data[src_pos + 2];
                    px.a = data[src_pos + 3];
                    src_pos += 4;
                } else if (b1 & QOI_MASK_2) == QOI_OP_INDEX {
                    px = index[b1 as usize];
                } else if (b1 & QOI_MASK_2) == QOI_OP_DIFF {
                    px.r = px.r.wrapping_add(((b1 >> 4) & 0x03).wrapping_sub(2));
                    px.g = px.g.wrapping_add(((b1 >> 2) & 0x03).wrapping_sub(2));
                    px.b = px.b.wrapping_add((b1 & 0x03).wrapping_sub(2));
                } else if (b1 & QOI_MASK_2) == QOI_OP_LUMA {
                    if src_pos >= src_end {
                        return Err(Error::TruncatedData("QOI LUMA chunk truncated".into()));
                    }
                    let b2 = data[src_pos];
                    src_pos += 1;
                    let vg = (b1 & 0x3F).wrapping_sub(32);
                    px.r = px
                        .r
                        .wrapping_add(vg.wrapping_sub(8).wrapping_add((b2 >> 4) & 0x0F));
                    px.g = px.g.wrapping_add(vg);
                    px.b = px
                        .b
                        .wrapping_add(vg.wrapping_sub(8).wrapping_add(b2 & 0x0F));
                } else {
                    // QOI_OP_RUN
                    run = (b1 & 0x3F) as u32;
                }

                index[color_hash(px)] = px;
            }

            pixels[dst_pos] = px.r;
            pixels[dst_pos + 1] = px.g;
            pixels[dst_pos + 2] = px.b;
            if bpp == 4 {
                pixels[dst_pos + 3] = px.a;
            }
            dst_pos += bpp;
        }

        let stride = width as usize * bpp;
        for y in 0..height {
            surface.write_pixels(0, y, &pixels[y as usize * stride..(y as usize + 1) * stride]);
        }

        Ok(())
    }
}

//! DCX multi-page PCX container.
//!
//! Pages are stacked vertically into one atlas surface; each page gets a
//! `Frame` sub-rect tagged with its page index. Pages whose PCX payload fails
//! to decode are skipped, but their reserved rows stay in the atlas so later
//! pages keep their offsets.

use log::warn;

use crate::bytes::read_le32;
use crate::codecs::pcx;
use crate::error::{Error, Result};
use crate::options::DecodeOptions;
use crate::registry::Decoder;
use crate::surface::{MemorySurface, PixelFormat, SubRect, SubRectKind, Surface};

const DCX_MAGIC: u32 = 0x3ADE_68B1;
const DCX_MAX_PAGES: usize = 1023;

fn page_offsets(data: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    for i in 0..DCX_MAX_PAGES {
        if 4 + (i + 1) * 4 > data.len() {
            break;
        }
        let offset = read_le32(data, 4 + i * 4) as usize;
        if offset == 0 {
            break;
        }
        if offset < data.len() {
            offsets.push(offset);
        }
    }
    offsets
}

pub struct DcxDecoder;

impl Decoder for DcxDecoder {
    fn name(&self) -> &'static str {
        "dcx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dcx"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 4 && read_le32(data, 0) == DCX_MAGIC
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid DCX file".into()));
        }
        if data.len() < 8 {
            return Err(Error::TruncatedData("DCX file too small".into()));
        }

        let offsets = page_offsets(data);
        if offsets.is_empty() {
            return Err(Error::InvalidFormat("DCX file has no pages".into()));
        }

        let (max_w, max_h) = options.limits();

        struct Page<'a> {
            width: u32,
            height: u32,
            pcx_data: &'a [u8],
        }
        let mut pages: Vec<Page<'_>> = Vec::with_capacity(offsets.len());

        let mut atlas_width: u64 = 0;
        let mut atlas_height: u64 = 0;
        let mut common_format = PixelFormat::Indexed8;

        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets.get(i + 1).copied().unwrap_or(data.len());
            if start >= end || start >= data.len() {
                continue;
            }
            let pcx_data = &data[start..end];

            let Ok(info) = pcx::parse_header(pcx_data, options) else {
                continue; // skip pages with broken headers
            };

            atlas_width = atlas_width.max(info.width as u64);
            atlas_height += info.height as u64;
            // Enforce limits while accumulating, before anything is allocated.
            if atlas_width > max_w as u64 || atlas_height > max_h as u64 {
                return Err(Error::DimensionsExceeded {
                    width: atlas_width as u32,
                    height: atlas_height as u32,
                    max_width: max_w,
                    max_height: max_h,
                });
            }

            if info.bits_per_pixel as usize * info.num_planes > 8 {
                common_format = PixelFormat::Rgb888;
            }
            pages.push(Page {
                width: info.width,
                height: info.height,
                pcx_data,
            });
        }

        if pages.is_empty() {
            return Err(Error::InvalidFormat("No valid pages in DCX file".into()));
        }

        if !surface.set_size(atlas_width as u32, atlas_height as u32, common_format) {
            return Err(Error::Internal("Failed to allocate atlas surface".into()));
        }

        let mut y_offset: u32 = 0;
        for (i, page) in pages.iter().enumerate() {
            let mut temp = MemorySurface::new();
            if let Err(err) = pcx::PcxDecoder.decode(page.pcx_data, &mut temp, options) {
                warn!("skipping DCX page {i}: {err}");
                y_offset += page.height;
                continue;
            }

            // Atlas palette comes from the first page.
            if i == 0 && temp.format() == PixelFormat::Indexed8 {
                let pal = temp.palette();
                if !pal.is_empty() {
                    surface.set_palette_size(pal.len() / 3);
                    surface.write_palette(0, pal);
                }
            }

            let src_row_bytes = page.width as usize * temp.format().bytes_per_pixel();
            for y in 0..page.height {
                let start = y as usize * src_row_bytes;
                surface.write_pixels(0, y_offset + y, &temp.pixels()[start..start + src_row_bytes]);
            }

            surface.add_subrect(SubRect {
                x: 0,
                y: y_offset,
                width: page.width,
                height: page.height,
                kind: SubRectKind::Frame,
                user_tag: i as u32,
            });
            y_offset += page.height;
        }

        Ok(())
    }
}

//! IFF ILBM/PBM decoder for Amiga interleaved-bitmap images.
//!
//! Supports uncompressed and ByteRun1 bodies, optional mask plane, EHB and
//! HAM6/HAM8 viewport modes and 24/32-plane truecolor. PBM chunky bodies
//! decode straight to indexed rows.

use crate::bytes::{read_be16, read_be32};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const CAMG_HAM_FLAG: u32 = 0x0800;
const CAMG_EHB_FLAG: u32 = 0x0080;

const MASKING_HAS_MASK: u8 = 1;

const COMPRESSION_NONE: u8 = 0;
const COMPRESSION_BYTERUN: u8 = 1;

struct Bmhd {
    width: u32,
    height: u32,
    num_planes: u8,
    masking: u8,
    compression: u8,
}

#[derive(Default)]
struct LbmChunks {
    is_pbm: bool,
    bmhd: Option<Bmhd>,
    camg: Option<u32>,
    cmap: Vec<u8>,
    body: Vec<u8>,
}

fn parse_chunks(data: &[u8]) -> LbmChunks {
    let mut result = LbmChunks {
        is_pbm: &data[8..12] == b"PBM ",
        ..LbmChunks::default()
    };

    let mut pos = 12;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let len = read_be32(data, pos + 4) as usize;
        pos += 8;
        if pos + len > data.len() {
            break;
        }
        let chunk = &data[pos..pos + len];

        match id {
            b"BMHD" if len >= 11 => {
                result.bmhd = Some(Bmhd {
                    width: read_be16(chunk, 0) as u32,
                    height: read_be16(chunk, 2) as u32,
                    num_planes: chunk[8],
                    masking: chunk[9],
                    compression: chunk[10],
                });
            }
            b"CMAP" => result.cmap.extend_from_slice(&chunk[..len - len % 3]),
            b"CAMG" if len >= 4 => result.camg = Some(read_be32(chunk, 0)),
            b"BODY" => result.body = chunk.to_vec(),
            _ => {}
        }

        pos += len + (len & 1); // chunks are word aligned
    }

    result
}

// ByteRun1: control >= 0 copies control+1 literals, control in -127..=-1
// repeats the next byte (-control)+1 times, -128 is a no-op.
fn unpack_byterun1(src: &[u8], pos: &mut usize, dst: &mut [u8]) -> bool {
    let mut produced = 0;
    while produced < dst.len() {
        if *pos >= src.len() {
            return false;
        }
        let control = src[*pos] as i8;
        *pos += 1;
        if control >= 0 {
            let count = control as usize + 1;
            if *pos + count > src.len() || produced + count > dst.len() {
                return false;
            }
            dst[produced..produced + count].copy_from_slice(&src[*pos..*pos + count]);
            *pos += count;
            produced += count;
        } else if control != -128 {
            let count = (-(control as i32)) as usize + 1;
            if *pos >= src.len() || produced + count > dst.len() {
                return false;
            }
            let value = src[*pos];
            *pos += 1;
            dst[produced..produced + count].fill(value);
            produced += count;
        }
    }
    true
}

fn advance_byterun1(src: &[u8], pos: &mut usize, expected: usize) -> bool {
    let mut produced = 0;
    while produced < expected {
        if *pos >= src.len() {
            return false;
        }
        let control = src[*pos] as i8;
        *pos += 1;
        if control >= 0 {
            let count = control as usize + 1;
            if *pos + count > src.len() || produced + count > expected {
                return false;
            }
            *pos += count;
            produced += count;
        } else if control != -128 {
            let count = (-(control as i32)) as usize + 1;
            if *pos >= src.len() || produced + count > expected {
                return false;
            }
            *pos += 1;
            produced += count;
        }
    }
    true
}

// Some writers compress each plane row independently, others the whole
// interleaved scanline. Try both layouts and pick the one that fits.
fn can_decode_byterun(
    body: &[u8],
    bytes_per_row: usize,
    stored_planes: usize,
    height: usize,
    per_plane_rows: bool,
) -> bool {
    let mut pos = 0;
    for _ in 0..height {
        if per_plane_rows {
            for _ in 0..stored_planes {
                if !advance_byterun1(body, &mut pos, bytes_per_row) {
                    return false;
                }
            }
        } else if !advance_byterun1(body, &mut pos, bytes_per_row * stored_planes) {
            return false;
        }
    }
    true
}

fn build_palette_rgb(cmap: &[u8], count: usize) -> Vec<u8> {
    let stored = cmap.len() / 3;
    let mut palette = vec![0u8; count * 3];
    for i in 0..count {
        if i < stored {
            palette[i * 3..i * 3 + 3].copy_from_slice(&cmap[i * 3..i * 3 + 3]);
        } else {
            let value = if count > 1 {
                ((i * 255) / (count - 1)) as u8
            } else {
                0
            };
            palette[i * 3..i * 3 + 3].fill(value);
        }
    }
    palette
}

// Extra-halfbrite: 32 base colors plus 32 half-brightness copies.
fn build_ehb_palette(cmap: &[u8]) -> Vec<u8> {
    let base = build_palette_rgb(cmap, 32);
    let mut palette = vec![0u8; 64 * 3];
    palette[..32 * 3].copy_from_slice(&base);
    for i in 0..32 * 3 {
        palette[32 * 3 + i] = base[i] >> 1;
    }
    palette
}

pub struct LbmDecoder;

impl Decoder for LbmDecoder {
    fn name(&self) -> &'static str {
        "lbm"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["lbm", "ilbm", "iff", "bbm"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 12
            && &data[..4] == b"FORM"
            && (&data[8..12] == b"ILBM" || &data[8..12] == b"PBM ")
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid IFF ILBM/PBM file".into()));
        }

        let parsed = parse_chunks(data);
        let header = parsed
            .bmhd
            .ok_or_else(|| Error::InvalidFormat("Missing BMHD chunk".into()))?;
        if parsed.body.is_empty() {
            return Err(Error::InvalidFormat("Missing BODY chunk".into()));
        }
        if header.num_planes == 0 {
            return Err(Error::InvalidFormat("Invalid number of planes".into()));
        }

        let has_mask = header.masking == MASKING_HAS_MASK;
        if header.compression != COMPRESSION_NONE && header.compression != COMPRESSION_BYTERUN {
            return Err(Error::UnsupportedEncoding("Unsupported compression".into()));
        }

        let width = header.width;
        let height = header.height;
        validate_dimensions(width, height, options)?;

        let body = &parsed.body[..];

        if parsed.is_pbm {
            if header.masking != 0 {
                return Err(Error::UnsupportedEncoding(
                    "PBM with masking not supported".into(),
                ));
            }

            if !surface.set_size(width, height, PixelFormat::Indexed8) {
                return Err(Error::Internal("Failed to allocate surface".into()));
            }
            let palette_size = 1usize << header.num_planes;
            let palette = build_palette_rgb(&parsed.cmap, palette_size);
            surface.set_palette_size(palette_size);
            surface.write_palette(0, &palette);

            let bytes_per_row = width as usize;
            let mut pos = 0;
            let mut row = vec![0u8; bytes_per_row];
            for y in 0..height {
                if header.compression == COMPRESSION_NONE {
                    if pos + bytes_per_row > body.len() {
                        return Err(Error::TruncatedData("Unexpected end of data".into()));
                    }
                    surface.write_pixels(0, y, &body[pos..pos + bytes_per_row]);
                    pos += bytes_per_row;
                } else {
                    if !unpack_byterun1(body, &mut pos, &mut row) {
                        return Err(Error::TruncatedData("ByteRun1 decode failed".into()));
                    }
                    surface.write_pixels(0, y, &row);
                }
            }
            return Ok(());
        }

        let is_truecolor = header.num_planes == 24 || header.num_planes == 32;
        if header.num_planes > 8 && !is_truecolor {
            return Err(Error::UnsupportedBitDepth("Unsupported bit depth".into()));
        }

        let bytes_per_row = ((width as usize + 15) / 16) * 2;
        let plane_count = header.num_planes as usize;
        let stored_planes = plane_count + has_mask as usize;

        let byterun_per_plane = header.compression == COMPRESSION_BYTERUN
            && can_decode_byterun(body, bytes_per_row, stored_planes, height as usize, true);
        let byterun_per_scanline = header.compression == COMPRESSION_BYTERUN
            && can_decode_byterun(body, bytes_per_row, stored_planes, height as usize, false);
        if header.compression == COMPRESSION_BYTERUN && !byterun_per_plane && !byterun_per_scanline
        {
            return Err(Error::TruncatedData("Invalid ByteRun1 data".into()));
        }

        let ham_mode = parsed.camg.is_some_and(|m| m & CAMG_HAM_FLAG != 0);
        let ehb_mode = parsed.camg.is_some_and(|m| m & CAMG_EHB_FLAG != 0);

        let out_format = if is_truecolor || ham_mode {
            PixelFormat::Rgba8888
        } else {
            PixelFormat::Indexed8
        };
        if !surface.set_size(width, height, out_format) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        if out_format == PixelFormat::Indexed8 {
            let palette = if ehb_mode && plane_count == 6 {
                build_ehb_palette(&parsed.cmap)
            } else {
                build_palette_rgb(&parsed.cmap, 1usize << plane_count)
            };
            surface.set_palette_size(palette.len() / 3);
            surface.write_palette(0, &palette);
        }

        let ham_base_palette = if ham_mode {
            build_palette_rgb(&parsed.cmap, if plane_count == 6 { 16 } else { 64 })
        } else {
            Vec::new()
        };

        let w = width as usize;
        let mut row_data = vec![0u8; bytes_per_row * stored_planes];
        let mut indices = vec![0u8; w];
        let mut rgba_row = vec![0u8; w * 4];
        let mut pos = 0;

        for y in 0..height {
            if header.compression == COMPRESSION_BYTERUN && !byterun_per_plane {
                if !unpack_byterun1(body, &mut pos, &mut row_data) {
                    return Err(Error::TruncatedData("ByteRun1 decode failed".into()));
                }
            } else {
                for p in 0..stored_planes {
                    let dst = &mut row_data[p * bytes_per_row..(p + 1) * bytes_per_row];
                    if header.compression == COMPRESSION_NONE {
                        if pos + bytes_per_row > body.len() {
                            return Err(Error::TruncatedData("Unexpected end of data".into()));
                        }
                        dst.copy_from_slice(&body[pos..pos + bytes_per_row]);
                        pos += bytes_per_row;
                    } else if !unpack_byterun1(body, &mut pos, dst) {
                        return Err(Error::TruncatedData("ByteRun1 decode failed".into()));
                    }
                }
            }

            if is_truecolor {
                for x in 0..w {
                    let byte_index = x / 8;
                    let bit_mask = 0x80u8 >> (x % 8);

                    let read_channel = |base_plane: usize| {
                        let mut value = 0u8;
                        for bit in 0..8 {
                            let byte = row_data[(base_plane + bit) * bytes_per_row + byte_index];
                            value |= ((byte & bit_mask != 0) as u8) << bit;
                        }
                        value
                    };

                    let r = read_channel(0);
                    let g = read_channel(8);
                    let b = read_channel(16);
                    let mut a = if plane_count == 32 {
                        read_channel(24)
                    } else {
                        0xFF
                    };
                    if has_mask {
                        let mask_byte = row_data[plane_count * bytes_per_row + byte_index];
                        if mask_byte & bit_mask == 0 {
                            a = 0;
                        }
                    }
                    rgba_row[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, a]);
                }
                surface.write_pixels(0, y, &rgba_row);
                continue;
            }

            // planar to chunky
            for (x, index) in indices.iter_mut().enumerate() {
                let byte_index = x / 8;
                let bit_mask = 0x80u8 >> (x % 8);
                let mut value = 0u8;
                for p in 0..plane_count {
                    let byte = row_data[p * bytes_per_row + byte_index];
                    value |= ((byte & bit_mask != 0) as u8) << p;
                }
                *index = value;
            }

            if ham_mode && (plane_count == 6 || plane_count == 8) {
                // Hold-and-modify: each code either loads a palette color or
                // modifies one channel of the previous pixel.
                let data_bits = if plane_count == 6 { 4 } else { 6 };
                let expand = |value: u8| {
                    if data_bits == 4 {
                        (value << 4) | value
                    } else {
                        value << 2
                    }
                };

                let mut r = ham_base_palette[0];
                let mut g = ham_base_palette[1];
                let mut b = ham_base_palette[2];

                for x in 0..w {
                    let code = indices[x];
                    let op = code >> data_bits;
                    let dat = code & ((1 << data_bits) - 1);
                    match op {
                        0 => {
                            let pal_idx = dat as usize * 3;
                            if pal_idx + 2 < ham_base_palette.len() {
                                r = ham_base_palette[pal_idx];
                                g = ham_base_palette[pal_idx + 1];
                                b = ham_base_palette[pal_idx + 2];
                            }
                        }
                        1 => b = expand(dat),
                        2 => r = expand(dat),
                        _ => g = expand(dat),
                    }
                    rgba_row[x * 4..x * 4 + 4].copy_from_slice(&[r, g, b, 0xFF]);
                }
                surface.write_pixels(0, y, &rgba_row);
            } else {
                surface.write_pixels(0, y, &indices);
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

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut data = id.to_vec();
        data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        data.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            data.push(0);
        }
        data
    }

    fn bmhd(width: u16, height: u16, planes: u8, masking: u8, compression: u8) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&[0, 0, 0, 0]); // x, y
        payload.push(planes);
        payload.push(masking);
        payload.push(compression);
        payload.extend_from_slice(&[0; 9]); // pad, transparent, aspect, page size
        chunk(b"BMHD", &payload)
    }

    fn form(kind: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut inner = kind.to_vec();
        for c in chunks {
            inner.extend_from_slice(c);
        }
        let mut data = b"FORM".to_vec();
        data.extend_from_slice(&(inner.len() as u32).to_be_bytes());
        data.extend_from_slice(&inner);
        data
    }

    #[test]
    fn ilbm_planar_indexed() {
        // 8x1, 2 planes: pixel 0 -> index 3, pixel 1 -> index 1
        let body = chunk(b"BODY", &[0b1100_0000, 0b1000_0000]);
        let cmap = chunk(b"CMAP", &[0, 0, 0, 10, 10, 10, 20, 20, 20, 30, 30, 30]);
        let data = form(b"ILBM", &[bmhd(8, 1, 2, 0, 0), cmap, body]);
        let mut surface = MemorySurface::new();
        LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Indexed8);
        assert_eq!(surface.pixel(0, 0), &[3]);
        assert_eq!(surface.pixel(1, 0), &[1]);
        assert_eq!(surface.palette()[9..12], [30, 30, 30]);
    }

    #[test]
    fn pbm_chunky_byterun() {
        // 4x1 chunky, ByteRun1: repeat 7 four times
        let body = chunk(b"BODY", &[0xFD, 7]);
        let data = form(b"PBM ", &[bmhd(4, 1, 8, 0, 1), body]);
        let mut surface = MemorySurface::new();
        LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.row(0), &[7, 7, 7, 7]);
    }

    #[test]
    fn ehb_doubles_palette() {
        // 16x1, 6 planes, EHB viewport. All-zero body.
        let body = chunk(b"BODY", &[0u8; 12]);
        let cmap = chunk(b"CMAP", &[200, 100, 50]);
        let camg = chunk(b"CAMG", &CAMG_EHB_FLAG.to_be_bytes());
        let data = form(b"ILBM", &[bmhd(16, 1, 6, 0, 0), cmap, camg, body]);
        let mut surface = MemorySurface::new();
        LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.palette().len(), 64 * 3);
        assert_eq!(surface.palette()[..3], [200, 100, 50]);
        assert_eq!(surface.palette()[32 * 3..32 * 3 + 3], [100, 50, 25]);
    }

    #[test]
    fn ham6_modifies_channels() {
        // 16x1, 6 planes, HAM. First pixel loads palette color 0, second
        // sets blue to 0xF (expands to 0xFF).
        // Codes: pixel0 = 0b000000, pixel1 = 0b011111 (op=1, dat=0xF).
        let mut planes = [0u8; 12];
        for p in 0..5 {
            planes[p * 2] = 0b0100_0000; // pixel 1 set in planes 0-4
        }
        let body = chunk(b"BODY", &planes);
        let cmap = chunk(b"CMAP", &[64, 32, 16]);
        let camg = chunk(b"CAMG", &CAMG_HAM_FLAG.to_be_bytes());
        let data = form(b"ILBM", &[bmhd(16, 1, 6, 0, 0), cmap, camg, body]);
        let mut surface = MemorySurface::new();
        LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Rgba8888);
        assert_eq!(surface.pixel(0, 0), &[64, 32, 16, 0xFF]);
        assert_eq!(surface.pixel(1, 0), &[64, 32, 0xFF, 0xFF]);
    }

    #[test]
    fn truncated_body_fails() {
        let body = chunk(b"BODY", &[0u8; 1]);
        let data = form(b"ILBM", &[bmhd(16, 2, 2, 0, 0), body]);
        let mut surface = MemorySurface::new();
        let err = LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn missing_bmhd_is_invalid() {
        let body = chunk(b"BODY", &[0u8; 4]);
        let data = form(b"ILBM", &[body]);
        let mut surface = MemorySurface::new();
        let err = LbmDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }
}

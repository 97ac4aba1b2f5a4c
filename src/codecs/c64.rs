//! Commodore 64 picture formats: Koala, Doodle, hires dumps, Run Paint,
//! InterPaint, Amica Paint, FunPaint II and DrazLace.
//!
//! These files are VIC-II memory dumps, so most sniffing is by exact file
//! size plus a load-address whitelist. Output is always RGB using the
//! Pepto palette; the interlaced formats decode two frames and blend them.

use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::palette::C64_PALETTE;
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const MULTICOLOR_WIDTH: usize = 320;
const MULTICOLOR_HEIGHT: usize = 200;
const HIRES_WIDTH: usize = 320;
const HIRES_HEIGHT: usize = 200;
/// The FLI bug blanks the leftmost 3 character columns.
const FLI_WIDTH: usize = 296;
const FLI_BUG_CHARACTERS: usize = 3;

const BITMAP_SIZE: usize = 8000;
const SCREEN_RAM_SIZE: usize = 1000;
const COLOR_RAM_SIZE: usize = 1000;

const KOALA_UNPACKED_SIZE: usize = 10001;

/// Guard against RLE decompression bombs.
const MAX_COMPRESSION_RATIO: usize = 1000;

fn palette_rgb(index: u8) -> [u8; 3] {
    let i = (index & 0x0F) as usize * 3;
    [C64_PALETTE[i], C64_PALETTE[i + 1], C64_PALETTE[i + 2]]
}

/// Byte-by-byte average of two RGB colors, used for interlace blending.
fn blend_rgb(a: [u8; 3], b: [u8; 3]) -> [u8; 3] {
    let mix = |a: u8, b: u8| (a & b) + ((a ^ b) >> 1);
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// One multicolor pixel from a flat bitmap/video-matrix/color-ram layout.
/// `left_skip` shifts the sampling left for interlaced second frames;
/// pixels shifted off the edge take the background color.
fn multicolor_pixel(
    data: &[u8],
    bitmap_offset: usize,
    video_matrix_offset: usize,
    color_offset: usize,
    background: u8,
    x: i32,
    y: usize,
    left_skip: i32,
) -> u8 {
    let x = x + left_skip;
    if x < 0 {
        return background;
    }
    let x = x as usize;
    let char_offset = (y / 8) * 40 + x / 8;
    let bitmap_byte = data[bitmap_offset + char_offset * 8 + y % 8];
    let shift = 6 - ((x % 8) / 2) * 2;
    match (bitmap_byte >> shift) & 0x03 {
        0 => background,
        1 => (data[video_matrix_offset + char_offset] >> 4) & 0x0F,
        2 => data[video_matrix_offset + char_offset] & 0x0F,
        _ => data[color_offset + char_offset] & 0x0F,
    }
}

/// FLI variant: the video matrix has one 1K bank per scanline within the
/// character row.
fn fli_multicolor_pixel(
    data: &[u8],
    bitmap_offset: usize,
    video_matrix_offset: usize,
    color_offset: usize,
    background: u8,
    x: i32,
    y: usize,
    left_skip: i32,
) -> u8 {
    let x = x + left_skip;
    if x < 0 {
        return background;
    }
    let x = x as usize;
    let char_offset = (y / 8) * 40 + x / 8;
    let bitmap_byte = data[bitmap_offset + char_offset * 8 + y % 8];
    let shift = 6 - (x % 8 & 6);
    let video_offset = video_matrix_offset + ((y & 7) << 10) + char_offset;
    match (bitmap_byte >> shift) & 0x03 {
        0 => background,
        1 => (data[video_offset] >> 4) & 0x0F,
        2 => data[video_offset] & 0x0F,
        _ => data[color_offset + char_offset] & 0x0F,
    }
}

fn decode_multicolor(
    data: &[u8],
    bitmap_offset: usize,
    video_matrix_offset: usize,
    color_offset: usize,
    background: u8,
    surface: &mut dyn Surface,
) {
    let mut row = vec![0u8; MULTICOLOR_WIDTH * 3];
    for y in 0..MULTICOLOR_HEIGHT {
        for x in 0..MULTICOLOR_WIDTH {
            let index = multicolor_pixel(
                data,
                bitmap_offset,
                video_matrix_offset,
                color_offset,
                background,
                x as i32,
                y,
                0,
            );
            row[x * 3..x * 3 + 3].copy_from_slice(&palette_rgb(index));
        }
        surface.write_pixels(0, y as u32, &row);
    }
}

fn decode_hires(
    bitmap: &[u8],
    video_matrix: Option<&[u8]>,
    fixed_colors: u8,
    surface: &mut dyn Surface,
) {
    let mut row = vec![0u8; HIRES_WIDTH * 3];
    for y in 0..HIRES_HEIGHT {
        for x in 0..HIRES_WIDTH {
            let char_offset = (y / 8) * 40 + x / 8;
            let byte = bitmap[char_offset * 8 + y % 8];
            let bit = (byte >> (7 - (x & 7))) & 1;
            let colors = match video_matrix {
                Some(vm) => vm[char_offset],
                None => fixed_colors,
            };
            let index = if bit == 0 { colors & 0x0F } else { colors >> 4 };
            row[x * 3..x * 3 + 3].copy_from_slice(&palette_rgb(index));
        }
        surface.write_pixels(0, y as u32, &row);
    }
}

fn check_multicolor_limits(options: &DecodeOptions) -> Result<()> {
    validate_dimensions(MULTICOLOR_WIDTH as u32, MULTICOLOR_HEIGHT as u32, options)
}

fn alloc_rgb(surface: &mut dyn Surface, width: usize, height: usize) -> Result<()> {
    if !surface.set_size(width as u32, height as u32, PixelFormat::Rgb888) {
        return Err(Error::Internal("Failed to allocate surface".into()));
    }
    Ok(())
}

/// GG/JJ RLE: `0xFE value count`. With `limit` of `None` the stream is
/// expanded fully, which the JJ sniff uses to distinguish it from GG.
fn decompress_gg(data: &[u8], offset: usize, limit: Option<usize>) -> Option<Vec<u8>> {
    if let Some(size) = limit {
        if size > data.len().saturating_mul(MAX_COMPRESSION_RATIO) {
            return None;
        }
    }

    let mut output = Vec::with_capacity(limit.unwrap_or(0));
    let mut pos = offset;
    while pos < data.len() {
        if let Some(size) = limit {
            if output.len() >= size {
                break;
            }
        }
        let byte = data[pos];
        pos += 1;
        if byte == 0xFE {
            if pos + 1 >= data.len() {
                return None;
            }
            let value = data[pos];
            let count = data[pos + 1] as usize;
            pos += 2;
            let to_write = match limit {
                Some(size) => count.min(size - output.len()),
                None => count,
            };
            output.extend(std::iter::repeat(value).take(to_write));
        } else {
            output.push(byte);
        }
    }

    match limit {
        Some(size) if output.len() != size => None,
        _ => Some(output),
    }
}

/// DRP RLE: `escape count value`. The first `out_start` output bytes are
/// copied straight from the input header.
fn decompress_drp(
    data: &[u8],
    escape: u8,
    in_start: usize,
    out_start: usize,
    output_size: usize,
) -> Option<Vec<u8>> {
    if output_size > data.len().saturating_mul(MAX_COMPRESSION_RATIO) || data.len() < out_start {
        return None;
    }

    let mut output = vec![0u8; output_size];
    output[..out_start].copy_from_slice(&data[..out_start]);

    let mut in_pos = in_start;
    let mut out_pos = out_start;
    while out_pos < output_size && in_pos < data.len() {
        let byte = data[in_pos];
        in_pos += 1;
        if byte == escape {
            if in_pos + 1 >= data.len() {
                return None;
            }
            let count = data[in_pos] as usize;
            let value = data[in_pos + 1];
            in_pos += 2;
            let to_write = count.min(output_size - out_pos);
            for slot in &mut output[out_pos..out_pos + to_write] {
                *slot = value;
            }
            out_pos += to_write;
        } else {
            output[out_pos] = byte;
            out_pos += 1;
        }
    }

    if out_pos == output_size {
        Some(output)
    } else {
        None
    }
}

fn load_address(data: &[u8]) -> u16 {
    u16::from(data[0]) | (u16::from(data[1]) << 8)
}

fn is_uncompressed_koala(len: usize) -> bool {
    matches!(len, 10001 | 10003 | 10006 | 10018)
}

fn is_gg_koala(data: &[u8]) -> bool {
    if data.len() < 100 || data.len() >= KOALA_UNPACKED_SIZE {
        return false;
    }
    if !matches!(load_address(data), 0x6000 | 0x4000 | 0x2000 | 0x5C00) {
        return false;
    }
    data[2..].contains(&0xFE)
}

pub struct KoalaDecoder;

impl Decoder for KoalaDecoder {
    fn name(&self) -> &'static str {
        "koala"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["koa", "kla", "koala", "gg", "gig"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        is_uncompressed_koala(data.len()) || is_gg_koala(data)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("Koala file is empty".into()));
        }

        let decompressed;
        let (source, bitmap_offset, screen_offset, color_offset, background_offset);
        if is_gg_koala(data) {
            decompressed = decompress_gg(data, 2, Some(KOALA_UNPACKED_SIZE)).ok_or_else(|| {
                Error::TruncatedData("Failed to decompress GG Koala data".into())
            })?;
            source = decompressed.as_slice();
            bitmap_offset = 0;
            screen_offset = BITMAP_SIZE;
            color_offset = BITMAP_SIZE + SCREEN_RAM_SIZE;
            background_offset = BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
        } else if data.len() == 10001 {
            source = data;
            bitmap_offset = 0;
            screen_offset = BITMAP_SIZE;
            color_offset = BITMAP_SIZE + SCREEN_RAM_SIZE;
            background_offset = BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
        } else if data.len() == 10003 || data.len() == 10006 {
            source = data;
            bitmap_offset = 2;
            screen_offset = 2 + BITMAP_SIZE;
            color_offset = 2 + BITMAP_SIZE + SCREEN_RAM_SIZE;
            background_offset = 2 + BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
        } else if data.len() == 10018 {
            // OCP Art Studio: an 8-byte gap between bitmap and screen RAM.
            source = data;
            bitmap_offset = 2;
            screen_offset = 2 + BITMAP_SIZE;
            color_offset = 2 + BITMAP_SIZE + 8 + SCREEN_RAM_SIZE;
            background_offset = color_offset - 1;
        } else {
            return Err(Error::InvalidFormat("Unrecognized Koala file size".into()));
        }

        if source.len() < background_offset + 1 {
            return Err(Error::TruncatedData(
                "Koala data truncated: incomplete image data".into(),
            ));
        }
        check_multicolor_limits(options)?;
        alloc_rgb(surface, MULTICOLOR_WIDTH, MULTICOLOR_HEIGHT)?;

        decode_multicolor(
            source,
            bitmap_offset,
            screen_offset,
            color_offset,
            source[background_offset],
            surface,
        );
        Ok(())
    }
}

fn is_uncompressed_c64_doodle(len: usize) -> bool {
    matches!(len, 9026 | 9217 | 9218 | 9346)
}

fn is_jj_doodle(data: &[u8]) -> bool {
    if data.len() < 100 || data.len() >= 9026 {
        return false;
    }
    // JJ must expand to exactly 9024 or 9216 bytes, which separates it
    // from GG Koala streams of similar size.
    match decompress_gg(data, 2, None) {
        Some(out) => out.len() == 9024 || out.len() == 9216,
        None => false,
    }
}

pub struct C64DoodleDecoder;

impl Decoder for C64DoodleDecoder {
    fn name(&self) -> &'static str {
        "c64_doodle"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dd", "ddp", "jj"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        is_uncompressed_c64_doodle(data.len()) || is_jj_doodle(data)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("Doodle file is empty".into()));
        }

        let decompressed;
        let (source, video_matrix_offset, bitmap_offset);
        if is_jj_doodle(data) {
            decompressed = decompress_gg(data, 2, Some(9024)).ok_or_else(|| {
                Error::TruncatedData("Failed to decompress JJ Doodle data".into())
            })?;
            source = decompressed.as_slice();
            video_matrix_offset = 0;
            bitmap_offset = 0x400;
        } else if is_uncompressed_c64_doodle(data.len()) {
            source = data;
            video_matrix_offset = 2;
            bitmap_offset = 0x402;
        } else {
            return Err(Error::InvalidFormat("Unrecognized Doodle file size".into()));
        }

        if source.len() < bitmap_offset + BITMAP_SIZE {
            return Err(Error::TruncatedData(
                "Doodle data truncated: incomplete image data".into(),
            ));
        }
        validate_dimensions(HIRES_WIDTH as u32, HIRES_HEIGHT as u32, options)?;
        alloc_rgb(surface, HIRES_WIDTH, HIRES_HEIGHT)?;

        decode_hires(
            &source[bitmap_offset..],
            Some(&source[video_matrix_offset..]),
            0x10,
            surface,
        );
        Ok(())
    }
}

fn is_c64_hires_size(len: usize) -> bool {
    matches!(len, 8002 | 8194 | 9002 | 9003 | 9009)
}

pub struct C64HiresDecoder;

impl Decoder for C64HiresDecoder {
    fn name(&self) -> &'static str {
        "c64_hires"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hbm", "fgs", "gih", "rpo", "dd", "mon", "gcd", "hpi"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        is_c64_hires_size(data.len())
            && matches!(
                load_address(data),
                0x2000 | 0x4000 | 0x6000 | 0xA000 | 0x5C00 | 0x4100 | 0x3F40 | 0x1C00 | 0x6C00
            )
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("C64 hires file is empty".into()));
        }
        if !is_c64_hires_size(data.len()) {
            return Err(Error::InvalidFormat("Invalid C64 hires file size".into()));
        }
        if data.len() < 2 + BITMAP_SIZE {
            return Err(Error::TruncatedData(
                "C64 hires data truncated: incomplete bitmap data".into(),
            ));
        }
        validate_dimensions(HIRES_WIDTH as u32, HIRES_HEIGHT as u32, options)?;
        alloc_rgb(surface, HIRES_WIDTH, HIRES_HEIGHT)?;

        // Files of 9002+ bytes carry a video matrix after the bitmap;
        // bitmap-only dumps use black background and white ink.
        let video_matrix = if data.len() >= 2 + BITMAP_SIZE + SCREEN_RAM_SIZE {
            Some(&data[2 + BITMAP_SIZE..])
        } else {
            None
        };
        decode_hires(&data[2..], video_matrix, 0x10, surface);
        Ok(())
    }
}

pub struct RunPaintDecoder;

impl Decoder for RunPaintDecoder {
    fn name(&self) -> &'static str {
        "runpaint"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rpm"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        matches!(data.len(), 10003 | 10006)
            && matches!(load_address(data), 0x6000 | 0x4000 | 0x5C00 | 0x2000)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("Run Paint file is empty".into()));
        }
        if !matches!(data.len(), 10003 | 10006) {
            return Err(Error::InvalidFormat("Invalid Run Paint file size".into()));
        }
        check_multicolor_limits(options)?;
        alloc_rgb(surface, MULTICOLOR_WIDTH, MULTICOLOR_HEIGHT)?;

        let background_offset = 2 + BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
        decode_multicolor(
            data,
            2,
            2 + BITMAP_SIZE,
            2 + BITMAP_SIZE + SCREEN_RAM_SIZE,
            data[background_offset],
            surface,
        );
        Ok(())
    }
}

pub struct InterpaintDecoder;

impl Decoder for InterpaintDecoder {
    fn name(&self) -> &'static str {
        "interpaint"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["iph", "ipt"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        matches!(data.len(), 9002 | 9003 | 9009 | 10003)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("InterPaint file is empty".into()));
        }

        match data.len() {
            9002 | 9003 | 9009 => {
                validate_dimensions(HIRES_WIDTH as u32, HIRES_HEIGHT as u32, options)?;
                alloc_rgb(surface, HIRES_WIDTH, HIRES_HEIGHT)?;
                decode_hires(&data[2..], Some(&data[0x1F42..]), 0x10, surface);
            }
            10003 => {
                check_multicolor_limits(options)?;
                alloc_rgb(surface, MULTICOLOR_WIDTH, MULTICOLOR_HEIGHT)?;
                let background_offset = 2 + BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
                decode_multicolor(
                    data,
                    2,
                    2 + BITMAP_SIZE,
                    2 + BITMAP_SIZE + SCREEN_RAM_SIZE,
                    data[background_offset],
                    surface,
                );
            }
            _ => {
                return Err(Error::InvalidFormat("Invalid InterPaint file size".into()));
            }
        }
        Ok(())
    }
}

const AMI_ESCAPE: u8 = 0xC2;

/// Amica Paint RLE: `0xC2 count value`, operands reversed relative to GG.
fn decompress_ami(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 3
        || KOALA_UNPACKED_SIZE > data.len().saturating_mul(MAX_COMPRESSION_RATIO)
    {
        return None;
    }

    let mut output = Vec::with_capacity(KOALA_UNPACKED_SIZE);
    let mut pos = 2;
    while output.len() < KOALA_UNPACKED_SIZE && pos < data.len() {
        let byte = data[pos];
        pos += 1;
        if byte == AMI_ESCAPE {
            if pos + 1 >= data.len() {
                return None;
            }
            let count = data[pos] as usize;
            let value = data[pos + 1];
            pos += 2;
            let to_write = count.min(KOALA_UNPACKED_SIZE - output.len());
            output.extend(std::iter::repeat(value).take(to_write));
        } else {
            output.push(byte);
        }
    }

    if output.len() == KOALA_UNPACKED_SIZE {
        Some(output)
    } else {
        None
    }
}

pub struct AmiDecoder;

impl Decoder for AmiDecoder {
    fn name(&self) -> &'static str {
        "ami"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ami"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < 100 || data.len() >= KOALA_UNPACKED_SIZE {
            return false;
        }
        if load_address(data) != 0x4000 {
            return false;
        }
        let scan_end = data.len().min(500);
        if data[2..scan_end].contains(&AMI_ESCAPE) {
            return true;
        }
        data.len() < 9000
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("Amica Paint file is empty".into()));
        }
        if data.len() < 3 {
            return Err(Error::TruncatedData(
                "Amica Paint file too small: expected at least 3 bytes".into(),
            ));
        }
        check_multicolor_limits(options)?;

        let unpacked = decompress_ami(data)
            .ok_or_else(|| Error::TruncatedData("Failed to decompress AMI data".into()))?;
        alloc_rgb(surface, MULTICOLOR_WIDTH, MULTICOLOR_HEIGHT)?;

        let background_offset = BITMAP_SIZE + SCREEN_RAM_SIZE + COLOR_RAM_SIZE;
        decode_multicolor(
            &unpacked,
            0,
            BITMAP_SIZE,
            BITMAP_SIZE + SCREEN_RAM_SIZE,
            unpacked[background_offset],
            surface,
        );
        Ok(())
    }
}

const FUNPAINT_SIGNATURE: &[u8] = b"FUNPAINT (MT) ";
const FUNPAINT_UNPACKED_SIZE: usize = 33694;

/// Decode one FLI frame into an RGB buffer.
fn decode_fli_frame(
    data: &[u8],
    bitmap_offset: usize,
    video_matrix_offset: usize,
    color_offset: usize,
    background: u8,
    left_skip: i32,
    frame: &mut [[u8; 3]],
) {
    let bitmap_offset = bitmap_offset + FLI_BUG_CHARACTERS * 8;
    let video_matrix_offset = video_matrix_offset + FLI_BUG_CHARACTERS;
    let color_offset = color_offset + FLI_BUG_CHARACTERS;

    for y in 0..MULTICOLOR_HEIGHT {
        for x in 0..FLI_WIDTH {
            let index = fli_multicolor_pixel(
                data,
                bitmap_offset,
                video_matrix_offset,
                color_offset,
                background,
                x as i32,
                y,
                left_skip,
            );
            frame[y * FLI_WIDTH + x] = palette_rgb(index);
        }
    }
}

pub struct FunpaintDecoder;

impl Decoder for FunpaintDecoder {
    fn name(&self) -> &'static str {
        "funpaint"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["fp2", "fun", "vic"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 2 + FUNPAINT_SIGNATURE.len()
            && &data[2..2 + FUNPAINT_SIGNATURE.len()] == FUNPAINT_SIGNATURE
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("FunPaint file is empty".into()));
        }
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Missing FunPaint signature".into()));
        }
        validate_dimensions(FLI_WIDTH as u32, MULTICOLOR_HEIGHT as u32, options)?;

        if data.len() < 18 {
            return Err(Error::TruncatedData(
                "FunPaint file too small: expected at least 18 bytes".into(),
            ));
        }

        let decompressed;
        let source = if data[16] != 0 {
            decompressed = decompress_drp(data, data[17], 18, 18, FUNPAINT_UNPACKED_SIZE)
                .ok_or_else(|| {
                    Error::TruncatedData("Failed to decompress FunPaint data".into())
                })?;
            decompressed.as_slice()
        } else {
            if data.len() != FUNPAINT_UNPACKED_SIZE {
                return Err(Error::InvalidFormat(
                    "Invalid uncompressed FunPaint size".into(),
                ));
            }
            data
        };

        alloc_rgb(surface, FLI_WIDTH, MULTICOLOR_HEIGHT)?;

        let mut frame1 = vec![[0u8; 3]; FLI_WIDTH * MULTICOLOR_HEIGHT];
        let mut frame2 = vec![[0u8; 3]; FLI_WIDTH * MULTICOLOR_HEIGHT];
        decode_fli_frame(source, 0x2012, 0x12, 0x4012, 0, 0, &mut frame1);
        decode_fli_frame(source, 0x63FA, 0x43FA, 0x4012, 0, -1, &mut frame2);

        let mut row = vec![0u8; FLI_WIDTH * 3];
        for y in 0..MULTICOLOR_HEIGHT {
            for x in 0..FLI_WIDTH {
                let rgb = blend_rgb(frame1[y * FLI_WIDTH + x], frame2[y * FLI_WIDTH + x]);
                row[x * 3..x * 3 + 3].copy_from_slice(&rgb);
            }
            surface.write_pixels(0, y as u32, &row);
        }
        Ok(())
    }
}

const DRAZLACE_SIGNATURE: &[u8] = b"DRAZLACE! 1.0";
const DRAZLACE_UNPACKED_SIZE: usize = 18242;

fn has_drazlace_signature(data: &[u8]) -> bool {
    data.len() >= 2 + DRAZLACE_SIGNATURE.len()
        && &data[2..2 + DRAZLACE_SIGNATURE.len()] == DRAZLACE_SIGNATURE
}

pub struct DrazlaceDecoder;

impl Decoder for DrazlaceDecoder {
    fn name(&self) -> &'static str {
        "drazlace"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["drl"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() == DRAZLACE_UNPACKED_SIZE || has_drazlace_signature(data)
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(Error::TruncatedData("DrazLace file is empty".into()));
        }

        let decompressed;
        let source = if has_drazlace_signature(data) {
            if data.len() < 17 {
                return Err(Error::TruncatedData(
                    "Failed to decompress DrazLace data".into(),
                ));
            }
            decompressed = decompress_drp(data, data[15], 16, 2, DRAZLACE_UNPACKED_SIZE)
                .ok_or_else(|| {
                    Error::TruncatedData("Failed to decompress DrazLace data".into())
                })?;
            decompressed.as_slice()
        } else if data.len() == DRAZLACE_UNPACKED_SIZE {
            data
        } else {
            return Err(Error::InvalidFormat(
                "Unrecognized DrazLace file format".into(),
            ));
        };

        // Shift selects static (0) or one-pixel (1) interlace.
        let shift = source[0x2744];
        if shift > 1 {
            return Err(Error::InvalidFormat("Invalid DrazLace shift value".into()));
        }
        check_multicolor_limits(options)?;
        alloc_rgb(surface, MULTICOLOR_WIDTH, MULTICOLOR_HEIGHT)?;

        let background = source[0x2742];
        let mut row = vec![0u8; MULTICOLOR_WIDTH * 3];
        for y in 0..MULTICOLOR_HEIGHT {
            for x in 0..MULTICOLOR_WIDTH {
                let a = multicolor_pixel(source, 0x802, 0x402, 2, background, x as i32, y, 0);
                let b = multicolor_pixel(
                    source,
                    0x2802,
                    0x402,
                    2,
                    background,
                    x as i32,
                    y,
                    -i32::from(shift),
                );
                let rgb = blend_rgb(palette_rgb(a), palette_rgb(b));
                row[x * 3..x * 3 + 3].copy_from_slice(&rgb);
            }
            surface.write_pixels(0, y as u32, &row);
        }
        Ok(())
    }
}

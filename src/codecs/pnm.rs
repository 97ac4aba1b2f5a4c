//! PNM (portable anymap) decoder: P1-P6, ASCII and binary variants.
//!
//! All variants decode to RGB888. PBM follows the format's inverted convention
//! (1 = black), and 16-bit binary samples are big-endian, scaled by maxval.

use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

struct PnmInfo {
    kind: u8,
    width: u32,
    height: u32,
    maxval: u32,
    data_offset: usize,
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Parser { data, pos: 0 }
    }

    fn skip_whitespace_and_comments(&mut self) -> bool {
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'#' => {
                    while self.pos < self.data.len() && self.data[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                    if self.pos < self.data.len() {
                        self.pos += 1;
                    }
                }
                c if c.is_ascii_whitespace() => self.pos += 1,
                _ => return true,
            }
        }
        false
    }

    fn parse_int(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u64 = 0;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            value = value * 10 + (self.data[self.pos] - b'0') as u64;
            if value > u32::MAX as u64 {
                return None;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        Some(value as u32)
    }

    fn parse_header(&mut self) -> Option<PnmInfo> {
        if self.data.len() < 3 || self.data[0] != b'P' {
            return None;
        }
        if !(b'1'..=b'7').contains(&self.data[1]) {
            return None;
        }
        let kind = self.data[1] - b'0';
        self.pos = 2;

        if !self.skip_whitespace_and_comments() {
            return None;
        }
        let width = self.parse_int()?;
        if width == 0 {
            return None;
        }
        if !self.skip_whitespace_and_comments() {
            return None;
        }
        let height = self.parse_int()?;
        if height == 0 {
            return None;
        }

        // PBM (P1/P4) has no maxval field.
        let mut maxval = 1;
        if kind != 1 && kind != 4 {
            if !self.skip_whitespace_and_comments() {
                return None;
            }
            maxval = self.parse_int()?;
            if maxval == 0 || maxval > 65535 {
                return None;
            }
        }

        let is_binary = matches!(kind, 4 | 5 | 6);
        if is_binary {
            // Exactly whitespace before binary data; a '#' byte here is pixel
            // data, not a comment.
            if self.pos >= self.data.len() || !self.data[self.pos].is_ascii_whitespace() {
                return None;
            }
            while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
        } else if !self.skip_whitespace_and_comments() {
            return None;
        }

        Some(PnmInfo {
            kind,
            width,
            height,
            maxval,
            data_offset: self.pos,
        })
    }

    fn next_ascii_value(&mut self) -> Option<u32> {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.parse_int()
    }
}

fn scale(val: u32, maxval: u32) -> u8 {
    (val * 255 / maxval) as u8
}

fn decode_pbm_ascii(parser: &mut Parser<'_>, info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        for x in 0..width {
            while parser.pos < parser.data.len()
                && parser.data[parser.pos].is_ascii_whitespace()
            {
                parser.pos += 1;
            }
            if parser.pos >= parser.data.len() {
                return false;
            }
            // 1 = black, 0 = white
            let val = if parser.data[parser.pos] == b'0' { 255 } else { 0 };
            parser.pos += 1;
            row[x * 3..x * 3 + 3].copy_from_slice(&[val, val, val]);
        }
        surface.write_pixels(0, y, &row);
    }
    true
}

fn decode_pbm_binary(data: &[u8], info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let row_bytes = (width + 7) / 8;
    let mut pos = info.data_offset;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        if pos + row_bytes > data.len() {
            return false;
        }
        for x in 0..width {
            let bit = (data[pos + x / 8] >> (7 - (x % 8))) & 1;
            let val = if bit != 0 { 0 } else { 255 };
            row[x * 3..x * 3 + 3].copy_from_slice(&[val, val, val]);
        }
        surface.write_pixels(0, y, &row);
        pos += row_bytes;
    }
    true
}

fn decode_gray_ascii(parser: &mut Parser<'_>, info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        for x in 0..width {
            let Some(val) = parser.next_ascii_value() else {
                return false;
            };
            let pixel = scale(val, info.maxval);
            row[x * 3..x * 3 + 3].copy_from_slice(&[pixel, pixel, pixel]);
        }
        surface.write_pixels(0, y, &row);
    }
    true
}

fn decode_rgb_ascii(parser: &mut Parser<'_>, info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        for x in 0..width {
            for c in 0..3 {
                let Some(val) = parser.next_ascii_value() else {
                    return false;
                };
                row[x * 3 + c] = scale(val, info.maxval);
            }
        }
        surface.write_pixels(0, y, &row);
    }
    true
}

fn decode_gray_binary(data: &[u8], info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let wide = info.maxval > 255;
    let row_bytes = width * if wide { 2 } else { 1 };
    let mut pos = info.data_offset;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        if pos + row_bytes > data.len() {
            return false;
        }
        for x in 0..width {
            let val = if wide {
                ((data[pos + x * 2] as u32) << 8) | data[pos + x * 2 + 1] as u32
            } else {
                data[pos + x] as u32
            };
            let pixel = scale(val, info.maxval);
            row[x * 3..x * 3 + 3].copy_from_slice(&[pixel, pixel, pixel]);
        }
        surface.write_pixels(0, y, &row);
        pos += row_bytes;
    }
    true
}

fn decode_rgb_binary(data: &[u8], info: &PnmInfo, surface: &mut dyn Surface) -> bool {
    let width = info.width as usize;
    let wide = info.maxval > 255;
    let row_bytes = width * if wide { 6 } else { 3 };
    let mut pos = info.data_offset;
    let mut row = vec![0u8; width * 3];
    for y in 0..info.height {
        if pos + row_bytes > data.len() {
            return false;
        }
        for x in 0..width {
            for c in 0..3 {
                let val = if wide {
                    let idx = pos + x * 6 + c * 2;
                    ((data[idx] as u32) << 8) | data[idx + 1] as u32
                } else {
                    data[pos + x * 3 + c] as u32
                };
                row[x * 3 + c] = scale(val, info.maxval);
            }
        }
        surface.write_pixels(0, y, &row);
        pos += row_bytes;
    }
    true
}

pub struct PnmDecoder;

impl Decoder for PnmDecoder {
    fn name(&self) -> &'static str {
        "pnm"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ppm", "pgm", "pbm", "pnm"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 3
            && data[0] == b'P'
            && (b'1'..=b'6').contains(&data[1])
            && data[2].is_ascii_whitespace()
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid PNM file".into()));
        }

        let mut parser = Parser::new(data);
        let info = parser
            .parse_header()
            .ok_or_else(|| Error::InvalidFormat("Failed to parse PNM header".into()))?;

        validate_dimensions(info.width, info.height, options)?;

        if !surface.set_size(info.width, info.height, PixelFormat::Rgb888) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let ok = match info.kind {
            1 => decode_pbm_ascii(&mut parser, &info, surface),
            2 => decode_gray_ascii(&mut parser, &info, surface),
            3 => decode_rgb_ascii(&mut parser, &info, surface),
            4 => decode_pbm_binary(data, &info, surface),
            5 => decode_gray_binary(data, &info, surface),
            6 => decode_rgb_binary(data, &info, surface),
            kind => {
                return Err(Error::UnsupportedEncoding(format!(
                    "Unsupported PNM type: P{kind}"
                )))
            }
        };

        if !ok {
            return Err(Error::TruncatedData(
                "Failed to decode PNM pixel data".into(),
            ));
        }
        Ok(())
    }
}

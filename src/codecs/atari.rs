//! Atari ST picture formats: NEOchrome, DEGAS, Doodle, Crack Art, Tiny
//! Stuff, Spectrum 512 and Photochrome.
//!
//! All of these store interleaved 16-bit bitplane words with 9-bit (ST) or
//! 12-bit (STE) palette entries. Spectrum 512 and Photochrome switch
//! palettes three times per scanline and decode straight to RGB; the rest
//! produce indexed surfaces.

use crate::bytes::{read_be16, read_be32};
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::palette::atarist_color_to_rgb;
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

const NEO_FILE_SIZE: usize = 32128;
const NEO_HEADER_SIZE: usize = 128;
const DEGAS_STANDARD_SIZE: usize = 32034;
const DEGAS_ELITE_SIZE: usize = 32066;
const DEGAS_COMPRESSED: u8 = 0x80;

/// Width, height, bitplane count and color count for an ST resolution
/// (0 = low, 1 = medium, 2 = high).
fn st_mode(resolution: u8) -> Option<(u32, u32, usize, usize)> {
    match resolution {
        0 => Some((320, 200, 4, 16)),
        1 => Some((640, 200, 2, 4)),
        2 => Some((640, 400, 1, 2)),
        _ => None,
    }
}

/// Convert an STE 12-bit color to RGB888. The STE stores the low bit of
/// each 4-bit component in bit 3, so the nibbles have to be reshuffled
/// before expansion.
fn ste_color_to_rgb(color: u16) -> [u8; 3] {
    let r = (color >> 8) as u32 & 0xFF;
    let gb = color as u32 & 0xFF;
    let mut rgb = ((r & 7) << 17)
        | ((r & 8) << 13)
        | ((gb & 112) << 5)
        | ((gb & 135) << 1)
        | ((gb & 8) >> 3);
    rgb = (rgb << 4) | rgb;
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8]
}

/// Whether any entry in a run of big-endian palette words uses the STE
/// extended bits.
fn is_ste_palette(palette: &[u8]) -> bool {
    palette
        .chunks_exact(2)
        .any(|pair| (pair[0] & 8) != 0 || (pair[1] & 136) != 0)
}

/// Set an indexed surface's palette from big-endian ST color words.
fn write_st_palette(surface: &mut dyn Surface, data: &[u8], offset: usize, colors: usize) {
    let mut palette = vec![0u8; colors * 3];
    for i in 0..colors {
        let rgb = atarist_color_to_rgb(read_be16(data, offset + i * 2));
        palette[i * 3..i * 3 + 3].copy_from_slice(&rgb);
    }
    surface.set_palette_size(colors);
    surface.write_palette(0, &palette);
}

/// Deinterleave ST bitplane words into chunky indexed pixels. Each group of
/// 16 pixels is stored as `bitplanes` consecutive big-endian words.
fn decode_st_bitplanes(
    src: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    bitplanes: usize,
) -> Vec<u8> {
    let mut pixels = vec![0u8; width * height];
    for y in 0..height {
        let row = &src[y * stride..y * stride + stride];
        let out = &mut pixels[y * width..(y + 1) * width];
        for (x, pixel) in out.iter_mut().enumerate() {
            let base = (x / 16) * bitplanes * 2;
            let bit = 15 - (x % 16);
            for plane in 0..bitplanes {
                let word = read_be16(row, base + plane * 2);
                if word & (1 << bit) != 0 {
                    *pixel |= 1 << plane;
                }
            }
        }
    }
    pixels
}

fn write_indexed_rows(surface: &mut dyn Surface, pixels: &[u8], width: usize, height: usize) {
    for y in 0..height {
        surface.write_pixels(0, y as u32, &pixels[y * width..(y + 1) * width]);
    }
}

/// PackBits RLE stream used by compressed DEGAS files.
struct PackBitsReader<'a> {
    data: &'a [u8],
    pos: usize,
    repeat_count: usize,
    repeat_value: Option<u8>,
}

impl<'a> PackBitsReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        PackBitsReader {
            data,
            pos: 0,
            repeat_count: 0,
            repeat_value: None,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_rle(&mut self) -> Option<u8> {
        while self.repeat_count == 0 {
            let b = self.read_byte()?;
            if b < 128 {
                // Literal run: b+1 bytes follow.
                self.repeat_count = b as usize + 1;
                self.repeat_value = None;
            } else if b > 128 {
                // Repeat the next byte 257-b times; 128 is a no-op.
                self.repeat_count = 257 - b as usize;
                self.repeat_value = Some(self.read_byte()?);
            }
        }
        self.repeat_count -= 1;
        match self.repeat_value {
            Some(v) => Some(v),
            None => self.read_byte(),
        }
    }
}

/// Decompress DEGAS Elite PackBits data. The stream holds each bitplane's
/// scanline separately, so the output words are reordered back into the
/// interleaved layout as they arrive.
fn unpack_degas_packbits(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    bitplanes: usize,
) -> bool {
    let mut reader = PackBitsReader::new(src);
    let bytes_per_line = bitplanes * ((width + 15) / 16) * 2;

    for y in 0..height {
        for bitplane in 0..bitplanes {
            let mut w = bitplane * 2;
            while w < bytes_per_line {
                for x in 0..2 {
                    let Some(b) = reader.read_rle() else {
                        return false;
                    };
                    dst[y * bytes_per_line + w + x] = b;
                }
                w += bitplanes * 2;
            }
        }
    }
    true
}

pub struct NeoDecoder;

impl Decoder for NeoDecoder {
    fn name(&self) -> &'static str {
        "neo"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["neo"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() == NEO_FILE_SIZE
            && data[0] == 0
            && data[1] == 0
            && read_be16(data, 2) <= 2
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() != NEO_FILE_SIZE {
            return Err(Error::InvalidFormat("Invalid NEO file size".into()));
        }
        if read_be16(data, 0) != 0 {
            return Err(Error::InvalidFormat("Invalid NEO flag".into()));
        }
        let resolution = read_be16(data, 2);
        let (width, height, bitplanes, colors) = st_mode(resolution as u8)
            .filter(|_| resolution <= 2)
            .ok_or_else(|| Error::UnsupportedVersion("Unknown NEO resolution".into()))?;
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        write_st_palette(surface, data, 4, colors);

        let stride = ((width as usize + 15) / 16) * bitplanes * 2;
        let pixels = decode_st_bitplanes(
            &data[NEO_HEADER_SIZE..],
            stride,
            width as usize,
            height as usize,
            bitplanes,
        );
        write_indexed_rows(surface, &pixels, width as usize, height as usize);
        Ok(())
    }
}

pub struct DegasDecoder;

impl Decoder for DegasDecoder {
    fn name(&self) -> &'static str {
        "degas"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pi1", "pi2", "pi3", "pc1", "pc2", "pc3"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < 34 || data[1] > 2 {
            return false;
        }
        match data[0] {
            0 => matches!(
                data.len(),
                DEGAS_STANDARD_SIZE | DEGAS_ELITE_SIZE | NEO_FILE_SIZE
            ),
            DEGAS_COMPRESSED => true,
            _ => false,
        }
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() < 34 {
            return Err(Error::TruncatedData("DEGAS file too small".into()));
        }
        let compressed = data[0] == DEGAS_COMPRESSED;
        let (width, height, bitplanes, colors) = st_mode(data[1])
            .ok_or_else(|| Error::UnsupportedVersion("Unknown DEGAS resolution".into()))?;
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        write_st_palette(surface, data, 2, colors);

        let stride = ((width as usize + 15) / 16) * bitplanes * 2;
        let mut bitmap = vec![0u8; stride * height as usize];
        if compressed {
            if !unpack_degas_packbits(
                &data[34..],
                &mut bitmap,
                width as usize,
                height as usize,
                bitplanes,
            ) {
                return Err(Error::UnsupportedEncoding(
                    "DEGAS decompression failed".into(),
                ));
            }
        } else {
            if data.len() < 34 + bitmap.len() {
                return Err(Error::TruncatedData(
                    "DEGAS file too small for bitmap".into(),
                ));
            }
            let len = bitmap.len();
            bitmap.copy_from_slice(&data[34..34 + len]);
        }

        let pixels =
            decode_st_bitplanes(&bitmap, stride, width as usize, height as usize, bitplanes);
        write_indexed_rows(surface, &pixels, width as usize, height as usize);
        Ok(())
    }
}

pub struct DoodleStDecoder;

impl Decoder for DoodleStDecoder {
    fn name(&self) -> &'static str {
        "doodle"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["doo"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        // 640x400 monochrome dump; Crack Art shares the size but starts
        // with "CA".
        data.len() == 32000 && !(data[0] == b'C' && data[1] == b'A')
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() != 32000 {
            return Err(Error::InvalidFormat("Invalid DOO file size".into()));
        }
        let (width, height) = (640u32, 400u32);
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Rgb888) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let mut row = vec![0u8; width as usize * 3];
        for y in 0..height as usize {
            let src = &data[y * 80..y * 80 + 80];
            for x in 0..width as usize {
                // Set bits are ink.
                let color = if src[x / 8] >> (7 - x % 8) & 1 != 0 {
                    0x00
                } else {
                    0xFF
                };
                row[x * 3..x * 3 + 3].copy_from_slice(&[color, color, color]);
            }
            surface.write_pixels(0, y as u32, &row);
        }
        Ok(())
    }
}

/// Crack Art RLE stream with a per-file escape byte, default fill value and
/// column interleave step.
struct CaStreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    repeat_count: usize,
    repeat_value: u8,
    escape: u8,
    default_value: u8,
    unpack_step: usize,
}

impl<'a> CaStreamReader<'a> {
    fn new(data: &'a [u8], offset: usize) -> Option<Self> {
        if offset + 4 > data.len() {
            return None;
        }
        let mut reader = CaStreamReader {
            data,
            pos: offset + 4,
            repeat_count: 0,
            repeat_value: 0,
            escape: data[offset],
            default_value: data[offset + 1],
            unpack_step: read_be16(data, offset + 2) as usize,
        };
        if reader.unpack_step >= 32000 {
            return None;
        }
        if reader.unpack_step == 0 {
            reader.repeat_count = 32000;
            reader.repeat_value = reader.default_value;
            reader.unpack_step = 1;
        }
        Some(reader)
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_command(&mut self) -> Option<()> {
        let b = self.read_byte()?;
        if b != self.escape {
            self.repeat_count = 1;
            self.repeat_value = b;
            return Some(());
        }
        let c = self.read_byte()?;
        if c == self.escape {
            // Doubled escape encodes the escape byte itself.
            self.repeat_count = 1;
            self.repeat_value = c;
            return Some(());
        }
        let b = self.read_byte()?;
        match c {
            0 => {
                self.repeat_count = b as usize + 1;
                self.repeat_value = self.read_byte()?;
            }
            1 => {
                let c2 = self.read_byte()?;
                self.repeat_count = ((b as usize) << 8) + c2 as usize + 1;
                self.repeat_value = self.read_byte()?;
            }
            2 => {
                if b == 0 {
                    // Fill the rest of the bitmap with the default value.
                    self.repeat_count = 32000;
                } else {
                    let c2 = self.read_byte()?;
                    self.repeat_count = ((b as usize) << 8) + c2 as usize + 1;
                }
                self.repeat_value = self.default_value;
            }
            _ => {
                self.repeat_count = c as usize + 1;
                self.repeat_value = b;
            }
        }
        Some(())
    }

    fn read_rle(&mut self) -> Option<u8> {
        while self.repeat_count == 0 {
            self.read_command()?;
        }
        self.repeat_count -= 1;
        Some(self.repeat_value)
    }

    /// The stream is stored column-major with `unpack_step` columns.
    fn unpack_columns(&mut self, dst: &mut [u8]) -> bool {
        for col in 0..self.unpack_step {
            let mut offset = col;
            while offset < dst.len() {
                let Some(b) = self.read_rle() else {
                    return false;
                };
                dst[offset] = b;
                offset += self.unpack_step;
            }
        }
        true
    }
}

pub struct CrackArtDecoder;

impl Decoder for CrackArtDecoder {
    fn name(&self) -> &'static str {
        "crack_art"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ca1", "ca2", "ca3"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 8
            && data[0] == b'C'
            && data[1] == b'A'
            && data[2] <= 1
            && data[3] <= 2
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() < 8 || data[0] != b'C' || data[1] != b'A' {
            return Err(Error::InvalidFormat("Invalid Crack Art signature".into()));
        }
        let compression = data[2];
        let resolution = data[3];
        if compression > 1 || resolution > 2 {
            return Err(Error::UnsupportedVersion(
                "Unsupported Crack Art compression/resolution".into(),
            ));
        }
        let (width, height, bitplanes, colors) = st_mode(resolution)
            .ok_or_else(|| Error::UnsupportedVersion("Unknown resolution".into()))?;
        // High resolution stores no palette words.
        let content_offset = match resolution {
            0 => 4 + 32,
            1 => 4 + 8,
            _ => 4,
        };
        validate_dimensions(width, height, options)?;

        let mut bitmap = vec![0u8; 32000];
        if compression == 0 {
            if content_offset + 32000 != data.len() {
                return Err(Error::InvalidFormat("Invalid uncompressed CA size".into()));
            }
            bitmap.copy_from_slice(&data[content_offset..content_offset + 32000]);
        } else {
            let unpacked = CaStreamReader::new(data, content_offset)
                .map_or(false, |mut reader| reader.unpack_columns(&mut bitmap));
            if !unpacked {
                return Err(Error::UnsupportedEncoding("CA decompression failed".into()));
            }
        }

        if !surface.set_size(width, height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        write_st_palette(surface, data, 4, colors);

        let stride = ((width as usize + 15) / 16) * bitplanes * 2;
        let pixels =
            decode_st_bitplanes(&bitmap, stride, width as usize, height as usize, bitplanes);
        write_indexed_rows(surface, &pixels, width as usize, height as usize);
        Ok(())
    }
}

/// Tiny Stuff splits the compressed image into a control stream of run
/// commands and a separate stream of 16-bit data words.
struct TnyStreamReader<'a> {
    data: &'a [u8],
    ctrl_pos: usize,
    ctrl_end: usize,
    val_pos: usize,
    val_end: usize,
    repeat_count: usize,
    repeat_value: Option<u16>,
}

impl<'a> TnyStreamReader<'a> {
    fn new(data: &'a [u8], ctrl_offset: usize, ctrl_len: usize, val_len: usize) -> Self {
        TnyStreamReader {
            data,
            ctrl_pos: ctrl_offset,
            ctrl_end: ctrl_offset + ctrl_len,
            val_pos: ctrl_offset + ctrl_len,
            val_end: ctrl_offset + ctrl_len + val_len,
            repeat_count: 0,
            repeat_value: None,
        }
    }

    fn read_ctrl_byte(&mut self) -> Option<u8> {
        if self.ctrl_pos >= self.ctrl_end {
            return None;
        }
        let b = *self.data.get(self.ctrl_pos)?;
        self.ctrl_pos += 1;
        Some(b)
    }

    fn read_value(&mut self) -> Option<u16> {
        if self.val_pos + 1 >= self.val_end || self.val_pos + 1 >= self.data.len() {
            return None;
        }
        let value = read_be16(self.data, self.val_pos);
        self.val_pos += 2;
        Some(value)
    }

    fn read_command(&mut self) -> Option<()> {
        let b = self.read_ctrl_byte()?;
        if b < 128 {
            if b <= 1 {
                // 0 and 1 carry a 16-bit count in the control stream.
                if self.ctrl_pos + 1 >= self.ctrl_end {
                    return None;
                }
                self.repeat_count = read_be16(self.data, self.ctrl_pos) as usize;
                self.ctrl_pos += 2;
            } else {
                self.repeat_count = b as usize;
            }
            self.repeat_value = if b == 1 { None } else { Some(self.read_value()?) };
        } else {
            self.repeat_count = 256 - b as usize;
            self.repeat_value = None;
        }
        Some(())
    }

    fn read_rle(&mut self) -> Option<u16> {
        while self.repeat_count == 0 {
            self.read_command()?;
        }
        self.repeat_count -= 1;
        match self.repeat_value {
            Some(v) => Some(v),
            None => self.read_value(),
        }
    }
}

pub struct TinyStuffDecoder;

impl TinyStuffDecoder {
    fn stream_lengths(data: &[u8], content_offset: usize) -> (usize, usize) {
        let control = read_be16(data, content_offset + 33) as usize;
        let value = (read_be16(data, content_offset + 35) as usize) << 1;
        (control, value)
    }
}

impl Decoder for TinyStuffDecoder {
    fn name(&self) -> &'static str {
        "tiny_stuff"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tn1", "tn2", "tn3"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < 42 || data[0] > 5 {
            return false;
        }
        // Modes 3-5 prepend a 4-byte animation header.
        let content_offset = if data[0] > 2 { 4 } else { 0 };
        let (control_length, value_length) = Self::stream_lengths(data, content_offset);
        let expected = content_offset + 37 + control_length + value_length;
        // Allow a little padding after the streams.
        data.len() >= expected && data.len() <= expected + 16
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() < 42 {
            return Err(Error::TruncatedData("TNY file too small".into()));
        }
        let mut mode = data[0];
        let content_offset = if mode > 2 {
            if mode > 5 {
                return Err(Error::UnsupportedVersion("Invalid TNY mode".into()));
            }
            mode -= 3;
            4
        } else {
            0
        };

        let (control_length, value_length) = Self::stream_lengths(data, content_offset);
        if content_offset + 37 + control_length + value_length > data.len() {
            return Err(Error::TruncatedData("TNY file truncated".into()));
        }

        let mut reader =
            TnyStreamReader::new(data, content_offset + 37, control_length, value_length);

        // The stream covers bitplanes 0, 2, 4 and 6 column by column.
        let mut bitmap = vec![0u8; 32000];
        for bitplane in (0..8).step_by(2) {
            for x in (bitplane..160).step_by(8) {
                for y in 0..200 {
                    let offset = y * 160 + x;
                    let word = reader.read_rle().ok_or_else(|| {
                        Error::UnsupportedEncoding("TNY decompression failed".into())
                    })?;
                    bitmap[offset] = (word >> 8) as u8;
                    bitmap[offset + 1] = word as u8;
                }
            }
        }

        let (width, height, bitplanes, colors) = st_mode(mode)
            .ok_or_else(|| Error::UnsupportedVersion("Unknown resolution".into()))?;
        validate_dimensions(width, height, options)?;

        if !surface.set_size(width, height, PixelFormat::Indexed8) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }
        write_st_palette(surface, data, content_offset + 1, colors);

        let stride = ((width as usize + 15) / 16) * bitplanes * 2;
        let pixels =
            decode_st_bitplanes(&bitmap, stride, width as usize, height as usize, bitplanes);
        write_indexed_rows(surface, &pixels, width as usize, height as usize);
        Ok(())
    }
}

/// Read one pixel from the Spectrum 512 interleaved bitmap. `pixels_offset`
/// is the linear pixel index; pairs of bitplane words are stored 8 bytes
/// apart.
fn spectrum512_pixel(bitmap: &[u8], bitmap_offset: usize, pixels_offset: usize) -> usize {
    let idx = pixels_offset >> 3;
    let base = bitmap_offset + (idx & !1) * 4 + (idx & 1);
    let bit = !pixels_offset & 7;
    let mut pixel = 0;
    for plane in (0..4).rev() {
        pixel = (pixel << 1) | ((bitmap[base + plane * 2] >> bit) & 1) as usize;
    }
    pixel
}

/// SPC PackBits variant (repeat counts run to 258-b).
struct SpcStreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    repeat_count: usize,
    repeat_value: Option<u8>,
}

impl<'a> SpcStreamReader<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        SpcStreamReader {
            data,
            pos: offset,
            repeat_count: 0,
            repeat_value: None,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_rle(&mut self) -> Option<u8> {
        while self.repeat_count == 0 {
            let b = self.read_byte()?;
            if b < 128 {
                self.repeat_count = b as usize + 1;
                self.repeat_value = None;
            } else {
                self.repeat_count = 258 - b as usize;
                self.repeat_value = Some(self.read_byte()?);
            }
        }
        self.repeat_count -= 1;
        match self.repeat_value {
            Some(v) => Some(v),
            None => self.read_byte(),
        }
    }

    fn unpack_words(&mut self, dst: &mut [u8], offset: usize, step: usize, end: usize) -> bool {
        let mut i = offset;
        while i < end {
            let (Some(hi), Some(lo)) = (self.read_rle(), self.read_rle()) else {
                return false;
            };
            dst[i] = hi;
            dst[i + 1] = lo;
            i += step;
        }
        true
    }
}

pub struct Spectrum512Decoder;

impl Decoder for Spectrum512Decoder {
    fn name(&self) -> &'static str {
        "spectrum512"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["spu", "spc"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        // SPU is a fixed-size dump; SPC carries a signature.
        data.len() == 51104 || (data.len() >= 12 && data[0] == b'S' && data[1] == b'P')
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        let (width, height) = (320u32, 199u32);
        validate_dimensions(width, height, options)?;

        let mut unpacked = vec![0u8; 51104];
        let is_spc = data.len() >= 12 && data[0] == b'S' && data[1] == b'P';

        if is_spc {
            let mut reader = SpcStreamReader::new(data, 12);
            for bitplane in (0..8).step_by(2) {
                if !reader.unpack_words(&mut unpacked, 160 + bitplane, 8, 32000) {
                    return Err(Error::UnsupportedEncoding(
                        "SPC bitmap decompression failed".into(),
                    ));
                }
            }

            let palette_offset = 12usize.wrapping_add(read_be32(data, 4) as usize);
            if palette_offset < 12 || palette_offset >= data.len() {
                return Err(Error::InvalidFormat("Invalid SPC palette offset".into()));
            }

            // Each scanline palette is a 16-bit presence mask followed by
            // the color words for set bits; clear bits mean black.
            let mut pos = palette_offset;
            let mut unpacked_offset = 32000;
            while unpacked_offset < 51104 {
                if pos + 1 >= data.len() {
                    return Err(Error::TruncatedData("SPC palette truncated".into()));
                }
                let got = (((data[pos] & 0x7F) as u16) << 8) | data[pos + 1] as u16;
                pos += 2;
                for i in 0..16 {
                    if got >> i & 1 != 0 {
                        if pos + 1 >= data.len() {
                            return Err(Error::TruncatedData("SPC palette truncated".into()));
                        }
                        unpacked[unpacked_offset] = data[pos];
                        unpacked[unpacked_offset + 1] = data[pos + 1];
                        pos += 2;
                    }
                    unpacked_offset += 2;
                }
            }
        } else if data.len() == 51104 {
            unpacked.copy_from_slice(data);
        } else {
            return Err(Error::InvalidFormat("Invalid Spectrum 512 format".into()));
        }

        if !surface.set_size(width, height, PixelFormat::Rgb888) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        // Three palettes of 16 colors per scanline; which one applies
        // depends on the pixel's x position relative to the raster reload.
        let mut row = vec![0u8; width as usize * 3];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let mut c = spectrum512_pixel(&unpacked, 160, y * 320 + x);
                let x1 = c * 10 + 1 - (c & 1) * 6;
                if x >= x1 + 160 {
                    c += 32;
                } else if x >= x1 {
                    c += 16;
                }
                let st_color = read_be16(&unpacked, 32000 + y * 96 + c * 2);
                row[x * 3..x * 3 + 3].copy_from_slice(&atarist_color_to_rgb(st_color));
            }
            surface.write_pixels(0, y as u32, &row);
        }
        Ok(())
    }
}

/// Read one pixel from four separated bitplanes laid out `plane_stride`
/// bytes apart.
fn st_low_separate_bitplanes(data: &[u8], offset: usize, plane_stride: usize, x: usize) -> usize {
    let byte_idx = x >> 3;
    let bit = !x & 7;
    let mut pixel = 0;
    for plane in (0..4).rev() {
        let byte = data[offset + byte_idx + plane * plane_stride];
        pixel = (pixel << 1) | ((byte >> bit) & 1) as usize;
    }
    pixel
}

const PCS_UNPACKED_LENGTH: usize = 32000 + (199 * 3 + 1) * 32;

/// Photochrome block stream: each block announces its command count, and
/// the bitmap block carries byte values while the palette block carries
/// 16-bit words.
struct PcsStreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    repeat_count: usize,
    repeat_value: Option<u16>,
    command_count: usize,
    is_palette: bool,
}

impl<'a> PcsStreamReader<'a> {
    fn new(data: &'a [u8], offset: usize) -> Self {
        PcsStreamReader {
            data,
            pos: offset,
            repeat_count: 0,
            repeat_value: None,
            command_count: 0,
            is_palette: false,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn read_value(&mut self) -> Option<u16> {
        if !self.is_palette {
            return self.read_byte().map(u16::from);
        }
        if self.pos + 1 >= self.data.len() {
            return None;
        }
        let value = read_be16(self.data, self.pos);
        self.pos += 2;
        Some(value)
    }

    fn read_command(&mut self) -> Option<()> {
        if self.command_count == 0 {
            return None;
        }
        self.command_count -= 1;

        let b = self.read_byte()?;
        if b < 128 {
            if b <= 1 {
                if self.pos + 1 >= self.data.len() {
                    return None;
                }
                self.repeat_count = read_be16(self.data, self.pos) as usize;
                self.pos += 2;
            } else {
                self.repeat_count = b as usize;
            }
            self.repeat_value = if b == 1 { None } else { Some(self.read_value()?) };
        } else {
            self.repeat_count = 256 - b as usize;
            self.repeat_value = None;
        }
        Some(())
    }

    fn read_rle(&mut self) -> Option<u16> {
        while self.repeat_count == 0 {
            self.read_command()?;
        }
        self.repeat_count -= 1;
        match self.repeat_value {
            Some(v) => Some(v),
            None => self.read_value(),
        }
    }

    fn start_block(&mut self) -> Option<()> {
        if self.pos + 1 >= self.data.len() {
            return None;
        }
        self.command_count = read_be16(self.data, self.pos) as usize;
        self.pos += 2;
        Some(())
    }

    fn end_block(&mut self) {
        while self.repeat_count > 0 || self.command_count > 0 {
            if self.read_rle().is_none() {
                break;
            }
        }
    }

    fn unpack_pcs(&mut self, unpacked: &mut [u8]) -> Option<()> {
        // Bitmap block, byte values.
        self.is_palette = false;
        self.start_block()?;
        for slot in unpacked.iter_mut().take(32000) {
            *slot = self.read_rle()? as u8;
        }
        self.end_block();

        // Palette block, word values.
        self.is_palette = true;
        self.start_block()?;
        let mut offset = 32000;
        while offset < PCS_UNPACKED_LENGTH {
            let word = self.read_rle()?;
            unpacked[offset] = (word >> 8) as u8;
            unpacked[offset + 1] = word as u8;
            offset += 2;
        }
        self.end_block();
        Some(())
    }
}

pub struct PhotochromeDecoder;

impl Decoder for PhotochromeDecoder {
    fn name(&self) -> &'static str {
        "photochrome"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pcs"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 18 && data[..4] == [0x01, 0x40, 0x00, 0xC8]
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if data.len() < 18 {
            return Err(Error::TruncatedData("PCS file too small".into()));
        }
        if data[..4] != [0x01, 0x40, 0x00, 0xC8] {
            return Err(Error::InvalidFormat("Invalid PCS header".into()));
        }
        let (width, height) = (320u32, 199u32);
        validate_dimensions(width, height, options)?;

        let mut unpacked = vec![0u8; PCS_UNPACKED_LENGTH];
        let mut reader = PcsStreamReader::new(data, 6);
        reader
            .unpack_pcs(&mut unpacked)
            .ok_or_else(|| Error::UnsupportedEncoding("PCS decompression failed".into()))?;

        if !surface.set_size(width, height, PixelFormat::Rgb888) {
            return Err(Error::Internal("Failed to allocate surface".into()));
        }

        let use_ste = is_ste_palette(&unpacked[32000..]);

        let mut row = vec![0u8; width as usize * 3];
        for y in 0..height as usize {
            for x in 0..width as usize {
                // Byte offset into the scanline's palette area, hence the
                // doubled index.
                let mut c = st_low_separate_bitplanes(&unpacked, 40 + y * 40, 8000, x) << 1;
                if x >= c * 2 {
                    if c < 28 {
                        if x >= c * 2 + 76 {
                            if x >= 176 + c * 5 - (c & 2) * 3 {
                                c += 32;
                            }
                            c += 32;
                        }
                    } else if x >= c * 2 + 92 {
                        c += 32;
                    }
                    c += 32;
                }
                let st_color = read_be16(&unpacked, 32000 + y * 96 + c);
                let rgb = if use_ste {
                    ste_color_to_rgb(st_color)
                } else {
                    atarist_color_to_rgb(st_color)
                };
                row[x * 3..x * 3 + 3].copy_from_slice(&rgb);
            }
            surface.write_pixels(0, y as u32, &row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn ste_color_bit_shuffle() {
        // Bit 3 of each component is the LSB on the STE.
        assert_eq!(ste_color_to_rgb(0x0888), [0x11, 0x11, 0x11]);
        assert_eq!(ste_color_to_rgb(0x0777), [0xEE, 0xEE, 0xEE]);
        assert!(is_ste_palette(&[0x08, 0x00]));
        assert!(is_ste_palette(&[0x00, 0x88]));
        assert!(!is_ste_palette(&[0x07, 0x77]));
    }

    #[test]
    fn neo_low_resolution() {
        let mut data = vec![0u8; 32128];
        // Palette: entry 0 white, entry 1 full red.
        data[4..6].copy_from_slice(&[0x07, 0x77]);
        data[6..8].copy_from_slice(&[0x07, 0x00]);
        // First word of plane 0: leftmost pixel set.
        data[128] = 0x80;
        assert!(NeoDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        NeoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (320, 200));
        assert_eq!(surface.pixel(0, 0), &[1]);
        assert_eq!(surface.pixel(1, 0), &[0]);
        assert_eq!(&surface.palette()[3..6], &[0xFF, 0x00, 0x00]);
    }

    #[test]
    fn neo_rejects_bad_resolution() {
        let mut data = vec![0u8; 32128];
        data[3] = 3;
        assert!(!NeoDecoder.sniff(&data));
        let mut surface = MemorySurface::new();
        let err = NeoDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn degas_uncompressed_low() {
        let mut data = vec![0u8; 32034];
        data[1] = 0;
        data[2..4].copy_from_slice(&[0x07, 0x77]);
        assert!(DegasDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        DegasDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (320, 200));
        assert_eq!(surface.pixel(0, 0), &[0]);
        assert_eq!(&surface.palette()[..3], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn degas_compressed_runs() {
        // 0x81 repeats the next byte 128 times; 250 runs fill the bitmap.
        let mut data = vec![0x80, 0x00];
        data.extend_from_slice(&[0u8; 32]);
        data[2] = 0x07;
        data[3] = 0x77;
        for _ in 0..250 {
            data.push(0x81);
            data.push(0x00);
        }
        assert!(DegasDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        DegasDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.pixel(100, 100), &[0]);
    }

    #[test]
    fn degas_truncated_stream_fails() {
        let mut data = vec![0x80, 0x00];
        data.extend_from_slice(&[0u8; 32]);
        data.push(0x81);
        data.push(0x00);
        let mut surface = MemorySurface::new();
        let err = DegasDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn doodle_monochrome() {
        let mut data = vec![0u8; 32000];
        data[0] = 0x80; // leftmost pixel inked
        assert!(DoodleStDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        DoodleStDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (640, 400));
        assert_eq!(surface.pixel(0, 0), &[0x00, 0x00, 0x00]);
        assert_eq!(surface.pixel(1, 0), &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn doodle_rejects_crack_art() {
        let mut data = vec![0u8; 32000];
        data[0] = b'C';
        data[1] = b'A';
        assert!(!DoodleStDecoder.sniff(&data));
    }

    #[test]
    fn crack_art_compressed_default_fill() {
        // High resolution, escape 0x1B, default 0x00, unpack step 1, then
        // the "fill the rest with the default" command.
        let data = [
            b'C', b'A', 1, 2, 0x1B, 0x00, 0x00, 0x01, 0x1B, 0x02, 0x00,
        ];
        assert!(CrackArtDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        CrackArtDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (640, 400));
        assert_eq!(surface.pixel(17, 3), &[0]);
    }

    #[test]
    fn crack_art_uncompressed_size_must_match() {
        let mut data = vec![0u8; 100];
        data[0] = b'C';
        data[1] = b'A';
        data[2] = 0;
        data[3] = 2;
        let mut surface = MemorySurface::new();
        let err = CrackArtDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidFormat);
    }

    #[test]
    fn tiny_stuff_shared_word_run() {
        // Mode 2 (high resolution). Control stream: command 0 with an
        // extended count of 16000 words, all 0x0000.
        let mut data = vec![0u8; 42];
        data[0] = 2;
        data[1] = 0x07;
        data[2] = 0x77;
        data[33] = 0x00;
        data[34] = 3; // control length
        data[35] = 0x00;
        data[36] = 1; // value length in words
        data[37] = 0;
        data[38] = 0x3E;
        data[39] = 0x80; // 16000
        data[40] = 0x00;
        data[41] = 0x00;
        assert!(TinyStuffDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        TinyStuffDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (640, 400));
        assert_eq!(surface.pixel(0, 0), &[0]);
        assert_eq!(&surface.palette()[..3], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn spectrum512_spu_black() {
        let data = vec![0u8; 51104];
        assert!(Spectrum512Decoder.sniff(&data));

        let mut surface = MemorySurface::new();
        Spectrum512Decoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (320, 199));
        assert_eq!(surface.format(), PixelFormat::Rgb888);
        assert_eq!(surface.pixel(200, 100), &[0, 0, 0]);
    }

    #[test]
    fn spectrum512_bad_size_rejected() {
        let data = vec![0u8; 4000];
        assert!(!Spectrum512Decoder.sniff(&data));
        let mut surface = MemorySurface::new();
        let err = Spectrum512Decoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidFormat);
    }

    #[test]
    fn photochrome_compressed_black() {
        let mut data = vec![0x01, 0x40, 0x00, 0xC8, 0, 0];
        // Bitmap block: 1 command, extended run of 32000 zero bytes.
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(&[0x00, 0x7D, 0x00, 0x00]);
        // Palette block: 1 command, extended run of 9568 zero words.
        data.extend_from_slice(&[0x00, 0x01]);
        data.extend_from_slice(&[0x00, 0x25, 0x60, 0x00, 0x00]);
        assert!(PhotochromeDecoder.sniff(&data));

        let mut surface = MemorySurface::new();
        PhotochromeDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (320, 199));
        assert_eq!(surface.pixel(0, 0), &[0, 0, 0]);
        assert_eq!(surface.pixel(319, 198), &[0, 0, 0]);
    }

    #[test]
    fn photochrome_empty_stream_fails() {
        let data = vec![0x01, 0x40, 0x00, 0xC8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut surface = MemorySurface::new();
        let err = PhotochromeDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedEncoding);
    }
}

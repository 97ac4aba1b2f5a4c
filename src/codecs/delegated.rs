//! JPEG, TGA and GIF decoders delegated to the `image` crate.
//!
//! All three share a common decode path that checks the advertised
//! dimensions against the limits before any pixel data is touched, then
//! decodes to RGBA. TGA has no magic number, so its sniff is a structural
//! check of the 18-byte header.

use std::io::Cursor;

use image::io::Reader as ImageReader;
use image::ImageFormat;

use crate::bytes::read_le16;
use crate::error::{Error, Result};
use crate::options::{validate_dimensions, DecodeOptions};
use crate::registry::Decoder;
use crate::surface::{PixelFormat, Surface};

fn decode_common(
    data: &[u8],
    format: ImageFormat,
    surface: &mut dyn Surface,
    options: &DecodeOptions,
) -> Result<()> {
    // Dimension pre-check from the header alone.
    let reader = ImageReader::with_format(Cursor::new(data), format);
    if let Ok((width, height)) = reader.into_dimensions() {
        validate_dimensions(width, height, options)?;
    }

    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|e| Error::InvalidFormat(e.to_string()))?;
    let rgba = decoded.to_rgba8();

    let (width, height) = rgba.dimensions();
    validate_dimensions(width, height, options)?;

    if !surface.set_size(width, height, PixelFormat::Rgba8888) {
        return Err(Error::Internal("Failed to allocate surface".into()));
    }

    let row_bytes = width as usize * 4;
    let pixels = rgba.as_raw();
    for y in 0..height {
        let start = y as usize * row_bytes;
        surface.write_pixels(0, y, &pixels[start..start + row_bytes]);
    }

    Ok(())
}

pub struct JpegDecoder;

impl Decoder for JpegDecoder {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid JPEG file".into()));
        }
        decode_common(data, ImageFormat::Jpeg, surface, options)
    }
}

pub struct TgaDecoder;

impl Decoder for TgaDecoder {
    fn name(&self) -> &'static str {
        "tga"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["tga", "targa"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < 18 {
            return false;
        }
        // image type: 0-3 uncompressed, 9-11 RLE
        let image_type = data[2];
        if image_type > 11 || (image_type > 3 && image_type < 9) {
            return false;
        }
        if data[1] > 1 {
            return false; // color map type
        }
        if !matches!(data[16], 8 | 15 | 16 | 24 | 32) {
            return false;
        }
        let width = read_le16(data, 12);
        let height = read_le16(data, 14);
        width != 0 && height != 0 && width <= 32768 && height <= 32768
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid TGA file".into()));
        }
        decode_common(data, ImageFormat::Tga, surface, options)
    }
}

pub struct GifDecoder;

impl Decoder for GifDecoder {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["gif"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        data.len() >= 6 && (&data[..6] == b"GIF87a" || &data[..6] == b"GIF89a")
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a valid GIF file".into()));
        }
        decode_common(data, ImageFormat::Gif, surface, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn tga_header(width: u16, height: u16, image_type: u8, bpp: u8) -> Vec<u8> {
        let mut data = vec![0u8; 18];
        data[2] = image_type;
        data[12..14].copy_from_slice(&width.to_le_bytes());
        data[14..16].copy_from_slice(&height.to_le_bytes());
        data[16] = bpp;
        data
    }

    #[test]
    fn tga_sniff_is_structural() {
        assert!(TgaDecoder.sniff(&tga_header(4, 4, 2, 24)));
        assert!(TgaDecoder.sniff(&tga_header(4, 4, 10, 32)));
        // invalid image type / bpp / dimensions
        assert!(!TgaDecoder.sniff(&tga_header(4, 4, 5, 24)));
        assert!(!TgaDecoder.sniff(&tga_header(4, 4, 2, 13)));
        assert!(!TgaDecoder.sniff(&tga_header(0, 4, 2, 24)));
    }

    #[test]
    fn jpeg_and_gif_sniff_magic() {
        assert!(JpegDecoder.sniff(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!JpegDecoder.sniff(&[0xFF, 0xD8, 0x00]));
        assert!(GifDecoder.sniff(b"GIF89a trailing"));
        assert!(!GifDecoder.sniff(b"GIF88a"));
    }

    #[test]
    fn uncompressed_tga_decodes() {
        // 1x1 true-color TGA, 24bpp, BGR pixel.
        let mut data = tga_header(1, 1, 2, 24);
        data.extend_from_slice(&[10, 20, 30]);
        let mut surface = MemorySurface::new();
        TgaDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap();
        assert_eq!(surface.format(), PixelFormat::Rgba8888);
        assert_eq!(surface.pixel(0, 0), &[30, 20, 10, 0xFF]);
    }

    #[test]
    fn garbage_jpeg_is_invalid() {
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];
        let mut surface = MemorySurface::new();
        let err = JpegDecoder
            .decode(&data, &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidFormat);
    }
}

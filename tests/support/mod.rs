#![allow(dead_code)]

//! Synthetic fixture builders shared by the integration suites. Each builder
//! produces a minimal but fully valid file for its format.

/// 128-byte PCX header followed by `height` literal scanlines of `fill`.
/// The fill value is masked below 0xC0 so the RLE reader treats it literally.
pub fn pcx_8bit(width: u16, height: u16, fill: u8) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data[0] = 0x0A;
    data[1] = 2; // version without VGA palette tail
    data[2] = 1;
    data[3] = 8;
    data[8..10].copy_from_slice(&(width - 1).to_le_bytes());
    data[10..12].copy_from_slice(&(height - 1).to_le_bytes());
    data[65] = 1;
    data[66..68].copy_from_slice(&width.to_le_bytes());
    for _ in 0..height {
        for _ in 0..width {
            data.push(fill & 0x3F);
        }
    }
    data
}

/// Version 5 PCX with a palette slot but no 0x0C marker, which decodes
/// with the grayscale identity ramp.
pub fn pcx_8bit_grayscale(width: u16, height: u16, fill: u8) -> Vec<u8> {
    let mut data = pcx_8bit(width, height, fill);
    data[1] = 5;
    data.extend_from_slice(&[0u8; 769]);
    data
}

/// QOI file of a single solid color, one QOI_OP_RGB per pixel.
pub fn qoi_solid(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut data = Vec::with_capacity(14 + (width * height) as usize * 4 + 8);
    data.extend_from_slice(b"qoif");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.push(3); // channels
    data.push(0); // sRGB colorspace
    for _ in 0..width * height {
        data.push(0xFE);
        data.extend_from_slice(&rgb);
    }
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    data
}

/// Uncompressed 24-bit BMP, a single pixel of the given color.
pub fn bmp_rgb24_1x1(rgb: [u8; 3]) -> Vec<u8> {
    let mut data = vec![b'B', b'M'];
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&(14u32 + 40).to_le_bytes());
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&24u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    data.extend_from_slice(&[0u8; 20]);
    data.extend_from_slice(&[rgb[2], rgb[1], rgb[0], 0]); // BGR + row pad
    data
}

/// Binary PPM (P6) with the given RGB triples, one row.
pub fn ppm_row(pixels: &[[u8; 3]]) -> Vec<u8> {
    let mut data = format!("P6\n{} 1\n255\n", pixels.len()).into_bytes();
    for px in pixels {
        data.extend_from_slice(px);
    }
    data
}

/// GG-compressed Koala stream expanding to `total` zero bytes.
pub fn gg_zero_stream(load_address: u16, total: usize) -> Vec<u8> {
    let mut data = load_address.to_le_bytes().to_vec();
    let mut remaining = total;
    while remaining > 0 {
        let run = remaining.min(255);
        data.extend_from_slice(&[0xFE, 0x00, run as u8]);
        remaining -= run;
    }
    data
}

/// Uncompressed NEOchrome file, all pixels color 0.
pub fn neo_blank() -> Vec<u8> {
    vec![0u8; 32128]
}

/// Uncompressed DEGAS low-resolution file (PI1 layout).
pub fn degas_uncompressed() -> Vec<u8> {
    vec![0u8; 32034]
}

/// Compressed DEGAS low-resolution file covering the same blank image.
/// Each 0x81 command repeats the following byte 128 times.
pub fn degas_compressed() -> Vec<u8> {
    let mut data = vec![0x80, 0x00];
    data.extend_from_slice(&[0u8; 32]);
    for _ in 0..250 {
        data.push(0x81);
        data.push(0x00);
    }
    data
}

fn row_stride_4byte(width: u32, bits: u32) -> usize {
    ((width * bits + 31) / 32 * 4) as usize
}

/// ICO DIB payload: 40-byte header, 4-entry palette, solid XOR image of
/// `index`, empty AND mask.
pub fn dib_icon(width: u32, height: u32, index: u8) -> Vec<u8> {
    let mut dib = Vec::new();
    dib.extend_from_slice(&40u32.to_le_bytes());
    dib.extend_from_slice(&(width as i32).to_le_bytes());
    dib.extend_from_slice(&((height * 2) as i32).to_le_bytes());
    dib.extend_from_slice(&1u16.to_le_bytes());
    dib.extend_from_slice(&8u16.to_le_bytes());
    dib.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    dib.extend_from_slice(&[0u8; 12]);
    dib.extend_from_slice(&4u32.to_le_bytes());
    dib.extend_from_slice(&0u32.to_le_bytes());
    for i in 0..4u8 {
        dib.extend_from_slice(&[i * 10, i * 20, i * 30, 0]);
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

/// Wraps DIB payloads in an ICO directory.
pub fn ico_file(images: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&(images.len() as u16).to_le_bytes());
    let mut offset = 6 + images.len() * 16;
    for image in images {
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

/// DCX container wrapping already-built PCX pages.
pub fn dcx_file(pages: &[Vec<u8>]) -> Vec<u8> {
    let mut data = 0x3ADE_68B1u32.to_le_bytes().to_vec();
    let header_len = 4 + 1023 * 4 + 4;
    let mut offset = header_len;
    for page in pages {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += page.len();
    }
    data.resize(header_len, 0);
    for page in pages {
        data.extend_from_slice(page);
    }
    data
}

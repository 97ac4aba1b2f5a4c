//! Byte-order readers and small unpacking helpers shared by the decoders.
//!
//! All readers take a slice positioned at the field; callers are responsible
//! for bounds checks (decoders validate sizes before reading).

/// Read a little-endian u16 at `data[offset..]`.
#[inline]
pub fn read_le16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Read a little-endian u32 at `data[offset..]`.
#[inline]
pub fn read_le32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Read a little-endian i32 at `data[offset..]`.
#[inline]
pub fn read_le32_signed(data: &[u8], offset: usize) -> i32 {
    read_le32(data, offset) as i32
}

/// Read a big-endian u16 at `data[offset..]`.
#[inline]
pub fn read_be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Read a big-endian u32 at `data[offset..]`.
#[inline]
pub fn read_be32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Row stride in bytes, padded to a 4-byte boundary (BMP, ICO DIBs).
#[inline]
pub fn row_stride_4byte(width: u32, bits_per_pixel: u32) -> usize {
    (((width as usize) * (bits_per_pixel as usize) + 31) / 32) * 4
}

/// Row stride in bytes, padded to a 2-byte boundary (Sun Raster).
#[inline]
pub fn row_stride_2byte(width: u32, bits_per_pixel: u32) -> usize {
    (((width as usize) * (bits_per_pixel as usize) + 15) / 16) * 2
}

/// Extract pixel `x` from a packed row at 1, 2, 4 or 8 bits per pixel,
/// MSB-first within each byte.
#[inline]
pub fn extract_pixel(row: &[u8], x: usize, bits_per_pixel: u32) -> u8 {
    match bits_per_pixel {
        1 => {
            let byte = row[x / 8];
            (byte >> (7 - (x % 8))) & 0x01
        }
        2 => {
            let byte = row[x / 4];
            (byte >> (6 - (x % 4) * 2)) & 0x03
        }
        4 => {
            let byte = row[x / 2];
            if x % 2 == 0 {
                (byte >> 4) & 0x0F
            } else {
                byte & 0x0F
            }
        }
        _ => row[x],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endian_readers() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_le16(&data, 0), 0x3412);
        assert_eq!(read_be16(&data, 0), 0x1234);
        assert_eq!(read_le32(&data, 0), 0x78563412);
        assert_eq!(read_be32(&data, 0), 0x12345678);
    }

    #[test]
    fn strides() {
        assert_eq!(row_stride_4byte(1, 1), 4);
        assert_eq!(row_stride_4byte(33, 1), 8);
        assert_eq!(row_stride_4byte(10, 24), 32);
        assert_eq!(row_stride_2byte(320, 4), 160);
        assert_eq!(row_stride_2byte(9, 1), 2);
    }

    #[test]
    fn packed_pixels_msb_first() {
        let row = [0b1010_0000u8];
        assert_eq!(extract_pixel(&row, 0, 1), 1);
        assert_eq!(extract_pixel(&row, 1, 1), 0);
        assert_eq!(extract_pixel(&row, 2, 1), 1);
        let row = [0xAB];
        assert_eq!(extract_pixel(&row, 0, 4), 0x0A);
        assert_eq!(extract_pixel(&row, 1, 4), 0x0B);
        let row = [0b11_01_00_10u8];
        assert_eq!(extract_pixel(&row, 0, 2), 3);
        assert_eq!(extract_pixel(&row, 1, 2), 1);
        assert_eq!(extract_pixel(&row, 2, 2), 0);
        assert_eq!(extract_pixel(&row, 3, 2), 2);
    }
}

//! Fixed hardware palettes for the retro platforms the decoders target.
//!
//! All palettes are RGB888 triples. Values come from hardware measurements
//! and the usual community references (Pepto/Colodore for the VIC-II, BIOS
//! defaults for CGA/EGA/VGA).

/// IBM CGA 16-color palette (RGBI). Index 6 is the brown hardware quirk.
pub const CGA_PALETTE: [u8; 16 * 3] = [
    0x00, 0x00, 0x00, // black
    0x00, 0x00, 0xAA, // blue
    0x00, 0xAA, 0x00, // green
    0x00, 0xAA, 0xAA, // cyan
    0xAA, 0x00, 0x00, // red
    0xAA, 0x00, 0xAA, // magenta
    0xAA, 0x55, 0x00, // brown
    0xAA, 0xAA, 0xAA, // light gray
    0x55, 0x55, 0x55, // dark gray
    0x55, 0x55, 0xFF, // light blue
    0x55, 0xFF, 0x55, // light green
    0x55, 0xFF, 0xFF, // light cyan
    0xFF, 0x55, 0x55, // light red
    0xFF, 0x55, 0xFF, // light magenta
    0xFF, 0xFF, 0x55, // yellow
    0xFF, 0xFF, 0xFF, // white
];

/// CGA 320x200 palette 0 (green/red/brown), normal intensity.
pub const CGA_PALETTE0_LOW: [u8; 4 * 3] = [
    0x00, 0x00, 0x00, 0x00, 0xAA, 0x00, 0xAA, 0x00, 0x00, 0xAA, 0x55, 0x00,
];

/// CGA 320x200 palette 0, high intensity.
pub const CGA_PALETTE0_HIGH: [u8; 4 * 3] = [
    0x00, 0x00, 0x00, 0x55, 0xFF, 0x55, 0xFF, 0x55, 0x55, 0xFF, 0xFF, 0x55,
];

/// CGA 320x200 palette 1 (cyan/magenta/gray), normal intensity.
pub const CGA_PALETTE1_LOW: [u8; 4 * 3] = [
    0x00, 0x00, 0x00, 0x00, 0xAA, 0xAA, 0xAA, 0x00, 0xAA, 0xAA, 0xAA, 0xAA,
];

/// CGA 320x200 palette 1, high intensity.
pub const CGA_PALETTE1_HIGH: [u8; 4 * 3] = [
    0x00, 0x00, 0x00, 0x55, 0xFF, 0xFF, 0xFF, 0x55, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// EGA default 16-color palette (matches CGA for compatibility).
pub const EGA_DEFAULT_PALETTE: [u8; 16 * 3] = CGA_PALETTE;

/// Convert a 6-bit EGA color (rgbRGB bit layout) to RGB888.
pub fn ega_color_to_rgb(color: u8) -> [u8; 3] {
    const LEVELS: [u8; 4] = [0x00, 0x55, 0xAA, 0xFF];
    let r = ((color >> 2) & 0x02) | ((color >> 5) & 0x01);
    let g = ((color >> 1) & 0x02) | ((color >> 4) & 0x01);
    let b = (color & 0x02) | ((color >> 3) & 0x01);
    [
        LEVELS[r as usize],
        LEVELS[g as usize],
        LEVELS[b as usize],
    ]
}

/// Full 64-color EGA palette.
pub fn ega_full_palette() -> [u8; 64 * 3] {
    let mut palette = [0u8; 64 * 3];
    for i in 0..64 {
        let rgb = ega_color_to_rgb(i as u8);
        palette[i * 3..i * 3 + 3].copy_from_slice(&rgb);
    }
    palette
}

/// Scale a 6-bit VGA DAC value (0-63) to 8 bits.
pub fn vga_6bit_to_8bit(value: u8) -> u8 {
    (value << 2) | (value >> 4)
}

/// VGA Mode 13h default 256-color palette: CGA block, 16-level gray ramp,
/// 8 hues x 3 saturation levels x 8 intensities, trailing gray fill.
pub fn vga_default_palette() -> [u8; 256 * 3] {
    let mut palette = [0u8; 256 * 3];
    palette[..16 * 3].copy_from_slice(&CGA_PALETTE);

    for i in 0..16u32 {
        let gray = vga_6bit_to_8bit((i * 63 / 15) as u8);
        let base = (16 + i as usize) * 3;
        palette[base] = gray;
        palette[base + 1] = gray;
        palette[base + 2] = gray;
    }

    // Hue definitions in 6-bit RGB at max intensity and saturation.
    const HUES: [[i32; 3]; 8] = [
        [63, 0, 0],   // red
        [63, 31, 0],  // orange
        [63, 63, 0],  // yellow
        [0, 63, 0],   // green
        [0, 63, 63],  // cyan
        [0, 0, 63],   // blue
        [31, 0, 63],  // purple
        [63, 0, 63],  // magenta
    ];

    let mut idx = 32usize;
    for hue in HUES {
        for sat in 0..3i32 {
            for intensity in 0..8i32 {
                if idx >= 256 {
                    break;
                }
                let int_scale = (intensity + 1) * 8;
                let mut r = hue[0] * int_scale / 64;
                let mut g = hue[1] * int_scale / 64;
                let mut b = hue[2] * int_scale / 64;
                if sat > 0 {
                    let gray = (r + g + b) / 3;
                    let sat_factor = if sat == 1 { 2 } else { 4 };
                    r += (gray - r) / sat_factor;
                    g += (gray - g) / sat_factor;
                    b += (gray - b) / sat_factor;
                }
                palette[idx * 3] = vga_6bit_to_8bit(r as u8);
                palette[idx * 3 + 1] = vga_6bit_to_8bit(g as u8);
                palette[idx * 3 + 2] = vga_6bit_to_8bit(b as u8);
                idx += 1;
            }
        }
    }

    while idx < 256 {
        let gray = vga_6bit_to_8bit((((idx - 224) * 63) / 31) as u8);
        palette[idx * 3] = gray;
        palette[idx * 3 + 1] = gray;
        palette[idx * 3 + 2] = gray;
        idx += 1;
    }

    palette
}

/// Commodore 64 VIC-II palette, Pepto measurement values.
pub const C64_PALETTE: [u8; 16 * 3] = [
    0x00, 0x00, 0x00, // black
    0xFF, 0xFF, 0xFF, // white
    0x68, 0x37, 0x2B, // red
    0x70, 0xA4, 0xB2, // cyan
    0x6F, 0x3D, 0x86, // purple
    0x58, 0x8D, 0x43, // green
    0x35, 0x28, 0x79, // blue
    0xB8, 0xC7, 0x6F, // yellow
    0x6F, 0x4F, 0x25, // orange
    0x43, 0x39, 0x00, // brown
    0x9A, 0x67, 0x59, // light red
    0x44, 0x44, 0x44, // dark gray
    0x6C, 0x6C, 0x6C, // medium gray
    0x9A, 0xD2, 0x84, // light green
    0x6C, 0x5E, 0xB5, // light blue
    0x95, 0x95, 0x95, // light gray
];

/// Alternative VIC-II palette, Colodore (2017 revision).
pub const C64_COLODORE_PALETTE: [u8; 16 * 3] = [
    0x00, 0x00, 0x00, // black
    0xFF, 0xFF, 0xFF, // white
    0x81, 0x33, 0x38, // red
    0x75, 0xCE, 0xC8, // cyan
    0x8E, 0x3C, 0x97, // purple
    0x56, 0xAC, 0x4D, // green
    0x2E, 0x2C, 0x9B, // blue
    0xED, 0xF1, 0x71, // yellow
    0x8E, 0x50, 0x29, // orange
    0x55, 0x38, 0x00, // brown
    0xC4, 0x6C, 0x71, // light red
    0x4A, 0x4A, 0x4A, // dark gray
    0x7B, 0x7B, 0x7B, // medium gray
    0xA9, 0xFF, 0x9F, // light green
    0x70, 0x6D, 0xEB, // light blue
    0xB2, 0xB2, 0xB2, // light gray
];

/// Convert a 12-bit Amiga OCS/ECS color word (0x0RGB) to RGB888.
pub fn amiga_color_to_rgb(color: u16) -> [u8; 3] {
    let r = ((color >> 8) & 0x0F) as u8;
    let g = ((color >> 4) & 0x0F) as u8;
    let b = (color & 0x0F) as u8;
    [(r << 4) | r, (g << 4) | g, (b << 4) | b]
}

/// Amiga Workbench 1.x default 4-color palette.
pub const AMIGA_WB1_PALETTE: [u8; 4 * 3] = [
    0x00, 0x55, 0xAA, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x88, 0x00,
];

/// Amiga Workbench 2.x default 4-color palette.
pub const AMIGA_WB2_PALETTE: [u8; 4 * 3] = [
    0x95, 0x95, 0x95, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x3B, 0x67, 0xA2,
];

/// Amiga Workbench 3.x default 8-color palette (MagicWB style).
pub const AMIGA_WB3_PALETTE: [u8; 8 * 3] = [
    0x95, 0x95, 0x95, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x3B, 0x67, 0xA2, 0x7B, 0x7B, 0x7B,
    0xAF, 0xAF, 0xAF, 0xAA, 0x90, 0x7C, 0xFF, 0xA9, 0x97,
];

/// Classic Deluxe Paint default 32-color palette.
pub const AMIGA_DPAINT_PALETTE: [u8; 32 * 3] = [
    0x00, 0x00, 0x00, // black
    0xFF, 0xFF, 0xFF, // white
    0xFF, 0x00, 0x00, // red
    0x00, 0xFF, 0x00, // green
    0x00, 0x00, 0xFF, // blue
    0xFF, 0xFF, 0x00, // yellow
    0xFF, 0x00, 0xFF, // magenta
    0x00, 0xFF, 0xFF, // cyan
    0xAA, 0x00, 0x00, // dark red
    0x00, 0xAA, 0x00, // dark green
    0x00, 0x00, 0xAA, // dark blue
    0xAA, 0xAA, 0x00, // dark yellow
    0xAA, 0x00, 0xAA, // dark magenta
    0x00, 0xAA, 0xAA, // dark cyan
    0xAA, 0xAA, 0xAA, // light gray
    0x55, 0x55, 0x55, // dark gray
    0xFF, 0xAA, 0xAA, // light red
    0xAA, 0xFF, 0xAA, // light green
    0xAA, 0xAA, 0xFF, // light blue
    0xFF, 0xFF, 0xAA, // light yellow
    0xFF, 0xAA, 0xFF, // light magenta
    0xAA, 0xFF, 0xFF, // light cyan
    0xFF, 0x55, 0x00, // orange
    0x00, 0xFF, 0x55, // spring green
    0x55, 0x00, 0xFF, // violet
    0xFF, 0x55, 0xAA, // pink
    0x55, 0xFF, 0x00, // lime
    0x00, 0x55, 0xFF, // sky blue
    0x88, 0x44, 0x00, // brown
    0x44, 0x88, 0x44, // olive
    0x44, 0x44, 0x88, // navy
    0x88, 0x88, 0x88, // gray
];

/// Convert a 9-bit Atari ST color word (0x0RGB, 3 bits each) to RGB888.
pub fn atarist_color_to_rgb(color: u16) -> [u8; 3] {
    let scale = |v: u8| (v << 5) | (v << 2) | (v >> 1);
    let r = ((color >> 8) & 0x07) as u8;
    let g = ((color >> 4) & 0x07) as u8;
    let b = (color & 0x07) as u8;
    [scale(r), scale(g), scale(b)]
}

/// Atari ST default low-res 16-color palette.
pub const ATARIST_DEFAULT_PALETTE: [u8; 16 * 3] = [
    0xFF, 0xFF, 0xFF, // white
    0xFF, 0x00, 0x00, // red
    0x00, 0xFF, 0x00, // green
    0xFF, 0xFF, 0x00, // yellow
    0x00, 0x00, 0xFF, // blue
    0xFF, 0x00, 0xFF, // magenta
    0x00, 0xFF, 0xFF, // cyan
    0xB6, 0xB6, 0xB6, // light gray
    0x49, 0x49, 0x49, // dark gray
    0x92, 0x00, 0x00, // dark red
    0x00, 0x92, 0x00, // dark green
    0x92, 0x92, 0x00, // dark yellow
    0x00, 0x00, 0x92, // dark blue
    0x92, 0x00, 0x92, // dark magenta
    0x00, 0x92, 0x92, // dark cyan
    0x00, 0x00, 0x00, // black
];

/// N-level grayscale ramp as RGB triples.
pub fn grayscale_palette(levels: usize) -> Vec<u8> {
    let mut palette = Vec::with_capacity(levels * 3);
    for i in 0..levels {
        let gray = if levels > 1 {
            ((i * 255) / (levels - 1)) as u8
        } else {
            0
        };
        palette.extend_from_slice(&[gray, gray, gray]);
    }
    palette
}

/// Two-entry black/white palette.
pub const GRAYSCALE_1BIT_PALETTE: [u8; 2 * 3] = [0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ega_levels() {
        assert_eq!(ega_color_to_rgb(0), [0, 0, 0]);
        // 0x3F = all six bits set = white
        assert_eq!(ega_color_to_rgb(0x3F), [0xFF, 0xFF, 0xFF]);
        // High red bit only = 0xAA red
        assert_eq!(ega_color_to_rgb(0x04), [0xAA, 0x00, 0x00]);
    }

    #[test]
    fn vga_dac_scale_endpoints() {
        assert_eq!(vga_6bit_to_8bit(0), 0);
        assert_eq!(vga_6bit_to_8bit(63), 255);
        assert_eq!(vga_6bit_to_8bit(32), 0x82);
    }

    #[test]
    fn vga_default_layout() {
        let pal = vga_default_palette();
        assert_eq!(&pal[..16 * 3], &CGA_PALETTE[..]);
        // Gray ramp endpoints
        assert_eq!(&pal[16 * 3..16 * 3 + 3], &[0, 0, 0]);
        assert_eq!(&pal[31 * 3..31 * 3 + 3], &[255, 255, 255]);
        // First hue block entry: red at lowest intensity (6-bit 7 -> 0x1C)
        assert_eq!(pal[32 * 3], vga_6bit_to_8bit((63u16 * 8 / 64) as u8));
    }

    #[test]
    fn color_word_conversions() {
        assert_eq!(amiga_color_to_rgb(0x0FFF), [0xFF, 0xFF, 0xFF]);
        assert_eq!(amiga_color_to_rgb(0x0F00), [0xFF, 0x00, 0x00]);
        assert_eq!(atarist_color_to_rgb(0x0777), [0xFF, 0xFF, 0xFF]);
        assert_eq!(atarist_color_to_rgb(0x0070), [0x00, 0xFF, 0x00]);
    }

    #[test]
    fn grayscale_ramp() {
        let pal = grayscale_palette(2);
        assert_eq!(pal, vec![0, 0, 0, 255, 255, 255]);
        let pal = grayscale_palette(256);
        assert_eq!(&pal[255 * 3..], &[255, 255, 255]);
    }
}

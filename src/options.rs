//! Decode configuration and dimension-limit enforcement.

use crate::error::{Error, Result};

/// Default maximum dimension applied when [`DecodeOptions`] leaves a limit
/// unset.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Default maximum dimension for icon decoders (ICO, CUR, executable icons).
pub const DEFAULT_ICON_MAX_DIMENSION: u32 = 256;

/// Options accepted by every decoder.
///
/// A limit of `0` means "use the built-in default" (16384, or 256 on icon
/// paths). Limits are enforced before any pixel memory is allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub max_width: u32,
    pub max_height: u32,
}

impl DecodeOptions {
    /// Options with explicit dimension limits.
    pub fn with_limits(max_width: u32, max_height: u32) -> Self {
        DecodeOptions {
            max_width,
            max_height,
        }
    }

    /// Effective limits with the standard fallback applied.
    pub fn limits(&self) -> (u32, u32) {
        self.limits_or(DEFAULT_MAX_DIMENSION)
    }

    /// Effective limits with the icon fallback applied.
    pub fn icon_limits(&self) -> (u32, u32) {
        self.limits_or(DEFAULT_ICON_MAX_DIMENSION)
    }

    fn limits_or(&self, fallback: u32) -> (u32, u32) {
        let w = if self.max_width > 0 {
            self.max_width
        } else {
            fallback
        };
        let h = if self.max_height > 0 {
            self.max_height
        } else {
            fallback
        };
        (w, h)
    }
}

/// Check parsed dimensions against the configured limits.
///
/// Must be called before the surface is sized so that oversized images fail
/// without allocating.
pub fn validate_dimensions(width: u32, height: u32, options: &DecodeOptions) -> Result<()> {
    let (max_w, max_h) = options.limits();
    if width > max_w || height > max_h {
        return Err(Error::DimensionsExceeded {
            width,
            height,
            max_width: max_w,
            max_height: max_h,
        });
    }
    Ok(())
}

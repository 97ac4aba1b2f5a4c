//! # retropix
//!
//! Decoders for retro and legacy raster image formats, from PCX and IFF ILBM
//! to Koala Painter and DEGAS Elite, all producing a uniform in-memory
//! surface.
//!
//! - **Formats**: ~25 decoders covering DOS (PCX, DCX, BMP, MSP, Pictor),
//!   Unix workstations (SGI, Sun Raster, PNM), Atari ST (NEO, DEGAS,
//!   Crack Art, Tiny Stuff, Spectrum 512, Photochrome), Commodore 64
//!   (Koala, Doodle, hires, Funpaint II, DrazLace and friends), Amiga IFF,
//!   QOI, ICO/CUR, and icon extraction from PE executables.
//! - **Uniform output**: every decoder writes a [`Surface`] in `Indexed8`,
//!   `Rgb888` or `Rgba8888`; containers additionally report [`SubRect`]s.
//! - **Safety**: dimension limits are enforced before allocation, truncated
//!   input is an error rather than a panic, and expanding decompressors
//!   carry a compression-ratio guard.
//! - **Re-encoding**: any decoded surface can be written back out as PNG via
//!   [`encode_png`] / [`save_png`].
//!
//! ## Quickstart
//!
//! ```rust
//! use retropix::{DecodeOptions, MemorySurface, Registry};
//!
//! # fn main() -> retropix::Result<()> {
//! // A 1x1 QOI image holding a single red pixel.
//! let mut data = b"qoif".to_vec();
//! data.extend_from_slice(&1u32.to_be_bytes());
//! data.extend_from_slice(&1u32.to_be_bytes());
//! data.extend_from_slice(&[3, 0]); // RGB, sRGB
//! data.extend_from_slice(&[0xFE, 255, 0, 0]); // QOI_OP_RGB
//! data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]); // end marker
//!
//! let registry = Registry::with_builtin();
//! let mut surface = MemorySurface::new();
//! registry.decode(&data, &mut surface, &DecodeOptions::default())?;
//! assert_eq!((surface.width(), surface.height()), (1, 1));
//! assert_eq!(surface.pixel(0, 0), &[255, 0, 0]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Forcing a specific decoder
//!
//! ```rust
//! use retropix::{DecodeOptions, MemorySurface, Registry};
//!
//! let registry = Registry::with_builtin();
//! let mut surface = MemorySurface::new();
//! // Headerless or ambiguous data can name its codec explicitly.
//! let result = registry.decode_as("pcx", &[0u8; 4], &mut surface, &DecodeOptions::default());
//! assert!(result.is_err()); // not a PCX, but it was routed to the PCX decoder
//! ```
//!
//! ### Re-encoding to PNG
//!
//! ```rust
//! use retropix::{encode_png, MemorySurface, PixelFormat, Surface};
//!
//! # fn main() -> retropix::Result<()> {
//! let mut surface = MemorySurface::new();
//! assert!(surface.set_size(2, 1, PixelFormat::Rgb888));
//! surface.write_pixels(0, 0, &[255, 0, 0, 0, 255, 0]);
//! let png_bytes = encode_png(&surface)?;
//! assert_eq!(&png_bytes[1..4], b"PNG");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//! - `delegated` (default): JPEG, TGA and GIF decoding via the `image` crate.
//! - `exe-icons` (default): icon extraction from PE executables via `pelite`.
//!
//! ## Notes
//! - Sniffing order is part of the API contract: [`Registry::with_builtin`]
//!   consults strongly-magic formats before the heuristic size-based ones.
//! - EGA and Mode X raw dumps are headerless and therefore not sniffable;
//!   decode them through [`codecs::ega`] and [`codecs::modex`] directly.

#![forbid(unsafe_code)]

pub mod bytes;
pub mod codecs;
pub mod error;
pub mod options;
pub mod palette;
pub mod registry;
pub mod surface;

pub use codecs::png::{encode_png, save_png};
pub use error::{Error, ErrorKind, Result};
pub use options::DecodeOptions;
pub use registry::{Decoder, Registry};
pub use surface::{MemorySurface, PixelFormat, SubRect, SubRectKind, Surface};

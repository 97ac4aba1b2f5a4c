//! Decoder trait and the ordered decoder registry.
//!
//! Registration order matters: [`Registry::decode`] walks the list and the
//! first decoder whose `sniff` accepts the data wins. The built-in order puts
//! strongly-magic formats first and the heuristic C64 size-based formats
//! last, so a registry with extra decoders appended keeps the built-in
//! routing intact.

use log::debug;

use crate::error::{Error, Result};
use crate::options::DecodeOptions;
use crate::surface::Surface;

/// A format decoder.
///
/// `sniff` must be cheap and must not allocate; `decode` validates fully and
/// writes into the surface.
pub trait Decoder: Send + Sync {
    /// Short stable identifier, e.g. `"pcx"`.
    fn name(&self) -> &'static str;

    /// File extensions commonly used for this format, lowercase, no dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Whether `data` looks like this format.
    fn sniff(&self, data: &[u8]) -> bool;

    /// Decode `data` into `surface`.
    fn decode(&self, data: &[u8], surface: &mut dyn Surface, options: &DecodeOptions)
        -> Result<()>;
}

/// Ordered collection of decoders.
pub struct Registry {
    decoders: Vec<Box<dyn Decoder>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Registry {
            decoders: Vec::new(),
        }
    }

    /// A registry holding every built-in decoder in the canonical order.
    pub fn with_builtin() -> Self {
        use crate::codecs;

        let mut registry = Registry::new();
        registry.register(Box::new(codecs::pcx::PcxDecoder));
        registry.register(Box::new(codecs::png::PngDecoder));
        registry.register(Box::new(codecs::lbm::LbmDecoder));
        #[cfg(feature = "delegated")]
        {
            registry.register(Box::new(codecs::delegated::JpegDecoder));
            registry.register(Box::new(codecs::delegated::TgaDecoder));
            registry.register(Box::new(codecs::delegated::GifDecoder));
        }
        registry.register(Box::new(codecs::bmp::BmpDecoder));
        registry.register(Box::new(codecs::sunrast::SunRastDecoder));
        registry.register(Box::new(codecs::pictor::PictorDecoder));
        registry.register(Box::new(codecs::sgi::SgiDecoder));
        registry.register(Box::new(codecs::pnm::PnmDecoder));
        registry.register(Box::new(codecs::dcx::DcxDecoder));
        registry.register(Box::new(codecs::msp::MspDecoder));
        registry.register(Box::new(codecs::atari::NeoDecoder));
        registry.register(Box::new(codecs::atari::DegasDecoder));
        registry.register(Box::new(codecs::atari::CrackArtDecoder));
        registry.register(Box::new(codecs::atari::Spectrum512Decoder));
        registry.register(Box::new(codecs::atari::PhotochromeDecoder));
        registry.register(Box::new(codecs::atari::TinyStuffDecoder));
        registry.register(Box::new(codecs::atari::DoodleStDecoder));
        registry.register(Box::new(codecs::qoi::QoiDecoder));
        registry.register(Box::new(codecs::ico::IcoDecoder));
        #[cfg(feature = "exe-icons")]
        registry.register(Box::new(codecs::exe::ExeIconDecoder));
        registry.register(Box::new(codecs::c64::C64DoodleDecoder));
        registry.register(Box::new(codecs::c64::RunPaintDecoder));
        registry.register(Box::new(codecs::c64::InterpaintDecoder));
        registry.register(Box::new(codecs::c64::AmiDecoder));
        registry.register(Box::new(codecs::c64::FunpaintDecoder));
        registry.register(Box::new(codecs::c64::C64HiresDecoder));
        registry.register(Box::new(codecs::c64::KoalaDecoder));
        registry.register(Box::new(codecs::c64::DrazlaceDecoder));
        registry
    }

    /// Append a decoder; it is consulted after everything already registered.
    pub fn register(&mut self, decoder: Box<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    /// The registered decoders in consultation order.
    pub fn decoders(&self) -> impl Iterator<Item = &dyn Decoder> {
        self.decoders.iter().map(|d| d.as_ref())
    }

    /// First decoder whose sniff accepts `data`.
    pub fn find(&self, data: &[u8]) -> Option<&dyn Decoder> {
        self.decoders
            .iter()
            .map(|d| d.as_ref())
            .find(|d| d.sniff(data))
    }

    /// Decoder registered under `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&dyn Decoder> {
        self.decoders
            .iter()
            .map(|d| d.as_ref())
            .find(|d| d.name() == name)
    }

    /// First decoder claiming `extension` (case-insensitive, leading dot
    /// allowed).
    pub fn find_by_extension(&self, extension: &str) -> Option<&dyn Decoder> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.decoders
            .iter()
            .map(|d| d.as_ref())
            .find(|d| d.extensions().contains(&ext.as_str()))
    }

    /// Sniff and decode `data`.
    pub fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        let decoder = self
            .find(data)
            .ok_or_else(|| Error::InvalidFormat("Unknown image format".into()))?;
        debug!("decoding {} bytes as {}", data.len(), decoder.name());
        decoder.decode(data, surface, options)
    }

    /// Decode `data` with the decoder registered under `name`, bypassing
    /// sniffing.
    pub fn decode_as(
        &self,
        name: &str,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        let decoder = self
            .find_by_name(name)
            .ok_or_else(|| Error::InvalidFormat(format!("Unknown codec: {name}")))?;
        decoder.decode(data, surface, options)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::surface::MemorySurface;

    #[test]
    fn builtin_order_starts_with_pcx() {
        let registry = Registry::with_builtin();
        let names: Vec<_> = registry.decoders().map(|d| d.name()).collect();
        assert_eq!(names[0], "pcx");
        assert_eq!(names[1], "png");
        assert_eq!(names[2], "lbm");
        // The loose size-based C64 formats come last.
        assert_eq!(names[names.len() - 1], "drazlace");
        assert_eq!(names[names.len() - 2], "koala");
    }

    #[test]
    fn unknown_data_is_invalid_format() {
        let registry = Registry::with_builtin();
        let mut surface = MemorySurface::new();
        let err = registry
            .decode(&[0u8; 16], &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        assert!(err.to_string().contains("Unknown image format"));
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = Registry::with_builtin();
        let mut surface = MemorySurface::new();
        let err = registry
            .decode_as("nope", &[], &mut surface, &DecodeOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("Unknown codec: nope"));
    }

    #[test]
    fn lookup_by_name_and_extension() {
        let registry = Registry::with_builtin();
        assert!(registry.find_by_name("koala").is_some());
        assert_eq!(registry.find_by_extension(".KOA").unwrap().name(), "koala");
        assert_eq!(registry.find_by_extension("pi1").unwrap().name(), "degas");
        assert!(registry.find_by_extension("xyz").is_none());
    }
}

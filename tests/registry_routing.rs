//! Sniff routing and lookup behavior of the built-in registry.

use retropix::{DecodeOptions, ErrorKind, MemorySurface, PixelFormat, Registry};

mod support;

fn route(data: &[u8]) -> Option<&'static str> {
    // Names are 'static on every built-in decoder.
    let registry = Registry::with_builtin();
    registry.find(data).map(|d| d.name())
}

#[test]
fn magic_bytes_pick_the_right_decoder() {
    assert_eq!(route(&support::pcx_8bit(4, 4, 1)), Some("pcx"));
    assert_eq!(route(&support::qoi_solid(2, 2, [1, 2, 3])), Some("qoi"));
    assert_eq!(route(&support::bmp_rgb24_1x1([9, 9, 9])), Some("bmp"));
    assert_eq!(route(&support::ppm_row(&[[0, 0, 0]])), Some("pnm"));
    assert_eq!(route(&support::neo_blank()), Some("neo"));
    assert_eq!(route(&support::degas_uncompressed()), Some("degas"));
    assert_eq!(route(&support::gg_zero_stream(0x6000, 10001)), Some("koala"));
    assert_eq!(
        route(&support::ico_file(&[support::dib_icon(4, 4, 1)])),
        Some("ico")
    );
    assert_eq!(
        route(&support::dcx_file(&[support::pcx_8bit(2, 2, 0)])),
        Some("dcx")
    );
}

#[test]
fn unknown_data_is_rejected() {
    let registry = Registry::with_builtin();
    let mut surface = MemorySurface::new();
    let err = registry
        .decode(b"not an image at all", &mut surface, &DecodeOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert_eq!(err.to_string(), "invalid format: Unknown image format");
}

#[test]
fn decode_as_checks_the_name() {
    let registry = Registry::with_builtin();
    let mut surface = MemorySurface::new();
    let err = registry
        .decode_as("vaporware", &[], &mut surface, &DecodeOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);

    // A known name bypasses sniffing entirely.
    let data = support::qoi_solid(1, 1, [10, 20, 30]);
    registry
        .decode_as("qoi", &data, &mut surface, &DecodeOptions::default())
        .unwrap();
    assert_eq!(surface.format(), PixelFormat::Rgb888);
    assert_eq!(surface.pixel(0, 0), &[10, 20, 30]);
}

#[test]
fn every_claimed_extension_resolves() {
    let registry = Registry::with_builtin();
    for decoder in registry.decoders() {
        for ext in decoder.extensions() {
            let found = registry
                .find_by_extension(ext)
                .unwrap_or_else(|| panic!("no decoder for extension {ext}"));
            // Some extensions (like "dd") are claimed by several decoders;
            // the lookup just has to land on one of the claimants.
            assert!(found.extensions().contains(ext));
        }
    }
}

#[test]
fn extension_lookup_is_case_insensitive() {
    let registry = Registry::with_builtin();
    assert_eq!(registry.find_by_extension(".KOA").unwrap().name(), "koala");
    assert_eq!(registry.find_by_extension("Pi1").unwrap().name(), "degas");
    assert!(registry.find_by_extension("xyz").is_none());
}

#[test]
fn raw_framebuffer_decoders_are_not_registered() {
    // Headerless formats need explicit dimensions and are exposed as
    // standalone functions instead of sniffing decoders.
    let registry = Registry::with_builtin();
    assert!(registry.find_by_name("ega").is_none());
    assert!(registry.find_by_name("modex").is_none());
}

#[test]
fn registry_decode_fills_the_surface() {
    let registry = Registry::with_builtin();
    let data = support::qoi_solid(3, 2, [200, 100, 50]);
    let mut surface = MemorySurface::new();
    registry
        .decode(&data, &mut surface, &DecodeOptions::default())
        .unwrap();
    assert_eq!((surface.width(), surface.height()), (3, 2));
    assert_eq!(surface.pixel(2, 1), &[200, 100, 50]);
}

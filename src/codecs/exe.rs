//! Icon extraction from PE executables (.exe/.dll/.scr).
//!
//! Walks the RT_GROUP_ICON resources with `pelite`, decodes each referenced
//! icon DIB once, and stacks the results into the same vertical atlas the
//! ICO decoder produces.

use log::warn;
use pelite::PeFile;

use crate::bytes::read_le32;
use crate::codecs::ico::{create_icon_atlas, decode_icon_image, DecodedIcon};
use crate::error::{Error, Result};
use crate::options::DecodeOptions;
use crate::registry::Decoder;
use crate::surface::Surface;

const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"

fn collect_icons(data: &[u8], max_w: u32, max_h: u32) -> Result<Vec<DecodedIcon>> {
    let file = PeFile::from_bytes(data).map_err(|e| Error::InvalidFormat(e.to_string()))?;

    let mut icons = Vec::new();
    let Ok(resources) = file.resources() else {
        return Ok(icons);
    };

    let mut seen_ids: Vec<u16> = Vec::new();
    for group in resources.icons() {
        let Ok((_, group)) = group else {
            warn!("skipping unreadable icon group in PE resources");
            continue;
        };
        for entry in group.entries() {
            if seen_ids.contains(&entry.nId) {
                continue;
            }
            seen_ids.push(entry.nId);
            let Ok(image) = group.image(entry.nId) else {
                warn!("skipping icon {}: missing resource", entry.nId);
                continue;
            };
            match decode_icon_image(image, max_w, max_h) {
                Some(icon) => icons.push(icon),
                None => warn!("skipping icon {}: undecodable image", entry.nId),
            }
        }
    }

    Ok(icons)
}

pub struct ExeIconDecoder;

impl Decoder for ExeIconDecoder {
    fn name(&self) -> &'static str {
        "exe_icon"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["exe", "dll", "scr"]
    }

    fn sniff(&self, data: &[u8]) -> bool {
        if data.len() < 64 || data[0] != b'M' || data[1] != b'Z' {
            return false;
        }
        // Follow e_lfanew and require a PE signature.
        let pe_offset = read_le32(data, 0x3C) as usize;
        pe_offset + 4 <= data.len() && read_le32(data, pe_offset) == PE_SIGNATURE
    }

    fn decode(
        &self,
        data: &[u8],
        surface: &mut dyn Surface,
        options: &DecodeOptions,
    ) -> Result<()> {
        if !self.sniff(data) {
            return Err(Error::InvalidFormat("Not a PE executable".into()));
        }
        let (max_w, max_h) = options.icon_limits();

        let icons = collect_icons(data, max_w, max_h)?;
        if icons.is_empty() {
            return Err(Error::InvalidFormat("No icons in executable".into()));
        }
        create_icon_atlas(&icons, surface, max_w, max_h)
    }
}

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::geojson::GeoJsonCodec;
use super::{Codec, CodecOptions, Loaded};
use crate::error::Result;
use crate::geotable::GeoTable;

const SNIFF_BYTES: u64 = 64;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Content family guessed from the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Json,
    Unknown,
}

/// Peek at the head of `path`. The file is closed before returning.
pub fn sniff(path: &Path) -> Result<Sniffed> {
    let mut head = Vec::with_capacity(SNIFF_BYTES as usize);
    File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut head)?;
    let body = head.strip_prefix(UTF8_BOM).unwrap_or(&head[..]);
    Ok(match body.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Sniffed::Json,
        _ => Sniffed::Unknown,
    })
}

/// Codec for files no extension claimed: JSON text goes through the GeoJSON
/// codec, anything else through GDAL when the `gdal` feature is enabled.
pub struct FallbackCodec;

impl Codec for FallbackCodec {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn read(&self, path: &Path, layer: usize, options: &CodecOptions) -> Result<Loaded> {
        let sniffed = sniff(path)?;
        tracing::debug!(path = %path.display(), ?sniffed, "sniffed unrecognized file");
        match sniffed {
            Sniffed::Json => GeoJsonCodec.read(path, layer, options),
            Sniffed::Unknown => read_other(path, layer, options),
        }
    }

    fn write(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            GeoJsonCodec.write(path, table, options)
        } else {
            write_other(path, table, options)
        }
    }
}

#[cfg(feature = "gdal")]
fn read_other(path: &Path, layer: usize, options: &CodecOptions) -> Result<Loaded> {
    super::gdal::GdalCodec.read(path, layer, options)
}

#[cfg(not(feature = "gdal"))]
fn read_other(path: &Path, _layer: usize, _options: &CodecOptions) -> Result<Loaded> {
    Err(crate::error::Error::UnrecognizedFormat {
        path: path.to_path_buf(),
    })
}

#[cfg(feature = "gdal")]
fn write_other(path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
    super::gdal::GdalCodec.write(path, table, options)
}

#[cfg(not(feature = "gdal"))]
fn write_other(path: &Path, _table: &GeoTable, _options: &CodecOptions) -> Result<()> {
    Err(crate::error::Error::UnrecognizedFormat {
        path: path.to_path_buf(),
    })
}

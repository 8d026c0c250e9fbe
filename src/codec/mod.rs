//! Format dispatcher: routes a path to the codec that handles its extension.
//!
//! Codecs wrap existing format libraries. Vector codecs hand back a row table
//! that is wrapped into a [`GeoTable`]; image and mesh codecs build the
//! geo-table directly.

pub mod fallback;
#[cfg(feature = "gdal")]
pub mod gdal;
pub mod geojson;
pub mod image;
pub mod parquet;
pub mod ply;
pub mod shapefile;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geotable::{self, GeoTable};
use crate::table::RowTable;

/// Options forwarded verbatim to the selected codec. Keys a codec does not
/// know are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecOptions {
    entries: BTreeMap<String, String>,
}

impl CodecOptions {
    pub fn new() -> Self {
        CodecOptions::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parse option `key`, failing if it is present but malformed.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| Error::InvalidOption {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a `key=value` pair as given on the command line.
    pub fn parse_pair(pair: &str) -> std::result::Result<(String, String), String> {
        pair.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| format!("expected key=value, got `{}`", pair))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CodecOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = CodecOptions::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

/// Options for [`Dispatcher::load`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    /// Layer index for multi-layer containers (fallback codec only).
    pub layer: usize,
    /// Defer geometry conversion until an element is accessed.
    pub lazy: bool,
    pub codec: CodecOptions,
}

/// What a codec produced from a file.
#[derive(Debug)]
pub enum Loaded {
    /// Row table whose `geometry_column` holds library geometries.
    Rows {
        rows: RowTable,
        geometry_column: String,
    },
    /// Grid or mesh geo-table built by the codec itself.
    Table(GeoTable),
}

impl Loaded {
    pub fn rows(rows: RowTable) -> Self {
        Loaded::Rows {
            rows,
            geometry_column: geotable::DEFAULT_GEOMETRY_COLUMN.to_string(),
        }
    }
}

/// Reader/writer for one family of files, backed by a format library.
pub trait Codec {
    fn name(&self) -> &'static str;

    fn read(&self, path: &Path, layer: usize, options: &CodecOptions) -> Result<Loaded>;

    fn write(&self, _path: &Path, table: &GeoTable, _options: &CodecOptions) -> Result<()> {
        Err(Error::unsupported_target(self.name(), table.domain().kind()))
    }
}

/// Codec handler selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Image,
    Ply,
    Shapefile,
    GeoJson,
    GeoParquet,
    Fallback,
}

const LOAD_EXTENSIONS: &[(&str, Handler)] = &[
    (".png", Handler::Image),
    (".jpg", Handler::Image),
    (".jpeg", Handler::Image),
    (".tif", Handler::Image),
    (".tiff", Handler::Image),
    (".ply", Handler::Ply),
    (".shp", Handler::Shapefile),
    (".geojson", Handler::GeoJson),
    (".parquet", Handler::GeoParquet),
];

const SAVE_EXTENSIONS: &[(&str, Handler)] = &[
    (".shp", Handler::Shapefile),
    (".geojson", Handler::GeoJson),
    (".parquet", Handler::GeoParquet),
];

fn lookup(table: &[(&str, Handler)], path: &Path) -> Handler {
    let name = path.to_string_lossy().to_lowercase();
    table
        .iter()
        .find(|(ext, _)| name.ends_with(ext))
        .map(|&(_, handler)| handler)
        .unwrap_or(Handler::Fallback)
}

impl Handler {
    pub fn for_load(path: &Path) -> Handler {
        lookup(LOAD_EXTENSIONS, path)
    }

    pub fn for_save(path: &Path) -> Handler {
        lookup(SAVE_EXTENSIONS, path)
    }
}

/// Routing table from handler to codec.
pub struct Dispatcher {
    codecs: HashMap<Handler, Box<dyn Codec>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::empty()
            .with_codec(Handler::Image, image::ImageCodec)
            .with_codec(Handler::Ply, ply::PlyCodec)
            .with_codec(Handler::Shapefile, shapefile::ShapefileCodec)
            .with_codec(Handler::GeoJson, geojson::GeoJsonCodec)
            .with_codec(Handler::GeoParquet, parquet::GeoParquetCodec)
            .with_codec(Handler::Fallback, fallback::FallbackCodec)
    }
}

impl Dispatcher {
    /// Dispatcher with no codecs registered.
    pub fn empty() -> Self {
        Dispatcher {
            codecs: HashMap::new(),
        }
    }

    /// Register (or replace) the codec behind `handler`.
    pub fn with_codec(mut self, handler: Handler, codec: impl Codec + 'static) -> Self {
        self.codecs.insert(handler, Box::new(codec));
        self
    }

    fn codec(&self, handler: Handler, path: &Path) -> Result<&dyn Codec> {
        self.codecs
            .get(&handler)
            .map(|c| &**c)
            .ok_or_else(|| Error::UnrecognizedFormat {
                path: path.to_path_buf(),
            })
    }

    pub fn load(&self, path: &Path, options: &LoadOptions) -> Result<GeoTable> {
        let handler = Handler::for_load(path);
        let codec = self.codec(handler, path)?;
        tracing::debug!(path = %path.display(), codec = codec.name(), "dispatching load");
        let table = match codec.read(path, options.layer, &options.codec)? {
            Loaded::Rows {
                rows,
                geometry_column,
            } => geotable::wrap(rows, &geometry_column, options.lazy)?,
            Loaded::Table(table) => table,
        };
        tracing::info!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn save(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let handler = Handler::for_save(path);
        let codec = self.codec(handler, path)?;
        if !table.domain().is_vector() {
            return Err(Error::unsupported_target(codec.name(), table.domain().kind()));
        }
        tracing::debug!(path = %path.display(), codec = codec.name(), "dispatching save");
        codec.write(path, table, options)?;
        tracing::info!("Saved {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extensions_match_case_insensitively() {
        assert_eq!(Handler::for_load(Path::new("a/B.PNG")), Handler::Image);
        assert_eq!(Handler::for_load(Path::new("scan.TIFF")), Handler::Image);
        assert_eq!(Handler::for_load(Path::new("mesh.ply")), Handler::Ply);
        assert_eq!(Handler::for_load(Path::new("x.GeoJSON")), Handler::GeoJson);
        assert_eq!(Handler::for_load(Path::new("x.gpkg")), Handler::Fallback);
        assert_eq!(Handler::for_load(&PathBuf::from("noext")), Handler::Fallback);
    }

    #[test]
    fn images_and_meshes_save_through_fallback() {
        assert_eq!(Handler::for_save(Path::new("out.shp")), Handler::Shapefile);
        assert_eq!(Handler::for_save(Path::new("out.parquet")), Handler::GeoParquet);
        assert_eq!(Handler::for_save(Path::new("out.png")), Handler::Fallback);
    }

    #[test]
    fn options_parse_and_validate() {
        let options: CodecOptions = [("pretty", "false"), ("width", "wide")].into_iter().collect();
        assert!(!options.flag("pretty", true).unwrap());
        assert!(options.flag("missing", true).unwrap());
        assert!(matches!(
            options.get_parsed::<u8>("width"),
            Err(Error::InvalidOption { .. })
        ));
        assert_eq!(
            CodecOptions::parse_pair("compression = zstd"),
            Ok(("compression".to_string(), "zstd".to_string()))
        );
        assert!(CodecOptions::parse_pair("novalue").is_err());
    }
}

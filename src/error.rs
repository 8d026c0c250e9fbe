use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::Dim;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, converting or saving geo-tables.
///
/// Errors coming out of a format library or the network are carried
/// through unchanged; only the conversion layer defines its own variants.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported geometry kind: {kind}")]
    UnsupportedGeometryKind { kind: String },

    #[error("inconsistent dimensionality: expected {expected}, found {found}")]
    InconsistentDimensionality { expected: Dim, found: Dim },

    #[error("missing geometry column `{0}`")]
    MissingGeometryColumn(String),

    #[error("{format} cannot represent {kind} geometry")]
    UnsupportedTargetFormat { format: String, kind: String },

    #[error("ring has {vertices} distinct vertices, at least 3 are required")]
    DegenerateRing { vertices: usize },

    #[error("domain has {domain} elements but attribute table has {rows} rows")]
    LengthMismatch { domain: usize, rows: usize },

    #[error("column `{column}` has {found} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("index {index} out of bounds for {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("unrecognized format: {}", path.display())]
    UnrecognizedFormat { path: PathBuf },

    #[error("invalid value `{value}` for option `{key}`")]
    InvalidOption { key: String, value: String },

    #[error("invalid decimation bounds: min {min} > max {max}")]
    InvalidDecimation { min: usize, max: usize },

    #[error("region not found: {region}")]
    RegionNotFound { region: String },

    #[error("column `{column}` has unsupported type {data_type}")]
    UnsupportedColumnType { column: String, data_type: String },

    #[error("invalid attribute field name `{name}`")]
    InvalidFieldName { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),

    #[error(transparent)]
    Dbase(#[from] shapefile::dbase::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error(transparent)]
    Geozero(#[from] geozero::error::GeozeroError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "gdal")]
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[cfg(feature = "proj")]
    #[error(transparent)]
    ProjCreate(#[from] proj::ProjCreateError),

    #[cfg(feature = "proj")]
    #[error(transparent)]
    Proj(#[from] proj::ProjError),
}

impl Error {
    pub(crate) fn unsupported_kind(kind: impl Into<String>) -> Self {
        Error::UnsupportedGeometryKind { kind: kind.into() }
    }

    pub(crate) fn unsupported_target(format: impl ToString, kind: impl Into<String>) -> Self {
        Error::UnsupportedTargetFormat {
            format: format.to_string(),
            kind: kind.into(),
        }
    }
}

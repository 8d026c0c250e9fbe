//! Load and save geospatial tables through existing format libraries.
//!
//! Every file format is read and written by a third-party crate. This crate
//! only converts between each crate's geometry type and one canonical
//! [`Geometry`] union, pairs geometries with their attributes in a
//! [`GeoTable`], and picks the codec for a path from its extension.

use std::path::Path;

pub mod codec;
pub mod convert;
pub mod decimate;
pub mod error;
pub mod gadm;
pub mod geometry;
pub mod geotable;
#[cfg(feature = "proj")]
pub mod reproject;
pub mod table;

pub use codec::{CodecOptions, Dispatcher, LoadOptions};
pub use decimate::Decimation;
pub use error::{Error, Result};
pub use gadm::RegionRequest;
pub use geometry::{Chain, Coord, Dim, Geometry, Grid, Mesh, Polygon, Ring};
pub use geotable::{Domain, GeoTable, GeometryView};
pub use table::{AttributeTable, Column, RowTable, Value};

/// Load `path` with the codec its extension selects.
pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<GeoTable> {
    Dispatcher::default().load(path.as_ref(), options)
}

/// Save `table` to `path` with the codec its extension selects.
pub fn save(path: impl AsRef<Path>, table: &GeoTable, options: &CodecOptions) -> Result<()> {
    Dispatcher::default().save(path.as_ref(), table, options)
}

/// Download GADM boundaries for `request` over HTTP and decimate them.
pub fn fetch_region(
    request: &RegionRequest,
    decimation: &Decimation,
    options: &CodecOptions,
) -> Result<GeoTable> {
    let client = gadm::ReqwestClient::from_options(options)?;
    gadm::fetch_region(&client, request, decimation, options)
}

//! Geometry converter: maps each format library's geometry type onto the
//! canonical [`Geometry`] union and back.
//!
//! There is one [`GeometryAdapter`] per library. The rest of the crate only
//! goes through [`to_canonical`] and [`from_canonical`].

pub mod geojson;
pub mod shapefile;
pub mod wkb;

use std::fmt;

use crate::error::{Error, Result};
use crate::geometry::{Coord, Geometry, Ring};

pub use self::geojson::GeoJsonAdapter;
pub use self::shapefile::ShapefileAdapter;
pub use self::wkb::{WkbAdapter, WkbGeometry};

/// A geometry value in the representation of the library that produced it.
pub enum SourceGeometry {
    GeoJson(::geojson::Geometry),
    Shape(::shapefile::Shape),
    Wkb(WkbGeometry),
}

impl SourceGeometry {
    pub fn format(&self) -> Format {
        match self {
            SourceGeometry::GeoJson(_) => Format::GeoJson,
            SourceGeometry::Shape(_) => Format::Shapefile,
            SourceGeometry::Wkb(_) => Format::Wkb,
        }
    }
}

impl Clone for SourceGeometry {
    fn clone(&self) -> Self {
        match self {
            SourceGeometry::GeoJson(g) => SourceGeometry::GeoJson(g.clone()),
            SourceGeometry::Shape(s) => SourceGeometry::Shape(self::shapefile::clone_shape(s)),
            SourceGeometry::Wkb(w) => SourceGeometry::Wkb(w.clone()),
        }
    }
}

impl PartialEq for SourceGeometry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SourceGeometry::GeoJson(a), SourceGeometry::GeoJson(b)) => a == b,
            (SourceGeometry::Shape(a), SourceGeometry::Shape(b)) => self::shapefile::shapes_equal(a, b),
            (SourceGeometry::Wkb(a), SourceGeometry::Wkb(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for SourceGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceGeometry::GeoJson(g) => f.debug_tuple("GeoJson").field(g).finish(),
            SourceGeometry::Shape(s) => self::shapefile::debug_shape(s, f),
            SourceGeometry::Wkb(w) => f.debug_tuple("Wkb").field(w).finish(),
        }
    }
}

/// Whether a target expects the first ring vertex repeated at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingClosure {
    /// The closing vertex must be present in the written ring.
    Explicit,
    /// The target closes rings itself; hand it the open ring.
    Implicit,
}

impl RingClosure {
    pub fn ring_coords(self, ring: &Ring) -> Vec<Coord> {
        match self {
            RingClosure::Explicit => ring.closed_coords().copied().collect(),
            RingClosure::Implicit => ring.coords().to_vec(),
        }
    }
}

/// Geometry representation a conversion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    GeoJson,
    Shapefile,
    /// Well-known binary, used for GeoParquet and GDAL.
    Wkb,
}

impl Format {
    pub fn ring_closure(self) -> RingClosure {
        match self {
            Format::GeoJson => GeoJsonAdapter::CLOSURE,
            Format::Shapefile => ShapefileAdapter::CLOSURE,
            Format::Wkb => WkbAdapter::CLOSURE,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::GeoJson => write!(f, "GeoJSON"),
            Format::Shapefile => write!(f, "Shapefile"),
            Format::Wkb => write!(f, "WKB"),
        }
    }
}

/// Conversion between one library's geometry type and [`Geometry`].
pub trait GeometryAdapter {
    type Source;

    /// Ring closure convention of the library's representation.
    const CLOSURE: RingClosure;

    fn to_canonical(source: &Self::Source) -> Result<Geometry>;

    fn from_canonical(geometry: &Geometry) -> Result<Self::Source>;
}

pub fn to_canonical(source: &SourceGeometry) -> Result<Geometry> {
    let geometry = match source {
        SourceGeometry::GeoJson(g) => GeoJsonAdapter::to_canonical(g)?,
        SourceGeometry::Shape(s) => ShapefileAdapter::to_canonical(s)?,
        SourceGeometry::Wkb(w) => WkbAdapter::to_canonical(w)?,
    };
    geometry.dim()?;
    Ok(geometry)
}

pub fn from_canonical(geometry: &Geometry, format: Format) -> Result<SourceGeometry> {
    if let Geometry::Grid(_) = geometry {
        return Err(Error::unsupported_target(format, geometry.kind()));
    }
    Ok(match format {
        Format::GeoJson => SourceGeometry::GeoJson(GeoJsonAdapter::from_canonical(geometry)?),
        Format::Shapefile => SourceGeometry::Shape(ShapefileAdapter::from_canonical(geometry)?),
        Format::Wkb => SourceGeometry::Wkb(WkbAdapter::from_canonical(geometry)?),
    })
}

use std::mem;

use geozero::error::{GeozeroError, Result as GeozeroResult};
use geozero::wkb::{Ewkb, Wkb, WkbDialect};
use geozero::{CoordDimensions, GeomProcessor, GeozeroGeometry, ToWkb};

use super::{GeometryAdapter, RingClosure};
use crate::error::{Error, Result};
use crate::geometry::{Chain, Coord, Dim, Geometry, Polygon, Ring};

/// Adapter for WKB-encoded geometries, the representation shared by the
/// GeoParquet and GDAL paths. Decoding and encoding go through `geozero`,
/// which keeps Z values. WKB rings are stored closed.
pub struct WkbAdapter;

/// Type words with one of these bits set use the PostGIS/OGR flag encoding
/// (Z, M, SRID) instead of the ISO `+1000` offsets.
const EWKB_FLAGS: u32 = 0xE000_0000;

/// WKB bytes together with the dialect they are encoded in.
#[derive(Debug, Clone, PartialEq)]
pub struct WkbGeometry {
    pub bytes: Vec<u8>,
    pub dialect: WkbDialect,
}

impl WkbGeometry {
    /// Wrap `bytes`, telling ISO WKB from the flag-bit encoding OGR and
    /// PostGIS emit by the first type word.
    pub fn new(bytes: Vec<u8>) -> Self {
        let dialect = match type_word(&bytes) {
            Some(type_id) if type_id & EWKB_FLAGS != 0 => WkbDialect::Ewkb,
            _ => WkbDialect::Wkb,
        };
        WkbGeometry { bytes, dialect }
    }

    /// GeoParquet `geometry_types` entry for the outermost geometry, such as
    /// `"Polygon Z"`.
    pub fn type_name(&self) -> Option<String> {
        let type_id = type_word(&self.bytes)?;
        let (base, has_z) = match self.dialect {
            WkbDialect::Ewkb => (type_id & 0xFF, type_id & 0x8000_0000 != 0),
            _ => (type_id % 1000, matches!(type_id / 1000, 1 | 3)),
        };
        let name = match base {
            1 => "Point",
            2 => "LineString",
            3 => "Polygon",
            4 => "MultiPoint",
            5 => "MultiLineString",
            6 => "MultiPolygon",
            7 => "GeometryCollection",
            _ => return None,
        };
        Some(if has_z { format!("{} Z", name) } else { name.to_string() })
    }
}

fn type_word(bytes: &[u8]) -> Option<u32> {
    let &[order, a, b, c, d] = bytes.get(..5)? else {
        return None;
    };
    Some(if order == 0 {
        u32::from_be_bytes([a, b, c, d])
    } else {
        u32::from_le_bytes([a, b, c, d])
    })
}

#[derive(Clone, Copy)]
enum Kind {
    Point,
    MultiPoint,
    Line,
    MultiLine,
    Polygon,
    MultiPolygon,
}

/// `GeomProcessor` collecting decoded coordinates into a canonical geometry.
///
/// Only the outermost `*_begin` call picks the kind. Untagged line strings
/// are rings or member lines; untagged polygons are multipolygon members.
#[derive(Default)]
struct CanonicalBuilder {
    kind: Option<Kind>,
    unsupported: Option<&'static str>,
    coords: Vec<Coord>,
    lines: Vec<Vec<Coord>>,
    polygons: Vec<Vec<Vec<Coord>>>,
}

impl CanonicalBuilder {
    fn begin(&mut self, kind: Kind) {
        self.kind.get_or_insert(kind);
    }

    fn reject(&mut self, kind: &'static str) -> GeozeroResult<()> {
        self.unsupported.get_or_insert(kind);
        Ok(())
    }

    fn finish(self) -> Result<Geometry> {
        if let Some(kind) = self.unsupported {
            return Err(Error::unsupported_kind(kind));
        }
        Ok(match self.kind {
            Some(Kind::Point) => match self.coords.as_slice() {
                [coord] => Geometry::Point(*coord),
                _ => return Err(Error::unsupported_kind("empty Point")),
            },
            Some(Kind::MultiPoint) => Geometry::MultiPoint(self.coords),
            Some(Kind::Line) => Geometry::Chain(Chain::new(self.coords)),
            Some(Kind::MultiLine) => {
                Geometry::MultiChain(self.lines.into_iter().map(Chain::new).collect())
            }
            Some(Kind::Polygon) => Geometry::Polygon(polygon(self.lines)?),
            Some(Kind::MultiPolygon) => Geometry::MultiPolygon(
                self.polygons
                    .into_iter()
                    .map(polygon)
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => return Err(Error::unsupported_kind("empty WKB geometry")),
        })
    }
}

fn polygon(rings: Vec<Vec<Coord>>) -> Result<Polygon> {
    let mut rings = rings.into_iter().map(Ring::new);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::unsupported_kind("empty Polygon"))??;
    Ok(Polygon::new(exterior, rings.collect::<Result<Vec<_>>>()?))
}

impl GeomProcessor for CanonicalBuilder {
    fn dimensions(&self) -> CoordDimensions {
        CoordDimensions::xyz()
    }

    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> GeozeroResult<()> {
        self.coords.push(Coord::xy(x, y));
        Ok(())
    }

    fn coordinate(
        &mut self,
        x: f64,
        y: f64,
        z: Option<f64>,
        _m: Option<f64>,
        _t: Option<f64>,
        _tm: Option<u64>,
        _idx: usize,
    ) -> GeozeroResult<()> {
        self.coords.push(Coord { x, y, z });
        Ok(())
    }

    fn empty_point(&mut self, _idx: usize) -> GeozeroResult<()> {
        self.reject("empty Point")
    }

    fn point_begin(&mut self, _idx: usize) -> GeozeroResult<()> {
        self.begin(Kind::Point);
        Ok(())
    }

    fn multipoint_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(Kind::MultiPoint);
        Ok(())
    }

    fn linestring_begin(&mut self, tagged: bool, _size: usize, _idx: usize) -> GeozeroResult<()> {
        if tagged {
            self.begin(Kind::Line);
        }
        Ok(())
    }

    fn linestring_end(&mut self, tagged: bool, _idx: usize) -> GeozeroResult<()> {
        if !tagged {
            let coords = mem::take(&mut self.coords);
            self.lines.push(coords);
        }
        Ok(())
    }

    fn multilinestring_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(Kind::MultiLine);
        Ok(())
    }

    fn polygon_begin(&mut self, tagged: bool, _size: usize, _idx: usize) -> GeozeroResult<()> {
        if tagged {
            self.begin(Kind::Polygon);
        }
        Ok(())
    }

    fn polygon_end(&mut self, tagged: bool, _idx: usize) -> GeozeroResult<()> {
        if !tagged {
            let rings = mem::take(&mut self.lines);
            self.polygons.push(rings);
        }
        Ok(())
    }

    fn multipolygon_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(Kind::MultiPolygon);
        Ok(())
    }

    fn geometrycollection_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("GeometryCollection")
    }

    fn circularstring_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("CircularString")
    }

    fn compoundcurve_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("CompoundCurve")
    }

    fn curvepolygon_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("CurvePolygon")
    }

    fn multicurve_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("MultiCurve")
    }

    fn multisurface_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("MultiSurface")
    }

    fn triangle_begin(&mut self, _tagged: bool, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("Triangle")
    }

    fn polyhedralsurface_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("PolyhedralSurface")
    }

    fn tin_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.reject("Tin")
    }
}

fn process_coord<P: GeomProcessor>(coord: &Coord, idx: usize, processor: &mut P) -> GeozeroResult<()> {
    if processor.multi_dim() {
        processor.coordinate(coord.x, coord.y, coord.z, None, None, None, idx)
    } else {
        processor.xy(coord.x, coord.y, idx)
    }
}

fn process_line<P: GeomProcessor>(
    coords: &[Coord],
    tagged: bool,
    idx: usize,
    processor: &mut P,
) -> GeozeroResult<()> {
    processor.linestring_begin(tagged, coords.len(), idx)?;
    for (i, coord) in coords.iter().enumerate() {
        process_coord(coord, i, processor)?;
    }
    processor.linestring_end(tagged, idx)
}

fn process_polygon<P: GeomProcessor>(
    polygon: &Polygon,
    tagged: bool,
    idx: usize,
    processor: &mut P,
) -> GeozeroResult<()> {
    processor.polygon_begin(tagged, polygon.holes.len() + 1, idx)?;
    for (i, ring) in polygon.rings().enumerate() {
        process_line(&WkbAdapter::CLOSURE.ring_coords(ring), false, i, processor)?;
    }
    processor.polygon_end(tagged, idx)
}

impl GeozeroGeometry for Geometry {
    fn process_geom<P: GeomProcessor>(&self, processor: &mut P) -> GeozeroResult<()> {
        match self {
            Geometry::Point(coord) => {
                processor.point_begin(0)?;
                process_coord(coord, 0, processor)?;
                processor.point_end(0)
            }
            Geometry::MultiPoint(coords) => {
                processor.multipoint_begin(coords.len(), 0)?;
                for (i, coord) in coords.iter().enumerate() {
                    process_coord(coord, i, processor)?;
                }
                processor.multipoint_end(0)
            }
            Geometry::Chain(chain) => process_line(&chain.coords, true, 0, processor),
            Geometry::MultiChain(chains) => {
                processor.multilinestring_begin(chains.len(), 0)?;
                for (i, chain) in chains.iter().enumerate() {
                    process_line(&chain.coords, false, i, processor)?;
                }
                processor.multilinestring_end(0)
            }
            Geometry::Polygon(polygon) => process_polygon(polygon, true, 0, processor),
            Geometry::MultiPolygon(polygons) => {
                processor.multipolygon_begin(polygons.len(), 0)?;
                for (i, polygon) in polygons.iter().enumerate() {
                    process_polygon(polygon, false, i, processor)?;
                }
                processor.multipolygon_end(0)
            }
            Geometry::Grid(_) => Err(GeozeroError::Geometry(self.kind().to_string())),
        }
    }
}

impl GeometryAdapter for WkbAdapter {
    type Source = WkbGeometry;

    const CLOSURE: RingClosure = RingClosure::Explicit;

    fn to_canonical(source: &WkbGeometry) -> Result<Geometry> {
        let mut builder = CanonicalBuilder::default();
        match source.dialect {
            WkbDialect::Wkb => Wkb(&source.bytes).process_geom(&mut builder)?,
            WkbDialect::Ewkb => Ewkb(&source.bytes).process_geom(&mut builder)?,
            other => return Err(Error::unsupported_kind(format!("{:?} encoding", other))),
        }
        builder.finish()
    }

    fn from_canonical(geometry: &Geometry) -> Result<WkbGeometry> {
        if let Geometry::Grid(_) = geometry {
            return Err(Error::unsupported_target("WKB", geometry.kind()));
        }
        let dims = match geometry.dim()? {
            Some(Dim::Xyz) => CoordDimensions::xyz(),
            _ => CoordDimensions::xy(),
        };
        Ok(WkbGeometry {
            bytes: geometry.to_wkb(dims)?,
            dialect: WkbDialect::Wkb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64, f64)]) -> Ring {
        Ring::new(coords.iter().map(|&(x, y, z)| Coord::xyz(x, y, z)).collect()).unwrap()
    }

    fn round_trip(geometry: &Geometry) -> Geometry {
        let wkb = WkbAdapter::from_canonical(geometry).unwrap();
        WkbAdapter::to_canonical(&WkbGeometry::new(wkb.bytes)).unwrap()
    }

    #[test]
    fn iso_point_z_keeps_z() {
        let mut bytes = vec![1];
        bytes.extend(1001u32.to_le_bytes());
        for v in [1.0f64, 2.0, 3.0] {
            bytes.extend(v.to_le_bytes());
        }
        let wkb = WkbGeometry::new(bytes);
        assert_eq!(wkb.dialect, WkbDialect::Wkb);
        assert_eq!(wkb.type_name().as_deref(), Some("Point Z"));
        assert_eq!(
            WkbAdapter::to_canonical(&wkb).unwrap(),
            Geometry::Point(Coord::xyz(1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn flag_encoded_point_z_keeps_z() {
        let mut bytes = vec![1];
        bytes.extend(0x8000_0001u32.to_le_bytes());
        for v in [4.0f64, 5.0, 6.0] {
            bytes.extend(v.to_le_bytes());
        }
        let wkb = WkbGeometry::new(bytes);
        assert_eq!(wkb.dialect, WkbDialect::Ewkb);
        assert_eq!(
            WkbAdapter::to_canonical(&wkb).unwrap(),
            Geometry::Point(Coord::xyz(4.0, 5.0, 6.0))
        );
    }

    #[test]
    fn polygon_with_hole_round_trips_in_3d() {
        let polygon = Geometry::Polygon(Polygon::new(
            ring(&[(0.0, 0.0, 1.0), (10.0, 0.0, 2.0), (10.0, 10.0, 3.0), (0.0, 10.0, 4.0)]),
            vec![ring(&[(2.0, 2.0, 0.0), (2.0, 4.0, 0.0), (4.0, 4.0, 0.0)])],
        ));
        assert_eq!(round_trip(&polygon), polygon);
        let wkb = WkbAdapter::from_canonical(&polygon).unwrap();
        assert_eq!(wkb.type_name().as_deref(), Some("Polygon Z"));
    }

    #[test]
    fn multi_geometries_round_trip() {
        let square = |dx: f64| {
            Polygon::new(
                Ring::new(vec![
                    Coord::xy(dx, 0.0),
                    Coord::xy(dx + 1.0, 0.0),
                    Coord::xy(dx + 1.0, 1.0),
                    Coord::xy(dx, 1.0),
                ])
                .unwrap(),
                vec![],
            )
        };
        let cases = [
            Geometry::MultiPoint(vec![Coord::xy(1.0, 2.0), Coord::xy(3.0, 4.0)]),
            Geometry::Chain(Chain::new(vec![Coord::xyz(0.0, 0.0, 0.0), Coord::xyz(1.0, 1.0, 5.0)])),
            Geometry::MultiChain(vec![
                Chain::new(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 1.0)]),
                Chain::new(vec![Coord::xy(2.0, 2.0), Coord::xy(3.0, 3.0), Coord::xy(4.0, 2.0)]),
            ]),
            Geometry::MultiPolygon(vec![square(0.0), square(5.0)]),
        ];
        for geometry in &cases {
            assert_eq!(&round_trip(geometry), geometry, "{}", geometry.kind());
        }
    }

    #[test]
    fn written_rings_are_closed() {
        let triangle = Geometry::Polygon(Polygon::new(
            Ring::new(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 0.0), Coord::xy(0.0, 1.0)]).unwrap(),
            vec![],
        ));
        let wkb = WkbAdapter::from_canonical(&triangle).unwrap();
        // header (5) + ring count (4) + point count (4) + 4 closed xy points
        assert_eq!(wkb.bytes.len(), 5 + 4 + 4 + 4 * 16);
    }

    #[test]
    fn geometry_collections_are_unsupported() {
        let mut bytes = vec![1];
        bytes.extend(7u32.to_le_bytes());
        bytes.extend(0u32.to_le_bytes());
        assert!(matches!(
            WkbAdapter::to_canonical(&WkbGeometry::new(bytes)),
            Err(Error::UnsupportedGeometryKind { .. })
        ));
    }
}

use geojson::{PolygonType, Position, Value as GeoJsonValue};

use super::{GeometryAdapter, RingClosure};
use crate::error::{Error, Result};
use crate::geometry::{Chain, Coord, Geometry, Polygon, Ring};

/// Adapter for `geojson::Geometry`. GeoJSON rings repeat their first position.
pub struct GeoJsonAdapter;

fn coord(position: &Position) -> Result<Coord> {
    Coord::from_slice(position)
        .ok_or_else(|| Error::unsupported_kind(format!("{}-element position", position.len())))
}

fn coords(positions: &[Position]) -> Result<Vec<Coord>> {
    positions.iter().map(coord).collect()
}

fn polygon(rings: &PolygonType) -> Result<Polygon> {
    let mut rings = rings.iter();
    let exterior = match rings.next() {
        Some(ring) => Ring::new(coords(ring)?)?,
        None => return Err(Error::unsupported_kind("empty Polygon")),
    };
    let holes = rings
        .map(|ring| Ring::new(coords(ring)?))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn positions<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Vec<Position> {
    coords.into_iter().map(Coord::to_vec).collect()
}

fn rings(polygon: &Polygon) -> PolygonType {
    polygon
        .rings()
        .map(|ring| positions(&GeoJsonAdapter::CLOSURE.ring_coords(ring)))
        .collect()
}

impl GeometryAdapter for GeoJsonAdapter {
    type Source = geojson::Geometry;

    const CLOSURE: RingClosure = RingClosure::Explicit;

    fn to_canonical(source: &geojson::Geometry) -> Result<Geometry> {
        Ok(match &source.value {
            GeoJsonValue::Point(position) => Geometry::Point(coord(position)?),
            GeoJsonValue::MultiPoint(points) => Geometry::MultiPoint(coords(points)?),
            GeoJsonValue::LineString(line) => Geometry::Chain(Chain::new(coords(line)?)),
            GeoJsonValue::MultiLineString(lines) => Geometry::MultiChain(
                lines
                    .iter()
                    .map(|line| -> Result<Chain> { Ok(Chain::new(coords(line)?)) })
                    .collect::<Result<Vec<_>>>()?,
            ),
            GeoJsonValue::Polygon(rings) => Geometry::Polygon(polygon(rings)?),
            GeoJsonValue::MultiPolygon(polygons) => Geometry::MultiPolygon(
                polygons.iter().map(polygon).collect::<Result<Vec<_>>>()?,
            ),
            GeoJsonValue::GeometryCollection(_) => {
                return Err(Error::unsupported_kind("GeometryCollection"))
            }
        })
    }

    fn from_canonical(geometry: &Geometry) -> Result<geojson::Geometry> {
        let value = match geometry {
            Geometry::Point(c) => GeoJsonValue::Point(c.to_vec()),
            Geometry::MultiPoint(cs) => GeoJsonValue::MultiPoint(positions(cs)),
            Geometry::Chain(chain) => GeoJsonValue::LineString(positions(&chain.coords)),
            Geometry::MultiChain(chains) => GeoJsonValue::MultiLineString(
                chains.iter().map(|c| positions(&c.coords)).collect(),
            ),
            Geometry::Polygon(p) => GeoJsonValue::Polygon(rings(p)),
            Geometry::MultiPolygon(ps) => GeoJsonValue::MultiPolygon(ps.iter().map(rings).collect()),
            Geometry::Grid(_) => return Err(Error::unsupported_target("GeoJSON", geometry.kind())),
        };
        Ok(geojson::Geometry::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon_with_hole() -> geojson::Geometry {
        geojson::Geometry::new(GeoJsonValue::Polygon(vec![
            vec![
                vec![0.0, 0.0],
                vec![10.0, 0.0],
                vec![10.0, 10.0],
                vec![0.0, 10.0],
                vec![0.0, 0.0],
            ],
            vec![
                vec![2.0, 2.0],
                vec![2.0, 4.0],
                vec![4.0, 4.0],
                vec![2.0, 2.0],
            ],
        ]))
    }

    #[test]
    fn polygon_keeps_outer_ring_first_and_holes_in_order() {
        let geometry = GeoJsonAdapter::to_canonical(&polygon_with_hole()).unwrap();
        let Geometry::Polygon(p) = &geometry else {
            panic!("expected polygon, got {:?}", geometry);
        };
        assert_eq!(p.exterior.len(), 4);
        assert_eq!(p.holes.len(), 1);
        assert_eq!(p.holes[0].coords()[1], Coord::xy(2.0, 4.0));
    }

    #[test]
    fn writes_closing_position() {
        let source = polygon_with_hole();
        let geometry = GeoJsonAdapter::to_canonical(&source).unwrap();
        let back = GeoJsonAdapter::from_canonical(&geometry).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn keeps_third_coordinate() {
        let source = geojson::Geometry::new(GeoJsonValue::LineString(vec![
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 2.0],
        ]));
        let geometry = GeoJsonAdapter::to_canonical(&source).unwrap();
        assert_eq!(geometry.dim().unwrap(), Some(crate::geometry::Dim::Xyz));
        assert_eq!(GeoJsonAdapter::from_canonical(&geometry).unwrap(), source);
    }

    #[test]
    fn geometry_collections_are_unsupported() {
        let source = geojson::Geometry::new(GeoJsonValue::GeometryCollection(vec![]));
        match GeoJsonAdapter::to_canonical(&source) {
            Err(Error::UnsupportedGeometryKind { kind }) => assert_eq!(kind, "GeometryCollection"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

use std::fmt;

use shapefile::{Point, PointM, PointZ, PolygonRing, Shape};

use super::{GeometryAdapter, RingClosure};
use crate::error::{Error, Result};
use crate::geometry::{Chain, Coord, Dim, Geometry, Polygon, Ring};

/// Adapter for `shapefile::Shape`.
///
/// Shapefile rings are stored closed. A polygon record is a flat list of
/// outer and inner rings; each inner ring belongs to the outer ring read
/// before it.
///
/// Shapefiles wind outer rings clockwise and holes counter-clockwise, the
/// reverse of canonical (RFC 7946) winding. Every ring is reversed on the
/// way in and on the way out, keeping its first vertex.
pub struct ShapefileAdapter;

trait ToCoord {
    fn coord(&self) -> Coord;
}

impl ToCoord for Point {
    fn coord(&self) -> Coord {
        Coord::xy(self.x, self.y)
    }
}

impl ToCoord for PointM {
    fn coord(&self) -> Coord {
        Coord::xy(self.x, self.y)
    }
}

impl ToCoord for PointZ {
    fn coord(&self) -> Coord {
        Coord::xyz(self.x, self.y, self.z)
    }
}

fn coords<P: ToCoord>(points: &[P]) -> Vec<Coord> {
    points.iter().map(ToCoord::coord).collect()
}

/// Closed ring in the opposite winding, starting at the same vertex.
fn reversed<T: Clone>(closed: &[T]) -> Vec<T> {
    closed.iter().rev().cloned().collect()
}

fn ring<P: ToCoord>(points: &[P]) -> Result<Ring> {
    Ring::new(reversed(&coords(points)))
}

fn lines<P: ToCoord>(parts: &[Vec<P>]) -> Geometry {
    match parts {
        [single] => Geometry::Chain(Chain::new(coords(single))),
        _ => Geometry::MultiChain(parts.iter().map(|p| Chain::new(coords(p))).collect()),
    }
}

fn polygons<P: ToCoord>(rings: &[PolygonRing<P>]) -> Result<Geometry> {
    let mut polygons: Vec<Polygon> = Vec::new();
    for part in rings {
        match part {
            PolygonRing::Outer(points) => {
                polygons.push(Polygon::new(ring(points)?, vec![]));
            }
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(polygon) => polygon.holes.push(ring(points)?),
                None => return Err(Error::unsupported_kind("Polygon hole without outer ring")),
            },
        }
    }
    match polygons.len() {
        0 => Err(Error::unsupported_kind("empty Polygon")),
        1 => Ok(Geometry::Polygon(polygons.remove(0))),
        _ => Ok(Geometry::MultiPolygon(polygons)),
    }
}

/// Shape parts built with one point type, before picking the shape variant.
enum Parts<P> {
    Point(P),
    Points(Vec<P>),
    Lines(Vec<Vec<P>>),
    Rings(Vec<PolygonRing<P>>),
}

fn parts<P>(geometry: &Geometry, point: impl Fn(&Coord) -> P) -> Result<Parts<P>> {
    let points = |cs: &[Coord]| cs.iter().map(&point).collect::<Vec<P>>();
    let line = |chain: &Chain| {
        if chain.coords.len() < 2 {
            return Err(Error::unsupported_target("Shapefile", "Chain with fewer than 2 vertices"));
        }
        Ok(points(chain.coords.as_slice()))
    };
    let ring = |r: &Ring| points(reversed(&ShapefileAdapter::CLOSURE.ring_coords(r)).as_slice());
    let rings = |polygon: &Polygon| {
        std::iter::once(PolygonRing::Outer(ring(&polygon.exterior)))
            .chain(polygon.holes.iter().map(|hole| PolygonRing::Inner(ring(hole))))
            .collect::<Vec<_>>()
    };
    Ok(match geometry {
        Geometry::Point(c) => Parts::Point(point(c)),
        Geometry::MultiPoint(cs) => Parts::Points(points(cs.as_slice())),
        Geometry::Chain(chain) => Parts::Lines(vec![line(chain)?]),
        Geometry::MultiChain(chains) => {
            Parts::Lines(chains.iter().map(line).collect::<Result<Vec<_>>>()?)
        }
        Geometry::Polygon(p) => Parts::Rings(rings(p)),
        Geometry::MultiPolygon(ps) => Parts::Rings(ps.iter().flat_map(rings).collect()),
        Geometry::Grid(_) => return Err(Error::unsupported_target("Shapefile", geometry.kind())),
    })
}

/// `Shape` implements none of `Clone`, `PartialEq` or `Debug`; its records do.
pub(crate) fn clone_shape(shape: &Shape) -> Shape {
    match shape {
        Shape::NullShape => Shape::NullShape,
        Shape::Point(s) => Shape::Point(*s),
        Shape::PointM(s) => Shape::PointM(*s),
        Shape::PointZ(s) => Shape::PointZ(*s),
        Shape::Polyline(s) => Shape::Polyline(s.clone()),
        Shape::PolylineM(s) => Shape::PolylineM(s.clone()),
        Shape::PolylineZ(s) => Shape::PolylineZ(s.clone()),
        Shape::Polygon(s) => Shape::Polygon(s.clone()),
        Shape::PolygonM(s) => Shape::PolygonM(s.clone()),
        Shape::PolygonZ(s) => Shape::PolygonZ(s.clone()),
        Shape::Multipoint(s) => Shape::Multipoint(s.clone()),
        Shape::MultipointM(s) => Shape::MultipointM(s.clone()),
        Shape::MultipointZ(s) => Shape::MultipointZ(s.clone()),
        Shape::Multipatch(s) => Shape::Multipatch(s.clone()),
    }
}

pub(crate) fn shapes_equal(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::NullShape, Shape::NullShape) => true,
        (Shape::Point(a), Shape::Point(b)) => a == b,
        (Shape::PointM(a), Shape::PointM(b)) => a == b,
        (Shape::PointZ(a), Shape::PointZ(b)) => a == b,
        (Shape::Polyline(a), Shape::Polyline(b)) => a == b,
        (Shape::PolylineM(a), Shape::PolylineM(b)) => a == b,
        (Shape::PolylineZ(a), Shape::PolylineZ(b)) => a == b,
        (Shape::Polygon(a), Shape::Polygon(b)) => a == b,
        (Shape::PolygonM(a), Shape::PolygonM(b)) => a == b,
        (Shape::PolygonZ(a), Shape::PolygonZ(b)) => a == b,
        (Shape::Multipoint(a), Shape::Multipoint(b)) => a == b,
        (Shape::MultipointM(a), Shape::MultipointM(b)) => a == b,
        (Shape::MultipointZ(a), Shape::MultipointZ(b)) => a == b,
        (Shape::Multipatch(a), Shape::Multipatch(b)) => a == b,
        _ => false,
    }
}

pub(crate) fn debug_shape(shape: &Shape, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let record: &dyn fmt::Debug = match shape {
        Shape::NullShape => return f.write_str("NullShape"),
        Shape::Point(s) => s,
        Shape::PointM(s) => s,
        Shape::PointZ(s) => s,
        Shape::Polyline(s) => s,
        Shape::PolylineM(s) => s,
        Shape::PolylineZ(s) => s,
        Shape::Polygon(s) => s,
        Shape::PolygonM(s) => s,
        Shape::PolygonZ(s) => s,
        Shape::Multipoint(s) => s,
        Shape::MultipointM(s) => s,
        Shape::MultipointZ(s) => s,
        Shape::Multipatch(s) => s,
    };
    f.debug_tuple(&shape.shapetype().to_string()).field(record).finish()
}

impl GeometryAdapter for ShapefileAdapter {
    type Source = Shape;

    const CLOSURE: RingClosure = RingClosure::Explicit;

    fn to_canonical(source: &Shape) -> Result<Geometry> {
        Ok(match source {
            Shape::Point(p) => Geometry::Point(p.coord()),
            Shape::PointM(p) => Geometry::Point(p.coord()),
            Shape::PointZ(p) => Geometry::Point(p.coord()),
            Shape::Multipoint(mp) => Geometry::MultiPoint(coords(mp.points())),
            Shape::MultipointM(mp) => Geometry::MultiPoint(coords(mp.points())),
            Shape::MultipointZ(mp) => Geometry::MultiPoint(coords(mp.points())),
            Shape::Polyline(pl) => lines(pl.parts()),
            Shape::PolylineM(pl) => lines(pl.parts()),
            Shape::PolylineZ(pl) => lines(pl.parts()),
            Shape::Polygon(p) => polygons(p.rings())?,
            Shape::PolygonM(p) => polygons(p.rings())?,
            Shape::PolygonZ(p) => polygons(p.rings())?,
            Shape::NullShape => return Err(Error::unsupported_kind("NullShape")),
            Shape::Multipatch(_) => return Err(Error::unsupported_kind("Multipatch")),
        })
    }

    fn from_canonical(geometry: &Geometry) -> Result<Shape> {
        if geometry.dim()? == Some(Dim::Xyz) {
            let z = |c: &Coord| PointZ::new(c.x, c.y, c.z.unwrap_or(0.0), shapefile::NO_DATA);
            return Ok(match parts(geometry, z)? {
                Parts::Point(p) => Shape::PointZ(p),
                Parts::Points(ps) => Shape::MultipointZ(shapefile::MultipointZ::new(ps)),
                Parts::Lines(ls) => Shape::PolylineZ(shapefile::PolylineZ::with_parts(ls)),
                Parts::Rings(rs) => Shape::PolygonZ(shapefile::PolygonZ::with_rings(rs)),
            });
        }
        let xy = |c: &Coord| Point::new(c.x, c.y);
        Ok(match parts(geometry, xy)? {
            Parts::Point(p) => Shape::Point(p),
            Parts::Points(ps) => Shape::Multipoint(shapefile::Multipoint::new(ps)),
            Parts::Lines(ls) => Shape::Polyline(shapefile::Polyline::with_parts(ls)),
            Parts::Rings(rs) => Shape::Polygon(shapefile::Polygon::with_rings(rs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn closed_shapefile_ring_keeps_unique_vertices() {
        let shape = Shape::Polygon(shapefile::Polygon::new(PolygonRing::Outer(ring(&[
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.0, 0.0),
        ]))));
        let Geometry::Polygon(p) = ShapefileAdapter::to_canonical(&shape).unwrap() else {
            panic!("expected polygon");
        };
        assert_eq!(p.exterior.len(), 4);
    }

    #[test]
    fn holes_attach_to_preceding_outer_ring() {
        let shape = Shape::Polygon(shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)])),
            PolygonRing::Inner(ring(&[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)])),
            PolygonRing::Outer(ring(&[(20.0, 0.0), (20.0, 5.0), (25.0, 5.0), (20.0, 0.0)])),
        ]));
        let Geometry::MultiPolygon(ps) = ShapefileAdapter::to_canonical(&shape).unwrap() else {
            panic!("expected multipolygon");
        };
        assert_eq!(ps.len(), 2);
        assert_eq!(ps[0].holes.len(), 1);
        assert!(ps[1].holes.is_empty());
    }

    #[test]
    fn multi_part_polyline_becomes_multichain() {
        let shape = Shape::Polyline(shapefile::Polyline::with_parts(vec![
            ring(&[(0.0, 0.0), (1.0, 1.0)]),
            ring(&[(2.0, 2.0), (3.0, 3.0)]),
        ]));
        assert_eq!(ShapefileAdapter::to_canonical(&shape).unwrap().kind(), "MultiChain");
    }

    #[test]
    fn three_dimensional_points_use_z_shapes() {
        let geometry = Geometry::Point(Coord::xyz(1.0, 2.0, 3.0));
        let shape = ShapefileAdapter::from_canonical(&geometry).unwrap();
        assert!(matches!(shape, Shape::PointZ(_)));
        assert_eq!(ShapefileAdapter::to_canonical(&shape).unwrap(), geometry);
    }

    fn canonical_ring(points: &[(f64, f64)]) -> Ring {
        Ring::new(points.iter().map(|&(x, y)| Coord::xy(x, y)).collect()).unwrap()
    }

    /// Shoelace sum; positive for counter-clockwise rings.
    fn signed_area(coords: &[Coord]) -> f64 {
        coords
            .iter()
            .zip(coords.iter().cycle().skip(1))
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            / 2.0
    }

    fn round_trip(geometry: &Geometry) -> Geometry {
        let shape = ShapefileAdapter::from_canonical(geometry).unwrap();
        ShapefileAdapter::to_canonical(&shape).unwrap()
    }

    #[test]
    fn counter_clockwise_exterior_round_trips_unchanged() {
        let polygon = Geometry::Polygon(Polygon::new(
            canonical_ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![canonical_ring(&[(2.0, 2.0), (2.0, 4.0), (4.0, 4.0), (4.0, 2.0)])],
        ));
        let Shape::Polygon(shape) = ShapefileAdapter::from_canonical(&polygon).unwrap() else {
            panic!("expected polygon shape");
        };
        let outer = coords(shape.rings()[0].points());
        assert!(signed_area(&outer) < 0.0, "shapefile outer rings wind clockwise");
        assert_eq!(outer[0], Coord::xy(0.0, 0.0));
        assert_eq!(ShapefileAdapter::to_canonical(&Shape::Polygon(shape)).unwrap(), polygon);
    }

    #[test]
    fn clockwise_exterior_reads_back_counter_clockwise() {
        let exterior = canonical_ring(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
        let Geometry::Polygon(back) = round_trip(&Geometry::Polygon(Polygon::new(exterior, vec![])))
        else {
            panic!("expected polygon");
        };
        assert!(signed_area(back.exterior.coords()) > 0.0);
        assert_eq!(back.exterior.coords()[0], Coord::xy(0.0, 0.0));
    }

    #[test]
    fn multi_geometries_round_trip() {
        let square = |dx: f64| {
            Polygon::new(
                canonical_ring(&[(dx, 0.0), (dx + 4.0, 0.0), (dx + 4.0, 4.0), (dx, 4.0)]),
                vec![canonical_ring(&[(dx + 1.0, 1.0), (dx + 1.0, 2.0), (dx + 2.0, 2.0), (dx + 2.0, 1.0)])],
            )
        };
        let cases = [
            Geometry::MultiPolygon(vec![square(0.0), square(10.0)]),
            Geometry::MultiChain(vec![
                Chain::new(vec![Coord::xy(0.0, 0.0), Coord::xy(1.0, 1.0)]),
                Chain::new(vec![Coord::xy(2.0, 2.0), Coord::xy(3.0, 3.0)]),
            ]),
            Geometry::MultiPoint(vec![Coord::xy(1.0, 2.0), Coord::xy(3.0, 4.0)]),
            Geometry::Polygon(Polygon::new(
                Ring::new(vec![
                    Coord::xyz(0.0, 0.0, 1.0),
                    Coord::xyz(1.0, 0.0, 2.0),
                    Coord::xyz(1.0, 1.0, 3.0),
                ])
                .unwrap(),
                vec![],
            )),
            Geometry::MultiChain(vec![
                Chain::new(vec![Coord::xyz(0.0, 0.0, 9.0), Coord::xyz(1.0, 1.0, 8.0)]),
                Chain::new(vec![Coord::xyz(5.0, 5.0, 7.0), Coord::xyz(6.0, 5.0, 6.0)]),
            ]),
        ];
        for geometry in &cases {
            assert_eq!(&round_trip(geometry), geometry, "{}", geometry.kind());
        }
    }

    #[test]
    fn shapes_compare_by_record() {
        let a = Shape::Point(Point::new(1.0, 2.0));
        assert!(shapes_equal(&a, &clone_shape(&a)));
        assert!(!shapes_equal(&a, &Shape::NullShape));
        assert!(!shapes_equal(&a, &Shape::PointZ(PointZ::new(1.0, 2.0, 0.0, 0.0))));
    }

    #[test]
    fn null_shapes_are_unsupported() {
        assert!(matches!(
            ShapefileAdapter::to_canonical(&Shape::NullShape),
            Err(Error::UnsupportedGeometryKind { .. })
        ));
    }
}

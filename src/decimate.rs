//! Vertex-count reduction for fetched boundaries.
//!
//! Simplification itself is Ramer-Douglas-Peucker from `geo`. This module
//! only threads the parameters: an optional starting tolerance, a target
//! vertex range and an iteration cap for the tolerance search.

use geo::{BoundingRect, LineString, SimplifyIdx};

use crate::error::{Error, Result};
use crate::geometry::{Chain, Coord, Geometry, Polygon, Ring};
use crate::geotable::{Domain, GeoTable};

const MIN_RING_VERTICES: usize = 3;
const MIN_CHAIN_VERTICES: usize = 2;

/// Decimation parameters.
///
/// Rings are counted without their closing vertex. `min_vertices` wins over
/// `max_vertices`: a ring is never reduced below `min_vertices`, even if that
/// leaves it above `max_vertices`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decimation {
    /// Starting tolerance in coordinate units. `None` leaves in-range rings untouched.
    pub tolerance: Option<f64>,
    pub min_vertices: usize,
    pub max_vertices: usize,
    /// Bisection steps allowed per ring when searching for a tolerance.
    pub max_iterations: usize,
}

impl Default for Decimation {
    fn default() -> Self {
        Decimation {
            tolerance: None,
            min_vertices: 3,
            max_vertices: usize::MAX,
            max_iterations: 10,
        }
    }
}

impl Decimation {
    pub fn validate(&self) -> Result<()> {
        if self.min_vertices > self.max_vertices {
            return Err(Error::InvalidDecimation {
                min: self.min_vertices,
                max: self.max_vertices,
            });
        }
        Ok(())
    }

    /// Whether applying these parameters can change anything.
    pub fn is_noop(&self) -> bool {
        self.tolerance.is_none() && self.max_vertices == usize::MAX
    }

    pub fn apply(&self, geometry: &Geometry) -> Result<Geometry> {
        self.validate()?;
        Ok(match geometry {
            Geometry::Chain(chain) => Geometry::Chain(self.chain(chain)),
            Geometry::MultiChain(chains) => {
                Geometry::MultiChain(chains.iter().map(|c| self.chain(c)).collect())
            }
            Geometry::Polygon(p) => Geometry::Polygon(self.polygon(p)?),
            Geometry::MultiPolygon(ps) => Geometry::MultiPolygon(
                ps.iter().map(|p| self.polygon(p)).collect::<Result<Vec<_>>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Decimate every element of a vector domain. The result is eager.
    pub fn apply_table(&self, table: GeoTable) -> Result<GeoTable> {
        self.validate()?;
        let table = table.materialize()?;
        if self.is_noop() || !table.domain().is_vector() {
            return Ok(table);
        }
        let (domain, values) = table.into_parts();
        let Domain::Geometries(geometries) = domain else {
            return GeoTable::new(domain, values);
        };
        let decimated = geometries
            .iter()
            .map(|g| self.apply(g))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            before = vertex_count(&geometries),
            after = vertex_count(&decimated),
            "decimated domain"
        );
        GeoTable::new(Domain::Geometries(decimated), values)
    }

    fn polygon(&self, polygon: &Polygon) -> Result<Polygon> {
        let exterior = self.ring(&polygon.exterior)?;
        let holes = polygon
            .holes
            .iter()
            .map(|h| self.ring(h))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, holes))
    }

    fn ring(&self, ring: &Ring) -> Result<Ring> {
        let closed: Vec<Coord> = ring.closed_coords().copied().collect();
        match self.fit(&closed, MIN_RING_VERTICES, 1) {
            Some(mut coords) => {
                coords.pop();
                Ring::new(coords)
            }
            None => Ok(ring.clone()),
        }
    }

    fn chain(&self, chain: &Chain) -> Chain {
        match self.fit(&chain.coords, MIN_CHAIN_VERTICES, 0) {
            Some(coords) => Chain::new(coords),
            None => chain.clone(),
        }
    }

    /// Simplified copy of `coords` within the vertex bounds, or `None` to keep
    /// the input. `closing` vertices at the end are not counted.
    fn fit(&self, coords: &[Coord], floor: usize, closing: usize) -> Option<Vec<Coord>> {
        let min = self.min_vertices.max(floor);
        let max = self.max_vertices;
        let line: LineString<f64> = coords.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>().into();
        let simplify = |epsilon: f64| -> Vec<Coord> {
            line.simplify_idx(&epsilon)
                .into_iter()
                .map(|i| coords[i])
                .collect()
        };
        let count = |c: &[Coord]| c.len().saturating_sub(closing);
        let in_bounds = |n: usize| (min..=max).contains(&n);

        let original = count(coords);
        let (mut lo, mut hi) = match self.tolerance {
            Some(tolerance) => {
                let candidate = simplify(tolerance);
                let n = count(&candidate);
                if in_bounds(n) {
                    return Some(candidate);
                }
                if n < min {
                    if original < min {
                        return None;
                    }
                    (0.0, tolerance)
                } else {
                    (tolerance, extent(&line).max(tolerance))
                }
            }
            None if original <= max => return None,
            None => (0.0, extent(&line)),
        };

        for _ in 0..self.max_iterations {
            let mid = (lo + hi) / 2.0;
            let candidate = simplify(mid);
            let n = count(&candidate);
            if n > max {
                lo = mid;
            } else if n < min {
                hi = mid;
            } else {
                return Some(candidate);
            }
        }
        // Out of iterations: keep the finest reduction that respects `min`.
        let candidate = simplify(lo);
        (count(&candidate) >= min && count(&candidate) < original).then_some(candidate)
    }
}

fn extent(line: &LineString<f64>) -> f64 {
    line.bounding_rect()
        .map(|r| r.width().hypot(r.height()))
        .unwrap_or(0.0)
}

fn vertex_count(geometries: &[Geometry]) -> usize {
    geometries
        .iter()
        .map(|g| match g {
            Geometry::Point(_) => 1,
            Geometry::MultiPoint(cs) => cs.len(),
            Geometry::Chain(c) => c.coords.len(),
            Geometry::MultiChain(cs) => cs.iter().map(|c| c.coords.len()).sum(),
            Geometry::Polygon(p) => p.rings().map(Ring::len).sum(),
            Geometry::MultiPolygon(ps) => ps.iter().flat_map(|p| p.rings()).map(Ring::len).sum(),
            Geometry::Grid(_) => 0,
        })
        .sum()
}

//! Canonical geometry model.
//!
//! Every format adapter converts into and out of these types; nothing else in
//! the crate touches a library-specific geometry.
//!
//! Rings are stored open: the closing vertex is never kept, targets that need
//! it get it added on the way out.

use std::fmt;

use crate::error::{Error, Result};
use crate::table::AttributeTable;

/// Coordinate dimensionality of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Xy,
    Xyz,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Xy => write!(f, "2D"),
            Dim::Xyz => write!(f, "3D"),
        }
    }
}

/// A 2D or 3D coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    pub fn xy(x: f64, y: f64) -> Self {
        Coord { x, y, z: None }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Coord { x, y, z: Some(z) }
    }

    /// Build a coordinate from a position slice (`[x, y]` or `[x, y, z, ...]`).
    pub fn from_slice(position: &[f64]) -> Option<Self> {
        match position {
            [x, y] => Some(Coord::xy(*x, *y)),
            [x, y, z, ..] => Some(Coord::xyz(*x, *y, *z)),
            _ => None,
        }
    }

    pub fn dim(&self) -> Dim {
        if self.z.is_some() {
            Dim::Xyz
        } else {
            Dim::Xy
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self.z {
            Some(z) => vec![self.x, self.y, z],
            None => vec![self.x, self.y],
        }
    }
}

/// Check that every coordinate in `coords` shares one dimensionality.
fn common_dim<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Result<Option<Dim>> {
    let mut dim = None;
    for coord in coords {
        merge_dim(&mut dim, Some(coord.dim()))?;
    }
    Ok(dim)
}

pub(crate) fn merge_dim(acc: &mut Option<Dim>, next: Option<Dim>) -> Result<()> {
    match (*acc, next) {
        (_, None) => Ok(()),
        (None, Some(d)) => {
            *acc = Some(d);
            Ok(())
        }
        (Some(expected), Some(found)) if expected != found => {
            Err(Error::InconsistentDimensionality { expected, found })
        }
        _ => Ok(()),
    }
}

/// Closed ring stored without its closing vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    coords: Vec<Coord>,
}

impl Ring {
    /// Build a ring, dropping a trailing vertex that repeats the first one.
    pub fn new(mut coords: Vec<Coord>) -> Result<Self> {
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        let distinct = distinct_count(&coords, 3);
        if distinct < 3 {
            return Err(Error::DegenerateRing { vertices: distinct });
        }
        common_dim(&coords)?;
        Ok(Ring { coords })
    }

    /// Unique vertices in ring order.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// Vertices followed by a copy of the first vertex.
    pub fn closed_coords(&self) -> impl Iterator<Item = &Coord> {
        self.coords.iter().chain(self.coords.first())
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// Distinct vertices, counted up to `limit`.
fn distinct_count(coords: &[Coord], limit: usize) -> usize {
    let mut seen: Vec<&Coord> = Vec::with_capacity(limit);
    for coord in coords {
        if !seen.contains(&coord) {
            seen.push(coord);
            if seen.len() == limit {
                break;
            }
        }
    }
    seen.len()
}

/// Ordered coordinate sequence (line string).
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub coords: Vec<Coord>,
}

impl Chain {
    pub fn new(coords: Vec<Coord>) -> Self {
        Chain { coords }
    }
}

/// Outer ring followed by zero or more holes, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Polygon { exterior, holes }
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }
}

/// Regular grid of `dims[0] x dims[1]` cells anchored at `origin`.
///
/// Cells are numbered with x varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub origin: Coord,
    pub spacing: [f64; 2],
    pub dims: [usize; 2],
}

impl Grid {
    pub fn new(origin: Coord, spacing: [f64; 2], dims: [usize; 2]) -> Self {
        Grid {
            origin,
            spacing,
            dims,
        }
    }

    /// Unit grid with its origin at (0, 0), as used for images.
    pub fn unit(width: usize, height: usize) -> Self {
        Grid::new(Coord::xy(0.0, 0.0), [1.0, 1.0], [width, height])
    }

    pub fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Cell `index` as a four-vertex polygon.
    pub fn cell(&self, index: usize) -> Result<Polygon> {
        let len = self.cell_count();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let col = (index % self.dims[0]) as f64;
        let row = (index / self.dims[0]) as f64;
        let min_x = self.origin.x + col * self.spacing[0];
        let min_y = self.origin.y + row * self.spacing[1];
        let max_x = min_x + self.spacing[0];
        let max_y = min_y + self.spacing[1];
        let exterior = Ring::new(vec![
            Coord::xy(min_x, min_y),
            Coord::xy(max_x, min_y),
            Coord::xy(max_x, max_y),
            Coord::xy(min_x, max_y),
        ])?;
        Ok(Polygon::new(exterior, vec![]))
    }
}

/// Explicit vertex/face set. A mesh without faces is a point set.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Coord>,
    pub faces: Vec<Vec<usize>>,
    /// Per-vertex attributes of a mesh with faces; its elements carry their own.
    pub vertex_attributes: AttributeTable,
}

impl Mesh {
    pub fn new(vertices: Vec<Coord>, faces: Vec<Vec<usize>>) -> Self {
        Mesh {
            vertices,
            faces,
            vertex_attributes: AttributeTable::default(),
        }
    }

    pub fn with_vertex_attributes(mut self, attributes: AttributeTable) -> Self {
        self.vertex_attributes = attributes;
        self
    }

    /// Number of elements: faces, or vertices for a point set.
    pub fn element_count(&self) -> usize {
        if self.faces.is_empty() {
            self.vertices.len()
        } else {
            self.faces.len()
        }
    }

    pub fn element(&self, index: usize) -> Result<Geometry> {
        let len = self.element_count();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        if self.faces.is_empty() {
            return Ok(Geometry::Point(self.vertices[index]));
        }
        let coords = self.faces[index]
            .iter()
            .map(|&v| {
                self.vertices.get(v).copied().ok_or(Error::IndexOutOfBounds {
                    index: v,
                    len: self.vertices.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Geometry::Polygon(Polygon::new(Ring::new(coords)?, vec![])))
    }
}

/// The canonical geometry union.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    Chain(Chain),
    MultiChain(Vec<Chain>),
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
    Grid(Grid),
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::Chain(_) => "Chain",
            Geometry::MultiChain(_) => "MultiChain",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Grid(_) => "Grid",
        }
    }

    /// Dimensionality of the geometry, `None` when it has no coordinates.
    pub fn dim(&self) -> Result<Option<Dim>> {
        match self {
            Geometry::Point(c) => Ok(Some(c.dim())),
            Geometry::MultiPoint(cs) => common_dim(cs),
            Geometry::Chain(chain) => common_dim(&chain.coords),
            Geometry::MultiChain(chains) => common_dim(chains.iter().flat_map(|c| &c.coords)),
            Geometry::Polygon(p) => common_dim(p.rings().flat_map(|r| r.coords())),
            Geometry::MultiPolygon(ps) => {
                common_dim(ps.iter().flat_map(|p| p.rings()).flat_map(|r| r.coords()))
            }
            Geometry::Grid(_) => Ok(Some(Dim::Xy)),
        }
    }

    /// Apply `f` to every coordinate, rebuilding rings so their invariants hold.
    pub fn try_map_coords<F>(&self, mut f: F) -> Result<Geometry>
    where
        F: FnMut(Coord) -> Result<Coord>,
    {
        Ok(match self {
            Geometry::Point(c) => Geometry::Point(f(*c)?),
            Geometry::MultiPoint(cs) => Geometry::MultiPoint(map_coords(cs, &mut f)?),
            Geometry::Chain(chain) => Geometry::Chain(Chain::new(map_coords(&chain.coords, &mut f)?)),
            Geometry::MultiChain(chains) => Geometry::MultiChain(
                chains
                    .iter()
                    .map(|c| -> Result<Chain> { Ok(Chain::new(map_coords(&c.coords, &mut f)?)) })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Geometry::Polygon(p) => Geometry::Polygon(map_polygon(p, &mut f)?),
            Geometry::MultiPolygon(ps) => Geometry::MultiPolygon(
                ps.iter()
                    .map(|p| map_polygon(p, &mut f))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Geometry::Grid(_) => return Err(Error::unsupported_kind("Grid")),
        })
    }
}

fn map_coords<F>(coords: &[Coord], f: &mut F) -> Result<Vec<Coord>>
where
    F: FnMut(Coord) -> Result<Coord>,
{
    coords.iter().map(|c| f(*c)).collect()
}

fn map_polygon<F>(polygon: &Polygon, f: &mut F) -> Result<Polygon>
where
    F: FnMut(Coord) -> Result<Coord>,
{
    let exterior = Ring::new(map_coords(polygon.exterior.coords(), f)?)?;
    let holes = polygon
        .holes
        .iter()
        .map(|h| Ring::new(map_coords(h.coords(), f)?))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

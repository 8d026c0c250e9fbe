//! Table adapter: pairs a domain of canonical geometries with its attribute
//! table, converting a row table's geometry column eagerly or on access.

use std::borrow::Cow;

use crate::convert::{self, Format, SourceGeometry};
use crate::error::{Error, Result};
use crate::geometry::{merge_dim, Geometry, Grid, Mesh};
use crate::table::{AttributeTable, ColumnData, RowTable};

pub const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// Read-only, index-addressable view converting source geometries on access.
///
/// Borrows the source column; every access redoes the conversion.
#[derive(Debug, Clone, Copy)]
pub struct GeometryView<'a> {
    source: &'a [SourceGeometry],
}

impl<'a> GeometryView<'a> {
    pub fn new(source: &'a [SourceGeometry]) -> Self {
        GeometryView { source }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Geometry> {
        let source = self.source.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            len: self.source.len(),
        })?;
        convert::to_canonical(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Geometry>> + 'a {
        self.source.iter().map(convert::to_canonical)
    }
}

/// Source geometries owned by a lazy geo-table.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyDomain {
    source: Vec<SourceGeometry>,
}

impl LazyDomain {
    pub fn new(source: Vec<SourceGeometry>) -> Self {
        LazyDomain { source }
    }

    pub fn view(&self) -> GeometryView<'_> {
        GeometryView::new(&self.source)
    }
}

/// Ordered geometries defining the rows of a geo-table.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Geometries(Vec<Geometry>),
    Lazy(LazyDomain),
    Grid(Grid),
    Mesh(Mesh),
}

impl Domain {
    pub fn len(&self) -> usize {
        match self {
            Domain::Geometries(g) => g.len(),
            Domain::Lazy(lazy) => lazy.source.len(),
            Domain::Grid(grid) => grid.cell_count(),
            Domain::Mesh(mesh) => mesh.element_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Domain::Geometries(_) => "geometry set",
            Domain::Lazy(_) => "lazy geometry set",
            Domain::Grid(_) => "Grid",
            Domain::Mesh(_) => "Mesh",
        }
    }

    /// Whether every element can be written to a vector format.
    pub fn is_vector(&self) -> bool {
        matches!(self, Domain::Geometries(_) | Domain::Lazy(_))
    }

    /// Element `index`, converted if the domain is lazy.
    pub fn element(&self, index: usize) -> Result<Cow<'_, Geometry>> {
        let len = self.len();
        match self {
            Domain::Geometries(g) => g
                .get(index)
                .map(Cow::Borrowed)
                .ok_or(Error::IndexOutOfBounds { index, len }),
            Domain::Lazy(lazy) => lazy.view().get(index).map(Cow::Owned),
            Domain::Grid(grid) => Ok(Cow::Owned(Geometry::Polygon(grid.cell(index)?))),
            Domain::Mesh(mesh) => mesh.element(index).map(Cow::Owned),
        }
    }
}

/// A domain paired with the attribute rows describing each element.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTable {
    domain: Domain,
    values: AttributeTable,
}

impl GeoTable {
    /// Pair `domain` with `values`, checking they have the same number of rows.
    pub fn new(domain: Domain, values: AttributeTable) -> Result<Self> {
        if let Some(rows) = values.row_count() {
            if rows != domain.len() {
                return Err(Error::LengthMismatch {
                    domain: domain.len(),
                    rows,
                });
            }
        }
        for column in &values.columns {
            if column.values.len() != domain.len() {
                return Err(Error::ColumnLengthMismatch {
                    column: column.name.clone(),
                    expected: domain.len(),
                    found: column.values.len(),
                });
            }
        }
        Ok(GeoTable { domain, values })
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn values(&self) -> &AttributeTable {
        &self.values
    }

    pub fn into_parts(self) -> (Domain, AttributeTable) {
        (self.domain, self.values)
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.domain, Domain::Lazy(_))
    }

    pub fn geometry(&self, index: usize) -> Result<Cow<'_, Geometry>> {
        self.domain.element(index)
    }

    /// Convert a lazy domain in full. Other domains are returned unchanged.
    pub fn materialize(self) -> Result<GeoTable> {
        match self.domain {
            Domain::Lazy(lazy) => Ok(GeoTable {
                domain: Domain::Geometries(convert_all(lazy.view())?),
                values: self.values,
            }),
            domain => Ok(GeoTable {
                domain,
                values: self.values,
            }),
        }
    }

    /// Keep rows by index, in the given order. The result is always eager.
    pub fn select_rows(&self, rows: &[usize]) -> Result<GeoTable> {
        let geometries = rows
            .iter()
            .map(|&i| self.geometry(i).map(Cow::into_owned))
            .collect::<Result<Vec<_>>>()?;
        GeoTable::new(Domain::Geometries(geometries), self.values.select_rows(rows))
    }
}

fn convert_all(view: GeometryView<'_>) -> Result<Vec<Geometry>> {
    let mut dim = None;
    let mut geometries = Vec::with_capacity(view.len());
    for geometry in view.iter() {
        let geometry = geometry?;
        merge_dim(&mut dim, geometry.dim()?)?;
        geometries.push(geometry);
    }
    Ok(geometries)
}

/// Wrap `table`, converting every geometry in `geometry_column` now
/// (`lazy == false`) or on access (`lazy == true`).
pub fn wrap(table: RowTable, geometry_column: &str, lazy: bool) -> Result<GeoTable> {
    let (source, values) = table.split_geometry(geometry_column)?;
    let domain = if lazy {
        Domain::Lazy(LazyDomain::new(source))
    } else {
        Domain::Geometries(convert_all(GeometryView::new(&source))?)
    };
    tracing::debug!(rows = domain.len(), lazy, "wrapped row table");
    GeoTable::new(domain, values)
}

/// `wrap` with conversion deferred to first access of each geometry.
pub fn wrap_lazy(table: RowTable, geometry_column: &str) -> Result<GeoTable> {
    wrap(table, geometry_column, true)
}

/// Lazy view over the geometry column of a borrowed table.
pub fn view<'a>(table: &'a RowTable, geometry_column: &str) -> Result<GeometryView<'a>> {
    table.geometry_column(geometry_column).map(GeometryView::new)
}

/// Rebuild a row table for `format`: attribute columns in order, then the
/// geometry column converted back to the format's representation.
///
/// The geometry column always comes last and is always named
/// [`DEFAULT_GEOMETRY_COLUMN`], whatever its name and position were when the
/// table was wrapped.
pub fn unwrap(table: &GeoTable, format: Format) -> Result<RowTable> {
    if !table.domain.is_vector() {
        return Err(Error::unsupported_target(format, table.domain.kind()));
    }
    let mut geometries = Vec::with_capacity(table.len());
    for index in 0..table.len() {
        let geometry = table.geometry(index)?;
        geometries.push(convert::from_canonical(&geometry, format)?);
    }
    let mut rows = RowTable::new();
    for column in &table.values.columns {
        rows.push(column.name.clone(), ColumnData::Values(column.values.clone()))?;
    }
    rows.push(DEFAULT_GEOMETRY_COLUMN, ColumnData::Geometry(geometries))?;
    Ok(rows)
}

/// Geo-table for image and mesh sources, which never pass through a row table.
pub fn from_grid_or_mesh(domain: Domain, values: AttributeTable) -> Result<GeoTable> {
    match domain {
        Domain::Grid(_) | Domain::Mesh(_) => GeoTable::new(domain, values),
        other => Err(Error::unsupported_kind(other.kind())),
    }
}

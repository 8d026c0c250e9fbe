//! CRS transformation of a geo-table's domain through PROJ.

use proj::Proj;

use crate::error::{Error, Result};
use crate::geometry::Coord;
use crate::geotable::{Domain, GeoTable};

/// Transform every coordinate of `table` from `from_crs` to `to_crs`.
///
/// CRS strings are anything PROJ accepts (`EPSG:4326`, PROJ strings, WKT).
/// Z values pass through unchanged. Grid domains are rejected since a
/// transformed grid is no longer regular; lazy domains are materialized.
pub fn reproject(table: GeoTable, from_crs: &str, to_crs: &str) -> Result<GeoTable> {
    let proj = Proj::new_known_crs(from_crs, to_crs, None)?;
    let transform = |c: Coord| -> Result<Coord> {
        let (x, y) = proj.convert((c.x, c.y))?;
        Ok(Coord { x, y, z: c.z })
    };

    let (domain, values) = table.materialize()?.into_parts();
    let domain = match domain {
        Domain::Geometries(geometries) => Domain::Geometries(
            geometries
                .iter()
                .map(|g| g.try_map_coords(&transform))
                .collect::<Result<Vec<_>>>()?,
        ),
        Domain::Mesh(mut mesh) => {
            for vertex in &mut mesh.vertices {
                *vertex = transform(*vertex)?;
            }
            Domain::Mesh(mesh)
        }
        other => return Err(Error::unsupported_kind(other.kind())),
    };
    tracing::info!("Reprojected {} rows from {} to {}", domain.len(), from_crs, to_crs);
    GeoTable::new(domain, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::table::AttributeTable;

    #[test]
    fn web_mercator_keeps_origin_and_z() {
        let table = GeoTable::new(
            Domain::Geometries(vec![Geometry::Point(Coord::xyz(0.0, 0.0, 12.0))]),
            AttributeTable::default(),
        )
        .unwrap();
        let projected = reproject(table, "EPSG:4326", "EPSG:3857").unwrap();
        let Geometry::Point(c) = projected.geometry(0).unwrap().into_owned() else {
            panic!("expected point");
        };
        assert!(c.x.abs() < 1e-6 && c.y.abs() < 1e-6);
        assert_eq!(c.z, Some(12.0));
    }
}

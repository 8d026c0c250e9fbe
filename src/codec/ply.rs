use std::fs::File;
use std::path::Path;

use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use super::{Codec, CodecOptions, Loaded};
use crate::error::{Error, Result};
use crate::geometry::{Coord, Mesh};
use crate::geotable::{self, Domain};
use crate::table::{AttributeTable, Column, Value};

const POSITION: [&str; 3] = ["x", "y", "z"];
const FACE_INDEX_PROPERTIES: [&str; 2] = ["vertex_indices", "vertex_index"];

/// Polygon meshes and point clouds in PLY format, through `ply-rs`.
///
/// Elements are the faces; a file without faces is a point set whose
/// elements are the vertices. Scalar properties of the element become
/// attribute columns.
pub struct PlyCodec;

fn scalar(property: &Property) -> Option<Value> {
    Some(match property {
        Property::Char(v) => Value::Integer(i64::from(*v)),
        Property::UChar(v) => Value::Integer(i64::from(*v)),
        Property::Short(v) => Value::Integer(i64::from(*v)),
        Property::UShort(v) => Value::Integer(i64::from(*v)),
        Property::Int(v) => Value::Integer(i64::from(*v)),
        Property::UInt(v) => Value::Integer(i64::from(*v)),
        Property::Float(v) => Value::Float(f64::from(*v)),
        Property::Double(v) => Value::Float(*v),
        _ => return None,
    })
}

fn indices(property: &Property) -> Option<Vec<usize>> {
    fn convert<T: Copy + TryInto<usize>>(list: &[T]) -> Option<Vec<usize>> {
        list.iter().map(|&i| i.try_into().ok()).collect()
    }
    match property {
        Property::ListChar(l) => convert(l),
        Property::ListUChar(l) => convert(l),
        Property::ListShort(l) => convert(l),
        Property::ListUShort(l) => convert(l),
        Property::ListInt(l) => convert(l),
        Property::ListUInt(l) => convert(l),
        _ => None,
    }
}

fn position(vertex: &DefaultElement, index: usize) -> Result<Coord> {
    let mut axes = POSITION
        .iter()
        .map(|name| vertex.get(*name).and_then(scalar).and_then(|v| v.as_f64()));
    let (Some(Some(x)), Some(Some(y))) = (axes.next(), axes.next()) else {
        return Err(Error::unsupported_kind(format!(
            "PLY vertex {} without x/y position",
            index
        )));
    };
    Ok(match axes.next().flatten() {
        Some(z) => Coord::xyz(x, y, z),
        None => Coord::xy(x, y),
    })
}

fn face(element: &DefaultElement, index: usize) -> Result<Vec<usize>> {
    FACE_INDEX_PROPERTIES
        .iter()
        .find_map(|name| element.get(*name).and_then(indices))
        .ok_or_else(|| Error::unsupported_kind(format!("PLY face {} without vertex indices", index)))
}

/// One column per scalar property of `elements`, in header order, skipping
/// the properties consumed by the domain.
fn attributes(elements: &[DefaultElement], skip: &[&str]) -> AttributeTable {
    let Some(first) = elements.first() else {
        return AttributeTable::default();
    };
    let columns = first
        .iter()
        .filter(|(name, property)| !skip.contains(&name.as_str()) && scalar(property).is_some())
        .map(|(name, _)| {
            let values = elements
                .iter()
                .map(|e| e.get(name).and_then(scalar).unwrap_or(Value::Null))
                .collect();
            Column::new(name.clone(), values)
        })
        .collect();
    AttributeTable::new(columns)
}

impl Codec for PlyCodec {
    fn name(&self) -> &'static str {
        "PLY"
    }

    fn read(&self, path: &Path, _layer: usize, _options: &CodecOptions) -> Result<Loaded> {
        tracing::info!("Loading file: {}", path.display());
        let mut file = File::open(path)?;
        let ply = Parser::<DefaultElement>::new().read_ply(&mut file)?;
        let no_elements = Vec::new();
        let vertex_elements = ply.payload.get("vertex").unwrap_or(&no_elements);
        let face_elements = ply.payload.get("face").unwrap_or(&no_elements);

        let vertices = vertex_elements
            .iter()
            .enumerate()
            .map(|(i, v)| position(v, i))
            .collect::<Result<Vec<_>>>()?;
        let faces = face_elements
            .iter()
            .enumerate()
            .map(|(i, f)| face(f, i))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(vertices = vertices.len(), faces = faces.len(), "read PLY payload");

        let vertex_values = attributes(vertex_elements, &POSITION);
        let (mesh, values) = if faces.is_empty() {
            (Mesh::new(vertices, faces), vertex_values)
        } else {
            let face_values = attributes(face_elements, &FACE_INDEX_PROPERTIES);
            (Mesh::new(vertices, faces).with_vertex_attributes(vertex_values), face_values)
        };
        let table = geotable::from_grid_or_mesh(Domain::Mesh(mesh), values)?;
        Ok(Loaded::Table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use std::io::Write;

    fn load(text: &str) -> Result<Loaded> {
        let mut file = tempfile::Builder::new().suffix(".ply").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        PlyCodec.read(file.path(), 0, &CodecOptions::new())
    }

    #[test]
    fn faces_become_elements() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 4\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\n\
            element face 2\nproperty list uchar int vertex_indices\nproperty uchar material\n\
            end_header\n\
            0 0 0 255\n1 0 0 0\n1 1 0 0\n0 1 0 0\n\
            3 0 1 2 7\n3 0 2 3 9\n";
        let Loaded::Table(table) = load(text).unwrap() else {
            panic!("expected a geo-table");
        };
        assert_eq!(table.len(), 2);
        assert!(matches!(table.geometry(1).unwrap().as_ref(), Geometry::Polygon(p) if p.exterior.len() == 3));
        assert_eq!(table.values().value("material", 1), Some(&Value::Integer(9)));
        assert!(table.values().column("vertex_indices").is_none());
        let Domain::Mesh(mesh) = table.domain() else {
            panic!("expected mesh domain");
        };
        assert_eq!(mesh.vertex_attributes.value("red", 0), Some(&Value::Integer(255)));
    }

    #[test]
    fn vertex_only_file_is_a_point_set() {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 2\nproperty double x\nproperty double y\nproperty float confidence\n\
            end_header\n\
            1 2 0.5\n3 4 0.25\n";
        let Loaded::Table(table) = load(text).unwrap() else {
            panic!("expected a geo-table");
        };
        assert_eq!(table.len(), 2);
        assert_eq!(table.geometry(1).unwrap().into_owned(), Geometry::Point(Coord::xy(3.0, 4.0)));
        assert_eq!(table.values().value("confidence", 0), Some(&Value::Float(0.5)));
        assert_eq!(table.values().columns.len(), 1);
    }
}

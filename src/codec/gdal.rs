use std::path::Path;

use gdal::vector::{FieldValue, Geometry, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType};
use gdal::{Dataset, DriverManager, DriverType};

use super::{Codec, CodecOptions, Loaded};
use crate::convert::{Format, SourceGeometry, WkbGeometry};
use crate::error::{Error, Result};
use crate::geotable::{self, GeoTable, DEFAULT_GEOMETRY_COLUMN};
use crate::table::{ColumnData, ColumnType, RowTable, Value};

/// Any vector format GDAL can open, one layer at a time.
pub struct GdalCodec;

fn field_value(value: Option<FieldValue>) -> Value {
    match value {
        None => Value::Null,
        Some(FieldValue::IntegerValue(i)) => Value::Integer(i64::from(i)),
        Some(FieldValue::Integer64Value(i)) => Value::Integer(i),
        Some(FieldValue::RealValue(f)) => Value::Float(f),
        Some(FieldValue::StringValue(s)) => Value::Text(s),
        Some(FieldValue::DateValue(d)) => Value::Text(d.to_string()),
        Some(FieldValue::DateTimeValue(d)) => Value::Text(d.to_rfc3339()),
        Some(other) => Value::Text(format!("{:?}", other)),
    }
}

fn read_rows(path: &Path, layer: usize) -> Result<RowTable> {
    let dataset = Dataset::open(path)?;
    let mut source = dataset.layers().nth(layer).ok_or(Error::IndexOutOfBounds {
        index: layer,
        len: dataset.layer_count() as usize,
    })?;
    tracing::debug!(layer = %source.name(), "reading GDAL layer");

    let mut names: Vec<String> = Vec::new();
    let mut records: Vec<Vec<(String, Value)>> = Vec::new();
    let mut geometries = Vec::new();
    for (index, feature) in source.features().enumerate() {
        let Some(geometry) = feature.geometry() else {
            tracing::warn!("Skipping feature {} without geometry", index);
            continue;
        };
        geometries.push(SourceGeometry::Wkb(WkbGeometry::new(geometry.wkb()?)));
        let fields: Vec<(String, Value)> = feature
            .fields()
            .map(|(name, value)| (name, field_value(value)))
            .collect();
        for (name, _) in &fields {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        records.push(fields);
    }

    let mut rows = RowTable::new();
    for name in names {
        let values = records
            .iter()
            .map(|fields| {
                fields
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        rows.push(name, ColumnData::Values(values))?;
    }
    rows.push(DEFAULT_GEOMETRY_COLUMN, ColumnData::Geometry(geometries))?;
    Ok(rows)
}

fn record_value(value: &Value, column_type: ColumnType) -> Option<FieldValue> {
    match (column_type, value) {
        (_, Value::Null) => None,
        (ColumnType::Bool, Value::Bool(b)) => Some(FieldValue::IntegerValue(i32::from(*b))),
        (ColumnType::Integer, Value::Integer(i)) => Some(FieldValue::Integer64Value(*i)),
        (ColumnType::Float, v) => v.as_f64().map(FieldValue::RealValue),
        (_, v) => v.to_text().map(FieldValue::StringValue),
    }
}

fn field_type(column_type: ColumnType) -> OGRFieldType::Type {
    match column_type {
        ColumnType::Bool => OGRFieldType::OFTInteger,
        ColumnType::Integer => OGRFieldType::OFTInteger64,
        ColumnType::Float => OGRFieldType::OFTReal,
        ColumnType::Text => OGRFieldType::OFTString,
    }
}

impl Codec for GdalCodec {
    fn name(&self) -> &'static str {
        "GDAL"
    }

    fn read(&self, path: &Path, layer: usize, _options: &CodecOptions) -> Result<Loaded> {
        tracing::info!("Loading file: {}", path.display());
        Ok(Loaded::rows(read_rows(path, layer)?))
    }

    /// Writes one layer. The driver comes from the `driver` option, or is
    /// guessed by GDAL from the file name.
    fn write(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let rows = geotable::unwrap(table, Format::Wkb)?;
        let driver = match options.get("driver") {
            Some(name) => DriverManager::get_driver_by_name(name)?,
            None => DriverManager::get_output_driver_for_dataset_name(path, DriverType::Vector)
                .ok_or_else(|| Error::UnrecognizedFormat {
                    path: path.to_path_buf(),
                })?,
        };
        let layer_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "layer".to_string());

        let mut dataset = driver.create_vector_only(path)?;
        let mut layer = dataset.create_layer(LayerOptions {
            name: &layer_name,
            ty: OGRwkbGeometryType::wkbUnknown,
            ..Default::default()
        })?;

        let mut fields: Vec<(&str, &[Value], ColumnType)> = Vec::new();
        let mut geometries: &[SourceGeometry] = &[];
        for (name, data) in rows.columns() {
            match data {
                ColumnData::Values(values) => {
                    fields.push((name, values.as_slice(), ColumnType::infer(values)))
                }
                ColumnData::Geometry(g) => geometries = g,
            }
        }
        let definitions: Vec<(&str, OGRFieldType::Type)> =
            fields.iter().map(|(name, _, t)| (*name, field_type(*t))).collect();
        layer.create_defn_fields(&definitions)?;

        for (index, geometry) in geometries.iter().enumerate() {
            let SourceGeometry::Wkb(wkb) = geometry else {
                return Err(Error::unsupported_target("GDAL", format!("{} geometry", geometry.format())));
            };
            let mut names = Vec::with_capacity(fields.len());
            let mut values = Vec::with_capacity(fields.len());
            for (name, column, column_type) in &fields {
                if let Some(value) = record_value(&column[index], *column_type) {
                    names.push(*name);
                    values.push(value);
                }
            }
            layer.create_feature_fields(Geometry::from_wkb(&wkb.bytes)?, &names, &values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, Geometry as CanonicalGeometry};
    use crate::geotable::Domain;
    use crate::table::{AttributeTable, Column};

    #[test]
    fn three_dimensional_points_keep_z() {
        let domain = Domain::Geometries(vec![CanonicalGeometry::Point(Coord::xyz(10.0, 60.0, 120.5))]);
        let values = AttributeTable::new(vec![Column::new("name", vec![Value::Text("peak".into())])]);
        let written = GeoTable::new(domain, values).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.geojson");
        GdalCodec.write(&path, &written, &CodecOptions::new()).unwrap();
        let Loaded::Rows { rows, geometry_column } =
            GdalCodec.read(&path, 0, &CodecOptions::new()).unwrap()
        else {
            panic!("expected rows");
        };
        let loaded = geotable::wrap(rows, &geometry_column, false).unwrap();
        assert_eq!(
            loaded.geometry(0).unwrap().into_owned(),
            CanonicalGeometry::Point(Coord::xyz(10.0, 60.0, 120.5))
        );
        assert_eq!(loaded.values().value("name", 0), Some(&Value::Text("peak".into())));
    }
}

use std::io::{Seek, Write};
use std::path::Path;

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::Shape;

use super::{Codec, CodecOptions, Loaded};
use crate::convert::{Format, SourceGeometry};
use crate::error::{Error, Result};
use crate::geotable::{self, GeoTable, DEFAULT_GEOMETRY_COLUMN};
use crate::table::{ColumnData, ColumnType, RowTable, Value};

const DEFAULT_TEXT_WIDTH: u8 = 254;

/// ESRI shapefiles (`.shp` + `.dbf`) through the `shapefile` crate.
pub struct ShapefileCodec;

fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) => Value::Text(s.trim_end().to_string()),
        FieldValue::Numeric(Some(n)) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Value::Integer(*n as i64)
            } else {
                Value::Float(*n)
            }
        }
        FieldValue::Logical(Some(b)) => Value::Bool(*b),
        FieldValue::Float(Some(f)) => Value::Float(f64::from(*f)),
        FieldValue::Integer(i) => Value::Integer(i64::from(*i)),
        FieldValue::Double(d) => Value::Float(*d),
        FieldValue::Currency(c) => Value::Float(*c),
        FieldValue::Memo(s) => Value::Text(s.clone()),
        FieldValue::Date(Some(d)) => {
            Value::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Logical(None)
        | FieldValue::Float(None)
        | FieldValue::Date(None) => Value::Null,
        other => Value::Text(format!("{:?}", other)),
    }
}

fn read_rows(path: &Path) -> Result<RowTable> {
    let shapes = shapefile::ShapeReader::from_path(path)?.read()?;
    let mut dbf = shapefile::dbase::Reader::from_path(path.with_extension("dbf"))?;
    let names: Vec<String> = dbf
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();
    let records = dbf.read()?;
    if records.len() != shapes.len() {
        tracing::warn!("Shape count {} does not match record count {}", shapes.len(), records.len());
    }
    tracing::debug!(shapes = shapes.len(), records = records.len(), "read shapefile");

    let total = shapes.len();
    let (shapes, records): (Vec<Shape>, Vec<Record>) = shapes
        .into_iter()
        .zip(records)
        .filter(|(shape, _)| !matches!(shape, Shape::NullShape))
        .unzip();
    let skipped = total - shapes.len();
    if skipped > 0 {
        tracing::warn!("Skipping {} null shape records", skipped);
    }

    let mut rows = RowTable::new();
    for name in names {
        let values = records
            .iter()
            .map(|r| r.get(&name).map(field_value).unwrap_or(Value::Null))
            .collect();
        rows.push(name, ColumnData::Values(values))?;
    }
    let geometries = shapes.into_iter().map(SourceGeometry::Shape).collect();
    rows.push(DEFAULT_GEOMETRY_COLUMN, ColumnData::Geometry(geometries))?;
    Ok(rows)
}

fn record_value(value: &Value, column_type: ColumnType) -> FieldValue {
    match column_type {
        ColumnType::Bool => FieldValue::Logical(match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }),
        ColumnType::Integer | ColumnType::Float => FieldValue::Numeric(value.as_f64()),
        ColumnType::Text => FieldValue::Character(value.to_text()),
    }
}

fn write_shape<W: Write + Seek>(
    writer: &mut shapefile::Writer<W>,
    shape: &Shape,
    record: &Record,
) -> Result<()> {
    match shape {
        Shape::Point(s) => writer.write_shape_and_record(s, record)?,
        Shape::PointZ(s) => writer.write_shape_and_record(s, record)?,
        Shape::Multipoint(s) => writer.write_shape_and_record(s, record)?,
        Shape::MultipointZ(s) => writer.write_shape_and_record(s, record)?,
        Shape::Polyline(s) => writer.write_shape_and_record(s, record)?,
        Shape::PolylineZ(s) => writer.write_shape_and_record(s, record)?,
        Shape::Polygon(s) => writer.write_shape_and_record(s, record)?,
        Shape::PolygonZ(s) => writer.write_shape_and_record(s, record)?,
        other => return Err(Error::unsupported_target("Shapefile", format!("{:?}", other.shapetype()))),
    }
    Ok(())
}

impl Codec for ShapefileCodec {
    fn name(&self) -> &'static str {
        "Shapefile"
    }

    fn read(&self, path: &Path, _layer: usize, _options: &CodecOptions) -> Result<Loaded> {
        tracing::info!("Loading file: {}", path.display());
        Ok(Loaded::rows(read_rows(path)?))
    }

    fn write(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let rows = geotable::unwrap(table, Format::Shapefile)?;
        let text_width = options
            .get_parsed::<u8>("text_width")?
            .unwrap_or(DEFAULT_TEXT_WIDTH);

        let mut builder = TableWriterBuilder::new();
        let mut fields: Vec<(&str, &[Value], ColumnType)> = Vec::new();
        let mut shapes: &[SourceGeometry] = &[];
        for (name, data) in rows.columns() {
            match data {
                ColumnData::Values(values) => {
                    let column_type = ColumnType::infer(values);
                    let field = FieldName::try_from(name).map_err(|_| Error::InvalidFieldName {
                        name: name.to_string(),
                    })?;
                    builder = match column_type {
                        ColumnType::Bool => builder.add_logical_field(field),
                        ColumnType::Integer => builder.add_numeric_field(field, 18, 0),
                        ColumnType::Float => builder.add_numeric_field(field, 20, 8),
                        ColumnType::Text => builder.add_character_field(field, text_width),
                    };
                    fields.push((name, values.as_slice(), column_type));
                }
                ColumnData::Geometry(geometries) => shapes = geometries,
            }
        }

        let mut writer = shapefile::Writer::from_path(path, builder)?;
        for (index, geometry) in shapes.iter().enumerate() {
            let SourceGeometry::Shape(shape) = geometry else {
                return Err(Error::unsupported_target("Shapefile", format!("{:?}", geometry.format())));
            };
            let mut record = Record::default();
            for (name, values, column_type) in &fields {
                record.insert(name.to_string(), record_value(&values[index], *column_type));
            }
            write_shape(&mut writer, shape, &record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_fields_keep_integers() {
        assert_eq!(field_value(&FieldValue::Numeric(Some(3.0))), Value::Integer(3));
        assert_eq!(field_value(&FieldValue::Numeric(Some(3.5))), Value::Float(3.5));
        assert_eq!(field_value(&FieldValue::Numeric(None)), Value::Null);
        assert_eq!(
            field_value(&FieldValue::Character(Some("Oslo   ".into()))),
            Value::Text("Oslo".into())
        );
    }

    #[test]
    fn record_values_follow_column_type() {
        assert_eq!(
            record_value(&Value::Integer(2), ColumnType::Float),
            FieldValue::Numeric(Some(2.0))
        );
        assert_eq!(
            record_value(&Value::Null, ColumnType::Text),
            FieldValue::Character(None)
        );
    }
}

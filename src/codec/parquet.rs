use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_array::{
    Array, ArrayRef, ArrowPrimitiveType, BinaryArray, BooleanArray, Float64Array, Int64Array,
    RecordBatch, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;

use super::{Codec, CodecOptions, Loaded};
use crate::convert::{Format, SourceGeometry, WkbGeometry};
use crate::error::{Error, Result};
use crate::geotable::{self, GeoTable, DEFAULT_GEOMETRY_COLUMN};
use crate::table::{ColumnData, ColumnType, RowTable, Value};

const GEO_METADATA_KEY: &str = "geo";
const GEOPARQUET_VERSION: &str = "1.0.0";

/// GeoParquet files: Arrow columns plus one WKB-encoded geometry column
/// described by the `geo` file metadata.
pub struct GeoParquetCodec;

/// Geometry column named by a `geo` metadata document.
fn primary_column(geo: &str) -> Option<String> {
    let geo: serde_json::Value = serde_json::from_str(geo).ok()?;
    geo.get("primary_column")?.as_str().map(str::to_string)
}

/// The `geo` document from the Arrow schema, else from the file's key-value
/// metadata.
fn geo_metadata(schema: &HashMap<String, String>, file: Option<&Vec<KeyValue>>) -> Option<String> {
    if let Some(geo) = schema.get(GEO_METADATA_KEY) {
        return Some(geo.clone());
    }
    file?
        .iter()
        .find(|kv| kv.key == GEO_METADATA_KEY)
        .and_then(|kv| kv.value.clone())
}

fn primitive<T: ArrowPrimitiveType>(
    array: &dyn Array,
    value: impl Fn(T::Native) -> Value,
) -> Vec<Value> {
    array
        .as_primitive::<T>()
        .iter()
        .map(|v| v.map(&value).unwrap_or(Value::Null))
        .collect()
}

fn column_values(name: &str, array: &dyn Array) -> Result<Vec<Value>> {
    Ok(match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
            .collect(),
        DataType::Int8 => primitive::<Int8Type>(array, |v| Value::Integer(v.into())),
        DataType::Int16 => primitive::<Int16Type>(array, |v| Value::Integer(v.into())),
        DataType::Int32 => primitive::<Int32Type>(array, |v| Value::Integer(v.into())),
        DataType::Int64 => primitive::<Int64Type>(array, Value::Integer),
        DataType::UInt8 => primitive::<UInt8Type>(array, |v| Value::Integer(v.into())),
        DataType::UInt16 => primitive::<UInt16Type>(array, |v| Value::Integer(v.into())),
        DataType::UInt32 => primitive::<UInt32Type>(array, |v| Value::Integer(v.into())),
        DataType::UInt64 => primitive::<UInt64Type>(array, |v| {
            i64::try_from(v)
                .map(Value::Integer)
                .unwrap_or(Value::Float(v as f64))
        }),
        DataType::Float32 => primitive::<Float32Type>(array, |v| Value::Float(v.into())),
        DataType::Float64 => primitive::<Float64Type>(array, Value::Float),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null))
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null))
            .collect(),
        other => {
            return Err(Error::UnsupportedColumnType {
                column: name.to_string(),
                data_type: other.to_string(),
            })
        }
    })
}

fn wkb(bytes: &[u8]) -> SourceGeometry {
    SourceGeometry::Wkb(WkbGeometry::new(bytes.to_vec()))
}

fn geometry_values(name: &str, array: &dyn Array) -> Result<Vec<Option<SourceGeometry>>> {
    match array.data_type() {
        DataType::Binary => Ok(array.as_binary::<i32>().iter().map(|v| v.map(wkb)).collect()),
        DataType::LargeBinary => Ok(array.as_binary::<i64>().iter().map(|v| v.map(wkb)).collect()),
        other => Err(Error::UnsupportedColumnType {
            column: name.to_string(),
            data_type: other.to_string(),
        }),
    }
}

fn read_rows(path: &Path, options: &CodecOptions) -> Result<(RowTable, String)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let geo = geo_metadata(
        schema.metadata(),
        builder.metadata().file_metadata().key_value_metadata(),
    );
    let geometry_column = match options.get("geometry_column") {
        Some(name) => name.to_string(),
        None => geo
            .as_deref()
            .and_then(primary_column)
            .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_string()),
    };
    if schema.field_with_name(&geometry_column).is_err() {
        return Err(Error::MissingGeometryColumn(geometry_column));
    }
    tracing::debug!(geometry_column = %geometry_column, "reading GeoParquet");

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); schema.fields().len()];
    let mut geometries: Vec<Option<SourceGeometry>> = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        for (index, field) in schema.fields().iter().enumerate() {
            let array = batch.column(index).as_ref();
            if field.name() == &geometry_column {
                geometries.extend(geometry_values(field.name(), array)?);
            } else {
                values[index].extend(column_values(field.name(), array)?);
            }
        }
    }

    let keep: Vec<bool> = geometries.iter().map(Option::is_some).collect();
    let skipped = keep.iter().filter(|k| !**k).count();
    if skipped > 0 {
        tracing::warn!("Skipping {} rows without geometry", skipped);
    }

    let mut rows = RowTable::new();
    for (field, column) in schema.fields().iter().zip(values) {
        if field.name() == &geometry_column {
            let geometries = geometries.drain(..).flatten().collect();
            rows.push(field.name().clone(), ColumnData::Geometry(geometries))?;
        } else {
            let column = column
                .into_iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v)
                .collect();
            rows.push(field.name().clone(), ColumnData::Values(column))?;
        }
    }
    Ok((rows, geometry_column))
}

fn compression(options: &CodecOptions) -> Result<Compression> {
    let value = options.get("compression").unwrap_or("snappy");
    Ok(match value.to_lowercase().as_str() {
        "snappy" => Compression::SNAPPY,
        "zstd" => Compression::ZSTD(ZstdLevel::default()),
        "gzip" => Compression::GZIP(GzipLevel::default()),
        "none" | "uncompressed" => Compression::UNCOMPRESSED,
        _ => {
            return Err(Error::InvalidOption {
                key: "compression".to_string(),
                value: value.to_string(),
            })
        }
    })
}

fn value_array(values: &[Value], column_type: ColumnType) -> (DataType, ArrayRef) {
    match column_type {
        ColumnType::Bool => {
            let array: BooleanArray = values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(array))
        }
        ColumnType::Integer => {
            let array: Int64Array = values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(array))
        }
        ColumnType::Float => {
            let array: Float64Array = values.iter().map(Value::as_f64).collect();
            (DataType::Float64, Arc::new(array))
        }
        ColumnType::Text => {
            let array: StringArray = values.iter().map(Value::to_text).collect();
            (DataType::Utf8, Arc::new(array))
        }
    }
}

/// `geo` metadata document for a single WKB geometry column.
fn geo_document(geometry_column: &str, geometry_types: &[String]) -> String {
    json!({
        "version": GEOPARQUET_VERSION,
        "primary_column": geometry_column,
        "columns": {
            geometry_column: {
                "encoding": "WKB",
                "geometry_types": geometry_types,
            }
        }
    })
    .to_string()
}

/// Build the record batch for `rows`, whose geometry column holds WKB, and
/// the `geo` metadata describing it.
fn record_batch(rows: &RowTable, geometry_column: &str) -> Result<(RecordBatch, String)> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    let mut geometry_types: Vec<String> = Vec::new();
    for (name, data) in rows.columns() {
        match data {
            ColumnData::Values(values) => {
                let (data_type, array) = value_array(values, ColumnType::infer(values));
                fields.push(Field::new(name, data_type, true));
                arrays.push(array);
            }
            ColumnData::Geometry(geometries) => {
                let mut bytes = Vec::with_capacity(geometries.len());
                for geometry in geometries {
                    let SourceGeometry::Wkb(wkb) = geometry else {
                        return Err(Error::unsupported_target(
                            "GeoParquet",
                            format!("{} geometry", geometry.format()),
                        ));
                    };
                    if let Some(kind) = wkb.type_name() {
                        if !geometry_types.contains(&kind) {
                            geometry_types.push(kind);
                        }
                    }
                    bytes.push(wkb.bytes.as_slice());
                }
                fields.push(Field::new(geometry_column, DataType::Binary, false));
                arrays.push(Arc::new(BinaryArray::from_iter_values(bytes)));
            }
        }
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok((batch, geo_document(geometry_column, &geometry_types)))
}

impl Codec for GeoParquetCodec {
    fn name(&self) -> &'static str {
        "GeoParquet"
    }

    fn read(&self, path: &Path, _layer: usize, options: &CodecOptions) -> Result<Loaded> {
        tracing::info!("Loading file: {}", path.display());
        let (rows, geometry_column) = read_rows(path, options)?;
        Ok(Loaded::Rows {
            rows,
            geometry_column,
        })
    }

    fn write(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let rows = geotable::unwrap(table, Format::Wkb)?;
        let geometry_column = options
            .get("geometry_column")
            .unwrap_or(DEFAULT_GEOMETRY_COLUMN);
        let (batch, geo) = record_batch(&rows, geometry_column)?;
        let props = WriterProperties::builder()
            .set_compression(compression(options)?)
            .set_key_value_metadata(Some(vec![KeyValue::new(GEO_METADATA_KEY.to_string(), geo)]))
            .build();
        let mut writer = ArrowWriter::try_new(File::create(path)?, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotable::Domain;
    use crate::geometry::{Coord, Geometry, Polygon, Ring};
    use crate::table::{AttributeTable, Column};

    fn table(area: Vec<Value>) -> GeoTable {
        let square = Ring::new(vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(1.0, 0.0),
            Coord::xy(1.0, 1.0),
            Coord::xy(0.0, 1.0),
        ])
        .unwrap();
        let domain = Domain::Geometries(vec![
            Geometry::Polygon(Polygon::new(square, vec![])),
            Geometry::Point(Coord::xy(5.0, 6.0)),
        ]);
        let values = AttributeTable::new(vec![
            Column::new("name", vec![Value::Text("plot".into()), Value::Null]),
            Column::new("area", area),
        ]);
        GeoTable::new(domain, values).unwrap()
    }

    #[test]
    fn round_trips_through_parquet_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots.parquet");
        let options = CodecOptions::new().with("compression", "zstd");
        let written = table(vec![Value::Float(1.0), Value::Integer(0)]);
        GeoParquetCodec.write(&path, &written, &options).unwrap();

        let Loaded::Rows { rows, geometry_column } =
            GeoParquetCodec.read(&path, 0, &CodecOptions::new()).unwrap()
        else {
            panic!("expected rows");
        };
        assert_eq!(geometry_column, "geometry");
        let loaded = geotable::wrap(rows, &geometry_column, false).unwrap();
        assert_eq!(loaded, table(vec![Value::Float(1.0), Value::Float(0.0)]));
    }

    #[test]
    fn geo_metadata_names_the_geometry_column() {
        let rows = geotable::unwrap(&table(vec![Value::Null; 2]), Format::Wkb).unwrap();
        let (_, geo) = record_batch(&rows, "geom").unwrap();
        assert_eq!(primary_column(&geo), Some("geom".to_string()));
        let geo: serde_json::Value = serde_json::from_str(&geo).unwrap();
        assert_eq!(geo["columns"]["geom"]["encoding"], "WKB");
        assert_eq!(
            geo["columns"]["geom"]["geometry_types"],
            json!(["Polygon", "Point"])
        );
    }

    #[test]
    fn geo_metadata_lands_in_file_key_value_metadata() {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots.parquet");
        let options = CodecOptions::new().with("geometry_column", "shape");
        GeoParquetCodec
            .write(&path, &table(vec![Value::Null; 2]), &options)
            .unwrap();

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let file_metadata = reader.metadata().file_metadata();
        let geo = geo_metadata(&HashMap::new(), file_metadata.key_value_metadata()).unwrap();
        assert_eq!(primary_column(&geo), Some("shape".to_string()));

        let Loaded::Rows { geometry_column, .. } =
            GeoParquetCodec.read(&path, 0, &CodecOptions::new()).unwrap()
        else {
            panic!("expected rows");
        };
        assert_eq!(geometry_column, "shape");
    }

    #[test]
    fn three_dimensional_geometries_keep_z() {
        let ring = Ring::new(vec![
            Coord::xyz(0.0, 0.0, 10.0),
            Coord::xyz(1.0, 0.0, 11.0),
            Coord::xyz(1.0, 1.0, 12.0),
        ])
        .unwrap();
        let domain = Domain::Geometries(vec![
            Geometry::Polygon(Polygon::new(ring, vec![])),
            Geometry::Point(Coord::xyz(1.0, 2.0, 3.0)),
        ]);
        let written = GeoTable::new(domain, AttributeTable::default()).unwrap();

        let rows = geotable::unwrap(&written, Format::Wkb).unwrap();
        let (_, geo) = record_batch(&rows, "geometry").unwrap();
        let geo: serde_json::Value = serde_json::from_str(&geo).unwrap();
        assert_eq!(
            geo["columns"]["geometry"]["geometry_types"],
            json!(["Polygon Z", "Point Z"])
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.parquet");
        GeoParquetCodec.write(&path, &written, &CodecOptions::new()).unwrap();
        let Loaded::Rows { rows, geometry_column } =
            GeoParquetCodec.read(&path, 0, &CodecOptions::new()).unwrap()
        else {
            panic!("expected rows");
        };
        let loaded = geotable::wrap(rows, &geometry_column, false).unwrap();
        assert_eq!(loaded, written);
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let options = CodecOptions::new().with("compression", "lz77");
        assert!(matches!(compression(&options), Err(Error::InvalidOption { .. })));
        assert!(matches!(compression(&CodecOptions::new()), Ok(Compression::SNAPPY)));
    }
}

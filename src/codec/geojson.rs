use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Map;

use super::{Codec, CodecOptions, Loaded};
use crate::convert::{Format, SourceGeometry};
use crate::error::Result;
use crate::geotable::{self, GeoTable, DEFAULT_GEOMETRY_COLUMN};
use crate::table::{ColumnData, RowTable, Value};

/// GeoJSON files through the `geojson` crate.
pub struct GeoJsonCodec;

/// Parse GeoJSON text into a row table with one column per property.
pub fn read_rows<R: Read>(reader: R) -> Result<RowTable> {
    let geojson = GeoJson::from_reader(reader)?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };
    let total_features = features.len();
    tracing::debug!("Found {} features", total_features);

    let mut names: Vec<String> = Vec::new();
    let mut properties = Vec::with_capacity(total_features);
    let mut geometries = Vec::with_capacity(total_features);
    for (index, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            tracing::warn!("Skipping feature {} without geometry", index);
            continue;
        };
        let props = feature.properties.unwrap_or_default();
        for key in props.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
        properties.push(props);
        geometries.push(SourceGeometry::GeoJson(geometry));
    }

    let mut rows = RowTable::new();
    for name in names {
        let values = properties
            .iter()
            .map(|p| p.get(&name).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        rows.push(name, ColumnData::Values(values))?;
    }
    rows.push(DEFAULT_GEOMETRY_COLUMN, ColumnData::Geometry(geometries))?;
    Ok(rows)
}

/// Build a feature collection from a row table holding GeoJSON geometries.
pub fn feature_collection(rows: &RowTable) -> FeatureCollection {
    let mut features: Vec<Feature> = (0..rows.row_count())
        .map(|_| Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: Some(Map::new()),
            foreign_members: None,
        })
        .collect();
    for (name, data) in rows.columns() {
        match data {
            ColumnData::Values(values) => {
                for (feature, value) in features.iter_mut().zip(values) {
                    if let Some(props) = feature.properties.as_mut() {
                        props.insert(name.to_string(), value.to_json());
                    }
                }
            }
            ColumnData::Geometry(geometries) => {
                for (feature, geometry) in features.iter_mut().zip(geometries) {
                    if let SourceGeometry::GeoJson(g) = geometry {
                        feature.geometry = Some(g.clone());
                    }
                }
            }
        }
    }
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

impl Codec for GeoJsonCodec {
    fn name(&self) -> &'static str {
        "GeoJSON"
    }

    fn read(&self, path: &Path, _layer: usize, _options: &CodecOptions) -> Result<Loaded> {
        tracing::info!("Loading file: {}", path.display());
        let file = File::open(path)?;
        let rows = read_rows(BufReader::new(file))?;
        Ok(Loaded::rows(rows))
    }

    fn write(&self, path: &Path, table: &GeoTable, options: &CodecOptions) -> Result<()> {
        let rows = geotable::unwrap(table, Format::GeoJson)?;
        let collection = feature_collection(&rows);
        let mut writer = BufWriter::new(File::create(path)?);
        if options.flag("pretty", true)? {
            serde_json::to_writer_pretty(&mut writer, &collection)?;
        } else {
            serde_json::to_writer(&mut writer, &collection)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "a", "pop": 10},
             "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
            {"type": "Feature", "properties": {"name": "b", "area": 1.5},
             "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}},
            {"type": "Feature", "properties": {"name": "c"}, "geometry": null}
        ]
    }"#;

    #[test]
    fn properties_become_columns() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.row_count(), 2);
        let names: Vec<&str> = rows.column_names().collect();
        assert_eq!(names, vec!["name", "pop", "area", "geometry"]);
        assert_eq!(
            rows.column("area"),
            Some(&ColumnData::Values(vec![Value::Null, Value::Float(1.5)]))
        );
    }

    #[test]
    fn collection_round_trips_properties() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        let collection = feature_collection(&rows);
        assert_eq!(collection.features.len(), 2);
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("pop"), Some(&serde_json::json!(10)));
        assert!(collection.features[1].geometry.is_some());
    }
}

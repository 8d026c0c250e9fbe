//! Row-oriented tables as produced and consumed by the format codecs.

use std::fmt;

use crate::convert::SourceGeometry;
use crate::error::{Error, Result};

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Rgba([u8; 4]),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text rendering used when a column has to fall back to strings.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Rgba(_) => serde_json::Value::String(self.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Rgba([r, g, b, a]) => write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a),
        }
    }
}

/// Storage type a writer picks for a column of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    /// Narrowest type that holds every non-null value; all-null columns are text.
    pub fn infer(values: &[Value]) -> ColumnType {
        let mut inferred: Option<ColumnType> = None;
        for value in values {
            let this = match value {
                Value::Null => continue,
                Value::Bool(_) => ColumnType::Bool,
                Value::Integer(_) => ColumnType::Integer,
                Value::Float(_) => ColumnType::Float,
                Value::Text(_) | Value::Rgba(_) => ColumnType::Text,
            };
            inferred = Some(match (inferred, this) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Integer), ColumnType::Float)
                | (Some(ColumnType::Float), ColumnType::Integer) => ColumnType::Float,
                _ => ColumnType::Text,
            });
        }
        inferred.unwrap_or(ColumnType::Text)
    }
}

/// Named column of attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }
}

/// Contents of a row-table column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Values(Vec<Value>),
    Geometry(Vec<SourceGeometry>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Values(v) => v.len(),
            ColumnData::Geometry(g) => g.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered named columns of equal length, one of which usually holds
/// geometries in a format library's own representation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowTable {
    columns: Vec<(String, ColumnData)>,
}

impl RowTable {
    pub fn new() -> Self {
        RowTable::default()
    }

    /// Append a column. Every column must have the same length.
    pub fn push(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if let Some((_, first)) = self.columns.first() {
            if first.len() != data.len() {
                return Err(Error::ColumnLengthMismatch {
                    column: name,
                    expected: first.len(),
                    found: data.len(),
                });
            }
        }
        self.columns.push((name, data));
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Result<Self> {
        self.push(name, data)?;
        Ok(self)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.columns.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn geometry_column(&self, name: &str) -> Result<&[SourceGeometry]> {
        match self.column(name) {
            Some(ColumnData::Geometry(g)) => Ok(g),
            _ => Err(Error::MissingGeometryColumn(name.to_string())),
        }
    }

    /// Split off the geometry column `name`, returning it with the remaining
    /// attribute columns in their original order.
    pub fn split_geometry(self, name: &str) -> Result<(Vec<SourceGeometry>, AttributeTable)> {
        let mut geometries = None;
        let mut attributes = AttributeTable::default();
        for (column_name, data) in self.columns {
            match data {
                ColumnData::Geometry(g) if column_name == name && geometries.is_none() => {
                    geometries = Some(g)
                }
                ColumnData::Values(values) => attributes.columns.push(Column::new(column_name, values)),
                // A second geometry column has no place in the attribute table.
                ColumnData::Geometry(_) => {}
            }
        }
        let geometries = geometries.ok_or_else(|| Error::MissingGeometryColumn(name.to_string()))?;
        Ok((geometries, attributes))
    }
}

/// Attribute columns of a geo-table: the row table minus its geometry column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeTable {
    pub columns: Vec<Column>,
}

impl AttributeTable {
    pub fn new(columns: Vec<Column>) -> Self {
        AttributeTable { columns }
    }

    /// Number of rows, `None` when there are no columns to count.
    pub fn row_count(&self) -> Option<usize> {
        self.columns.first().map(|c| c.values.len())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn value(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Keep only the rows listed in `rows`, in that order.
    pub fn select_rows(&self, rows: &[usize]) -> AttributeTable {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = rows
                    .iter()
                    .map(|&r| c.values.get(r).cloned().unwrap_or(Value::Null))
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        AttributeTable { columns }
    }
}

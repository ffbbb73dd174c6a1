//! In-memory table backed by an Arrow record batch.
//!
//! Every column is nullable. Columns keep insertion order; concatenation
//! aligns columns by name, fills absent columns with nulls and casts
//! disagreeing pieces to a common type.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, concat, take};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use ce_types::{CeResult, DataError, Value};

/// A named column used to assemble a [`Frame`].
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    array: ArrayRef,
}

impl Column {
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    pub fn int(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::new(name, Arc::new(Int64Array::from_iter_values(values)))
    }

    pub fn float(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(name, Arc::new(Float64Array::from_iter_values(values)))
    }

    pub fn str<S: AsRef<str>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::new(name, Arc::new(StringArray::from_iter_values(values)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }
}

/// Type a loaded column is stored as: 64-bit integers and reals, plain
/// strings. Other types pass through.
fn canonical_type(data_type: &DataType) -> DataType {
    match data_type {
        t if t.is_integer() => DataType::Int64,
        t if t.is_floating() => DataType::Float64,
        DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => DataType::Utf8,
        other => other.clone(),
    }
}

/// Type that every piece of a concatenated column can be cast to.
///
/// All-null pieces carry no type information and are ignored. Integers
/// meeting reals become reals; any other disagreement falls back to text.
fn common_type(pieces: &[&ArrayRef]) -> DataType {
    let informative: Vec<&DataType> = pieces
        .iter()
        .filter(|a| a.data_type() != &DataType::Null && a.null_count() < a.len())
        .map(|a| a.data_type())
        .collect();

    match informative.split_first() {
        None => pieces
            .iter()
            .map(|a| a.data_type())
            .find(|t| **t != DataType::Null)
            .cloned()
            .unwrap_or(DataType::Null),
        Some((first, rest)) if rest.iter().all(|t| t == first) => (*first).clone(),
        _ if informative.iter().all(|t| t.is_integer()) => DataType::Int64,
        _ if informative.iter().all(|t| t.is_numeric()) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn cast_to(array: &ArrayRef, to: &DataType) -> CeResult<ArrayRef> {
    if array.data_type() == to {
        Ok(Arc::clone(array))
    } else {
        Ok(cast(array, to)?)
    }
}

/// Cells of an array as scalars. Categorical cells yield their category text.
pub fn array_values(array: &ArrayRef) -> CeResult<Vec<Option<Value>>> {
    let values = match array.data_type() {
        DataType::Null => vec![None; array.len()],
        DataType::Boolean => array.as_boolean().iter().map(|v| v.map(Value::Bool)).collect(),
        t if t.is_integer() => cast_to(array, &DataType::Int64)?
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map(Value::Int))
            .collect(),
        t if t.is_numeric() => cast_to(array, &DataType::Float64)?
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(Value::Float))
            .collect(),
        _ => cast_to(array, &DataType::Utf8)?
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(Value::from))
            .collect(),
    };
    Ok(values)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    batch: RecordBatch,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }
}

impl Frame {
    /// Build a frame; all columns must have the same length and distinct names.
    pub fn new(columns: Vec<Column>) -> CeResult<Self> {
        let n_rows = columns.first().map(|c| c.array.len()).unwrap_or(0);
        let mut fields: Vec<Field> = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());

        for column in columns {
            if fields.iter().any(|f| f.name() == &column.name) {
                return Err(DataError::ColumnMismatch {
                    column: column.name,
                    message: "duplicate column name".to_string(),
                }
                .into());
            }
            if column.array.len() != n_rows {
                return Err(DataError::LengthMismatch {
                    column: column.name,
                    expected: n_rows,
                    actual: column.array.len(),
                }
                .into());
            }
            fields.push(Field::new(column.name, column.array.data_type().clone(), true));
            arrays.push(column.array);
        }
        Self::from_parts(fields, arrays, n_rows)
    }

    fn from_parts(fields: Vec<Field>, arrays: Vec<ArrayRef>, n_rows: usize) -> CeResult<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(n_rows));
        let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
        Ok(Self { batch })
    }

    /// Wrap a loaded batch, storing integers, reals and strings in their
    /// 64-bit or plain forms.
    pub fn from_batch(batch: RecordBatch) -> CeResult<Self> {
        let n_rows = batch.num_rows();
        let schema = batch.schema();
        let mut fields = Vec::with_capacity(batch.num_columns());
        let mut arrays = Vec::with_capacity(batch.num_columns());

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let target = canonical_type(field.data_type());
            arrays.push(cast_to(array, &target)?);
            fields.push(Field::new(field.name(), target, true));
        }
        Self::from_parts(fields, arrays, n_rows)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn n_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn n_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.column_names().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        matches!(
            self.column(name).map(|a| a.data_type()),
            Some(DataType::Dictionary(_, _))
        )
    }

    /// Cells of column `name` as scalars.
    pub fn values(&self, name: &str) -> CeResult<Vec<Option<Value>>> {
        let array = self.column(name).ok_or_else(|| DataError::MissingColumn {
            action: "read".to_string(),
            column: name.to_string(),
        })?;
        array_values(array)
    }

    /// Single cell, `None` when missing or out of range.
    pub fn value(&self, name: &str, row: usize) -> Option<Value> {
        self.values(name).ok()?.into_iter().nth(row).flatten()
    }

    /// Insert a column, replacing a same-named one in place.
    pub fn set_column(&mut self, name: &str, array: ArrayRef) -> CeResult<()> {
        let n_rows = if self.n_columns() == 0 {
            array.len()
        } else {
            self.n_rows()
        };
        if array.len() != n_rows {
            return Err(DataError::LengthMismatch {
                column: name.to_string(),
                expected: n_rows,
                actual: array.len(),
            }
            .into());
        }

        let mut fields: Vec<Field> = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        let mut arrays = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);
        match self.position(name) {
            Some(index) => {
                fields[index] = field;
                arrays[index] = array;
            }
            None => {
                fields.push(field);
                arrays.push(array);
            }
        }
        *self = Self::from_parts(fields, arrays, n_rows)?;
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<ArrayRef> {
        let index = self.position(name)?;
        Some(self.batch.remove_column(index))
    }

    /// Rows at `rows`, in that order.
    pub fn take(&self, rows: &[usize]) -> CeResult<Self> {
        let indices = arrow::array::UInt64Array::from_iter_values(rows.iter().map(|&r| r as u64));
        let arrays = self
            .batch
            .columns()
            .iter()
            .map(|array| Ok(take(array.as_ref(), &indices, None)?))
            .collect::<CeResult<Vec<_>>>()?;
        let fields = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        Self::from_parts(fields, arrays, rows.len())
    }

    /// Render a column's cells as text keys, used to stratify rows.
    pub fn labels(&self, name: &str) -> CeResult<Vec<Option<String>>> {
        let array = self.column(name).ok_or_else(|| DataError::MissingColumn {
            action: "labels".to_string(),
            column: name.to_string(),
        })?;
        Ok(array_values(array)?
            .into_iter()
            .map(|v| v.map(|v| v.to_string()))
            .collect())
    }

    /// Stack frames vertically, preserving row order.
    ///
    /// Columns are aligned by name in first-seen order; a column absent from
    /// some frame is filled with nulls for that frame's rows.
    pub fn concat(frames: &[&Frame]) -> CeResult<Self> {
        let mut names: Vec<&str> = Vec::new();
        for frame in frames {
            for name in frame.column_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let n_rows = frames.iter().map(|f| f.n_rows()).sum();
        let mut fields = Vec::with_capacity(names.len());
        let mut arrays = Vec::with_capacity(names.len());
        for name in names {
            let present: Vec<&ArrayRef> = frames.iter().filter_map(|f| f.column(name)).collect();
            let target = common_type(&present);

            let parts = frames
                .iter()
                .map(|f| match f.column(name) {
                    Some(array) => cast_to(array, &target),
                    None => Ok(new_null_array(&target, f.n_rows())),
                })
                .collect::<CeResult<Vec<_>>>()?;
            let refs: Vec<&dyn Array> = parts.iter().map(|a| a.as_ref()).collect();

            arrays.push(concat(&refs)?);
            fields.push(Field::new(name, target, true));
        }

        Self::from_parts(fields, arrays, n_rows)
    }
}

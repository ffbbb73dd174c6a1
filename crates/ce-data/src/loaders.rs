use std::fs;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use ce_params::Parameter;
use ce_types::{CeResult, DataError, SchemaError};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::frame::Frame;

/// Tabular file formats recognized by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> CeResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            _ => Err(SchemaError::UnsupportedSuffix {
                path: path.display().to_string(),
            }
            .into()),
        }
    }
}

/// Load a table, picking the parser from the file suffix.
pub fn load_frame<P: AsRef<Path>>(path: P) -> CeResult<Frame> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Csv => load_csv(path),
        FileFormat::Parquet => load_parquet(path),
    }
}

/// Load a CSV file with a header row.
///
/// Column types are inferred by the Arrow CSV reader over the whole file;
/// empty cells are nulls.
pub fn load_csv<P: AsRef<Path>>(path: P) -> CeResult<Frame> {
    let path = path.as_ref();
    tracing::info!("Loading CSV data from: {}", path.display());

    let mut file = fs::File::open(path).map_err(|e| DataError::LoadingFailed {
        message: format!("Failed to open CSV file {}: {}", path.display(), e),
    })?;

    let (schema, records) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    tracing::debug!("Inferred {} columns from {} records", schema.fields().len(), records);
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;

    let frame = Frame::from_batch(concat_batches(&schema, &batches)?)?;
    tracing::info!("Loaded {} rows from CSV file: {}", frame.n_rows(), path.display());
    Ok(frame)
}

/// Load a Parquet file through Arrow record batches.
pub fn load_parquet<P: AsRef<Path>>(path: P) -> CeResult<Frame> {
    let path = path.as_ref();
    tracing::info!("Loading Parquet data from: {}", path.display());

    let file = fs::File::open(path).map_err(|e| DataError::LoadingFailed {
        message: format!("Failed to open Parquet file {}: {}", path.display(), e),
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;

    let frame = Frame::from_batch(concat_batches(&schema, &batches)?)?;
    tracing::info!("Loaded {} rows from Parquet file: {}", frame.n_rows(), path.display());
    Ok(frame)
}

/// A loaded source table with its weight and cross-validation flag.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    path: PathBuf,
    weight: Parameter,
    cv: bool,
    data: Frame,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        weight: Parameter,
        cv: bool,
        data: Frame,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            weight,
            cv,
            data,
        }
    }

    /// Load the table at `path`. The suffix is checked before the file is read.
    pub fn from_file(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        weight: Parameter,
        cv: bool,
    ) -> CeResult<Self> {
        let path = path.into();
        let data = load_frame(&path)?;
        Ok(Self::new(name, path, weight, cv, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn cv(&self) -> bool {
        self.cv
    }

    pub fn data(&self) -> &Frame {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use ce_params::ConstantParameter;
    use ce_types::{CeError, Value};
    use parquet::arrow::ArrowWriter;
    use std::io::Write;
    use tempfile::TempDir;

    fn unit_weight() -> Parameter {
        Parameter::Constant(ConstantParameter::new("weight", 1.0, None))
    }

    #[test]
    fn test_csv_type_inference() {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "id,score,flag,label").unwrap();
        writeln!(temp_file, "1,0.5,true,a").unwrap();
        writeln!(temp_file, "2,,false,b").unwrap();
        writeln!(temp_file, "3,2,true,").unwrap();
        temp_file.flush().unwrap();

        let frame = load_frame(temp_file.path()).unwrap();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.column("id").unwrap().data_type(), &DataType::Int64);
        assert_eq!(
            frame.values("id").unwrap(),
            vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))]
        );
        assert_eq!(
            frame.values("score").unwrap(),
            vec![Some(Value::Float(0.5)), None, Some(Value::Float(2.0))]
        );
        assert_eq!(frame.value("flag", 2), Some(Value::Bool(true)));
        assert_eq!(frame.value("label", 0), Some(Value::from("a")));
        assert_eq!(frame.value("label", 2), None);
    }

    #[test]
    fn test_parquet_loading() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("train.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("score", DataType::Float64, true),
            Field::new("label", DataType::Utf8, true),
        ]));
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])),
            Arc::new(Float64Array::from(vec![Some(0.5), None, Some(1.5)])),
            Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let file = fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dataset = Dataset::from_file(&path, "train", unit_weight(), true).unwrap();
        let frame = dataset.data();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.column("id").unwrap().data_type(), &DataType::Int64);
        assert_eq!(frame.value("id", 2), Some(Value::Int(3)));
        assert_eq!(frame.value("score", 1), None);
        assert_eq!(frame.value("label", 0), Some(Value::from("a")));
        assert!(dataset.cv());
        assert_eq!(dataset.name(), "train");
    }

    #[test]
    fn test_corrupt_parquet_is_a_parquet_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.parquet");
        fs::write(&path, b"not parquet").unwrap();
        let err = load_parquet(&path).unwrap_err();
        assert!(matches!(err, CeError::Parquet(_)));
    }

    #[test]
    fn test_unsupported_suffix_fails_before_reading() {
        let err = Dataset::from_file("/does/not/exist/data.xlsx", "x", unit_weight(), false)
            .unwrap_err();
        assert!(matches!(err, CeError::Schema(SchemaError::UnsupportedSuffix { .. })));
        assert!(err.to_string().contains("data.xlsx"));
    }

    #[test]
    fn test_missing_csv_file() {
        let err = load_csv("/does/not/exist/data.csv").unwrap_err();
        assert!(matches!(err, CeError::Data(DataError::LoadingFailed { .. })));
    }
}

//! Result records emitted per trial, and selection of the best recorded
//! configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ce_params::{CallableRegistry, ObjectiveDirection};
use ce_types::{CeError, CeResult, DataError, LookupError, Value};
use serde::{Deserialize, Serialize};

use crate::categories::CategoryRegistry;
use crate::processing::ColumnProcessingSchema;
use crate::tabular::{
    DatasetRecord, Metadata, ProcessedDataset, TabularConfiguration, TabularSchema,
};

/// Column of the metric table holding each trial's score.
pub const BEST_SCORE_COLUMN: &str = "best_score";

/// Flat record of one resolved configuration.
///
/// Every section holds plain scalars, and the record deserializes back into
/// a [`TabularSchema`] whose parameters are all constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub metadata: Metadata,
    pub tuner_parameters: BTreeMap<String, Value>,
    pub additional_parameters: BTreeMap<String, Value>,
    pub training_datasets: Vec<DatasetRecord>,
    pub training_parameters: BTreeMap<String, Value>,
    pub model_parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub preprocessing: Vec<ColumnProcessingSchema>,
}

impl ResultRecord {
    /// Record a trial from its configuration, assembled dataset and the
    /// resolved training and model parameters.
    pub fn new(
        configuration: &TabularConfiguration,
        dataset: &ProcessedDataset,
        training_parameters: BTreeMap<String, Value>,
        model_parameters: BTreeMap<String, Value>,
    ) -> CeResult<Self> {
        Ok(Self {
            metadata: configuration.metadata().clone(),
            tuner_parameters: configuration.construct_tuner_parameters()?,
            additional_parameters: configuration.construct_additional_params()?,
            training_datasets: dataset.dataset_parameters.clone(),
            training_parameters,
            model_parameters,
            preprocessing: configuration.preprocessing().to_vec(),
        })
    }

    pub fn to_yaml(&self) -> CeResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Rebuildable schema equivalent to this record.
    pub fn to_schema(&self) -> CeResult<TabularSchema> {
        Ok(serde_yaml::from_value(serde_yaml::to_value(self)?)?)
    }
}

/// Render records as a multi-document YAML log.
pub fn render_log(records: &[ResultRecord]) -> CeResult<String> {
    let mut out = String::new();
    for record in records {
        out.push_str("---\n");
        out.push_str(&record.to_yaml()?);
    }
    Ok(out)
}

/// Multi-document YAML log of recorded configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultLog {
    documents: Vec<TabularSchema>,
}

impl ResultLog {
    pub fn parse(text: &str) -> CeResult<Self> {
        let documents = serde_yaml::Deserializer::from_str(text)
            .map(TabularSchema::deserialize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { documents })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CeResult<Self> {
        let path = path.as_ref();
        let log = Self::parse(&std::fs::read_to_string(path)?)?;
        tracing::info!("Loaded {} configurations from {}", log.len(), path.display());
        Ok(log)
    }

    pub fn documents(&self) -> &[TabularSchema] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Optimization direction declared by the first document.
    pub fn direction(&self) -> CeResult<ObjectiveDirection> {
        let missing = || -> CeError {
            LookupError::KeyNotFound {
                key: "additional_parameters.direction".to_string(),
                method: "direction".to_string(),
            }
            .into()
        };
        let first = self.documents.first().ok_or_else(missing)?;
        match first.additional_parameters.get("direction") {
            Some(Value::Str(direction)) => direction.parse(),
            Some(other) => Err(ce_types::config_error!(
                "direction must be maximize or minimize, got {other}"
            )),
            None => Err(missing()),
        }
    }
}

/// Per-trial scores, parallel to a [`ResultLog`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable {
    scores: Vec<Option<f64>>,
}

impl MetricTable {
    pub fn new(scores: Vec<Option<f64>>) -> Self {
        Self { scores }
    }

    /// Read the `best_score` column of a CSV file. Empty cells are missing.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CeResult<Self> {
        let path = path.as_ref();
        let mut rdr = csv::Reader::from_path(path).map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open metric file {}: {}", path.display(), e),
        })?;

        let column = rdr
            .headers()
            .map_err(|e| CeError::Csv(e.to_string()))?
            .iter()
            .position(|h| h == BEST_SCORE_COLUMN)
            .ok_or_else(|| DataError::MissingColumn {
                action: "metric table".to_string(),
                column: BEST_SCORE_COLUMN.to_string(),
            })?;

        let mut scores = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| CeError::Csv(e.to_string()))?;
            let cell = record.get(column).unwrap_or("").trim();
            let score = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|e| DataError::LoadingFailed {
                    message: format!("Invalid score at line {}: {}", line_num + 2, e),
                })?)
            };
            scores.push(score);
        }
        Ok(Self { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Row of the best score; missing scores are skipped and ties go to the
    /// earliest row.
    pub fn best_index(&self, direction: ObjectiveDirection) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, score) in self.scores.iter().copied().enumerate() {
            let Some(score) = score.filter(|s| !s.is_nan()) else {
                continue;
            };
            let better = match (best, direction) {
                (None, _) => true,
                (Some((_, current)), ObjectiveDirection::Maximize) => score > current,
                (Some((_, current)), ObjectiveDirection::Minimize) => score < current,
            };
            if better {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }
}

/// Paths consumed by a best-configuration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPaths {
    pub config_path: PathBuf,
    pub metric_path: PathBuf,
    pub test_path: PathBuf,
    pub output_path: PathBuf,
}

impl TrainingPaths {
    pub fn from_yaml_str(document: &str) -> CeResult<Self> {
        Ok(serde_yaml::from_str(document)?)
    }
}

/// Schema of the best-scoring logged configuration.
pub fn select_best_schema(log: &ResultLog, metrics: &MetricTable) -> CeResult<TabularSchema> {
    if log.len() != metrics.len() {
        return Err(DataError::LengthMismatch {
            column: BEST_SCORE_COLUMN.to_string(),
            expected: log.len(),
            actual: metrics.len(),
        }
        .into());
    }
    let direction = log.direction()?;
    let index = metrics.best_index(direction).ok_or_else(|| DataError::LoadingFailed {
        message: "metric table has no scores".to_string(),
    })?;
    tracing::info!("Selected configuration {} of {} ({:?})", index, log.len(), direction);
    Ok(log.documents[index].clone())
}

/// Load the log and metrics named by `paths` and rebuild the best
/// configuration, datasets included.
pub fn select_best(
    paths: &TrainingPaths,
    registry: &CallableRegistry,
    categories: &CategoryRegistry,
) -> CeResult<TabularConfiguration> {
    let log = ResultLog::from_path(&paths.config_path)?;
    let metrics = MetricTable::from_path(&paths.metric_path)?;
    select_best_schema(&log, &metrics)?.build(registry, categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Frame};
    use crate::loaders::Dataset;
    use crate::tabular::TunerKind;
    use ce_params::{Configuration, ConstantParameter, FixedTrial, Parameter};
    use std::io::Write;

    fn metadata() -> Metadata {
        Metadata {
            name: "churn".to_string(),
            output_path: None,
            seed: 3,
            tuner: TunerKind::Optuna,
            cv: true,
        }
    }

    fn record(direction: &str, learning_rate: f64) -> ResultRecord {
        ResultRecord {
            metadata: metadata(),
            tuner_parameters: BTreeMap::from([("n_trials".to_string(), Value::Int(10))]),
            additional_parameters: BTreeMap::from([(
                "direction".to_string(),
                Value::from(direction),
            )]),
            training_datasets: vec![DatasetRecord {
                name: "main".to_string(),
                path: PathBuf::from("main.csv"),
                weight: 0.75,
                cv: true,
            }],
            training_parameters: BTreeMap::from([(
                "learning_rate".to_string(),
                Value::Float(learning_rate),
            )]),
            model_parameters: BTreeMap::from([("booster".to_string(), Value::from("dart"))]),
            preprocessing: Vec::new(),
        }
    }

    #[test]
    fn record_round_trips_into_schema() {
        let schema = record("maximize", 0.1 + 0.2).to_schema().unwrap();
        let dataset = &schema.training_datasets[0];
        assert_eq!(dataset.name, "main");
        assert!(dataset.cv);

        let registry = CallableRegistry::new();
        let weight = dataset.build_weight(&registry).unwrap();
        assert_eq!(
            weight,
            Parameter::Constant(ConstantParameter::new("weight", 0.75, None))
        );

        let parameters = schema.build_parameters(&registry).unwrap();
        assert_eq!(
            parameters.construct("training_parameters").unwrap()["learning_rate"],
            Value::Float(0.1 + 0.2)
        );
    }

    #[test]
    fn record_from_assembly() {
        let frame = Frame::new(vec![
            Column::int("id", [1, 2, 3, 4]),
            Column::str("target", ["a", "b", "a", "b"]),
        ])
        .unwrap();
        let mut parameters = Configuration::default();
        parameters.insert(
            "tuner_parameters",
            ce_params::ConfigEntry::Nontunable(BTreeMap::new()),
        );
        parameters.insert(
            "additional_parameters",
            ce_params::ConfigEntry::Nontunable(BTreeMap::from([(
                "direction".to_string(),
                ce_params::NontunableParameter::new("direction", "minimize"),
            )])),
        );
        let mut config = TabularConfiguration::new(
            metadata(),
            vec![Dataset::new(
                "main",
                "main.csv",
                Parameter::Constant(ConstantParameter::new("weight", 2.0, None)),
                true,
                frame,
            )],
            parameters,
            Vec::new(),
            &CategoryRegistry::new(),
        )
        .unwrap();

        let processed = config
            .construct_dataset("target", Some(&mut FixedTrial::default()), 2)
            .unwrap();
        let record = ResultRecord::new(&config, &processed, BTreeMap::new(), BTreeMap::new()).unwrap();
        assert_eq!(record.training_datasets[0].weight, 2.0);
        assert_eq!(record.additional_parameters["direction"], Value::from("minimize"));

        let yaml = record.to_yaml().unwrap();
        assert!(yaml.contains("additional_parameters"));
        assert!(!yaml.contains("Constant"));
    }

    #[test]
    fn best_index_follows_direction() {
        let metrics = MetricTable::new(vec![Some(0.4), None, Some(0.9), Some(0.1), Some(0.9)]);
        assert_eq!(metrics.best_index(ObjectiveDirection::Maximize), Some(2));
        assert_eq!(metrics.best_index(ObjectiveDirection::Minimize), Some(3));
        assert_eq!(MetricTable::new(vec![None]).best_index(ObjectiveDirection::Maximize), None);
    }

    #[test]
    fn selects_best_document() {
        let text = render_log(&[
            record("minimize", 0.1),
            record("minimize", 0.2),
            record("minimize", 0.3),
        ])
        .unwrap();
        let log = ResultLog::parse(&text).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.direction().unwrap(), ObjectiveDirection::Minimize);

        let metrics = MetricTable::new(vec![Some(0.5), Some(0.2), Some(0.7)]);
        let best = select_best_schema(&log, &metrics).unwrap();
        assert_eq!(
            best.training_parameters["learning_rate"],
            ce_params::ParameterSpec::Scalar(Value::Float(0.2))
        );

        let short = MetricTable::new(vec![Some(0.5)]);
        assert!(select_best_schema(&log, &short).is_err());
    }

    #[test]
    fn missing_direction_is_a_lookup_error() {
        let mut without = record("maximize", 0.1);
        without.additional_parameters.clear();
        let log = ResultLog::parse(&render_log(&[without]).unwrap()).unwrap();
        assert!(matches!(
            log.direction().unwrap_err(),
            CeError::Lookup(LookupError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn select_best_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let data_path = dir.path().join("main.csv");
        let mut data = std::fs::File::create(&data_path).unwrap();
        writeln!(data, "id,target").unwrap();
        for i in 0..6 {
            writeln!(data, "{},{}", i, if i % 2 == 0 { "yes" } else { "no" }).unwrap();
        }

        let mut records = vec![record("maximize", 0.1), record("maximize", 0.2)];
        for r in records.iter_mut() {
            r.training_datasets[0].path = data_path.clone();
        }
        let config_path = dir.path().join("configs.yaml");
        std::fs::write(&config_path, render_log(&records).unwrap()).unwrap();

        let metric_path = dir.path().join("metrics.csv");
        std::fs::write(&metric_path, "trial,best_score\n0,0.8\n1,0.6\n").unwrap();

        let paths = TrainingPaths::from_yaml_str(&format!(
            "config_path: {}\nmetric_path: {}\ntest_path: test.csv\noutput_path: out\n",
            config_path.display(),
            metric_path.display()
        ))
        .unwrap();

        let mut config = select_best(&paths, &CallableRegistry::new(), &CategoryRegistry::new()).unwrap();
        assert_eq!(
            config.first_training_params().unwrap()["learning_rate"],
            Value::Float(0.1)
        );
        let processed = config.construct_dataset("target", None, 3).unwrap();
        assert_eq!(processed.weight, vec![0.75; 6]);
    }

    #[test]
    fn metric_table_requires_score_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        std::fs::write(&path, "trial,score\n0,1.0\n").unwrap();
        let err = MetricTable::from_path(&path).unwrap_err();
        assert!(err.to_string().contains(BEST_SCORE_COLUMN));
    }
}

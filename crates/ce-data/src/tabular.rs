//! Tabular experiment schema, the configuration it builds, and dataset
//! assembly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ce_params::{
    CallableRegistry, ConfigEntry, Configuration, NontunableParameter, Parameter, ParameterSchema,
    ParameterSpec, Trial, TunableParameter,
};
use ce_types::{CeResult, DataError, ResolutionError, SchemaError, Value};
use serde::{Deserialize, Serialize};

use crate::categories::CategoryRegistry;
use crate::folds::{Fold, StratifiedKFold};
use crate::frame::Frame;
use crate::loaders::Dataset;
use crate::processing::{ColumnProcessingSchema, ProcessingAction};

pub const TUNER_PARAMETERS: &str = "tuner_parameters";
pub const ADDITIONAL_PARAMETERS: &str = "additional_parameters";
pub const TRAINING_PARAMETERS: &str = "training_parameters";
pub const MODEL_PARAMETERS: &str = "model_parameters";

/// Fold count used when the caller has no preference.
pub const DEFAULT_K_FOLDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunerKind {
    Grid,
    #[default]
    Optuna,
}

fn default_true() -> bool {
    true
}

/// Experiment identity and reproducibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    /// Where result logs go; `None` keeps them in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub seed: u64,
    #[serde(default)]
    pub tuner: TunerKind,
    #[serde(default = "default_true")]
    pub cv: bool,
}

fn default_weight() -> ParameterSpec {
    ParameterSpec::Scalar(Value::Float(1.0))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    pub path: PathBuf,
    /// A scalar or a range schema.
    #[serde(default = "default_weight")]
    pub weight: ParameterSpec,
    #[serde(default)]
    pub cv: bool,
}

impl DatasetSchema {
    /// Weight parameter named `weight`; a range gets the alias
    /// `weight_{dataset name}` so every source is searched separately.
    pub fn build_weight(&self, registry: &CallableRegistry) -> CeResult<Parameter> {
        match &self.weight {
            ParameterSpec::Scalar(_) => self.weight.build("weight", None, registry),
            ParameterSpec::Schema(ParameterSchema::Range(_)) => {
                let alias = format!("weight_{}", self.name);
                self.weight.build("weight", Some(&alias), registry)
            }
            ParameterSpec::Schema(_) => Err(SchemaError::Malformed {
                field: format!("training_datasets.{}.weight", self.name),
                message: "weight must be a number or a range".to_string(),
            }
            .into()),
        }
    }

    pub fn build(&self, registry: &CallableRegistry) -> CeResult<Dataset> {
        Dataset::from_file(&self.path, &self.name, self.build_weight(registry)?, self.cv)
    }
}

/// Declarative description of a tabular experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularSchema {
    pub metadata: Metadata,
    #[serde(default)]
    pub tuner_parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub additional_parameters: BTreeMap<String, Value>,
    pub training_datasets: Vec<DatasetSchema>,
    #[serde(default)]
    pub training_parameters: BTreeMap<String, ParameterSpec>,
    #[serde(default)]
    pub model_parameters: BTreeMap<String, ParameterSpec>,
    #[serde(default)]
    pub preprocessing: Vec<ColumnProcessingSchema>,
}

fn tunable_section(
    parameters: &BTreeMap<String, ParameterSpec>,
    registry: &CallableRegistry,
) -> CeResult<ConfigEntry> {
    let built = parameters
        .iter()
        .map(|(key, spec)| Ok((key.clone(), spec.build(key, None, registry)?)))
        .collect::<CeResult<BTreeMap<_, _>>>()?;
    Ok(ConfigEntry::Tunable(built))
}

fn nontunable_section(values: &BTreeMap<String, Value>) -> ConfigEntry {
    ConfigEntry::Nontunable(
        values
            .iter()
            .map(|(key, value)| (key.clone(), NontunableParameter::new(key.clone(), value.clone())))
            .collect(),
    )
}

impl TabularSchema {
    pub fn from_yaml_str(document: &str) -> CeResult<Self> {
        Ok(serde_yaml::from_str(document)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CeResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Build the four parameter sections. Plain scalars become constants.
    pub fn build_parameters(&self, registry: &CallableRegistry) -> CeResult<Configuration> {
        let mut configuration = Configuration::default();
        configuration.insert(TUNER_PARAMETERS, nontunable_section(&self.tuner_parameters));
        configuration.insert(
            ADDITIONAL_PARAMETERS,
            nontunable_section(&self.additional_parameters),
        );
        configuration.insert(
            TRAINING_PARAMETERS,
            tunable_section(&self.training_parameters, registry)?,
        );
        configuration.insert(
            MODEL_PARAMETERS,
            tunable_section(&self.model_parameters, registry)?,
        );
        Ok(configuration)
    }

    /// Load every dataset and build the whole configuration.
    pub fn build(
        &self,
        registry: &CallableRegistry,
        categories: &CategoryRegistry,
    ) -> CeResult<TabularConfiguration> {
        let datasets = self
            .training_datasets
            .iter()
            .map(|d| d.build(registry))
            .collect::<CeResult<Vec<_>>>()?;
        self.build_with_datasets(datasets, registry, categories)
    }

    /// Build around already loaded datasets.
    pub fn build_with_datasets(
        &self,
        datasets: Vec<Dataset>,
        registry: &CallableRegistry,
        categories: &CategoryRegistry,
    ) -> CeResult<TabularConfiguration> {
        let configuration = TabularConfiguration::new(
            self.metadata.clone(),
            datasets,
            self.build_parameters(registry)?,
            self.preprocessing.clone(),
            categories,
        )?;
        tracing::info!(
            "Built configuration '{}': {} datasets, {} training and {} model parameters, {} processing actions",
            self.metadata.name,
            configuration.datasets.len(),
            self.training_parameters.len(),
            self.model_parameters.len(),
            configuration.actions.len()
        );
        Ok(configuration)
    }
}

/// Audit record of one source used in an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    pub path: PathBuf,
    pub weight: f64,
    pub cv: bool,
}

/// Result of [`TabularConfiguration::construct_dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDataset {
    /// Training rows followed by additional rows, processed.
    pub data: Frame,
    /// One weight per row of `data`, in the same order.
    pub weight: Vec<f64>,
    pub folds: Vec<Fold>,
    pub dataset_parameters: Vec<DatasetRecord>,
    /// Number of cross-validated rows at the top of `data`.
    pub n_training_rows: usize,
}

impl ProcessedDataset {
    /// Training and validation frames of fold `index`.
    pub fn fold_frames(&self, index: usize) -> CeResult<(Frame, Frame)> {
        let fold = self.folds.get(index).ok_or_else(|| DataError::InvalidFolds {
            message: format!("no fold {} among {}", index, self.folds.len()),
        })?;
        Ok((self.data.take(&fold.train)?, self.data.take(&fold.validation)?))
    }

    /// Weights of fold `index`'s training rows.
    pub fn fold_train_weight(&self, index: usize) -> Option<Vec<f64>> {
        let fold = self.folds.get(index)?;
        Some(fold.train.iter().map(|&i| self.weight[i]).collect())
    }
}

/// A built tabular experiment.
///
/// Immutable after construction except for the processing actions, which are
/// fit during each assembly. Use one instance per trial.
#[derive(Debug)]
pub struct TabularConfiguration {
    metadata: Metadata,
    datasets: Vec<Dataset>,
    parameters: Configuration,
    preprocessing: Vec<ColumnProcessingSchema>,
    actions: Vec<Box<dyn ProcessingAction>>,
}

impl TabularConfiguration {
    pub fn new(
        metadata: Metadata,
        datasets: Vec<Dataset>,
        parameters: Configuration,
        preprocessing: Vec<ColumnProcessingSchema>,
        categories: &CategoryRegistry,
    ) -> CeResult<Self> {
        let mut actions = Vec::new();
        for column in &preprocessing {
            actions.extend(column.build(categories)?);
        }
        Ok(Self {
            metadata,
            datasets,
            parameters,
            preprocessing,
            actions,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn parameters(&self) -> &Configuration {
        &self.parameters
    }

    pub fn preprocessing(&self) -> &[ColumnProcessingSchema] {
        &self.preprocessing
    }

    pub fn actions(&self) -> &[Box<dyn ProcessingAction>] {
        &self.actions
    }

    pub fn suggest_training_params(
        &self,
        trial: &mut dyn Trial,
    ) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.suggest(TRAINING_PARAMETERS, trial)
    }

    pub fn suggest_model_params(&self, trial: &mut dyn Trial) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.suggest(MODEL_PARAMETERS, trial)
    }

    pub fn first_training_params(&self) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.construct(TRAINING_PARAMETERS)
    }

    pub fn first_model_params(&self) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.construct(MODEL_PARAMETERS)
    }

    pub fn construct_tuner_parameters(&self) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.construct(TUNER_PARAMETERS)
    }

    pub fn construct_additional_params(&self) -> CeResult<BTreeMap<String, Value>> {
        self.parameters.construct(ADDITIONAL_PARAMETERS)
    }

    /// Assemble the weighted, processed, fold-split dataset.
    ///
    /// Weights resolve through `trial` when given, else through `first()`.
    /// Processing actions are fit on training and additional rows together,
    /// then applied to each part. Folds are stratified on `target_column`
    /// over the cross-validated rows only; additional rows join every
    /// training split and never a validation split.
    pub fn construct_dataset(
        &mut self,
        target_column: &str,
        mut trial: Option<&mut dyn Trial>,
        k_folds: usize,
    ) -> CeResult<ProcessedDataset> {
        let mut dataset_parameters = Vec::with_capacity(self.datasets.len());
        let mut training_frames: Vec<&Frame> = Vec::new();
        let mut additional_frames: Vec<&Frame> = Vec::new();
        let mut training_weight: Vec<f64> = Vec::new();
        let mut additional_weight: Vec<f64> = Vec::new();

        for dataset in &self.datasets {
            let resolved = match trial.as_deref_mut() {
                Some(trial) => dataset.weight().suggest(trial)?,
                None => dataset.weight().first(),
            };
            let weight = resolved.as_f64().ok_or_else(|| ResolutionError::NonNumericWeight {
                dataset: dataset.name().to_string(),
                value: resolved.to_string(),
            })?;

            let rows = dataset.data().n_rows();
            if dataset.cv() {
                training_frames.push(dataset.data());
                training_weight.extend(std::iter::repeat(weight).take(rows));
            } else {
                additional_frames.push(dataset.data());
                additional_weight.extend(std::iter::repeat(weight).take(rows));
            }
            tracing::debug!(
                "Dataset {} ({} rows, cv={}) weighted {}",
                dataset.name(),
                rows,
                dataset.cv(),
                weight
            );

            dataset_parameters.push(DatasetRecord {
                name: dataset.name().to_string(),
                path: dataset.path().to_path_buf(),
                weight,
                cv: dataset.cv(),
            });
        }

        if training_frames.is_empty() {
            return Err(DataError::NoCrossValidatedData.into());
        }
        tracing::info!(
            "Assembling dataset from {} cross-validated and {} additional sources",
            training_frames.len(),
            additional_frames.len()
        );

        let mut training = Frame::concat(&training_frames)?;
        let mut additional = if additional_frames.is_empty() {
            None
        } else {
            Some(Frame::concat(&additional_frames)?)
        };
        let mut total = match &additional {
            Some(additional) => Frame::concat(&[&training, additional])?,
            None => training.clone(),
        };

        for action in self.actions.iter_mut() {
            action.fit_transform_in_place(&mut total)?;
            action.transform_in_place(&mut training)?;
            if let Some(additional) = additional.as_mut() {
                action.transform_in_place(additional)?;
            }
        }

        let labels = training.labels(target_column)?;
        let mut folds = StratifiedKFold::new(k_folds)
            .with_seed(self.metadata.seed)
            .split(&labels, target_column)?;

        let n_training_rows = training.n_rows();
        if let Some(additional) = &additional {
            for fold in folds.iter_mut() {
                fold.extend_train(n_training_rows, additional.n_rows());
            }
        }

        for (i, fold) in folds.iter().enumerate() {
            tracing::info!(
                "Fold {}: {} training rows, {} validation rows",
                i,
                fold.train.len(),
                fold.validation.len()
            );
        }

        training_weight.extend(additional_weight);
        Ok(ProcessedDataset {
            data: total,
            weight: training_weight,
            folds,
            dataset_parameters,
            n_training_rows,
        })
    }
}

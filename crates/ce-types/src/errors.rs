use thiserror::Error;

/// Main error type for the configuration engine
#[derive(Error, Debug)]
pub enum CeError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Build-time configuration errors. Always fatal, raised before any trial runs.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Malformed schema for '{field}': {message}")]
    Malformed { field: String, message: String },

    #[error("Invalid range for '{field}': {message}")]
    InvalidRange { field: String, message: String },

    #[error("Parameter '{field}' has no candidate values")]
    EmptyCandidates { field: String },

    #[error("Built-in callables are not supported, use a full module path: '{path}'")]
    BuiltinCallable { path: String },

    #[error("Module '{module}' is not in the allowed list")]
    ModuleNotAllowed { module: String },

    #[error("Module '{module}' could not be resolved")]
    ModuleNotFound { module: String },

    #[error("Attribute '{attribute}' not found in module '{module}'")]
    AttributeNotFound { module: String, attribute: String },

    #[error("'{path}' is not callable")]
    NotCallable { path: String },

    #[error("'{path}' is not a class, class-only resolution allows only callable classes")]
    NotAClass { path: String },

    #[error("Unknown category domain '{category}' for column '{column}'")]
    UnknownCategory { category: String, column: String },

    #[error("Couldn't determine extension of file {path}")]
    UnsupportedSuffix { path: String },
}

/// Errors raised while resolving a parameter value for a trial
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Index {index} returned for '{key}' is outside [0, {}]", .count.saturating_sub(1))]
    IndexOutOfRange { key: String, index: i64, count: usize },

    #[error("Oracle failed to suggest '{key}': {message}")]
    Oracle { key: String, message: String },

    #[error("Weight of dataset '{dataset}' resolved to non-numeric value {value}")]
    NonNumericWeight { dataset: String, value: String },
}

/// Ordering errors in the fit/transform discipline
#[derive(Error, Debug)]
pub enum StateError {
    #[error("{action} on column '{column}' can't transform data before fitting")]
    NotFitted { action: String, column: String },
}

/// Errors caused by the contents of a table
#[derive(Error, Debug)]
pub enum DataError {
    #[error("{action}: dataframe doesn't contain column {column}")]
    MissingColumn { action: String, column: String },

    #[error("{action}: column isn't categorical {column}")]
    NotCategorical { action: String, column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' can't be concatenated: {message}")]
    ColumnMismatch { column: String, message: String },

    #[error("Invalid fold configuration: {message}")]
    InvalidFolds { message: String },

    #[error("The least populated class in '{column}' has {members} members, which is less than n_splits={n_splits}")]
    InsufficientClassMembers {
        column: String,
        members: usize,
        n_splits: usize,
    },

    #[error("No cross-validated dataset available for assembly")]
    NoCrossValidatedData,

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },
}

/// Errors looking up or resolving configuration entries
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("{method}: key {key} isn't present")]
    KeyNotFound { key: String, method: String },

    #[error("{method}: key {key} has unsupported shape, expected {expected}")]
    UnsupportedEntry {
        key: String,
        method: String,
        expected: String,
    },
}

/// Result type alias for configuration engine operations
pub type CeResult<T> = Result<T, CeError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::CeError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CeError::Config(format!($($arg)*))
    };
}

use ce_data::{CategoryRegistry, ResultRecord, TabularSchema, DEFAULT_K_FOLDS};
use ce_params::CallableRegistry;
use tracing_subscriber::EnvFilter;

/// Build a tabular schema, assemble its first-choice dataset and print the
/// resulting record.
///
/// Usage: `ce-dry-run <schema.yaml> <target-column> [categories.yaml]`, with
/// `CE_SCHEMA`, `CE_TARGET`, `CE_CATEGORIES` and `CE_K_FOLDS` as fallbacks.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let schema_path = args
        .next()
        .or_else(|| std::env::var("CE_SCHEMA").ok())
        .ok_or_else(|| anyhow::anyhow!("missing schema path (argument or CE_SCHEMA)"))?;
    let target = args
        .next()
        .or_else(|| std::env::var("CE_TARGET").ok())
        .ok_or_else(|| anyhow::anyhow!("missing target column (argument or CE_TARGET)"))?;
    let categories_path = args.next().or_else(|| std::env::var("CE_CATEGORIES").ok());
    let k_folds = match std::env::var("CE_K_FOLDS") {
        Ok(value) => value.parse()?,
        Err(_) => DEFAULT_K_FOLDS,
    };

    let categories = match categories_path {
        Some(path) => CategoryRegistry::from_path(path)?,
        None => CategoryRegistry::new(),
    };
    let registry = CallableRegistry::new();

    let mut configuration = TabularSchema::from_path(&schema_path)?.build(&registry, &categories)?;
    let processed = configuration.construct_dataset(&target, None, k_folds)?;
    tracing::info!(
        "Assembled {} rows ({} cross-validated) into {} folds",
        processed.data.n_rows(),
        processed.n_training_rows,
        processed.folds.len()
    );

    let record = ResultRecord::new(
        &configuration,
        &processed,
        configuration.first_training_params()?,
        configuration.first_model_params()?,
    )?;
    print!("{}", record.to_yaml()?);
    Ok(())
}

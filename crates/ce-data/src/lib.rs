//! # ce-data
//!
//! Tabular side of the configuration engine: frames and their file loaders,
//! category domains, column processing actions, stratified folds, and the
//! tabular configuration that assembles weighted, fold-split training data.

pub mod categories;
pub mod folds;
pub mod frame;
pub mod loaders;
pub mod processing;
pub mod record;
pub mod tabular;

pub use categories::*;
pub use folds::*;
pub use frame::*;
pub use loaders::*;
pub use processing::*;
pub use record::*;
pub use tabular::*;

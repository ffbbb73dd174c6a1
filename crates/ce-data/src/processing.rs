//! Stateful single-column processing actions and their schemas.
//!
//! Every action moves through `Unfit -> Fit -> Transformed`. Transforming an
//! unfit action is an ordering bug on the caller's side and always fails;
//! nothing here fits implicitly.

use std::sync::Arc;

use arrow::array::{AsArray, DictionaryArray, Int32Array, Int64Array, StringArray};
use arrow::datatypes::Int32Type;
use ce_types::{CeResult, DataError, StateError};
use serde::{Deserialize, Serialize};

use crate::categories::{CategoryDomain, CategoryRegistry};
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Unfit,
    Fit,
    Transformed,
}

impl ActionState {
    pub fn is_fit(self) -> bool {
        self != Self::Unfit
    }
}

/// A per-column transform with a fit-before-transform discipline.
pub trait ProcessingAction: std::fmt::Debug + Send + Sync {
    /// Human-readable action name, used in error messages.
    fn name(&self) -> &'static str;

    fn column(&self) -> &str;

    fn state(&self) -> ActionState;

    /// Mark the action fit. Repeated calls are equivalent to one.
    fn fit(&mut self, frame: &Frame) -> CeResult<()>;

    /// Apply the action to `frame`, mutating it.
    fn transform_in_place(&mut self, frame: &mut Frame) -> CeResult<()>;

    /// Apply the action to a copy of `frame`, leaving the original untouched.
    fn transform(&mut self, frame: &Frame) -> CeResult<Frame> {
        let mut copy = frame.clone();
        self.transform_in_place(&mut copy)?;
        Ok(copy)
    }

    fn fit_transform_in_place(&mut self, frame: &mut Frame) -> CeResult<()> {
        self.fit(frame)?;
        self.transform_in_place(frame)
    }

    fn fit_transform(&mut self, frame: &Frame) -> CeResult<Frame> {
        self.fit(frame)?;
        self.transform(frame)
    }
}

/// Fit flag and target column shared by every action.
#[derive(Debug, Clone, PartialEq)]
struct ColumnGuard {
    column: String,
    state: ActionState,
}

impl ColumnGuard {
    fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            state: ActionState::Unfit,
        }
    }

    fn fit(&mut self) {
        if self.state == ActionState::Unfit {
            self.state = ActionState::Fit;
        }
    }

    /// Fails unless fit and the column is present.
    fn check_transform(&self, action: &str, frame: &Frame) -> CeResult<()> {
        if !self.state.is_fit() {
            return Err(StateError::NotFitted {
                action: action.to_string(),
                column: self.column.clone(),
            }
            .into());
        }
        if !frame.contains(&self.column) {
            return Err(DataError::MissingColumn {
                action: action.to_string(),
                column: self.column.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn transformed(&mut self) {
        self.state = ActionState::Transformed;
    }
}

// ---- Drop column ----

#[derive(Debug, Clone, PartialEq)]
pub struct DropColumn {
    guard: ColumnGuard,
}

impl DropColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            guard: ColumnGuard::new(column),
        }
    }
}

impl ProcessingAction for DropColumn {
    fn name(&self) -> &'static str {
        "drop column"
    }

    fn column(&self) -> &str {
        &self.guard.column
    }

    fn state(&self) -> ActionState {
        self.guard.state
    }

    fn fit(&mut self, _frame: &Frame) -> CeResult<()> {
        self.guard.fit();
        Ok(())
    }

    fn transform_in_place(&mut self, frame: &mut Frame) -> CeResult<()> {
        self.guard.check_transform(self.name(), frame)?;
        frame.remove_column(&self.guard.column);
        self.guard.transformed();
        tracing::debug!("Dropped column {}", self.guard.column);
        Ok(())
    }
}

// ---- Recategorize ----

/// Assigns a categorical domain to a column. Values outside the domain
/// become missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Recategorize {
    guard: ColumnGuard,
    domain: CategoryDomain,
}

impl Recategorize {
    pub fn new(column: impl Into<String>, domain: CategoryDomain) -> Self {
        Self {
            guard: ColumnGuard::new(column),
            domain,
        }
    }

    pub fn domain(&self) -> &CategoryDomain {
        &self.domain
    }
}

impl ProcessingAction for Recategorize {
    fn name(&self) -> &'static str {
        "change category"
    }

    fn column(&self) -> &str {
        &self.guard.column
    }

    fn state(&self) -> ActionState {
        self.guard.state
    }

    fn fit(&mut self, _frame: &Frame) -> CeResult<()> {
        self.guard.fit();
        Ok(())
    }

    fn transform_in_place(&mut self, frame: &mut Frame) -> CeResult<()> {
        self.guard.check_transform(self.name(), frame)?;
        let keys: Int32Array = frame
            .values(&self.guard.column)?
            .iter()
            .map(|cell| {
                cell.as_ref()
                    .and_then(|v| self.domain.position(v))
                    .and_then(|code| i32::try_from(code).ok())
            })
            .collect();
        let labels = StringArray::from_iter_values(
            self.domain.categories().iter().map(|c| c.to_string()),
        );
        let categorical = DictionaryArray::<Int32Type>::try_new(keys, Arc::new(labels))?;

        frame.set_column(&self.guard.column, Arc::new(categorical))?;
        self.guard.transformed();
        tracing::debug!(
            "Recategorized column {} into {} categories",
            self.guard.column,
            self.domain.len()
        );
        Ok(())
    }
}

// ---- Category to codes ----

/// Replaces a categorical column by its integer codes; missing values map
/// to `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryToCodes {
    guard: ColumnGuard,
}

impl CategoryToCodes {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            guard: ColumnGuard::new(column),
        }
    }
}

impl ProcessingAction for CategoryToCodes {
    fn name(&self) -> &'static str {
        "category to codes"
    }

    fn column(&self) -> &str {
        &self.guard.column
    }

    fn state(&self) -> ActionState {
        self.guard.state
    }

    fn fit(&mut self, _frame: &Frame) -> CeResult<()> {
        self.guard.fit();
        Ok(())
    }

    fn transform_in_place(&mut self, frame: &mut Frame) -> CeResult<()> {
        self.guard.check_transform(self.name(), frame)?;
        let codes = match frame
            .column(&self.guard.column)
            .and_then(|array| array.as_dictionary_opt::<Int32Type>())
        {
            Some(categorical) => Int64Array::from_iter_values(
                categorical.keys().iter().map(|code| code.map_or(-1, i64::from)),
            ),
            None => {
                return Err(DataError::NotCategorical {
                    action: self.name().to_string(),
                    column: self.guard.column.clone(),
                }
                .into())
            }
        };
        frame.set_column(&self.guard.column, Arc::new(codes))?;
        self.guard.transformed();
        tracing::debug!("Converted column {} to category codes", self.guard.column);
        Ok(())
    }
}

// ---- Schemas ----

/// One action in a column's preprocessing list, discriminated by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ColumnActionSchema {
    Drop,
    Codes,
    CategoryChange { category: String },
}

impl ColumnActionSchema {
    pub fn build(
        &self,
        column: &str,
        categories: &CategoryRegistry,
    ) -> CeResult<Box<dyn ProcessingAction>> {
        Ok(match self {
            Self::Drop => Box::new(DropColumn::new(column)),
            Self::Codes => Box::new(CategoryToCodes::new(column)),
            Self::CategoryChange { category } => Box::new(Recategorize::new(
                column,
                categories.resolve(category, column)?.clone(),
            )),
        })
    }
}

/// Ordered actions applied to a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProcessingSchema {
    pub column: String,
    pub actions: Vec<ColumnActionSchema>,
}

impl ColumnProcessingSchema {
    pub fn build(&self, categories: &CategoryRegistry) -> CeResult<Vec<Box<dyn ProcessingAction>>> {
        self.actions
            .iter()
            .map(|action| action.build(&self.column, categories))
            .collect()
    }
}

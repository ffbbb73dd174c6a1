//! Named categorical domains referenced by recategorize actions.

use ce_types::{CeResult, SchemaError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainRepr {
    Values(Vec<Value>),
    Full {
        categories: Vec<Value>,
        #[serde(default)]
        ordered: bool,
    },
}

impl From<DomainRepr> for CategoryDomain {
    fn from(repr: DomainRepr) -> Self {
        match repr {
            DomainRepr::Values(categories) => Self::new(categories, false),
            DomainRepr::Full {
                categories,
                ordered,
            } => Self::new(categories, ordered),
        }
    }
}

/// Ordered set of category values.
///
/// Cells match a category by their text rendering, so `1` and `1.0` land in
/// the same category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DomainRepr")]
pub struct CategoryDomain {
    categories: Vec<Value>,
    ordered: bool,
}

impl CategoryDomain {
    pub fn new(categories: Vec<Value>, ordered: bool) -> Self {
        Self {
            categories,
            ordered,
        }
    }

    pub fn categories(&self) -> &[Value] {
        &self.categories
    }

    pub fn ordered(&self) -> bool {
        self.ordered
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, code: usize) -> Option<&Value> {
        self.categories.get(code)
    }

    /// Code of `value`, or `None` when it lies outside the domain.
    pub fn position(&self, value: &Value) -> Option<usize> {
        let rendered = value.to_string();
        self.categories
            .iter()
            .position(|c| c.to_string() == rendered)
    }
}

/// Registry of category domains addressed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRegistry {
    domains: BTreeMap<String, CategoryDomain>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, domain: CategoryDomain) -> &mut Self {
        self.domains.insert(name.into(), domain);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDomain> {
        self.domains.get(name)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domain `name`, requested for `column`.
    pub fn resolve(&self, name: &str, column: &str) -> CeResult<&CategoryDomain> {
        self.domains.get(name).ok_or_else(|| {
            SchemaError::UnknownCategory {
                category: name.to_string(),
                column: column.to_string(),
            }
            .into()
        })
    }

    pub fn from_yaml_str(document: &str) -> CeResult<Self> {
        Ok(serde_yaml::from_str(document)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CeResult<Self> {
        let path = path.as_ref();
        let registry = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        tracing::info!(
            "Loaded {} category domains from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }
}

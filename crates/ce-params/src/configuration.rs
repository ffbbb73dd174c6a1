//! Named mapping of built configuration entries.

use ce_types::{CeResult, LookupError, Value};
use std::collections::BTreeMap;

use crate::parameter::{NontunableParameter, Parameter, TunableParameter};
use crate::trial::Trial;

/// One entry of a [`Configuration`].
///
/// A parameter map never mixes raw values and parameter objects: each entry
/// holds exactly one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEntry {
    /// Materialized basic record, dumped as-is by `construct`.
    Record(BTreeMap<String, Value>),
    Tunable(BTreeMap<String, Parameter>),
    Nontunable(BTreeMap<String, NontunableParameter>),
    /// Untagged field, preserved verbatim.
    Plain(serde_json::Value),
}

impl ConfigEntry {
    fn shape(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Tunable(_) => "tunable parameters",
            Self::Nontunable(_) => "nontunable parameters",
            Self::Plain(_) => "plain value",
        }
    }
}

/// Resolve every parameter through `first()`.
pub fn first_values(parameters: &BTreeMap<String, Parameter>) -> BTreeMap<String, Value> {
    parameters
        .iter()
        .map(|(key, param)| (key.clone(), param.first()))
        .collect()
}

/// Resolve every parameter through the oracle.
pub fn suggest_values(
    parameters: &BTreeMap<String, Parameter>,
    trial: &mut dyn Trial,
) -> CeResult<BTreeMap<String, Value>> {
    parameters
        .iter()
        .map(|(key, param)| Ok((key.clone(), param.suggest(trial)?)))
        .collect()
}

pub fn nontunable_values(
    parameters: &BTreeMap<String, NontunableParameter>,
) -> BTreeMap<String, Value> {
    parameters
        .iter()
        .map(|(key, param)| (key.clone(), param.value()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    entries: BTreeMap<String, ConfigEntry>,
}

impl Configuration {
    pub fn new(entries: BTreeMap<String, ConfigEntry>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ConfigEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str, method: &str) -> CeResult<&ConfigEntry> {
        self.entries.get(key).ok_or_else(|| {
            LookupError::KeyNotFound {
                key: key.to_string(),
                method: method.to_string(),
            }
            .into()
        })
    }

    pub fn get(&self, key: &str) -> CeResult<&ConfigEntry> {
        self.lookup(key, "get")
    }

    /// Verbatim value of an untagged entry.
    pub fn plain(&self, key: &str) -> CeResult<&serde_json::Value> {
        match self.lookup(key, "plain")? {
            ConfigEntry::Plain(value) => Ok(value),
            other => Err(LookupError::UnsupportedEntry {
                key: key.to_string(),
                method: "plain".to_string(),
                expected: format!("plain value, found {}", other.shape()),
            }
            .into()),
        }
    }

    /// Resolve an entry without touching the oracle.
    ///
    /// Records are dumped, tunable parameters resolve through `first()` and
    /// non-tunable parameters through `value()`.
    pub fn construct(&self, key: &str) -> CeResult<BTreeMap<String, Value>> {
        match self.lookup(key, "construct")? {
            ConfigEntry::Record(record) => Ok(record.clone()),
            ConfigEntry::Tunable(parameters) => Ok(first_values(parameters)),
            ConfigEntry::Nontunable(parameters) => Ok(nontunable_values(parameters)),
            ConfigEntry::Plain(_) => Err(LookupError::UnsupportedEntry {
                key: key.to_string(),
                method: "construct".to_string(),
                expected: "record or parameter map".to_string(),
            }
            .into()),
        }
    }

    /// Resolve a tunable entry through the oracle.
    ///
    /// Only tunable parameter maps are subject to search; every other shape
    /// is an error.
    pub fn suggest(&self, key: &str, trial: &mut dyn Trial) -> CeResult<BTreeMap<String, Value>> {
        match self.lookup(key, "suggest")? {
            ConfigEntry::Tunable(parameters) => suggest_values(parameters, trial),
            other => Err(LookupError::UnsupportedEntry {
                key: key.to_string(),
                method: "suggest".to_string(),
                expected: format!("tunable parameters, found {}", other.shape()),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{RangeBounds, RangeParameter};
    use crate::trial::FixedTrial;
    use ce_types::CeError;

    fn basic_configuration() -> Configuration {
        let mut info = BTreeMap::new();
        info.insert("name".to_string(), Value::from("peter"));
        info.insert("surname".to_string(), Value::from("karel"));

        let age = RangeParameter::new(
            "age",
            RangeBounds::Int {
                min: 0,
                max: 24,
                step: Some(1),
            },
            false,
            None,
        )
        .unwrap();
        let mut tunable = BTreeMap::new();
        tunable.insert("age".to_string(), Parameter::Range(age));

        let mut nontunable = BTreeMap::new();
        nontunable.insert("skin".to_string(), NontunableParameter::new("skin", "bad"));

        let mut config = Configuration::default();
        config.insert("info", ConfigEntry::Record(info));
        config.insert("tunable", ConfigEntry::Tunable(tunable));
        config.insert("nontunable", ConfigEntry::Nontunable(nontunable));
        config.insert("notes", ConfigEntry::Plain(serde_json::json!({"free": "text"})));
        config
    }

    fn trial() -> FixedTrial {
        FixedTrial::default().with("age", 5i64)
    }

    #[test]
    fn construct_missing_key() {
        let err = basic_configuration().construct("hello").unwrap_err();
        assert!(matches!(err, CeError::Lookup(LookupError::KeyNotFound { .. })));
        assert!(err.to_string().contains("hello"));
    }

    #[test]
    fn construct_each_shape() {
        let config = basic_configuration();
        assert_eq!(
            config.construct("info").unwrap(),
            BTreeMap::from([
                ("name".to_string(), Value::from("peter")),
                ("surname".to_string(), Value::from("karel")),
            ])
        );
        assert_eq!(
            config.construct("tunable").unwrap(),
            BTreeMap::from([("age".to_string(), Value::Int(0))])
        );
        assert_eq!(
            config.construct("nontunable").unwrap(),
            BTreeMap::from([("skin".to_string(), Value::from("bad"))])
        );
    }

    #[test]
    fn construct_plain_is_unsupported_but_plain_returns_it() {
        let config = basic_configuration();
        assert!(config.construct("notes").is_err());
        assert_eq!(config.plain("notes").unwrap()["free"], "text");
    }

    #[test]
    fn suggest_tunable_entry() {
        let data = basic_configuration().suggest("tunable", &mut trial()).unwrap();
        assert_eq!(data, BTreeMap::from([("age".to_string(), Value::Int(5))]));
    }

    #[test]
    fn suggest_rejects_non_tunable_shapes() {
        let config = basic_configuration();
        for key in ["nontunable", "info", "notes"] {
            let err = config.suggest(key, &mut trial()).unwrap_err();
            assert!(
                matches!(err, CeError::Lookup(LookupError::UnsupportedEntry { .. })),
                "{key} should not be suggestible"
            );
            assert!(err.to_string().contains("suggest"));
        }
    }

    #[test]
    fn suggest_missing_key() {
        let err = basic_configuration().suggest("missing", &mut trial()).unwrap_err();
        assert!(matches!(err, CeError::Lookup(LookupError::KeyNotFound { .. })));
    }
}

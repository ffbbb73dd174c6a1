//! Tag-driven configuration builder.
//!
//! A record type declares, once and statically, which of its fields hold
//! tunable parameters, non-tunable settings or basic records. The generic
//! builder walks the serialized record and dispatches each field by its
//! declared kind. Undeclared fields pass through verbatim.

use ce_types::{CeResult, SchemaError, Value};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::callable::CallableRegistry;
use crate::configuration::{ConfigEntry, Configuration};
use crate::parameter::{NontunableParameter, Parameter};
use crate::schema::ParameterSpec;

/// Capability tag of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Mapping (or sub-record) of parameter specs.
    Tunable,
    /// Mapping (or sub-record) of plain scalars.
    Nontunable,
    /// Basic record, dumped as-is.
    Record,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub const fn tunable(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Tunable,
        }
    }

    pub const fn nontunable(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Nontunable,
        }
    }

    pub const fn record(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Record,
        }
    }

    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
        }
    }
}

/// A record whose fields carry capability tags.
pub trait TaggedSchema: Serialize {
    const FIELDS: &'static [FieldDecl];

    fn build_configuration(&self, registry: &CallableRegistry) -> CeResult<Configuration> {
        build_tagged(self, Self::FIELDS, registry)
    }
}

fn malformed(field: &str, message: impl Into<String>) -> ce_types::CeError {
    SchemaError::Malformed {
        field: field.to_string(),
        message: message.into(),
    }
    .into()
}

fn to_object(
    field: &str,
    value: serde_json::Value,
) -> CeResult<serde_json::Map<String, serde_json::Value>> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(malformed(field, format!("expected a mapping, got {other}"))),
    }
}

fn tunable_entries(
    field: &str,
    value: serde_json::Value,
    registry: &CallableRegistry,
) -> CeResult<BTreeMap<String, Parameter>> {
    let mut parameters = BTreeMap::new();
    for (key, raw) in to_object(field, value)? {
        let spec: ParameterSpec = serde_json::from_value(raw)
            .map_err(|e| malformed(&format!("{field}.{key}"), e.to_string()))?;
        let parameter = spec.build(&key, None, registry)?;
        parameters.insert(key, parameter);
    }
    Ok(parameters)
}

fn scalar_entries(field: &str, value: serde_json::Value) -> CeResult<BTreeMap<String, Value>> {
    let mut values = BTreeMap::new();
    for (key, raw) in to_object(field, value)? {
        let scalar: Value = serde_json::from_value(raw)
            .map_err(|e| malformed(&format!("{field}.{key}"), e.to_string()))?;
        values.insert(key, scalar);
    }
    Ok(values)
}

fn nontunable_entries(
    field: &str,
    value: serde_json::Value,
) -> CeResult<BTreeMap<String, NontunableParameter>> {
    Ok(scalar_entries(field, value)?
        .into_iter()
        .map(|(key, value)| {
            let parameter = NontunableParameter::new(key.clone(), value);
            (key, parameter)
        })
        .collect())
}

/// Build a record whose every field is a parameter spec into a parameter map.
pub fn build_tunable_record<S: Serialize + ?Sized>(
    record: &S,
    registry: &CallableRegistry,
) -> CeResult<BTreeMap<String, Parameter>> {
    tunable_entries("record", serde_json::to_value(record)?, registry)
}

/// Build a record whose every field is a plain scalar into non-tunable parameters.
pub fn build_nontunable_record<S: Serialize + ?Sized>(
    record: &S,
) -> CeResult<BTreeMap<String, NontunableParameter>> {
    nontunable_entries("record", serde_json::to_value(record)?)
}

/// Build a [`Configuration`] from a record and its field declarations.
pub fn build_tagged<S: Serialize + ?Sized>(
    schema: &S,
    fields: &[FieldDecl],
    registry: &CallableRegistry,
) -> CeResult<Configuration> {
    let mut object = to_object("schema", serde_json::to_value(schema)?)?;
    let mut configuration = Configuration::default();

    for decl in fields {
        let value = object
            .remove(decl.name)
            .ok_or_else(|| malformed(decl.name, "declared field is missing"))?;

        let entry = match decl.kind {
            FieldKind::Tunable => ConfigEntry::Tunable(tunable_entries(decl.name, value, registry)?),
            FieldKind::Nontunable => ConfigEntry::Nontunable(nontunable_entries(decl.name, value)?),
            FieldKind::Record => ConfigEntry::Record(scalar_entries(decl.name, value)?),
            FieldKind::Plain => ConfigEntry::Plain(value),
        };
        configuration.insert(decl.name, entry);
    }

    for (name, value) in object {
        configuration.insert(name, ConfigEntry::Plain(value));
    }

    tracing::debug!("Built tagged configuration with {} entries", configuration.len());
    Ok(configuration)
}

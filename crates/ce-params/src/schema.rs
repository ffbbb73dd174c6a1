//! Serializable parameter schemas.
//!
//! Wherever a document may hold either a plain scalar or a structured schema,
//! it is deserialized as a [`ParameterSpec`]. [`ParameterSpec::build`] is the
//! single place where plain scalars degrade to constant parameters.

use ce_types::{CeResult, SchemaError, Value};
use serde::{Deserialize, Serialize};

use crate::callable::CallableRegistry;
use crate::parameter::{
    CallableParameter, ConstantParameter, LiteralParameter, MultiParameter, Parameter,
    RangeBounds, RangeParameter,
};

/// Integer or real bound, as written in the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeParameterSchema {
    pub min: Number,
    pub max: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Number>,
    #[serde(default)]
    pub log: bool,
}

impl RangeParameterSchema {
    pub fn bounds(&self, field: &str) -> CeResult<RangeBounds> {
        let mismatch = |message: &str| -> CeResult<RangeBounds> {
            Err(SchemaError::InvalidRange {
                field: field.to_string(),
                message: message.to_string(),
            }
            .into())
        };

        match (self.min, self.max, self.step) {
            (Number::Int(min), Number::Int(max), None) => Ok(RangeBounds::Int {
                min,
                max,
                step: None,
            }),
            (Number::Int(min), Number::Int(max), Some(Number::Int(step))) => Ok(RangeBounds::Int {
                min,
                max,
                step: Some(step),
            }),
            (Number::Int(_), Number::Int(_), Some(Number::Float(_))) => {
                mismatch("integer range can't have a real step")
            }
            (Number::Float(min), Number::Float(max), step) => Ok(RangeBounds::Float {
                min,
                max,
                step: step.map(|s| match s {
                    Number::Int(v) => v as f64,
                    Number::Float(v) => v,
                }),
            }),
            _ => mismatch("min and max must both be integers or both be reals"),
        }
    }

    pub fn build(&self, name: &str, alias: Option<&str>) -> CeResult<RangeParameter> {
        RangeParameter::new(name, self.bounds(name)?, self.log, alias)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralParameterSchema {
    pub values: Vec<Value>,
}

impl LiteralParameterSchema {
    pub fn build(&self, name: &str, alias: Option<&str>) -> CeResult<LiteralParameter> {
        if let Some(value) = self.values.iter().find(|v| matches!(v, Value::List(_))) {
            return Err(SchemaError::Malformed {
                field: name.to_string(),
                message: format!("literal candidates must be scalars, got {value}"),
            }
            .into());
        }
        LiteralParameter::new(name, self.values.clone(), alias)
    }
}

/// One dotted path or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallablePaths {
    One(String),
    Many(Vec<String>),
}

impl CallablePaths {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::One(path) => vec![path.as_str()],
            Self::Many(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

fn default_class_only() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallableParameterSchema {
    pub callable: CallablePaths,
    #[serde(default = "default_class_only")]
    pub class_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_modules: Option<Vec<String>>,
}

impl CallableParameterSchema {
    /// Resolves every path now, so unresolvable callables fail at build time.
    pub fn build(
        &self,
        name: &str,
        alias: Option<&str>,
        registry: &CallableRegistry,
    ) -> CeResult<CallableParameter> {
        let callables = self
            .callable
            .paths()
            .into_iter()
            .map(|path| registry.resolve(path, self.allowed_modules.as_deref(), self.class_only))
            .collect::<CeResult<Vec<_>>>()?;
        CallableParameter::new(name, callables, alias)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiParameterSchema {
    pub parameters: Vec<ParameterSpec>,
}

impl MultiParameterSchema {
    pub fn build(
        &self,
        name: &str,
        alias: Option<&str>,
        registry: &CallableRegistry,
    ) -> CeResult<MultiParameter> {
        let alias = alias.filter(|a| !a.is_empty()).unwrap_or(name);
        let parameters = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let branch_alias = MultiParameter::branch_alias(alias, i);
                spec.build(name, Some(&branch_alias), registry)
            })
            .collect::<CeResult<Vec<_>>>()?;
        MultiParameter::new(name, parameters, Some(alias))
    }
}

/// Structured parameter schema, discriminated by its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSchema {
    Range(RangeParameterSchema),
    Literal(LiteralParameterSchema),
    Callable(CallableParameterSchema),
    Multi(MultiParameterSchema),
}

impl ParameterSchema {
    pub fn build(
        &self,
        name: &str,
        alias: Option<&str>,
        registry: &CallableRegistry,
    ) -> CeResult<Parameter> {
        Ok(match self {
            Self::Range(schema) => Parameter::Range(schema.build(name, alias)?),
            Self::Literal(schema) => Parameter::Literal(schema.build(name, alias)?),
            Self::Callable(schema) => Parameter::Callable(schema.build(name, alias, registry)?),
            Self::Multi(schema) => Parameter::Multi(schema.build(name, alias, registry)?),
        })
    }
}

/// A parameter-valued field: a plain scalar or a structured schema.
///
/// Scalars are tried first: serde accepts a sequence for a struct, so a plain
/// list must never reach the schema variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSpec {
    Scalar(Value),
    Schema(ParameterSchema),
}

impl ParameterSpec {
    pub fn build(
        &self,
        name: &str,
        alias: Option<&str>,
        registry: &CallableRegistry,
    ) -> CeResult<Parameter> {
        match self {
            Self::Schema(schema) => schema.build(name, alias, registry),
            Self::Scalar(value) => Ok(Parameter::Constant(ConstantParameter::new(
                name,
                value.clone(),
                alias,
            ))),
        }
    }

    pub fn is_tunable(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

impl From<Value> for ParameterSpec {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<ParameterSchema> for ParameterSpec {
    fn from(schema: ParameterSchema) -> Self {
        Self::Schema(schema)
    }
}

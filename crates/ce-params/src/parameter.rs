//! Runtime parameter objects.
//!
//! A tunable parameter resolves either through the trial oracle (`suggest`)
//! or deterministically (`first`). Equality is structural: reals are compared
//! with a relative tolerance so parameters rebuilt from re-serialized schemas
//! still compare equal.

use ce_types::{ApproxEq, CeResult, ResolutionError, SchemaError, Value};

use crate::callable::{Callable, CallableKind};
use crate::schema::{
    CallableParameterSchema, CallablePaths, LiteralParameterSchema, MultiParameterSchema,
    Number, ParameterSchema, ParameterSpec, RangeParameterSchema,
};
use crate::trial::Trial;

/// Common contract of every tunable parameter variant.
pub trait TunableParameter {
    /// Field identifier, used as the configuration key.
    fn name(&self) -> &str;

    /// Search key the oracle sees.
    fn alias(&self) -> &str;

    /// Ask the oracle for a trial-specific value under `alias`.
    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value>;

    /// Fixed representative value. Pure and oracle-free.
    fn first(&self) -> Value;
}

fn resolve_alias(name: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) if !alias.is_empty() => alias.to_string(),
        _ => name.to_string(),
    }
}

/// Pick an index in `[0, count-1]` through the integer oracle.
///
/// An answer outside the range is a hard failure, never clamped.
fn suggest_index(trial: &mut dyn Trial, alias: &str, count: usize) -> CeResult<usize> {
    let high = count as i64 - 1;
    let index = trial.suggest_int(alias, 0, high, 1, false)?;
    if index < 0 || index > high {
        return Err(ResolutionError::IndexOutOfRange {
            key: alias.to_string(),
            index,
            count,
        }
        .into());
    }
    Ok(index as usize)
}

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConstantParameter {
    name: String,
    alias: String,
    value: Value,
}

impl ConstantParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, alias: Option<&str>) -> Self {
        let name = name.into();
        Self {
            alias: resolve_alias(&name, alias),
            name,
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl TunableParameter for ConstantParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn suggest(&self, _trial: &mut dyn Trial) -> CeResult<Value> {
        Ok(self.value.clone())
    }

    fn first(&self) -> Value {
        self.value.clone()
    }
}

impl PartialEq for ConstantParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.alias == other.alias && self.value.approx_eq(&other.value)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// Bounds of a numeric range. Integer and real bounds never mix.
#[derive(Debug, Clone, Copy)]
pub enum RangeBounds {
    Int {
        min: i64,
        max: i64,
        step: Option<i64>,
    },
    Float {
        min: f64,
        max: f64,
        step: Option<f64>,
    },
}

impl PartialEq for RangeBounds {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Int { min, max, step },
                Self::Int {
                    min: omin,
                    max: omax,
                    step: ostep,
                },
            ) => min == omin && max == omax && step == ostep,
            (
                Self::Float { min, max, step },
                Self::Float {
                    min: omin,
                    max: omax,
                    step: ostep,
                },
            ) => min.approx_eq(omin) && max.approx_eq(omax) && step.approx_eq(ostep),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeParameter {
    name: String,
    alias: String,
    bounds: RangeBounds,
    log: bool,
}

impl RangeParameter {
    pub fn new(
        name: impl Into<String>,
        bounds: RangeBounds,
        log: bool,
        alias: Option<&str>,
    ) -> CeResult<Self> {
        let name = name.into();
        let invalid = |message: String| -> CeResult<Self> {
            Err(SchemaError::InvalidRange {
                field: name.clone(),
                message,
            }
            .into())
        };

        match bounds {
            RangeBounds::Int { min, max, step } => {
                if min > max {
                    return invalid(format!("min {min} is greater than max {max}"));
                }
                if matches!(step, Some(s) if s <= 0) {
                    return invalid("step must be positive".to_string());
                }
                if log && min <= 0 {
                    return invalid("log scale requires a positive lower bound".to_string());
                }
            }
            RangeBounds::Float { min, max, step } => {
                if !min.is_finite() || !max.is_finite() {
                    return invalid("bounds must be finite".to_string());
                }
                if min > max {
                    return invalid(format!("min {min} is greater than max {max}"));
                }
                if matches!(step, Some(s) if s <= 0.0 || !s.is_finite()) {
                    return invalid("step must be positive".to_string());
                }
                if log && min <= 0.0 {
                    return invalid("log scale requires a positive lower bound".to_string());
                }
            }
        }

        Ok(Self {
            alias: resolve_alias(&name, alias),
            name,
            bounds,
            log,
        })
    }

    pub fn bounds(&self) -> RangeBounds {
        self.bounds
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.bounds, RangeBounds::Int { .. })
    }
}

impl TunableParameter for RangeParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value> {
        match self.bounds {
            RangeBounds::Int { min, max, step } => trial
                .suggest_int(&self.alias, min, max, step.unwrap_or(1), self.log)
                .map(Value::Int),
            RangeBounds::Float { min, max, step } => trial
                .suggest_float(&self.alias, min, max, step, self.log)
                .map(Value::Float),
        }
    }

    fn first(&self) -> Value {
        match self.bounds {
            RangeBounds::Int { min, .. } => Value::Int(min),
            RangeBounds::Float { min, .. } => Value::Float(min),
        }
    }
}

// ---------------------------------------------------------------------------
// Literal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LiteralParameter {
    name: String,
    alias: String,
    values: Vec<Value>,
}

impl LiteralParameter {
    pub fn new(name: impl Into<String>, values: Vec<Value>, alias: Option<&str>) -> CeResult<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(SchemaError::EmptyCandidates { field: name }.into());
        }
        Ok(Self {
            alias: resolve_alias(&name, alias),
            name,
            values,
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl TunableParameter for LiteralParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value> {
        let index = suggest_index(trial, &self.alias, self.values.len())?;
        Ok(self.values[index].clone())
    }

    fn first(&self) -> Value {
        self.values[0].clone()
    }
}

impl PartialEq for LiteralParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.alias == other.alias && self.values.approx_eq(&other.values)
    }
}

// ---------------------------------------------------------------------------
// Callable set
// ---------------------------------------------------------------------------

/// Candidate callables, bound when the schema is built.
///
/// In resolved configurations a callable is represented by its dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableParameter {
    name: String,
    alias: String,
    callables: Vec<Callable>,
}

impl CallableParameter {
    pub fn new(
        name: impl Into<String>,
        callables: Vec<Callable>,
        alias: Option<&str>,
    ) -> CeResult<Self> {
        let name = name.into();
        if callables.is_empty() {
            return Err(SchemaError::EmptyCandidates { field: name }.into());
        }
        Ok(Self {
            alias: resolve_alias(&name, alias),
            name,
            callables,
        })
    }

    pub fn callables(&self) -> &[Callable] {
        &self.callables
    }

    pub fn suggest_callable(&self, trial: &mut dyn Trial) -> CeResult<&Callable> {
        let index = suggest_index(trial, &self.alias, self.callables.len())?;
        Ok(&self.callables[index])
    }

    pub fn first_callable(&self) -> &Callable {
        &self.callables[0]
    }
}

impl TunableParameter for CallableParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value> {
        self.suggest_callable(trial)
            .map(|callable| Value::Str(callable.path().to_string()))
    }

    fn first(&self) -> Value {
        Value::Str(self.first_callable().path().to_string())
    }
}

// ---------------------------------------------------------------------------
// Multi-of
// ---------------------------------------------------------------------------

/// Picks one sub-parameter by index, then delegates resolution to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiParameter {
    name: String,
    alias: String,
    parameters: Vec<Parameter>,
}

impl MultiParameter {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        alias: Option<&str>,
    ) -> CeResult<Self> {
        let name = name.into();
        if parameters.is_empty() {
            return Err(SchemaError::EmptyCandidates { field: name }.into());
        }
        Ok(Self {
            alias: resolve_alias(&name, alias),
            name,
            parameters,
        })
    }

    /// Search key of the `index`-th branch.
    pub fn branch_alias(alias: &str, index: usize) -> String {
        format!("{alias}.{index}")
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

impl TunableParameter for MultiParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value> {
        let index = suggest_index(trial, &self.alias, self.parameters.len())?;
        self.parameters[index].suggest(trial)
    }

    fn first(&self) -> Value {
        self.parameters[0].first()
    }
}

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// A tunable parameter of any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Constant(ConstantParameter),
    Range(RangeParameter),
    Literal(LiteralParameter),
    Callable(CallableParameter),
    Multi(MultiParameter),
}

impl Parameter {
    fn inner(&self) -> &dyn TunableParameter {
        match self {
            Self::Constant(p) => p,
            Self::Range(p) => p,
            Self::Literal(p) => p,
            Self::Callable(p) => p,
            Self::Multi(p) => p,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Serializable schema that rebuilds an equal parameter.
    pub fn to_spec(&self) -> ParameterSpec {
        match self {
            Self::Constant(p) => ParameterSpec::Scalar(p.value.clone()),
            Self::Range(p) => {
                let (min, max, step) = match p.bounds {
                    RangeBounds::Int { min, max, step } => {
                        (Number::Int(min), Number::Int(max), step.map(Number::Int))
                    }
                    RangeBounds::Float { min, max, step } => {
                        (Number::Float(min), Number::Float(max), step.map(Number::Float))
                    }
                };
                ParameterSpec::Schema(ParameterSchema::Range(RangeParameterSchema {
                    min,
                    max,
                    step,
                    log: p.log,
                }))
            }
            Self::Literal(p) => ParameterSpec::Schema(ParameterSchema::Literal(
                LiteralParameterSchema {
                    values: p.values.clone(),
                },
            )),
            Self::Callable(p) => {
                let mut paths: Vec<String> =
                    p.callables.iter().map(|c| c.path().to_string()).collect();
                let callable = if paths.len() == 1 {
                    CallablePaths::One(paths.remove(0))
                } else {
                    CallablePaths::Many(paths)
                };
                ParameterSpec::Schema(ParameterSchema::Callable(CallableParameterSchema {
                    callable,
                    class_only: p.callables.iter().all(|c| c.kind() == CallableKind::Class),
                    allowed_modules: None,
                }))
            }
            Self::Multi(p) => ParameterSpec::Schema(ParameterSchema::Multi(MultiParameterSchema {
                parameters: p.parameters.iter().map(Parameter::to_spec).collect(),
            })),
        }
    }
}

impl TunableParameter for Parameter {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn alias(&self) -> &str {
        self.inner().alias()
    }

    fn suggest(&self, trial: &mut dyn Trial) -> CeResult<Value> {
        self.inner().suggest(trial)
    }

    fn first(&self) -> Value {
        self.inner().first()
    }
}

// ---------------------------------------------------------------------------
// Non-tunable
// ---------------------------------------------------------------------------

/// A setting recorded with every trial but never searched.
#[derive(Debug, Clone)]
pub struct NontunableParameter {
    name: String,
    value: Value,
}

impl NontunableParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Value {
        self.value.clone()
    }
}

impl PartialEq for NontunableParameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value.approx_eq(&other.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::FixedTrial;
    use ce_types::CeError;

    /// Records which oracle primitive was used.
    #[derive(Default)]
    struct SpyTrial {
        int_calls: Vec<(String, i64, i64, i64, bool)>,
        float_calls: Vec<(String, f64, f64, Option<f64>, bool)>,
        int_answer: i64,
    }

    impl Trial for SpyTrial {
        fn suggest_int(
            &mut self,
            key: &str,
            low: i64,
            high: i64,
            step: i64,
            log: bool,
        ) -> CeResult<i64> {
            self.int_calls.push((key.to_string(), low, high, step, log));
            Ok(self.int_answer)
        }

        fn suggest_float(
            &mut self,
            key: &str,
            low: f64,
            high: f64,
            step: Option<f64>,
            log: bool,
        ) -> CeResult<f64> {
            self.float_calls.push((key.to_string(), low, high, step, log));
            Ok(low)
        }
    }

    #[test]
    fn constant_ignores_oracle() {
        let param = ConstantParameter::new("x", 3i64, None);
        let mut trial = SpyTrial::default();
        assert_eq!(param.first(), Value::Int(3));
        assert_eq!(param.suggest(&mut trial).unwrap(), Value::Int(3));
        assert!(trial.int_calls.is_empty() && trial.float_calls.is_empty());
    }

    #[test]
    fn constant_equality_is_tolerant_but_name_sensitive() {
        let a = ConstantParameter::new("x", 0.1 + 0.2, None);
        let b = ConstantParameter::new("x", 0.3, None);
        let c = ConstantParameter::new("y", 0.3, None);
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn integer_range_routes_to_integer_oracle() {
        let bounds = RangeBounds::Int {
            min: 1,
            max: 9,
            step: None,
        };
        let param = RangeParameter::new("depth", bounds, false, Some("tree_depth")).unwrap();
        let mut trial = SpyTrial {
            int_answer: 4,
            ..Default::default()
        };

        assert_eq!(param.first(), Value::Int(1));
        assert_eq!(param.suggest(&mut trial).unwrap(), Value::Int(4));
        assert_eq!(trial.int_calls, vec![("tree_depth".to_string(), 1, 9, 1, false)]);
        assert!(trial.float_calls.is_empty());
    }

    #[test]
    fn real_range_routes_to_real_oracle_with_optional_step() {
        let bounds = RangeBounds::Float {
            min: 1e-4,
            max: 1e-1,
            step: None,
        };
        let param = RangeParameter::new("lr", bounds, true, None).unwrap();
        let mut trial = SpyTrial::default();

        assert_eq!(param.first(), Value::Float(1e-4));
        param.suggest(&mut trial).unwrap();
        assert!(trial.int_calls.is_empty());
        assert_eq!(trial.float_calls, vec![("lr".to_string(), 1e-4, 1e-1, None, true)]);
    }

    #[test]
    fn range_rejects_inverted_bounds_and_bad_log() {
        let inverted = RangeBounds::Int {
            min: 5,
            max: 1,
            step: None,
        };
        assert!(RangeParameter::new("x", inverted, false, None).is_err());

        let zero_log = RangeBounds::Float {
            min: 0.0,
            max: 1.0,
            step: None,
        };
        let err = RangeParameter::new("x", zero_log, true, None).unwrap_err();
        assert!(matches!(err, CeError::Schema(SchemaError::InvalidRange { .. })));
    }

    #[test]
    fn literal_resolves_by_index_and_rejects_out_of_range() {
        let param = LiteralParameter::new(
            "color",
            vec!["red".into(), "green".into(), "blue".into()],
            None,
        )
        .unwrap();
        assert_eq!(param.first(), Value::from("red"));

        for (index, expected) in ["red", "green", "blue"].iter().enumerate() {
            let mut trial = FixedTrial::default().with("color", index as i64);
            assert_eq!(param.suggest(&mut trial).unwrap(), Value::from(*expected));
        }

        for bad in [3i64, -1] {
            let mut trial = FixedTrial::default().with("color", bad);
            let err = param.suggest(&mut trial).unwrap_err();
            assert!(matches!(
                err,
                CeError::Resolution(ResolutionError::IndexOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn literal_queries_alias_not_name() {
        let param =
            LiteralParameter::new("size", vec![10i64.into(), 20i64.into(), 30i64.into()], Some("custom_alias"))
                .unwrap();
        let mut trial = SpyTrial {
            int_answer: 2,
            ..Default::default()
        };
        assert_eq!(param.suggest(&mut trial).unwrap(), Value::Int(30));
        assert_eq!(trial.int_calls, vec![("custom_alias".to_string(), 0, 2, 1, false)]);
    }

    #[test]
    fn empty_literal_is_rejected() {
        let err = LiteralParameter::new("empty", vec![], None).unwrap_err();
        assert!(matches!(err, CeError::Schema(SchemaError::EmptyCandidates { .. })));
    }

    #[test]
    fn multi_delegates_to_chosen_branch() {
        let small = Parameter::Range(
            RangeParameter::new(
                "units",
                RangeBounds::Int {
                    min: 8,
                    max: 32,
                    step: None,
                },
                false,
                Some("units.0"),
            )
            .unwrap(),
        );
        let fixed = Parameter::Constant(ConstantParameter::new("units", 512i64, Some("units.1")));
        let param = MultiParameter::new("units", vec![small, fixed], None).unwrap();

        assert_eq!(param.first(), Value::Int(8));

        let mut trial = FixedTrial::default().with("units", 0i64).with("units.0", 16i64);
        assert_eq!(param.suggest(&mut trial).unwrap(), Value::Int(16));

        let mut trial = FixedTrial::default().with("units", 1i64);
        assert_eq!(param.suggest(&mut trial).unwrap(), Value::Int(512));

        let mut trial = FixedTrial::default().with("units", 2i64);
        assert!(param.suggest(&mut trial).is_err());
    }

    #[test]
    fn nontunable_equality_uses_tolerance() {
        let a = NontunableParameter::new("ratio", 0.1 + 0.2);
        let b = NontunableParameter::new("ratio", 0.3);
        assert_eq!(a, b);
        assert_eq!(a.name(), "ratio");
        assert_ne!(a, NontunableParameter::new("other", 0.3));
    }

    #[test]
    fn parameter_enum_dispatches() {
        let param = Parameter::Constant(ConstantParameter::new("seed", 42i64, Some("s")));
        assert_eq!(param.name(), "seed");
        assert_eq!(param.alias(), "s");
        assert_eq!(param.first(), Value::Int(42));
        assert!(param.is_constant());
    }
}

//! # ce-params
//!
//! Parameter resolution for the configuration engine.
//!
//! Provides the trial oracle seam, tunable and non-tunable parameters, the
//! serializable schemas that build them, a registry for callable-set
//! parameters, and the `Configuration` container with its two resolution
//! modes (deterministic `construct` and oracle-driven `suggest`).

mod callable;
mod configuration;
mod parameter;
mod schema;
mod tagged;
mod trial;

pub use callable::{Callable, CallableFn, CallableKind, CallableRegistry};
pub use configuration::{
    first_values, nontunable_values, suggest_values, ConfigEntry, Configuration,
};
pub use parameter::{
    CallableParameter, ConstantParameter, LiteralParameter, MultiParameter,
    NontunableParameter, Parameter, RangeBounds, RangeParameter, TunableParameter,
};
pub use schema::{
    CallableParameterSchema, CallablePaths, LiteralParameterSchema, MultiParameterSchema,
    Number, ParameterSchema, ParameterSpec, RangeParameterSchema,
};
pub use tagged::{
    build_nontunable_record, build_tagged, build_tunable_record, FieldDecl, FieldKind,
    TaggedSchema,
};
pub use trial::{FixedTrial, ObjectiveDirection, RandomTrial, Trial};

//! The trial oracle seam and the oracles bundled with the engine.

use ce_types::{CeResult, ResolutionError, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-trial suggestion oracle.
///
/// An external optimizer answers "suggest a value for key K" queries through
/// this trait. Parameters always query by their alias.
pub trait Trial {
    /// Suggest an integer in `[low, high]` on a grid of `step`.
    fn suggest_int(&mut self, key: &str, low: i64, high: i64, step: i64, log: bool)
        -> CeResult<i64>;

    /// Suggest a real in `[low, high]`; `step` of `None` means continuous.
    fn suggest_float(
        &mut self,
        key: &str,
        low: f64,
        high: f64,
        step: Option<f64>,
        log: bool,
    ) -> CeResult<f64>;
}

/// Whether we are maximizing or minimizing the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveDirection {
    #[default]
    Maximize,
    Minimize,
}

impl std::str::FromStr for ObjectiveDirection {
    type Err = ce_types::CeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maximize" => Ok(Self::Maximize),
            "minimize" => Ok(Self::Minimize),
            other => Err(ce_types::config_error!(
                "Unknown optimization direction '{other}', expected maximize or minimize"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed trial
// ---------------------------------------------------------------------------

/// Oracle that answers from a preset `key -> value` map.
///
/// Used to replay a recorded trial and as the scripted oracle in tests.
#[derive(Debug, Clone, Default)]
pub struct FixedTrial {
    answers: BTreeMap<String, Value>,
    asked: Vec<String>,
}

impl FixedTrial {
    pub fn new(answers: BTreeMap<String, Value>) -> Self {
        Self {
            answers,
            asked: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.answers.insert(key.into(), value.into());
        self
    }

    /// Keys queried so far, in query order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    fn answer(&mut self, key: &str) -> CeResult<&Value> {
        self.asked.push(key.to_string());
        self.answers.get(key).ok_or_else(|| {
            ResolutionError::Oracle {
                key: key.to_string(),
                message: "no fixed answer for key".to_string(),
            }
            .into()
        })
    }
}

impl Trial for FixedTrial {
    fn suggest_int(
        &mut self,
        key: &str,
        _low: i64,
        _high: i64,
        _step: i64,
        _log: bool,
    ) -> CeResult<i64> {
        let value = self.answer(key)?;
        value.as_i64().ok_or_else(|| {
            ResolutionError::Oracle {
                key: key.to_string(),
                message: format!("fixed answer {value} is not an integer"),
            }
            .into()
        })
    }

    fn suggest_float(
        &mut self,
        key: &str,
        _low: f64,
        _high: f64,
        _step: Option<f64>,
        _log: bool,
    ) -> CeResult<f64> {
        let value = self.answer(key)?;
        value.as_f64().ok_or_else(|| {
            ResolutionError::Oracle {
                key: key.to_string(),
                message: format!("fixed answer {value} is not numeric"),
            }
            .into()
        })
    }
}

// ---------------------------------------------------------------------------
// Random trial
// ---------------------------------------------------------------------------

/// Seeded random oracle for smoke runs without an external optimizer.
///
/// Every suggestion is recorded so the sampled point can be logged or
/// replayed through a [`FixedTrial`].
#[derive(Debug, Clone)]
pub struct RandomTrial {
    rng: ChaCha8Rng,
    params: BTreeMap<String, Value>,
}

impl RandomTrial {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            params: BTreeMap::new(),
        }
    }

    /// Values suggested so far, keyed by alias.
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn into_fixed(self) -> FixedTrial {
        FixedTrial::new(self.params)
    }

    fn check_bounds<T: PartialOrd + std::fmt::Display>(key: &str, low: T, high: T) -> CeResult<()> {
        if low > high {
            return Err(ResolutionError::Oracle {
                key: key.to_string(),
                message: format!("low {low} is greater than high {high}"),
            }
            .into());
        }
        Ok(())
    }
}

impl Trial for RandomTrial {
    fn suggest_int(
        &mut self,
        key: &str,
        low: i64,
        high: i64,
        step: i64,
        log: bool,
    ) -> CeResult<i64> {
        Self::check_bounds(key, low, high)?;
        let value = if log && low > 0 {
            let log_val: f64 = self.rng.random_range((low as f64).ln()..=(high as f64).ln());
            (log_val.exp().round() as i64).clamp(low, high)
        } else {
            // i128 keeps the span of any two i64 bounds exact.
            let step = i128::from(step.max(1));
            let steps = (i128::from(high) - i128::from(low)) / step;
            let picked = i128::from(low) + self.rng.random_range(0..=steps) * step;
            i64::try_from(picked).map_err(|_| ResolutionError::Oracle {
                key: key.to_string(),
                message: format!("suggestion {picked} does not fit in i64"),
            })?
        };
        self.params.insert(key.to_string(), Value::Int(value));
        Ok(value)
    }

    fn suggest_float(
        &mut self,
        key: &str,
        low: f64,
        high: f64,
        step: Option<f64>,
        log: bool,
    ) -> CeResult<f64> {
        Self::check_bounds(key, low, high)?;
        let value = match step {
            Some(step) if step > 0.0 => {
                let steps = ((high - low) / step).floor() as i64;
                let k = self.rng.random_range(0..=steps);
                (low + k as f64 * step).min(high)
            }
            _ if log && low > 0.0 => {
                let log_val: f64 = self.rng.random_range(low.ln()..=high.ln());
                log_val.exp().clamp(low, high)
            }
            _ => self.rng.random_range(low..=high),
        };
        self.params.insert(key.to_string(), Value::Float(value));
        Ok(value)
    }
}

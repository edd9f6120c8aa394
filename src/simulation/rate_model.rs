//! Stochastic interest-rate path generators
//!
//! The simulator only sees the [`RatePathGenerator`] trait, so models can be
//! swapped without touching aggregation.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::{EngineError, Result};

/// Monthly time step, in years
pub const MONTH: f64 = 1.0 / 12.0;

/// Produces one path of annual mortgage rates, one per month
pub trait RatePathGenerator: Send + Sync {
    /// Draw the next path; `path[0]` is the rate for the first month
    fn next_path(&self, rng: &mut StdRng, months: usize) -> Vec<f64>;
}

/// Same rate every month, whatever the draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRate(pub f64);

impl RatePathGenerator for ConstantRate {
    fn next_path(&self, _rng: &mut StdRng, months: usize) -> Vec<f64> {
        vec![self.0; months]
    }
}

/// Discretised Vasicek process on monthly steps
///
/// `r[t+1] = r[t] + speed * (target - r[t]) * dt + volatility * sqrt(dt) * Z`,
/// floored at `floor`. A zero speed gives an arithmetic random walk.
#[derive(Debug, Clone)]
pub struct MeanRevertingRate {
    pub start: f64,
    pub target: f64,
    pub speed: f64,
    pub volatility: f64,
    pub floor: f64,
    shock: Normal,
}

impl MeanRevertingRate {
    pub fn new(start: f64, target: f64, speed: f64, volatility: f64, floor: f64) -> Result<Self> {
        for (field, value) in [("rate_model.volatility", volatility), ("rate_model.reversion_speed", speed)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::validation(field, format!("must be non-negative, got {}", value)));
            }
        }
        if !start.is_finite() || !target.is_finite() || !floor.is_finite() {
            return Err(EngineError::validation("rate_model", "rates must be finite"));
        }
        let shock = Normal::new(0.0, 1.0).map_err(|e| EngineError::Validation {
            field: "rate_model".into(),
            reason: format!("invalid shock distribution: {e}"),
        })?;
        Ok(Self {
            start,
            target,
            speed,
            volatility,
            floor,
            shock,
        })
    }

    pub fn random_walk(start: f64, volatility: f64, floor: f64) -> Result<Self> {
        Self::new(start, start, 0.0, volatility, floor)
    }
}

impl RatePathGenerator for MeanRevertingRate {
    fn next_path(&self, rng: &mut StdRng, months: usize) -> Vec<f64> {
        let diffusion = self.volatility * MONTH.sqrt();
        let mut path = Vec::with_capacity(months);
        let mut r = self.start.max(self.floor);
        for _ in 0..months {
            path.push(r);
            let z: f64 = rng.sample(&self.shock);
            r = (r + self.speed * (self.target - r) * MONTH + diffusion * z).max(self.floor);
        }
        path
    }
}

/// Which generator a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RateModelKind {
    #[default]
    MeanReverting,
    RandomWalk,
    Constant,
}

fn default_volatility() -> f64 {
    0.01
}

fn default_speed() -> f64 {
    0.15
}

/// Rate model parameters as supplied in a scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateModelConfig {
    #[serde(default)]
    pub kind: RateModelKind,

    /// Defaults to the contract rate of the first segment
    #[serde(default)]
    pub starting_rate: Option<f64>,

    /// Annualised standard deviation of rate changes
    #[serde(default = "default_volatility")]
    pub volatility: f64,

    #[serde(default = "default_speed")]
    pub reversion_speed: f64,

    /// Long-run level; defaults to the starting rate
    #[serde(default)]
    pub reversion_target: Option<f64>,

    #[serde(default)]
    pub min_rate: f64,
}

impl Default for RateModelConfig {
    fn default() -> Self {
        Self {
            kind: RateModelKind::MeanReverting,
            starting_rate: None,
            volatility: default_volatility(),
            reversion_speed: default_speed(),
            reversion_target: None,
            min_rate: 0.0,
        }
    }
}

impl RateModelConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(EngineError::validation(
                "rate_model.volatility",
                format!("must be non-negative, got {}", self.volatility),
            ));
        }
        if !self.reversion_speed.is_finite() || self.reversion_speed < 0.0 {
            return Err(EngineError::validation(
                "rate_model.reversion_speed",
                format!("must be non-negative, got {}", self.reversion_speed),
            ));
        }
        if let Some(r) = self.starting_rate {
            if !r.is_finite() || r < 0.0 {
                return Err(EngineError::validation("rate_model.starting_rate", "must be non-negative"));
            }
        }
        Ok(())
    }

    /// Build the generator, starting from `contract_rate` unless overridden
    pub fn build(&self, contract_rate: f64) -> Result<Box<dyn RatePathGenerator>> {
        self.validate()?;
        let start = self.starting_rate.unwrap_or(contract_rate);
        let model: Box<dyn RatePathGenerator> = match self.kind {
            RateModelKind::Constant => Box::new(ConstantRate(start)),
            RateModelKind::RandomWalk => Box::new(MeanRevertingRate::random_walk(start, self.volatility, self.min_rate)?),
            RateModelKind::MeanReverting => Box::new(MeanRevertingRate::new(
                start,
                self.reversion_target.unwrap_or(start),
                self.reversion_speed,
                self.volatility,
                self.min_rate,
            )?),
        };
        Ok(model)
    }
}

//! Performance threshold evaluation.
//!
//! Each metric carries its own threshold and comparison direction. Rules
//! are swapped atomically so a reload never blocks `evaluate`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ThresholdRule;

/// Issue code for greater-is-worse metrics above their threshold.
pub const THRESHOLD_EXCEEDED: &str = "THRESHOLD_EXCEEDED";

/// Issue code for lesser-is-worse metrics below their threshold.
pub const BELOW_THRESHOLD: &str = "BELOW_THRESHOLD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    GreaterIsWorse,
    LesserIsWorse,
}

/// A validated rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedRule {
    pub threshold: f64,
    pub direction: Direction,
}

impl ResolvedRule {
    /// Issue code if `value` breaches this rule. Equality is not a breach.
    pub fn check(&self, value: f64) -> Option<&'static str> {
        if !value.is_finite() {
            return None;
        }
        match self.direction {
            Direction::GreaterIsWorse if value > self.threshold => Some(THRESHOLD_EXCEEDED),
            Direction::LesserIsWorse if value < self.threshold => Some(BELOW_THRESHOLD),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdConfigurationError {
    #[error("metric `{metric}` has no threshold")]
    MissingThreshold { metric: String },

    #[error("metric `{metric}` has a non-finite threshold ({value})")]
    NonFiniteThreshold { metric: String, value: f64 },

    #[error("metric `{metric}` has no direction")]
    MissingDirection { metric: String },
}

impl ThresholdConfigurationError {
    pub fn metric(&self) -> &str {
        match self {
            Self::MissingThreshold { metric }
            | Self::NonFiniteThreshold { metric, .. }
            | Self::MissingDirection { metric } => metric,
        }
    }
}

fn resolve(metric: &str, rule: &ThresholdRule) -> Result<ResolvedRule, ThresholdConfigurationError> {
    let threshold = rule
        .threshold
        .ok_or_else(|| ThresholdConfigurationError::MissingThreshold {
            metric: metric.to_string(),
        })?;
    if !threshold.is_finite() {
        return Err(ThresholdConfigurationError::NonFiniteThreshold {
            metric: metric.to_string(),
            value: threshold,
        });
    }
    let direction = rule
        .direction
        .ok_or_else(|| ThresholdConfigurationError::MissingDirection {
            metric: metric.to_string(),
        })?;
    Ok(ResolvedRule {
        threshold,
        direction,
    })
}

/// Maps metric names to rules.
#[derive(Debug)]
pub struct ThresholdEvaluator {
    rules: ArcSwap<HashMap<String, ResolvedRule>>,
}

impl ThresholdEvaluator {
    /// Evaluator with no rules: nothing is ever flagged.
    pub fn new() -> Self {
        Self {
            rules: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Replace all rules.
    ///
    /// Invalid rules are left out (their metric stays unflagged) and
    /// reported once each in the returned list.
    pub fn configure(
        &self,
        mapping: &BTreeMap<String, ThresholdRule>,
    ) -> Vec<ThresholdConfigurationError> {
        let mut rules = HashMap::with_capacity(mapping.len());
        let mut errors = Vec::new();

        for (metric, rule) in mapping {
            match resolve(metric, rule) {
                Ok(resolved) => {
                    rules.insert(metric.clone(), resolved);
                }
                Err(err) => {
                    tracing::warn!(metric = %metric, error = %err, "Ignoring invalid threshold rule");
                    errors.push(err);
                }
            }
        }

        tracing::info!(
            rules = rules.len(),
            invalid = errors.len(),
            "Threshold rules configured"
        );
        self.rules.store(Arc::new(rules));
        errors
    }

    /// Issue code if `value` breaches the metric's rule. `None` for
    /// unconfigured metrics.
    pub fn evaluate(&self, metric_name: &str, value: f64) -> Option<&'static str> {
        self.rules.load().get(metric_name)?.check(value)
    }

    /// Threshold and issue for a metric, as persisted on performance
    /// records. The issue is only ever set together with the threshold.
    pub fn assess(&self, metric_name: &str, value: f64) -> (Option<f64>, Option<&'static str>) {
        match self.rules.load().get(metric_name) {
            Some(rule) => (Some(rule.threshold), rule.check(value)),
            None => (None, None),
        }
    }

    pub fn rule(&self, metric_name: &str) -> Option<ResolvedRule> {
        self.rules.load().get(metric_name).copied()
    }

    /// Snapshot of the active rules, sorted by metric name.
    pub fn rules(&self) -> BTreeMap<String, ResolvedRule> {
        self.rules
            .load()
            .iter()
            .map(|(name, rule)| (name.clone(), *rule))
            .collect()
    }
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

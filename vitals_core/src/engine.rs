//! Advisory engine: turns a snapshot into a ranked, bounded advisory list.
//!
//! Evaluation pipeline:
//! - Run every rule family in its fixed order, isolating failures and panics
//! - Keep at most one advisory per family
//! - Append a single fallback advisory if any family failed
//! - Stable sort by priority (ties keep family order)
//! - Truncate to the configured maximum

use crate::config::Config;
use crate::rules::{default_rules, RuleContext, RuleFn};
use crate::{Advisory, Error, HealthSnapshot, Priority, RuleFamily};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

/// Default number of advisories returned
pub const DEFAULT_MAX_ADVISORIES: usize = 6;

/// Id of the advisory emitted when one or more families fail
pub const FALLBACK_ID: &str = "engine_fallback";

/// Rule-based advisory engine
pub struct AdvisoryEngine {
    rules: Vec<(RuleFamily, RuleFn)>,
    ctx: RuleContext,
    max_advisories: usize,
}

impl Default for AdvisoryEngine {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            ctx: RuleContext::default(),
            max_advisories: DEFAULT_MAX_ADVISORIES,
        }
    }
}

impl AdvisoryEngine {
    /// Engine with the default rule families and thresholds from `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            rules: default_rules(),
            ctx: RuleContext {
                hydration: config.hydration.clone(),
                thresholds: config.thresholds.clone(),
            },
            max_advisories: config
                .delivery
                .max_advisories
                .clamp(1, DEFAULT_MAX_ADVISORIES),
        }
    }

    /// Engine with an explicit rule list (evaluated in the given order)
    pub fn with_rules(rules: Vec<(RuleFamily, RuleFn)>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn max_advisories(&self) -> usize {
        self.max_advisories
    }

    /// Evaluate all families against a snapshot
    pub fn evaluate(&self, snapshot: &HealthSnapshot) -> Vec<Advisory> {
        let mut advisories = Vec::with_capacity(self.rules.len() + 1);
        let mut seen = HashSet::new();
        let mut failures = 0usize;

        for (family, rule) in &self.rules {
            match run_rule(*family, *rule, snapshot, &self.ctx) {
                Ok(advisory) => {
                    if seen.insert(advisory.family) {
                        advisories.push(advisory);
                    } else {
                        tracing::warn!(
                            "Dropping duplicate advisory {} for family {:?}",
                            advisory.id,
                            advisory.family
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            advisories.push(fallback_advisory());
        }

        // Vec::sort_by_key is stable, so equal priorities keep family order
        advisories.sort_by_key(|a| a.priority.rank());
        advisories.truncate(self.max_advisories);

        tracing::debug!(
            "Evaluated {} advisories ({} family failures)",
            advisories.len(),
            failures
        );
        advisories
    }
}

/// Evaluate a snapshot with the default engine
pub fn evaluate(snapshot: &HealthSnapshot) -> Vec<Advisory> {
    AdvisoryEngine::default().evaluate(snapshot)
}

fn run_rule(
    family: RuleFamily,
    rule: RuleFn,
    snapshot: &HealthSnapshot,
    ctx: &RuleContext,
) -> crate::Result<Advisory> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule(snapshot, ctx)));
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(Error::RuleFailure { family, reason })
        }
    }
}

fn fallback_advisory() -> Advisory {
    Advisory::new(
        FALLBACK_ID,
        RuleFamily::Fallback,
        Priority::Medium,
        "⚠️",
        "Some insights couldn't be calculated right now. Check your logged data and try again.",
    )
}

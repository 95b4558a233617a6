//! Feature validation.
//!
//! Every optional feature names tables and columns in the web application's
//! database. [`FeatureValidator`] checks those bindings through a
//! [`QueryPort`] at load or reload and switches off features whose storage
//! is missing, along with the features that depend on them.
//!
//! Validation never enables a feature and never fails outright; the outcome
//! is a [`ValidationReport`] and the narrowed flags on the configuration.

mod checker;
mod steps;

pub use checker::Checker;
pub use steps::{STEPS, Step};

use crate::config::{BridgeConfig, FeatureFlags, Tracker};
use crate::storage::QueryPort;
use std::fmt;
use std::time::Instant;
use tracing::instrument;

/// Severity of a validation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something looks wrong but nothing was disabled because of it.
    Warning,
    /// A check failed or a feature was disabled.
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Severe => f.write_str("severe"),
        }
    }
}

/// One logged validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEntry {
    /// How serious it is.
    pub severity: Severity,
    /// What was found.
    pub message: String,
}

impl ValidationEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    passed: bool,
    entries: Vec<ValidationEntry>,
    before: FeatureFlags,
    after: FeatureFlags,
}

impl ValidationReport {
    /// Returns `true` if every hard check passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Every finding, in the order it was logged.
    #[must_use]
    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    /// Findings of one severity.
    pub fn entries_with(&self, severity: Severity) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(move |e| e.severity == severity)
    }

    /// Flags before validation.
    #[must_use]
    pub const fn flags_before(&self) -> FeatureFlags {
        self.before
    }

    /// Flags after validation.
    #[must_use]
    pub const fn flags_after(&self) -> FeatureFlags {
        self.after
    }

    /// Names of the features this pass switched off.
    #[must_use]
    pub fn disabled_features(&self) -> Vec<String> {
        disabled_features(self.before, self.after)
    }
}

/// Validates feature bindings and narrows the configuration's flags.
#[derive(Debug, Clone)]
pub struct FeatureValidator {
    steps: Vec<(&'static str, Step)>,
}

impl Default for FeatureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureValidator {
    /// Creates a validator running every step in order.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: STEPS.to_vec(),
        }
    }

    /// Runs every step against `port`, then settles and applies the
    /// resulting flags to `config`.
    #[instrument(skip(self, config, port), fields(operation = "validation.validate"))]
    pub fn validate(&self, config: &mut BridgeConfig, port: &dyn QueryPort) -> ValidationReport {
        let start = Instant::now();
        let before = config.flags();
        let mut checker = Checker::new(port);

        let mut flags = before;
        for (name, step) in &self.steps {
            let next = step(&mut checker, config, flags);
            if next != flags {
                tracing::debug!(step = %name, "Validation step narrowed feature flags");
            }
            flags = next;
        }
        let after = config.narrow(flags.settle());

        let (passed, entries) = checker.finish();
        let report = ValidationReport {
            passed,
            entries,
            before,
            after,
        };

        for feature in report.disabled_features() {
            metrics::counter!("features_disabled_total", "feature" => feature).increment(1);
        }
        let status = if passed { "passed" } else { "failed" };
        metrics::counter!("validation_runs_total", "status" => status).increment(1);
        metrics::histogram!("validation_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if passed {
            tracing::info!("Configuration validated");
        } else {
            tracing::warn!(
                severe = report.entries_with(Severity::Severe).count(),
                "Configuration has problems; affected features were disabled"
            );
        }
        report
    }
}

fn disabled_features(before: FeatureFlags, after: FeatureFlags) -> Vec<String> {
    let pairs = [
        ("avatar", before.avatar, after.avatar),
        ("require-avatar", before.require_avatar, after.require_avatar),
        ("post-count", before.post_count, after.post_count),
        (
            "require-minimum-posts",
            before.require_minimum_posts,
            after.require_minimum_posts,
        ),
        ("statistics", before.statistics, after.statistics),
        (
            "webapp-primary-group",
            before.webapp_primary_group,
            after.webapp_primary_group,
        ),
        (
            "webapp-secondary-group",
            before.webapp_secondary_group,
            after.webapp_secondary_group,
        ),
        (
            "simple-synchronization",
            before.simple_synchronization,
            after.simple_synchronization,
        ),
        (
            "ban-synchronization",
            before.ban_synchronization,
            after.ban_synchronization,
        ),
        ("economy", before.economy, after.economy),
    ];
    let mut out: Vec<String> = pairs
        .into_iter()
        .filter(|(_, was, is)| *was && !*is)
        .map(|(name, _, _)| name.to_string())
        .collect();
    for tracker in Tracker::ALL {
        if before.trackers.is_enabled(tracker) && !after.trackers.is_enabled(tracker) {
            out.push(format!("tracker:{tracker}"));
        } else if before.trackers.has_formatted(tracker) && !after.trackers.has_formatted(tracker)
        {
            out.push(format!("tracker:{tracker}:formatted"));
        }
    }
    out
}

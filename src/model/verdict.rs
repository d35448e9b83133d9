use serde::{Deserialize, Serialize};

/// Severity at or above which a classifier verdict counts as a violation.
pub const DEFAULT_SEVERITY_THRESHOLD: u8 = 3;

pub const MAX_SEVERITY: u8 = 5;

/// The gate's decision on a single input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintVerdict {
    pub violation: bool,
    pub severity: u8,
    pub reason: String,
    pub suggested_replacement: Option<String>,

    /// Produced under classifier failure or fallback.
    pub degraded: bool,
}

impl ConstraintVerdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            violation: false,
            severity: 0,
            reason: reason.into(),
            suggested_replacement: None,
            degraded: false,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            degraded: true,
            ..Self::allow(reason)
        }
    }

    pub fn signature_match() -> Self {
        Self {
            violation: true,
            severity: MAX_SEVERITY,
            reason: "deterministic signature match".into(),
            suggested_replacement: None,
            degraded: false,
        }
    }

    /// Applies the confidence floor: anything below `threshold` is allowed.
    pub fn floored(mut self, threshold: u8) -> Self {
        self.severity = self.severity.min(MAX_SEVERITY);
        if self.severity < threshold {
            self.violation = false;
        }
        self
    }
}

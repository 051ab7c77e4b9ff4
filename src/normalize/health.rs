//! Cluster health classification from alerts and the run's pass flag.

use serde_json::Value;
use std::fmt;

/// Three-valued cluster health for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthScore {
    Green,
    Yellow,
    Red,
}

impl HealthScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthScore::Green => "Green",
            HealthScore::Yellow => "Yellow",
            HealthScore::Red => "Red",
        }
    }
}

impl fmt::Display for HealthScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score a run: `Red` on any error-severity alert or a failed run, else
/// `Yellow` on any warning-severity alert, else `Green`.
pub fn score(alerts: &[Value], passed: bool) -> HealthScore {
    let mut has_error = false;
    let mut has_warning = false;
    for alert in alerts {
        match alert.get("severity").and_then(Value::as_str) {
            Some(severity) if severity.eq_ignore_ascii_case("error") => has_error = true,
            Some(severity) if severity.eq_ignore_ascii_case("warning") => has_warning = true,
            _ => {}
        }
    }
    if has_error || !passed {
        HealthScore::Red
    } else if has_warning {
        HealthScore::Yellow
    } else {
        HealthScore::Green
    }
}

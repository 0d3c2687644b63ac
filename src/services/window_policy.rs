//! Window policy evaluation.
//!
//! Decides from configuration alone whether a check cycle may run at a
//! given local wall time. No I/O and no clock access happen here.

use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::CheckCycleConfig;

/// Why a cycle is or is not eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasonCode {
    Eligible,
    InactiveDay,
    OutsideActiveHours,
    QuietHours,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Eligible => "eligible",
            ReasonCode::InactiveDay => "inactiveDay",
            ReasonCode::OutsideActiveHours => "outsideActiveHours",
            ReasonCode::QuietHours => "quietHours",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a window policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: ReasonCode,
}

impl Eligibility {
    fn denied(reason: ReasonCode) -> Self {
        Self {
            eligible: false,
            reason,
        }
    }
}

/// Evaluates the window policy at local wall time `now`.
///
/// Eligible iff the weekday is active, the time of day falls inside active
/// hours, and it does not fall inside quiet hours. Either range may wrap
/// midnight. Checks run in that order and the first failing one is
/// reported.
pub fn is_eligible(config: &CheckCycleConfig, now: NaiveDateTime) -> Eligibility {
    if !config.active_days.contains(&now.weekday()) {
        return Eligibility::denied(ReasonCode::InactiveDay);
    }

    let time = now.time();
    if !config.active_hours.contains(time) {
        return Eligibility::denied(ReasonCode::OutsideActiveHours);
    }

    if config
        .quiet_hours
        .is_some_and(|quiet| quiet.contains(time))
    {
        return Eligibility::denied(ReasonCode::QuietHours);
    }

    Eligibility {
        eligible: true,
        reason: ReasonCode::Eligible,
    }
}

//! Value types produced by the priority engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest possible score (no rule fired).
pub const BASE_SCORE: u8 = 1;

/// Hard cap applied after all rules have been summed.
pub const MAX_SCORE: u8 = 10;

/// Scores at or above this are [`PriorityTier::High`].
pub const HIGH_THRESHOLD: u8 = 8;

/// Scores at or above this (and below [`HIGH_THRESHOLD`]) are [`PriorityTier::Medium`].
pub const MEDIUM_THRESHOLD: u8 = 4;

/// Separator used when joining reason lines for display and storage.
pub const REASON_SEPARATOR: &str = "; ";

/// Coarse priority bucket assigned to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    /// Map a final (already capped) score to its tier.
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Canonical uppercase name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown tier name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority tier: {0}")]
pub struct ParseTierError(pub String);

impl FromStr for PriorityTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

/// Result of scoring one message.
///
/// Produced fresh per call and never mutated afterwards. The caller copies
/// `tier`, `score` and [`reason()`](Self::reason) onto the stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEvaluation {
    pub tier: PriorityTier,
    /// Always within `1..=10`.
    pub score: u8,
    /// One line per rule that fired, in evaluation order.
    pub reasons: Vec<String>,
}

impl PriorityEvaluation {
    /// Reason lines joined for display. Empty when no rule fired.
    pub fn reason(&self) -> String {
        self.reasons.join(REASON_SEPARATOR)
    }
}

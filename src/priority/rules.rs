//! Keyword rule tables and the scoring pass over them.
//!
//! Matching is plain case-insensitive substring containment: the message is
//! lower-cased once and every table entry (already lowercase) is checked with
//! `str::contains`. No tokenisation, no regex.

use tracing::debug;

use super::types::{BASE_SCORE, MAX_SCORE, PriorityEvaluation, PriorityTier};

/// Failed financial / process outcomes. Every match adds its own points.
pub const HIGH_URGENCY_PHRASES: &[&str] = &[
    "money not received",
    "loan disbursement",
    "disbursement failed",
    "payment failed",
    "loan rejected",
    "account blocked",
    "blocked",
];

/// Status and process inquiries. First match only.
pub const MEDIUM_INTENT_PHRASES: &[&str] = &[
    "status",
    "update",
    "applied",
    "application",
    "review",
    "processing",
    "approval",
    "approved",
    "disbursement date",
    "when will",
    "how long",
];

/// Repeated follow-ups and dissatisfaction. First match only.
pub const FRUSTRATION_PHRASES: &[&str] = &[
    "still",
    "again",
    "not satisfied",
    "no response",
    "waiting",
    "delay",
    "why",
];

/// Customer explicitly asked for speed. Contributes once no matter how many match.
pub const EXPLICIT_URGENCY_MARKERS: &[&str] = &["urgent", "asap"];

const BLOCKER_POINTS: u32 = 3;
const EXPLICIT_URGENCY_POINTS: u32 = 3;
const INTENT_POINTS: u32 = 2;
const FRICTION_POINTS: u32 = 1;
const QUESTION_POINTS: u32 = 1;

/// The ordered phrase tables a [`PriorityEvaluator`] scans.
///
/// Entries must be lowercase. Order matters for the first-match categories:
/// it decides which phrase is named in the reason line.
#[derive(Debug, Clone, Copy)]
pub struct RuleTables {
    pub high_urgency: &'static [&'static str],
    pub medium_intent: &'static [&'static str],
    pub frustration: &'static [&'static str],
    pub explicit_urgency: &'static [&'static str],
}

impl RuleTables {
    /// The built-in support-inbox tables.
    pub const DEFAULT: Self = Self {
        high_urgency: HIGH_URGENCY_PHRASES,
        medium_intent: MEDIUM_INTENT_PHRASES,
        frustration: FRUSTRATION_PHRASES,
        explicit_urgency: EXPLICIT_URGENCY_MARKERS,
    };
}

impl Default for RuleTables {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Deterministic keyword scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityEvaluator {
    tables: RuleTables,
}

static DEFAULT_EVALUATOR: PriorityEvaluator = PriorityEvaluator::new(RuleTables::DEFAULT);

/// Score `content` with the built-in tables.
///
/// Total over every input, including the empty string.
pub fn evaluate(content: &str) -> PriorityEvaluation {
    DEFAULT_EVALUATOR.evaluate(content)
}

impl PriorityEvaluator {
    pub const fn new(tables: RuleTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RuleTables {
        &self.tables
    }

    /// Score a message body.
    pub fn evaluate(&self, content: &str) -> PriorityEvaluation {
        let text = content.to_lowercase();
        let mut score = u32::from(BASE_SCORE);
        let mut reasons = Vec::new();

        // Blockers compound: no early exit.
        for phrase in self.tables.high_urgency {
            if text.contains(phrase) {
                score = score.saturating_add(BLOCKER_POINTS);
                reasons.push(format!("Blocker detected: \"{phrase}\""));
            }
        }

        if self
            .tables
            .explicit_urgency
            .iter()
            .any(|marker| text.contains(marker))
        {
            score = score.saturating_add(EXPLICIT_URGENCY_POINTS);
            reasons.push("Explicit urgency requested".to_string());
        }

        if let Some(phrase) = first_match(&text, self.tables.medium_intent) {
            score = score.saturating_add(INTENT_POINTS);
            reasons.push(format!("Status / intent detected: \"{phrase}\""));
        }

        if let Some(phrase) = first_match(&text, self.tables.frustration) {
            score = score.saturating_add(FRICTION_POINTS);
            reasons.push(format!("Friction signal detected: \"{phrase}\""));
        }

        if text.contains('?') {
            score = score.saturating_add(QUESTION_POINTS);
            reasons.push("Direct question asked".to_string());
        }

        let raw_score = score;
        let score = score.min(u32::from(MAX_SCORE)) as u8;
        let tier = PriorityTier::from_score(score);

        debug!(
            raw_score,
            score,
            tier = %tier,
            rules_fired = reasons.len(),
            "Message scored"
        );

        PriorityEvaluation {
            tier,
            score,
            reasons,
        }
    }
}

fn first_match<'a>(text: &str, phrases: &'a [&'a str]) -> Option<&'a str> {
    phrases.iter().copied().find(|phrase| text.contains(phrase))
}

//! Priority scoring engine.
//!
//! Every message that enters the inbox (customer-authored or agent-authored)
//! is scored once at creation time:
//! 1. Blocker phrases: +3 each, every match counts
//! 2. Explicit urgency ("urgent" / "asap"): +3 once
//! 3. Status / intent phrases: +2 for the first match only
//! 4. Friction phrases: +1 for the first match only
//! 5. Question mark: +1
//!
//! The score is capped at 10 and bucketed into a [`PriorityTier`].
//! Scoring is pure: no state, no I/O, no failure modes.

pub mod rules;
pub mod types;

pub use rules::{PriorityEvaluator, RuleTables, evaluate};
pub use types::{PriorityEvaluation, PriorityTier};

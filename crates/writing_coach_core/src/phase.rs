//! crates/writing_coach_core/src/phase.rs
//!
//! The phase-progression state machine. The completion service is instructed to
//! end a reply with `[PHASE_COMPLETE:<phase>]` once the current phase is done;
//! detecting that marker is a plain substring check.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::Phase;

pub const COMPLETION_SENTINEL: &str = "PHASE_COMPLETE";

static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\[PHASE_COMPLETE(?::[A-Za-z_]+)?\]")
        .expect("marker pattern is a valid regex")
});

/// The fixed transition table. `Growth` loops onto itself.
pub fn next_phase(phase: Phase) -> Phase {
    match phase {
        Phase::Facts => Phase::Feelings,
        Phase::Feelings => Phase::Associations,
        Phase::Associations => Phase::Growth,
        Phase::Growth => Phase::Growth,
    }
}

/// The marker that closes `phase`, e.g. `[PHASE_COMPLETE:facts]`.
pub fn completion_marker(phase: Phase) -> String {
    format!("[{}:{}]", COMPLETION_SENTINEL, phase.as_str())
}

/// Removes every marker-shaped token and trims the surrounding whitespace.
pub fn strip_markers(text: &str) -> String {
    MARKER_PATTERN.replace_all(text, "").trim().to_string()
}

/// What the state machine decided for one assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub advanced: bool,
    /// The reply with markers removed, plus the transition announcement on advance.
    pub text: String,
}

/// Inspects an assistant reply for the current phase's completion marker and
/// returns the phase the event should be in afterwards.
///
/// A marker seen while already in the terminal phase is a no-op.
pub fn advance_if_complete(response: &str, current: Phase) -> PhaseOutcome {
    let cleaned = strip_markers(response);
    let marked = response.contains(&completion_marker(current));

    if !marked || current.is_terminal() {
        return PhaseOutcome {
            phase: current,
            advanced: false,
            text: cleaned,
        };
    }

    let next = next_phase(current);
    PhaseOutcome {
        phase: next,
        advanced: true,
        text: format!("{}{}", cleaned, transition_announcement(current, next)),
    }
}

fn transition_announcement(from: Phase, to: Phase) -> String {
    format!(
        "\n\nYou've completed the {} phase. Next, we'll move on to {}.",
        from.label(),
        to.description()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_exact() {
        let expected = [
            (Phase::Facts, Phase::Feelings),
            (Phase::Feelings, Phase::Associations),
            (Phase::Associations, Phase::Growth),
            (Phase::Growth, Phase::Growth),
        ];
        for (from, to) in expected {
            assert_eq!(next_phase(from), to, "transition from {from}");
        }
    }

    #[test]
    fn transitions_never_go_backwards_or_skip() {
        for phase in Phase::ALL {
            let next = next_phase(phase);
            assert!(next >= phase);
            let skipped = Phase::ALL.iter().filter(|p| **p > phase && **p < next).count();
            assert_eq!(skipped, 0);
        }
    }

    #[test]
    fn marker_for_current_phase_advances_and_is_stripped() {
        let outcome = advance_if_complete(
            "Thank you for laying that out so clearly. [PHASE_COMPLETE:facts]",
            Phase::Facts,
        );
        assert!(outcome.advanced);
        assert_eq!(outcome.phase, Phase::Feelings);
        assert!(!outcome.text.contains("PHASE_COMPLETE"));
        assert!(outcome
            .text
            .starts_with("Thank you for laying that out so clearly."));
        assert!(outcome.text.contains("Emotional Response"));
    }

    #[test]
    fn marker_for_another_phase_does_not_advance() {
        let outcome = advance_if_complete("Good. [PHASE_COMPLETE:feelings]", Phase::Facts);
        assert!(!outcome.advanced);
        assert_eq!(outcome.phase, Phase::Facts);
        assert_eq!(outcome.text, "Good.");
    }

    #[test]
    fn reply_without_marker_is_left_alone() {
        let outcome = advance_if_complete("  What happened next?  ", Phase::Feelings);
        assert_eq!(
            outcome,
            PhaseOutcome {
                phase: Phase::Feelings,
                advanced: false,
                text: "What happened next?".to_string(),
            }
        );
    }

    #[test]
    fn terminal_phase_with_marker_stays_terminal() {
        let outcome = advance_if_complete("Well done. [PHASE_COMPLETE:growth]", Phase::Growth);
        assert!(!outcome.advanced);
        assert_eq!(outcome.phase, Phase::Growth);
        assert_eq!(outcome.text, "Well done.");
    }

    #[test]
    fn every_phase_advances_on_its_own_marker_only() {
        for phase in Phase::ALL {
            let reply = format!("ok {}", completion_marker(phase));
            let outcome = advance_if_complete(&reply, phase);
            assert_eq!(outcome.phase, next_phase(phase));
            assert_eq!(outcome.advanced, !phase.is_terminal());
        }
    }

    #[test]
    fn bare_sentinel_is_stripped() {
        assert_eq!(strip_markers("Done [PHASE_COMPLETE]\n"), "Done");
    }
}

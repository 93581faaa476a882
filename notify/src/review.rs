//! Review-loop phase notifications (spec.md §4.I): thread-reply text posted on each phase
//! transition. These are plain posts, not interactive attachments — review-loop phases are
//! driven entirely by external webhook signals, not by chat actions.

use store::{ReviewLoop, ReviewPhase};

pub fn phase_message(loop_: &ReviewLoop) -> String {
    match loop_.phase {
        ReviewPhase::RequestingReview => format!("Requesting review for {}", loop_.pr_url),
        ReviewPhase::AwaitingReview => format!("Awaiting review for {} (iteration {})", loop_.pr_url, loop_.iteration),
        ReviewPhase::CursorFixing => format!("Review feedback dispatched; agent is addressing it (iteration {})", loop_.iteration),
        ReviewPhase::Approved => format!("Review approved for {}", loop_.pr_url),
        ReviewPhase::HumanReview => format!("Awaiting human review for {}", loop_.pr_url),
        ReviewPhase::Complete => format!(":rocket: {} is complete", loop_.pr_url),
        ReviewPhase::MaxIterations => format!(":warning: {} hit the maximum of {} review iterations", loop_.pr_url, loop_.iteration),
        ReviewPhase::Failed => format!(":x: Review loop for {} failed; manual intervention required", loop_.pr_url),
    }
}

/// Reaction emoji matching the review-loop phase transitions in spec.md §4.I.
pub fn reaction_for_phase(phase: ReviewPhase) -> Option<&'static str> {
    match phase {
        ReviewPhase::AwaitingReview => Some("eyes"),
        ReviewPhase::Approved => Some("white_check_mark"),
        ReviewPhase::Complete => Some("rocket"),
        ReviewPhase::MaxIterations => Some("warning"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_phase_message_mentions_pr_url() {
        let mut rl = ReviewLoop::new("a1", None, "u1", "c1", "r1", "t1", "https://x/pull/1", 1, "o", "r");
        rl.phase = ReviewPhase::Complete;
        assert!(phase_message(&rl).contains("https://x/pull/1"));
    }

    #[test]
    fn max_iterations_reaction_is_warning() {
        assert_eq!(reaction_for_phase(ReviewPhase::MaxIterations), Some("warning"));
    }
}

//! Vote tally engine
//!
//! Applies at most one counted vote per participant per open poll. Every
//! rejection is a silent outcome rather than an error: votes race with
//! identification, poll changes and disconnects, and none of those races
//! should reach the voter.
//!
//! Votes for an option the poll does not offer are dropped unless
//! `PollPolicy::accept_unknown_options` is set, in which case the value is
//! counted under its own tally key. A dropped vote leaves the participant
//! free to vote again.

use lp_core::PollPolicy;
use lp_protocol::{ConnectionId, PollId};

use crate::directory::ParticipantDirectory;
use crate::session::PollState;

/// What happened to a submitted vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was counted
    Counted {
        poll_id: PollId,
        option: String,
        count: u32,
        /// A placeholder participant was created for the voter
        synthesized: bool,
    },
    /// No poll exists or the current one is closed
    NoOpenPoll,
    /// The vote named a different poll and strict checking is on
    PollMismatch { current: PollId, submitted: PollId },
    /// The voter already has a counted vote in this poll
    AlreadyAnswered,
    /// The option is not part of the current poll
    UnknownOption,
}

impl VoteOutcome {
    /// Whether the tally changed
    pub fn is_counted(&self) -> bool {
        matches!(self, VoteOutcome::Counted { .. })
    }
}

/// Applies votes against the current poll
#[derive(Debug, Clone, Default)]
pub struct TallyEngine {
    strict_poll_id: bool,
    accept_unknown_options: bool,
}

impl TallyEngine {
    /// Create an engine following the given policy
    pub fn new(policy: &PollPolicy) -> Self {
        Self {
            strict_poll_id: policy.strict_poll_id,
            accept_unknown_options: policy.accept_unknown_options,
        }
    }

    /// Cast one vote from `voter` for `option_value`.
    ///
    /// Checks, in order: an open poll exists; the submitted poll ID matches
    /// (enforced only in strict mode); the voter has a participant record,
    /// synthesizing one if needed; the voter has not answered; the option
    /// belongs to the poll, unless unknown options are accepted.
    pub fn cast_vote(
        &self,
        directory: &mut ParticipantDirectory,
        polls: &mut PollState,
        voter: &ConnectionId,
        poll_id: Option<PollId>,
        option_value: &str,
    ) -> VoteOutcome {
        let Some(session) = polls.open_session_mut() else {
            return VoteOutcome::NoOpenPoll;
        };

        if let Some(submitted) = poll_id {
            if submitted != session.id() {
                tracing::warn!(
                    "Vote from {} names {} but current poll is {}",
                    voter,
                    submitted,
                    session.id()
                );
                if self.strict_poll_id {
                    return VoteOutcome::PollMismatch {
                        current: session.id(),
                        submitted,
                    };
                }
            }
        }

        let (participant, synthesized) = directory.get_or_synthesize(voter);
        if synthesized {
            tracing::warn!(
                "Connection {} voted before identifying, registered as {}",
                voter,
                participant.display_name
            );
        }

        if participant.has_answered {
            return VoteOutcome::AlreadyAnswered;
        }

        if !session.has_option(option_value) {
            if !self.accept_unknown_options {
                return VoteOutcome::UnknownOption;
            }
            tracing::warn!(
                "Counting {:?} from {} though {} does not offer it",
                option_value,
                voter,
                session.id()
            );
        }

        let count = session.record_vote(option_value);
        participant.has_answered = true;

        tracing::info!(
            "Vote counted from {} for {:?} in {} (now {})",
            participant.display_name,
            option_value,
            session.id(),
            count
        );

        VoteOutcome::Counted {
            poll_id: session.id(),
            option: option_value.to_string(),
            count,
            synthesized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PollDraft;
    use lp_protocol::{CreatePollPayload, Role};

    fn open_poll(polls: &mut PollState, options: &[&str]) -> PollId {
        let payload = CreatePollPayload {
            question: "Color?".to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
        };
        let draft = PollDraft::parse(&payload, None).unwrap();
        polls.start(draft).0.id()
    }

    fn id(s: &str) -> ConnectionId {
        ConnectionId::new(s)
    }

    #[test]
    fn test_vote_without_poll_is_ignored() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Red");
        assert_eq!(outcome, VoteOutcome::NoOpenPoll);
        // No participant synthesized for a vote that could not count
        assert!(directory.is_empty());
    }

    #[test]
    fn test_vote_after_close_is_ignored() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        open_poll(&mut polls, &["Red", "Blue"]);
        polls.close();

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Red");
        assert_eq!(outcome, VoteOutcome::NoOpenPoll);
        assert!(polls.current().unwrap().tally().is_empty());
    }

    #[test]
    fn test_at_most_one_vote_per_participant() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        open_poll(&mut polls, &["Red", "Blue"]);
        directory.identify(&id("a"), Role::Respondent, "A");

        assert!(engine
            .cast_vote(&mut directory, &mut polls, &id("a"), None, "Red")
            .is_counted());
        for option in ["Red", "Blue", "Red"] {
            let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, option);
            assert_eq!(outcome, VoteOutcome::AlreadyAnswered);
        }

        assert_eq!(polls.current().unwrap().total_votes(), 1);
    }

    #[test]
    fn test_vote_before_identify_synthesizes_participant() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        let poll_id = open_poll(&mut polls, &["Red", "Blue"]);

        let outcome =
            engine.cast_vote(&mut directory, &mut polls, &id("early123"), Some(poll_id), "Blue");

        assert_eq!(
            outcome,
            VoteOutcome::Counted {
                poll_id,
                option: "Blue".to_string(),
                count: 1,
                synthesized: true,
            }
        );
        let participant = directory.get(&id("early123")).unwrap();
        assert_eq!(participant.display_name, "Anonymous_earl");
        assert!(participant.has_answered);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_unknown_option_does_not_consume_vote() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        open_poll(&mut polls, &["Red", "Blue"]);

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Green");
        assert_eq!(outcome, VoteOutcome::UnknownOption);
        assert!(polls.current().unwrap().tally().is_empty());

        assert!(engine
            .cast_vote(&mut directory, &mut polls, &id("a"), None, "Red")
            .is_counted());
    }

    #[test]
    fn test_unknown_option_counted_when_accepted() {
        let engine = TallyEngine::new(&PollPolicy {
            accept_unknown_options: true,
            ..PollPolicy::default()
        });
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        open_poll(&mut polls, &["Red", "Blue"]);

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Green");
        assert!(outcome.is_counted());
        assert_eq!(polls.current().unwrap().tally().get("Green"), Some(&1));

        // Still one vote per participant
        let again = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Red");
        assert_eq!(again, VoteOutcome::AlreadyAnswered);
        assert_eq!(polls.current().unwrap().total_votes(), 1);
    }

    #[test]
    fn test_lenient_poll_id_mismatch_still_counts() {
        let engine = TallyEngine::new(&PollPolicy::default());
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        let poll_id = open_poll(&mut polls, &["Red", "Blue"]);
        let stale = PollId::new(poll_id.as_u64() - 1);

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), Some(stale), "Red");
        assert!(outcome.is_counted());
    }

    #[test]
    fn test_strict_poll_id_mismatch_is_rejected() {
        let policy = PollPolicy {
            strict_poll_id: true,
            ..PollPolicy::default()
        };
        let engine = TallyEngine::new(&policy);
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        let poll_id = open_poll(&mut polls, &["Red", "Blue"]);
        let stale = PollId::new(poll_id.as_u64() - 1);

        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), Some(stale), "Red");
        assert_eq!(
            outcome,
            VoteOutcome::PollMismatch {
                current: poll_id,
                submitted: stale,
            }
        );
        assert!(polls.current().unwrap().tally().is_empty());

        // Matching ID and a missing ID are both accepted
        assert!(engine
            .cast_vote(&mut directory, &mut polls, &id("a"), Some(poll_id), "Red")
            .is_counted());
        assert!(engine
            .cast_vote(&mut directory, &mut polls, &id("b"), None, "Blue")
            .is_counted());
    }

    #[test]
    fn test_color_scenario() {
        let engine = TallyEngine::default();
        let mut directory = ParticipantDirectory::new();
        let mut polls = PollState::new();
        open_poll(&mut polls, &["Red", "Blue"]);

        engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Red");
        engine.cast_vote(&mut directory, &mut polls, &id("b"), None, "Blue");
        let outcome = engine.cast_vote(&mut directory, &mut polls, &id("a"), None, "Blue");
        assert_eq!(outcome, VoteOutcome::AlreadyAnswered);

        let tally = polls.current().unwrap().tally();
        assert_eq!(tally.get("Red"), Some(&1));
        assert_eq!(tally.get("Blue"), Some(&1));
        assert_eq!(tally.len(), 2);
    }
}

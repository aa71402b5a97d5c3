//! Poll session state
//!
//! Holds the single current poll and its lifecycle:
//!
//! ```text
//! NoSession -> Open -> Closed
//!                ^        |
//!                +--------+  (create_poll supersedes with a new session)
//! ```
//!
//! A closed session is never reopened. Creating a poll always builds a new
//! session record and discards the previous one, open or closed.

use std::collections::HashSet;

use lp_core::time::current_time_millis;
use lp_core::CommandError;
use lp_protocol::{CreatePollPayload, PollId, PollView, Tally};

/// A validated `create_poll` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    question: String,
    options: Vec<String>,
}

impl PollDraft {
    /// Validate a `create_poll` payload.
    ///
    /// The question and options are trimmed, blank options dropped, and
    /// duplicate options collapsed to their first occurrence. `max_options`
    /// caps the usable options only when set.
    pub fn parse(
        payload: &CreatePollPayload,
        max_options: Option<usize>,
    ) -> Result<Self, CommandError> {
        let question = payload.question.trim();
        if question.is_empty() {
            return Err(CommandError::EmptyQuestion);
        }

        let mut seen = HashSet::new();
        let options: Vec<String> = payload
            .options
            .iter()
            .map(|option| option.trim())
            .filter(|option| !option.is_empty())
            .filter(|option| seen.insert(*option))
            .map(str::to_string)
            .collect();

        if options.len() < 2 {
            return Err(CommandError::TooFewOptions(options.len()));
        }
        if let Some(max) = max_options.filter(|max| options.len() > *max) {
            return Err(CommandError::TooManyOptions {
                got: options.len(),
                max,
            });
        }

        Ok(Self {
            question: question.to_string(),
            options,
        })
    }

    /// Trimmed question
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Usable options in submission order
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// The current poll and its tally
#[derive(Debug, Clone)]
pub struct PollSession {
    id: PollId,
    question: String,
    options: Vec<String>,
    is_open: bool,
    tally: Tally,
    created_at: u64,
}

impl PollSession {
    fn new(id: PollId, draft: PollDraft) -> Self {
        Self {
            id,
            question: draft.question,
            options: draft.options,
            is_open: true,
            tally: Tally::new(),
            created_at: current_time_millis(),
        }
    }

    /// Poll identifier
    pub fn id(&self) -> PollId {
        self.id
    }

    /// Question text
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Options in the order the presenter gave them
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Whether votes are still accepted
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Vote counts; options without votes have no entry
    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Creation time in Unix milliseconds
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Whether `value` names one of this poll's options
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|option| option == value)
    }

    /// Total counted votes
    pub fn total_votes(&self) -> u32 {
        self.tally.values().sum()
    }

    /// Client-visible view of this poll
    pub fn view(&self) -> PollView {
        PollView {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            is_open: self.is_open,
        }
    }

    /// Add one vote for `option`, returning its new count
    pub(crate) fn record_vote(&mut self, option: &str) -> u32 {
        let count = self.tally.entry(option.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Lifecycle phase of the current poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// No poll has been created yet
    NoSession,
    /// Current poll accepts votes
    Open,
    /// Current poll was closed and awaits a successor
    Closed,
}

/// Holder of the current poll session
#[derive(Debug, Default)]
pub struct PollState {
    current: Option<PollSession>,
    last_id: u64,
}

impl PollState {
    /// Create state with no session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session, open or closed
    pub fn current(&self) -> Option<&PollSession> {
        self.current.as_ref()
    }

    /// Current session only if it is open
    pub fn open_session(&self) -> Option<&PollSession> {
        self.current.as_ref().filter(|session| session.is_open)
    }

    pub(crate) fn open_session_mut(&mut self) -> Option<&mut PollSession> {
        self.current.as_mut().filter(|session| session.is_open)
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> PollPhase {
        match &self.current {
            None => PollPhase::NoSession,
            Some(session) if session.is_open => PollPhase::Open,
            Some(_) => PollPhase::Closed,
        }
    }

    /// Start a new open session, superseding the current one.
    ///
    /// Returns the new session and the one it replaced, if any.
    pub fn start(&mut self, draft: PollDraft) -> (&PollSession, Option<PollSession>) {
        let id = self.next_id();
        let previous = self.current.take();
        let session = self.current.insert(PollSession::new(id, draft));
        (&*session, previous)
    }

    /// Close the current session.
    ///
    /// Returns the closed session, or `None` if there was no open session.
    pub fn close(&mut self) -> Option<&PollSession> {
        let session = self.open_session_mut()?;
        session.is_open = false;
        Some(&*session)
    }

    /// Time-derived ID, strictly increasing for the life of the process
    fn next_id(&mut self) -> PollId {
        let id = current_time_millis().max(self.last_id + 1);
        self.last_id = id;
        PollId::new(id)
    }
}

//! Named events exchanged between poll clients and the coordinator
//!
//! Every event travels as a single JSON object of the form
//! `{"event": "<name>", "data": <payload>}`. Events without a payload omit
//! the `data` field entirely.
//!
//! # Event Flow
//!
//! 1. Client connects, server sends `welcome` with the assigned connection ID
//! 2. Client sends `identify` with its role and display name
//! 3. If a poll is open, server replies with `session_snapshot` (and, for a
//!    presenter, a `tally_update`)
//! 4. Presenter sends `create_poll`, server broadcasts `poll_started`
//! 5. Respondents send `submit_vote`, server broadcasts `tally_update`
//! 6. Presenter sends `close_poll`, server broadcasts `poll_ended`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::{ConnectionId, PollId};

/// Vote counts keyed by option value
pub type Tally = BTreeMap<String, u32>;

/// Participant role within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates and closes polls, watches the tally
    #[serde(alias = "teacher")]
    Presenter,
    /// Casts votes
    #[serde(alias = "student")]
    Respondent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Presenter => write!(f, "presenter"),
            Role::Respondent => write!(f, "respondent"),
        }
    }
}

/// Event sent from a client to the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Declare role and display name for this connection
    Identify(IdentifyPayload),

    /// Start a new poll, superseding any current one
    CreatePoll(CreatePollPayload),

    /// Cast a vote in the current poll
    SubmitVote(SubmitVotePayload),

    /// Close the current poll
    ClosePoll,
}

impl ClientEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Identify(_) => "identify",
            ClientEvent::CreatePoll(_) => "create_poll",
            ClientEvent::SubmitVote(_) => "submit_vote",
            ClientEvent::ClosePoll => "close_poll",
        }
    }
}

/// Payload of `identify`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub role: Role,
    #[serde(default, alias = "name")]
    pub display_name: String,
}

/// Payload of `create_poll`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollPayload {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Payload of `submit_vote`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVotePayload {
    /// Poll the client believes it is voting in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_id: Option<PollId>,
    /// Connection ID the client believes it has
    #[serde(default, alias = "voterId", skip_serializing_if = "Option::is_none")]
    pub voter_connection_id: Option<ConnectionId>,
    #[serde(alias = "votedOption")]
    pub option_value: String,
}

/// Event pushed from the coordinator to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Greeting carrying the connection's assigned ID
    Welcome(WelcomePayload),

    /// Current poll, sent to a single late-joining connection
    SessionSnapshot(PollView),

    /// A new poll has started
    PollStarted(PollView),

    /// Full tally of the current poll
    TallyUpdate(Tally),

    /// The current poll was closed
    PollEnded,
}

impl ServerEvent {
    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome(_) => "welcome",
            ServerEvent::SessionSnapshot(_) => "session_snapshot",
            ServerEvent::PollStarted(_) => "poll_started",
            ServerEvent::TallyUpdate(_) => "tally_update",
            ServerEvent::PollEnded => "poll_ended",
        }
    }
}

/// Payload of `welcome`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub connection_id: ConnectionId,
    pub message: String,
}

/// Client-visible view of a poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub is_open: bool,
}

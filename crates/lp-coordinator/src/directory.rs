//! Participant directory
//!
//! Maps each identified connection to its participant record and tracks
//! which connection is the authoritative presenter. Owned by the
//! coordinator; nothing else mutates it.

use std::collections::HashMap;

use lp_protocol::{ConnectionId, Role};

/// A participant in the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Self-reported display name
    pub display_name: String,
    /// Presenter or respondent
    pub role: Role,
    /// Whether a vote has been counted for the current poll
    pub has_answered: bool,
}

impl Participant {
    fn new(role: Role, display_name: String) -> Self {
        Self {
            display_name,
            role,
            has_answered: false,
        }
    }

    /// Minimal record for a connection that voted before identifying
    fn placeholder(connection_id: &ConnectionId) -> Self {
        Self::new(Role::Respondent, placeholder_name(connection_id))
    }
}

/// Name given to participants who never supplied one
pub fn placeholder_name(connection_id: &ConnectionId) -> String {
    format!("Anonymous_{}", connection_id.short())
}

/// Result of removing a participant
#[derive(Debug)]
pub struct Departure {
    /// The removed record
    pub participant: Participant,
    /// Whether the presenter slot was vacated
    pub was_presenter: bool,
}

/// Directory of participants indexed by connection ID
#[derive(Debug, Default)]
pub struct ParticipantDirectory {
    participants: HashMap<ConnectionId, Participant>,
    presenter: Option<ConnectionId>,
}

impl ParticipantDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for a connection.
    ///
    /// Re-identifying keeps `has_answered`, so a respondent cannot vote twice
    /// in one poll by identifying again. A presenter identification takes
    /// the presenter slot; the current presenter switching to respondent
    /// vacates it.
    pub fn identify(
        &mut self,
        connection_id: &ConnectionId,
        role: Role,
        display_name: &str,
    ) -> &Participant {
        let display_name = match display_name.trim() {
            "" => placeholder_name(connection_id),
            name => name.to_string(),
        };

        match role {
            Role::Presenter => {
                if let Some(previous) = self.presenter.replace(connection_id.clone()) {
                    if &previous != connection_id {
                        tracing::info!("Presenter slot moved from {} to {}", previous, connection_id);
                    }
                }
            }
            Role::Respondent => {
                if self.presenter.as_ref() == Some(connection_id) {
                    self.presenter = None;
                }
            }
        }

        let participant = self
            .participants
            .entry(connection_id.clone())
            .and_modify(|p| {
                p.role = role;
                p.display_name = display_name.clone();
            })
            .or_insert_with(|| Participant::new(role, display_name.clone()));

        &*participant
    }

    /// Remove a participant, vacating the presenter slot if they held it
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Departure> {
        let participant = self.participants.remove(connection_id)?;
        let was_presenter = self.presenter.as_ref() == Some(connection_id);
        if was_presenter {
            self.presenter = None;
        }
        Some(Departure {
            participant,
            was_presenter,
        })
    }

    /// Clear `has_answered` for every participant
    pub fn reset_answered(&mut self) {
        for participant in self.participants.values_mut() {
            participant.has_answered = false;
        }
    }

    /// Get a participant by connection ID
    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    /// Get a participant, creating a placeholder respondent if absent.
    ///
    /// The flag is true when a record had to be synthesized.
    pub fn get_or_synthesize(&mut self, connection_id: &ConnectionId) -> (&mut Participant, bool) {
        let mut synthesized = false;
        let participant = self
            .participants
            .entry(connection_id.clone())
            .or_insert_with(|| {
                synthesized = true;
                Participant::placeholder(connection_id)
            });
        (participant, synthesized)
    }

    /// Connection currently holding the presenter slot
    pub fn presenter(&self) -> Option<&ConnectionId> {
        self.presenter.as_ref()
    }

    /// Whether the connection holds the presenter slot
    pub fn is_presenter(&self, connection_id: &ConnectionId) -> bool {
        self.presenter.as_ref() == Some(connection_id)
    }

    /// Number of participants who have a counted vote
    pub fn answered_count(&self) -> usize {
        self.participants.values().filter(|p| p.has_answered).count()
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

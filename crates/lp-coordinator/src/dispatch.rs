//! Broadcast dispatcher
//!
//! Decides the audience and payload for each outbound event:
//!
//! | Trigger                          | Audience        | Events                               |
//! |----------------------------------|-----------------|--------------------------------------|
//! | Connection registered            | that connection | `welcome`                            |
//! | Presenter identifies, poll open  | that connection | `session_snapshot`, `tally_update`   |
//! | Respondent identifies, poll open | that connection | `session_snapshot`                   |
//! | Poll created                     | everyone        | `poll_started`                       |
//! | Vote counted                     | everyone        | `tally_update` (full tally)          |
//! | Poll closed                      | everyone        | `poll_ended`                         |
//!
//! Delivery is fire-and-forget through the registry's outbound queues.

use lp_protocol::{ConnectionId, Role, ServerEvent, WelcomePayload};

use crate::registry::ConnectionRegistry;
use crate::session::PollSession;

/// Greeting sent with `welcome`
pub const WELCOME_MESSAGE: &str = "Connected to live-poll";

/// Emits outbound events through the connection registry
pub struct Dispatcher<'a> {
    registry: &'a ConnectionRegistry,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over the given registry
    pub fn new(registry: &'a ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Tell a new connection the ID it was assigned
    pub fn welcome(&self, id: &ConnectionId) -> bool {
        self.registry.send_to(
            id,
            ServerEvent::Welcome(WelcomePayload {
                connection_id: id.clone(),
                message: WELCOME_MESSAGE.to_string(),
            }),
        )
    }

    /// Bring a newly identified connection up to date with an open poll.
    ///
    /// Presenters also get the current tally so their results view matches
    /// everyone else's.
    pub fn late_join(&self, id: &ConnectionId, role: Role, session: &PollSession) {
        if !session.is_open() {
            return;
        }
        self.registry
            .send_to(id, ServerEvent::SessionSnapshot(session.view()));
        if role == Role::Presenter {
            self.registry
                .send_to(id, ServerEvent::TallyUpdate(session.tally().clone()));
        }
    }

    /// Announce a new poll to everyone
    pub fn poll_started(&self, session: &PollSession) -> usize {
        self.registry
            .broadcast(&ServerEvent::PollStarted(session.view()))
    }

    /// Send the full tally to everyone
    pub fn tally_update(&self, session: &PollSession) -> usize {
        self.registry
            .broadcast(&ServerEvent::TallyUpdate(session.tally().clone()))
    }

    /// Announce that the current poll closed
    pub fn poll_ended(&self) -> usize {
        self.registry.broadcast(&ServerEvent::PollEnded)
    }
}

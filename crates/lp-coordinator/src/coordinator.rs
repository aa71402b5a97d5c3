//! Session coordinator
//!
//! The `Coordinator` owns every piece of session state: the connection
//! registry, the participant directory and the current poll. It runs as a
//! single task that takes one [`CoordinatorEvent`] at a time from a bounded
//! inbox and handles it to completion (read state, mutate, dispatch) before
//! taking the next.
//!
//! # Atomicity Model
//!
//! No locks are involved. Transports hold a [`CoordinatorHandle`] and only
//! ever send messages; they never see the state itself. Because handling is
//! serialized, the effects of events are applied in the order the inbox
//! delivers them, and broadcasts always describe a fully applied update.
//!
//! # Trust Model
//!
//! `create_poll` and `close_poll` are accepted from any connection. The
//! recognized presenter is tracked (last presenter to identify wins) and
//! commands from other connections are logged, but not refused.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use lp_core::time::elapsed_millis;
use lp_core::PollPolicy;
use lp_protocol::{
    ClientEvent, ConnectionId, CreatePollPayload, IdentifyPayload, PollId, SubmitVotePayload,
};

use crate::directory::ParticipantDirectory;
use crate::dispatch::Dispatcher;
use crate::registry::{ConnectionRegistry, OutboundSender};
use crate::session::{PollDraft, PollPhase, PollState};
use crate::tally::{TallyEngine, VoteOutcome};

/// Message delivered to the coordinator
pub enum CoordinatorEvent {
    /// A transport accepted a connection
    Connected {
        id: ConnectionId,
        outbound: OutboundSender,
    },
    /// A connection went away
    Disconnected { id: ConnectionId },
    /// A decoded event from a connection
    Client { id: ConnectionId, event: ClientEvent },
    /// Snapshot request for health reporting
    Status { reply: oneshot::Sender<StatusReport> },
}

/// Point-in-time summary of coordinator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Live connections
    pub connections: usize,
    /// Identified (or synthesized) participants
    pub participants: usize,
    /// Whether a presenter is recognized
    pub presenter_present: bool,
    /// Current poll, open or closed
    pub poll_id: Option<PollId>,
    /// Whether the current poll accepts votes
    pub poll_open: bool,
    /// Participants with a counted vote in the current poll
    pub answered: usize,
    /// Votes counted in the current poll
    pub total_votes: u32,
}

/// The coordinator task is no longer running
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Coordinator is not running")]
pub struct CoordinatorClosed;

/// Cloneable sender used by transports to reach the coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// Create a handle and the inbox it feeds
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Register a connection and its outbound queue
    pub async fn connected(
        &self,
        id: ConnectionId,
        outbound: OutboundSender,
    ) -> Result<(), CoordinatorClosed> {
        self.send(CoordinatorEvent::Connected { id, outbound }).await
    }

    /// Report that a connection is gone
    pub async fn disconnected(&self, id: ConnectionId) -> Result<(), CoordinatorClosed> {
        self.send(CoordinatorEvent::Disconnected { id }).await
    }

    /// Forward a decoded client event
    pub async fn client_event(
        &self,
        id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), CoordinatorClosed> {
        self.send(CoordinatorEvent::Client { id, event }).await
    }

    /// Ask for a status snapshot
    pub async fn status(&self) -> Result<StatusReport, CoordinatorClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorEvent::Status { reply }).await?;
        rx.await.map_err(|_| CoordinatorClosed)
    }

    async fn send(&self, event: CoordinatorEvent) -> Result<(), CoordinatorClosed> {
        self.tx.send(event).await.map_err(|_| CoordinatorClosed)
    }
}

/// Owner of all poll session state
pub struct Coordinator {
    registry: ConnectionRegistry,
    directory: ParticipantDirectory,
    polls: PollState,
    tally: TallyEngine,
    policy: PollPolicy,
}

impl Coordinator {
    /// Create a coordinator with no connections and no poll
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory: ParticipantDirectory::new(),
            polls: PollState::new(),
            tally: TallyEngine::new(&policy),
            policy,
        }
    }

    /// Spawn the coordinator loop, returning its handle and task
    pub fn spawn(
        policy: PollPolicy,
        inbox_capacity: usize,
        cancel: CancellationToken,
    ) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let (handle, inbox) = CoordinatorHandle::channel(inbox_capacity);
        let task = tokio::spawn(Self::new(policy).run(inbox, cancel));
        (handle, task)
    }

    /// Process events until cancelled or every handle is dropped
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<CoordinatorEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Coordinator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Coordinator shutting down");
                    break;
                }
                event = inbox.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => {
                            tracing::info!("All coordinator handles dropped, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Handle one event to completion
    pub fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Connected { id, outbound } => self.on_connected(id, outbound),
            CoordinatorEvent::Disconnected { id } => self.on_disconnected(&id),
            CoordinatorEvent::Client { id, event } => self.on_client_event(&id, event),
            CoordinatorEvent::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> StatusReport {
        let current = self.polls.current();
        StatusReport {
            connections: self.registry.len(),
            participants: self.directory.len(),
            presenter_present: self.directory.presenter().is_some(),
            poll_id: current.map(|session| session.id()),
            poll_open: self.polls.phase() == PollPhase::Open,
            answered: self.directory.answered_count(),
            total_votes: current.map_or(0, |session| session.total_votes()),
        }
    }

    fn on_connected(&mut self, id: ConnectionId, outbound: OutboundSender) {
        if !self.registry.register(id.clone(), outbound) {
            tracing::warn!("Connection {} registered twice, replacing queue", id);
        }
        tracing::info!("Connection registered: {} ({} live)", id, self.registry.len());
        Dispatcher::new(&self.registry).welcome(&id);
    }

    fn on_disconnected(&mut self, id: &ConnectionId) {
        let Some(handle) = self.registry.unregister(id) else {
            tracing::debug!("Disconnect for unknown connection {}", id);
            return;
        };
        tracing::info!(
            "Connection closed: {} after {:?} ({} live)",
            id,
            handle.connected_at.elapsed(),
            self.registry.len()
        );

        let Some(departure) = self.directory.remove(id) else {
            return;
        };
        tracing::info!(
            "{} {} left",
            departure.participant.role,
            departure.participant.display_name
        );

        if departure.was_presenter {
            tracing::info!("Presenter disconnected, presenter slot is vacant");
            if self.policy.close_on_presenter_disconnect {
                self.close_current_poll("presenter disconnected");
            }
        }
    }

    fn on_client_event(&mut self, id: &ConnectionId, event: ClientEvent) {
        if !self.registry.is_live(id) {
            tracing::debug!("Ignoring {} from stale connection {}", event.name(), id);
            return;
        }

        match event {
            ClientEvent::Identify(payload) => self.on_identify(id, payload),
            ClientEvent::CreatePoll(payload) => self.on_create_poll(id, payload),
            ClientEvent::SubmitVote(payload) => self.on_submit_vote(id, payload),
            ClientEvent::ClosePoll => self.on_close_poll(id),
        }
    }

    fn on_identify(&mut self, id: &ConnectionId, payload: IdentifyPayload) {
        let participant = self
            .directory
            .identify(id, payload.role, &payload.display_name);
        let role = participant.role;
        tracing::info!(
            "Connection {} identified as {} {}",
            id,
            role,
            participant.display_name
        );

        if let Some(session) = self.polls.open_session() {
            Dispatcher::new(&self.registry).late_join(id, role, session);
        }
    }

    fn on_create_poll(&mut self, id: &ConnectionId, payload: CreatePollPayload) {
        self.warn_if_not_presenter(id, "create_poll");

        let draft = match PollDraft::parse(&payload, self.policy.max_options) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!("Rejected create_poll from {}: {}", id, e);
                return;
            }
        };

        let (session, previous) = self.polls.start(draft);
        if let Some(previous) = previous.filter(|p| p.is_open()) {
            tracing::info!("{} superseded while still open", previous.id());
        }
        tracing::info!(
            "{} started: {:?} with {} options",
            session.id(),
            session.question(),
            session.options().len()
        );

        self.directory.reset_answered();
        Dispatcher::new(&self.registry).poll_started(session);
    }

    fn on_submit_vote(&mut self, id: &ConnectionId, payload: SubmitVotePayload) {
        if let Some(claimed) = payload.voter_connection_id.as_ref() {
            if claimed != id {
                tracing::warn!(
                    "Vote from {} claims voter {}, counting it for the sender",
                    id,
                    claimed
                );
            }
        }

        let outcome = self.tally.cast_vote(
            &mut self.directory,
            &mut self.polls,
            id,
            payload.poll_id,
            &payload.option_value,
        );

        match outcome {
            VoteOutcome::Counted { .. } => {
                if let Some(session) = self.polls.current() {
                    Dispatcher::new(&self.registry).tally_update(session);
                }
            }
            other => {
                tracing::debug!("Vote from {} ignored: {:?}", id, other);
            }
        }
    }

    fn on_close_poll(&mut self, id: &ConnectionId) {
        self.warn_if_not_presenter(id, "close_poll");
        self.close_current_poll("close_poll");
    }

    fn close_current_poll(&mut self, reason: &str) {
        let Some(session) = self.polls.close() else {
            tracing::debug!("No open poll to close ({})", reason);
            return;
        };
        tracing::info!(
            "{} closed ({}) after {}ms with {} votes",
            session.id(),
            reason,
            elapsed_millis(session.created_at()),
            session.total_votes()
        );
        Dispatcher::new(&self.registry).poll_ended();
    }

    fn warn_if_not_presenter(&self, id: &ConnectionId, command: &str) {
        if !self.directory.is_presenter(id) {
            tracing::warn!(
                "{} from {} which is not the recognized presenter (accepted)",
                command,
                id
            );
        }
    }
}

//! lp-protocol: Wire event vocabulary for live-poll sessions
//!
//! This crate defines the named events exchanged between poll clients
//! (presenters and respondents) and the session coordinator, together with
//! the identifiers they carry and the text codecs used by the transports.

pub mod codec;
pub mod error;
pub mod event;
pub mod ids;

pub use codec::{decode_event, encode_event, EventCodec, MAX_EVENT_SIZE};
pub use error::ProtocolError;
pub use event::{
    ClientEvent, CreatePollPayload, IdentifyPayload, PollView, Role, ServerEvent,
    SubmitVotePayload, Tally, WelcomePayload,
};
pub use ids::{ConnectionId, PollId};

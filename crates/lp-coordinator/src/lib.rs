//! lp-coordinator: Session coordinator for a single live classroom poll
//!
//! One presenter broadcasts a question with options, respondents cast at
//! most one vote each, and the tally streams back to every connection in
//! real time. The coordinator owns all session state and processes events
//! one at a time; transports only deliver events to it and drain the
//! outbound queues it fills.

pub mod coordinator;
pub mod directory;
pub mod dispatch;
pub mod registry;
pub mod server;
pub mod session;
pub mod tally;

pub use coordinator::{Coordinator, CoordinatorClosed, CoordinatorEvent, CoordinatorHandle, StatusReport};
pub use server::{AppState, TcpTransport};

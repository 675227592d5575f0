//! Matchmaking queue: level-bucketed FIFO pairing and match delivery

pub mod events;
pub mod matchmaker;
pub mod registry;

pub use events::{EventPublisher, MatchFound, MockEventPublisher};
pub use matchmaker::{JoinOutcome, LeaveReason, Matchmaker, MatchmakerStats, QueueStatus};
pub use registry::{MatchQueue, QueueDecision, QueueEntry};

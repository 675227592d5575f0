//! Session lifecycle: creation, answers, completion and stat finalization

pub mod factory;
pub mod ledger;
pub mod locks;
pub mod result;
pub mod store;

pub use factory::SessionFactory;
pub use ledger::{AnswerLedger, InMemoryAnswerLedger};
pub use locks::SessionLocks;
pub use result::{
    AnswerReceipt, AnswerReview, FinalizationPath, FinalizationReport, FinalizationStatus, MatchPlayers, ResultAggregator,
    ResultAggregatorStats, SeatResult, SessionResult, SessionView, SubmissionReceipt,
};
pub use store::{
    FinalizationClaim, InMemorySessionStore, Session, SessionStore, SessionStoreStats,
};

/// Candidate codes and decode attempts
pub mod candidate;
/// Frame snapshots
pub mod frame;
/// Product ranges and reconciliation results
pub mod range;

pub use candidate::{CandidateCode, DecodeAttempt, StrategyId};
pub use frame::Frame;
pub use range::{ParsedRange, ProductRange, ReconciliationResult};

//! # Crossfeed Store
//! Durable state: the scheduled-post queue and the posted-content ledger.

pub mod ledger;
pub mod queue;

pub use ledger::HashLedger;
pub use queue::PostQueue;

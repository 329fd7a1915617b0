//! Group execution
//!
//! # Architecture
//!
//! A run uses a fixed group of worker threads. Rank 0 doubles as the
//! coordinator and owns the authoritative global table.
//!
//! - **Collectives**: gather and broadcast over rendezvous channels
//! - **Protocol**: messages exchanged by the collectives during a run
//! - **Coordinator**: builds the group, runs it, collects the aggregate
//!
//! # Modules
//!
//! - `collective`: group construction and the two collective operations
//! - `protocol`: message definitions
//! - `coordinator`: pipeline driver

pub mod collective;
pub mod coordinator;
pub mod protocol;

pub use collective::{CollectiveError, Communicator, Group};
pub use coordinator::{greet, run_pipeline, RunOutcome};
pub use protocol::Message;

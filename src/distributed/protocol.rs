//! Counting protocol messages
//!
//! Every collective in a counting run carries a [`Message`]. The step a rank
//! is in determines which variant it must receive; anything else is a
//! protocol violation and fails the run.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator (rank 0)                 Worker (rank k)
//!     |                                    |
//!     |   repeated every sync round:       |
//!     |<------- gather DELTA --------------|
//!     |-------- broadcast GLOBAL --------->|  (only when round % rate == 0)
//!     |                                    |
//!     |   once, at shard exhaustion:       |
//!     |<------- gather DELTA --------------|
//!     |<------- gather REPORT -------------|
//! ```

use super::collective::CollectiveError;
use crate::counter::FrequencyTable;
use crate::stats::WorkerReport;

/// Payload of one collective operation
#[derive(Debug, Clone)]
pub enum Message {
    /// Counts accumulated since the sender's last gather
    Delta(FrequencyTable),
    /// The coordinator's authoritative table
    Global(FrequencyTable),
    /// Timing and document counts of a finished worker
    Report(WorkerReport),
}

impl Message {
    /// Short name used in protocol errors
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Delta(_) => "DELTA",
            Message::Global(_) => "GLOBAL",
            Message::Report(_) => "REPORT",
        }
    }

    /// Unwrap a DELTA message received by `rank`
    pub fn into_delta(self, rank: usize) -> Result<FrequencyTable, CollectiveError> {
        match self {
            Message::Delta(table) => Ok(table),
            other => Err(unexpected(rank, "DELTA", &other)),
        }
    }

    /// Unwrap a GLOBAL message received by `rank`
    pub fn into_global(self, rank: usize) -> Result<FrequencyTable, CollectiveError> {
        match self {
            Message::Global(table) => Ok(table),
            other => Err(unexpected(rank, "GLOBAL", &other)),
        }
    }

    /// Unwrap a REPORT message received by `rank`
    pub fn into_report(self, rank: usize) -> Result<WorkerReport, CollectiveError> {
        match self {
            Message::Report(report) => Ok(report),
            other => Err(unexpected(rank, "REPORT", &other)),
        }
    }
}

fn unexpected(rank: usize, expected: &'static str, received: &Message) -> CollectiveError {
    CollectiveError::UnexpectedMessage {
        rank,
        expected,
        received: received.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::NGram;

    #[test]
    fn test_message_kinds() {
        assert_eq!(Message::Delta(FrequencyTable::new()).kind(), "DELTA");
        assert_eq!(Message::Global(FrequencyTable::new()).kind(), "GLOBAL");
        assert_eq!(Message::Report(WorkerReport::new(0, 0)).kind(), "REPORT");
    }

    #[test]
    fn test_into_delta() {
        let mut table = FrequencyTable::new();
        table.increment(NGram::from_tokens(["a"]));

        let delta = Message::Delta(table.clone()).into_delta(0).unwrap();
        assert_eq!(delta, table);
    }

    #[test]
    fn test_wrong_variant_is_protocol_error() {
        let err = Message::Global(FrequencyTable::new()).into_delta(2).unwrap_err();
        assert_eq!(
            err,
            CollectiveError::UnexpectedMessage {
                rank: 2,
                expected: "DELTA",
                received: "GLOBAL",
            }
        );

        assert!(Message::Delta(FrequencyTable::new()).into_report(0).is_err());
        assert!(Message::Report(WorkerReport::new(1, 3)).into_global(1).is_err());
    }
}

//! Collective operations over a fixed worker group
//!
//! A [`Group`] of `size` ranks is wired as a star around rank 0 (the
//! coordinator) with zero-capacity crossbeam channels, so every send is a
//! rendezvous. Two operations are exposed, and both are barriers: nobody
//! returns before every rank has entered the call.
//!
//! ```text
//!  gather                         broadcast
//!  rank k ---- value ----> 0      0 ---- value ----> rank k
//!  rank k <--- release --- 0      0 ---- release --> rank k
//! ```
//!
//! The release phase is what turns a plain send/receive into a barrier: the
//! coordinator only releases members once it has talked to all of them.
//!
//! There are no timeouts. A rank that stops participating stalls its peers;
//! a rank that exits drops its channel endpoints, and its peers see
//! [`CollectiveError::Disconnected`] instead of hanging.
//!
//! # Example
//!
//! ```
//! use gramsync::distributed::collective::Group;
//! use std::thread;
//!
//! let comms = Group::create::<usize>(3)?;
//! let handles: Vec<_> = comms
//!     .into_iter()
//!     .map(|comm| thread::spawn(move || comm.gather(comm.rank() * 10)))
//!     .collect();
//!
//! let gathered: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
//! assert_eq!(gathered[0], Some(vec![0, 10, 20]));
//! assert_eq!(gathered[1], None);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crossbeam::channel::{bounded, Receiver, Sender};
use thiserror::Error;

/// Failure of a collective operation
///
/// Either kind is fatal for the whole run: the protocol has no retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectiveError {
    /// The peer at `rank` dropped out of the group
    #[error("rank {rank} left the group during a collective operation")]
    Disconnected { rank: usize },

    /// A rank received a message that does not belong to the current step
    #[error("rank {rank} expected {expected} but received {received}")]
    UnexpectedMessage {
        rank: usize,
        expected: &'static str,
        received: &'static str,
    },
}

/// Coordinator-to-member traffic
enum Downlink<M> {
    Value(M),
    Release,
}

impl<M> Downlink<M> {
    fn kind(&self) -> &'static str {
        match self {
            Downlink::Value(_) => "value",
            Downlink::Release => "release",
        }
    }
}

enum Role<M> {
    Root {
        /// One receiver per member, index `i` is rank `i + 1`
        uplinks: Vec<Receiver<M>>,
        downlinks: Vec<Sender<Downlink<M>>>,
    },
    Member {
        uplink: Sender<M>,
        downlink: Receiver<Downlink<M>>,
    },
}

/// Group construction
pub struct Group;

impl Group {
    /// Create the communicators for a group of `size` ranks
    ///
    /// Element `i` of the result is the communicator of rank `i`; each one is
    /// meant to be moved into its own thread.
    pub fn create<M: Send>(size: usize) -> crate::Result<Vec<Communicator<M>>> {
        if size == 0 {
            anyhow::bail!("group size must be at least 1");
        }

        let mut uplinks = Vec::with_capacity(size - 1);
        let mut downlinks = Vec::with_capacity(size - 1);
        let mut members = Vec::with_capacity(size - 1);

        for rank in 1..size {
            let (up_tx, up_rx) = bounded(0);
            let (down_tx, down_rx) = bounded(0);
            uplinks.push(up_rx);
            downlinks.push(down_tx);
            members.push(Communicator {
                rank,
                size,
                role: Role::Member {
                    uplink: up_tx,
                    downlink: down_rx,
                },
            });
        }

        let mut comms = Vec::with_capacity(size);
        comms.push(Communicator {
            rank: 0,
            size,
            role: Role::Root { uplinks, downlinks },
        });
        comms.extend(members);
        Ok(comms)
    }
}

/// One rank's handle on the group
pub struct Communicator<M> {
    rank: usize,
    size: usize,
    role: Role<M>,
}

impl<M: Send> Communicator<M> {
    /// Rank of this participant (0 is the coordinator)
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of participants in the group
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    /// Gather one value from every rank to the coordinator
    ///
    /// The coordinator receives `Some` with the values in rank order (its own
    /// first); every other rank receives `None`.
    pub fn gather(&self, value: M) -> Result<Option<Vec<M>>, CollectiveError> {
        match &self.role {
            Role::Root { uplinks, downlinks } => {
                let mut values = Vec::with_capacity(self.size);
                values.push(value);
                for (i, rx) in uplinks.iter().enumerate() {
                    let v = rx
                        .recv()
                        .map_err(|_| CollectiveError::Disconnected { rank: i + 1 })?;
                    values.push(v);
                }
                release(downlinks)?;
                Ok(Some(values))
            }
            Role::Member { uplink, downlink } => {
                uplink
                    .send(value)
                    .map_err(|_| CollectiveError::Disconnected { rank: 0 })?;
                self.await_release(downlink)?;
                Ok(None)
            }
        }
    }

    /// Push the coordinator's value to every rank
    ///
    /// Every rank passes a value; only the coordinator's is used. Each rank
    /// returns the coordinator's value, which replaces whatever it passed in.
    pub fn broadcast(&self, value: M) -> Result<M, CollectiveError>
    where
        M: Clone,
    {
        match &self.role {
            Role::Root { downlinks, .. } => {
                for (i, tx) in downlinks.iter().enumerate() {
                    tx.send(Downlink::Value(value.clone()))
                        .map_err(|_| CollectiveError::Disconnected { rank: i + 1 })?;
                }
                release(downlinks)?;
                Ok(value)
            }
            Role::Member { downlink, .. } => {
                drop(value);
                let received = match downlink.recv() {
                    Ok(Downlink::Value(v)) => v,
                    Ok(other) => {
                        return Err(CollectiveError::UnexpectedMessage {
                            rank: self.rank,
                            expected: "value",
                            received: other.kind(),
                        })
                    }
                    Err(_) => return Err(CollectiveError::Disconnected { rank: 0 }),
                };
                self.await_release(downlink)?;
                Ok(received)
            }
        }
    }

    fn await_release(&self, downlink: &Receiver<Downlink<M>>) -> Result<(), CollectiveError> {
        match downlink.recv() {
            Ok(Downlink::Release) => Ok(()),
            Ok(other) => Err(CollectiveError::UnexpectedMessage {
                rank: self.rank,
                expected: "release",
                received: other.kind(),
            }),
            Err(_) => Err(CollectiveError::Disconnected { rank: 0 }),
        }
    }
}

fn release<M>(downlinks: &[Sender<Downlink<M>>]) -> Result<(), CollectiveError> {
    for (i, tx) in downlinks.iter().enumerate() {
        tx.send(Downlink::Release)
            .map_err(|_| CollectiveError::Disconnected { rank: i + 1 })?;
    }
    Ok(())
}

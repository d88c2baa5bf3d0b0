// OspfPlan: A network-planning engine for OSPF-style topologies
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Module containing all type definitions

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;

/// Router identification (and index into the graph of a specific snapshot)
pub type RouterId = NodeIndex<IndexType>;

/// Identification of a single directed edge within a specific snapshot.
pub type EdgeId = EdgeIndex<IndexType>;

/// OSPF link cost. Valid costs are in `MIN_LINK_COST..=MAX_LINK_COST`.
pub type LinkCost = u32;

/// The smallest valid OSPF link cost.
pub const MIN_LINK_COST: LinkCost = 1;

/// The largest valid OSPF link cost.
pub const MAX_LINK_COST: LinkCost = 65535;

/// Identifier of a logical link. A logical link is a bidirectional connection between two routers,
/// materialized as up to two directed edges sharing the same `LinkId`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinkId(pub u32);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl From<u32> for LinkId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<usize> for LinkId {
    fn from(x: usize) -> Self {
        Self(x as u32)
    }
}

/// The two directions of a logical link. `Forward` is the orientation in which the link was first
/// registered (source to target), `Reverse` is the opposite one.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LinkDirection {
    /// The direction from the registered source towards the registered target.
    Forward,
    /// The direction from the registered target towards the registered source.
    Reverse,
}

impl LinkDirection {
    /// Get the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

impl std::fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Reverse => f.write_str("reverse"),
        }
    }
}

/// Process-unique identity of a snapshot. Every committed or derived snapshot gets a fresh id, so
/// callers can key memoization on it.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(0);

impl SnapshotId {
    /// Allocate the next process-unique snapshot id.
    pub(crate) fn next() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Main error type of the planning engine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanError {
    /// The topology violates one of the construction invariants. The operation was not applied.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    /// A link cost outside of `[MIN_LINK_COST, MAX_LINK_COST]` was supplied.
    #[error("Invalid link cost: {0} (must be in [1, 65535])")]
    InvalidCost(u32),
    /// The requested router handle is not present in the snapshot.
    #[error("Unknown router: {0}")]
    UnknownRouter(String),
    /// The requested logical link is not present in the snapshot.
    #[error("Unknown link: {0}")]
    UnknownLink(LinkId),
    /// The caller's cancellation token was tripped. Partial results are discarded.
    #[error("The operation was cancelled")]
    Cancelled,
    /// An optimizer constraint cannot be satisfied.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl PlanError {
    /// The machine-readable error code for the host boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTopology(_) => "invalid_topology",
            Self::InvalidCost(_) => "invalid_cost",
            Self::UnknownRouter(_) => "unknown_router",
            Self::UnknownLink(_) => "unknown_edge",
            Self::Cancelled => "cancelled",
            Self::ConstraintViolation(_) => "constraint_violation",
        }
    }
}

/// Non-fatal semantic warnings. These are attached to result objects as notes; the query still
/// completes.
#[derive(Error, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Warning {
    /// An edge carries traffic but no capacity metadata; the default capacity was assumed.
    #[error(
        "Link {link} ({source_handle} -> {target}) has no capacity metadata; assuming {assumed_mbps} Mbps"
    )]
    CapacityMissing {
        /// The logical link the edge belongs to.
        link: LinkId,
        /// Handle of the edge source.
        source_handle: String,
        /// Handle of the edge target.
        target: String,
        /// The capacity that was assumed.
        assumed_mbps: u64,
    },
    /// The two directions of a logical link have different costs but no metadata explaining why.
    #[error("Link {link} has asymmetric costs ({forward_cost} / {reverse_cost}) without metadata")]
    AsymmetricWithoutMetadata {
        /// The logical link.
        link: LinkId,
        /// Cost in the forward direction.
        forward_cost: LinkCost,
        /// Cost in the reverse direction.
        reverse_cost: LinkCost,
    },
}

impl Warning {
    /// The machine-readable warning code for the host boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapacityMissing { .. } => "capacity_missing",
            Self::AsymmetricWithoutMetadata { .. } => "asymmetric_without_metadata",
        }
    }
}

/// A shared flag to cancel long-running queries. The engine polls the token at coarse iteration
/// boundaries (roughly every 1% of the total work) and returns [`PlanError::Cancelled`] when it is
/// tripped. Cloning the token shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. All queries polling this token will return [`PlanError::Cancelled`] at
    /// their next suspension point.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check whether the token was tripped.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return `Err(PlanError::Cancelled)` if the token was tripped.
    pub(crate) fn check(&self) -> Result<(), PlanError> {
        if self.is_cancelled() {
            Err(PlanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A synchronous progress sink. Long-running queries call `report` at their suspension points;
/// there is no async machinery involved.
pub trait ProgressSink: Sync {
    /// Report that `done` out of `total` outer iterations have completed.
    fn report(&self, done: usize, total: usize);
}

/// A progress sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _done: usize, _total: usize) {}
}

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

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # OspfPlan
//!
//! A network-planning engine for OSPF-style link-state topologies. Given routers, directed links
//! with integer OSPF costs, and optional capacity and traffic metadata, it answers the questions
//! network engineers ask before committing a change to production:
//!
//! - **Routing**: single-source shortest paths with full Equal-Cost Multi-Path enumeration, a
//!   deterministic canonical path, and layered traversal orders ([`spf`]).
//! - **What-if**: the impact of a cost change or a new link on every router-to-router flow
//!   ([`impact`]), aggregated into a risk score with rollback hints ([`blast`]).
//! - **Failure simulation**: connected components and partition structure ([`connectivity`]),
//!   single points of failure and a resilience score ([`resilience`]).
//! - **Optimization**: per-edge load and utilization under a traffic matrix ([`traffic`]), and a
//!   bounded greedy search for cost changes that relieve congestion ([`optimizer`]).
//!
//! The engine is a library of pure functions over immutable [`topology::Snapshot`]s: mutations go
//! through a builder or [`topology::Snapshot::with_edits`] and always produce a *new* snapshot,
//! so concurrent queries never observe a change. The all-pairs analyses fan out across logical
//! cores; results are nevertheless returned in a deterministic, handle-lexicographic order.
//!
//! ## Example
//!
//! A square of four routers with unit costs has two equal-cost paths across it:
//!
//! ```
//! use ospfplan::prelude::*;
//!
//! fn main() -> Result<(), PlanError> {
//!     let mut builder = Snapshot::builder();
//!     let a = builder.add_router("a", "Amsterdam")?;
//!     let b = builder.add_router("b", "Berlin")?;
//!     let c = builder.add_router("c", "Copenhagen")?;
//!     let d = builder.add_router("d", "Dublin")?;
//!     builder.add_link(a, b, 1, Some(1))?;
//!     builder.add_link(a, c, 1, Some(1))?;
//!     builder.add_link(b, d, 1, Some(1))?;
//!     builder.add_link(c, d, 1, Some(1))?;
//!     let snapshot = builder.commit()?;
//!
//!     let table = shortest_paths(&snapshot, a)?;
//!     let path = table.reconstruct(d).expect("d is reachable");
//!     assert_eq!(path.cost, 2);
//!     assert!(path.is_ecmp);
//!     assert_eq!(path.canonical_handles(&snapshot), ["a", "b", "d"]);
//!     Ok(())
//! }
//! ```

pub mod blast;
pub mod connectivity;
pub mod formatter;
pub mod impact;
pub mod io;
pub mod optimizer;
pub mod prelude;
pub mod resilience;
pub mod spf;
pub mod store;
pub mod topology;
pub mod traffic;
pub mod types;

#[cfg(test)]
mod test;

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

//! Module that introduces a formatter to display all types containing `RouterId`s or edge ids by
//! looking the handles up in a snapshot.

use itertools::Itertools;

use crate::impact::ImpactRecord;
use crate::resilience::{Spof, SpofElement};
use crate::spf::PathResult;
use crate::topology::Snapshot;
use crate::types::{EdgeId, RouterId};

/// Trait to format a type that contains router or edge ids against a snapshot.
pub trait SnapshotFormatter {
    /// Return a formatted string by looking up ids in the snapshot.
    fn fmt(&self, snapshot: &Snapshot) -> String;
}

impl SnapshotFormatter for RouterId {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        snapshot.handle(*self).to_string()
    }
}

impl SnapshotFormatter for EdgeId {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        match (snapshot.edge_endpoints(*self), snapshot.edge_data(*self)) {
            (Some((src, dst)), Some(data)) => format!(
                "{} -> {} ({}, cost {})",
                snapshot.handle(src),
                snapshot.handle(dst),
                data.link(),
                data.cost()
            ),
            _ => "?".to_string(),
        }
    }
}

impl SnapshotFormatter for [RouterId] {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        self.iter().map(|r| snapshot.handle(*r)).join(" => ")
    }
}

impl SnapshotFormatter for Vec<RouterId> {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        self.as_slice().fmt(snapshot)
    }
}

impl SnapshotFormatter for PathResult {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        format!(
            "{} (cost {}{})",
            self.canonical_path.fmt(snapshot),
            self.cost,
            if self.is_ecmp { ", ecmp" } else { "" }
        )
    }
}

impl SnapshotFormatter for ImpactRecord {
    fn fmt(&self, _snapshot: &Snapshot) -> String {
        let cost = |c: Option<u32>| c.map(|x| x.to_string()).unwrap_or_else(|| "-".to_string());
        format!(
            "{} -> {}: {} (cost {} => {})",
            self.source,
            self.destination,
            self.kind,
            cost(self.old_cost),
            cost(self.new_cost),
        )
    }
}

impl SnapshotFormatter for Spof {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        let element = match &self.element {
            SpofElement::Node(handle) => handle.clone(),
            SpofElement::Link(link) => snapshot
                .link_edges(*link)
                .map(|e| {
                    format!(
                        "{} ({} -- {})",
                        link,
                        snapshot.handle(e.source),
                        snapshot.handle(e.target)
                    )
                })
                .unwrap_or_else(|| link.to_string()),
        };
        format!(
            "{element}: {:?}, {} paths affected{}",
            self.severity,
            self.paths_affected,
            if self.causes_partition { ", partitions the network" } else { "" }
        )
    }
}

impl<T: SnapshotFormatter> SnapshotFormatter for &T {
    fn fmt(&self, snapshot: &Snapshot) -> String {
        T::fmt(*self, snapshot)
    }
}

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

//! Connectivity analysis: weakly connected components over the undirected projection of a
//! snapshot, isolated nodes, and partition structure.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::topology::Snapshot;
use crate::types::RouterId;

/// The partition structure of a snapshot. Components are sorted by the lexicographically smallest
/// handle they contain, so the report is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    /// Whether a single component covers all routers.
    pub is_fully_connected: bool,
    /// The weakly connected components, as sets of router handles.
    pub components: Vec<BTreeSet<String>>,
    /// Routers without any link, in either direction.
    pub isolated_nodes: BTreeSet<String>,
    /// Size of the largest component.
    pub largest_component: usize,
}

impl ConnectivityReport {
    /// The number of components.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }
}

/// Compute the [`ConnectivityReport`] of a snapshot. Edges are treated as bidirectional if either
/// direction is present. Runs in `O(V + E)`.
pub fn connectivity(snapshot: &Snapshot) -> ConnectivityReport {
    let components = components(snapshot);

    let mut named: Vec<BTreeSet<String>> = components
        .iter()
        .map(|c| c.iter().map(|r| snapshot.handle(*r).to_string()).collect())
        .collect();
    // label each component by its smallest handle and sort by that label
    named.sort_by(|a, b| a.iter().next().cmp(&b.iter().next()));

    let isolated_nodes: BTreeSet<String> =
        named.iter().filter(|c| c.len() == 1).flatten().cloned().collect();
    let largest_component = named.iter().map(|c| c.len()).max().unwrap_or(0);
    let is_fully_connected = named.len() == 1 && largest_component == snapshot.num_routers();

    ConnectivityReport {
        is_fully_connected,
        components: named,
        isolated_nodes,
        largest_component,
    }
}

/// The weakly connected components as router ids, in unspecified order. BFS over the undirected
/// projection.
pub(crate) fn components(snapshot: &Snapshot) -> Vec<Vec<RouterId>> {
    let mut visited: HashSet<RouterId> = HashSet::with_capacity(snapshot.num_routers());
    let mut components = Vec::new();

    for start in snapshot.routers() {
        if !visited.insert(start) {
            continue;
        }
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for neighbor in snapshot.neighbors_undirected(node) {
                if visited.insert(neighbor) {
                    component.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Check whether two routers are in the same weakly connected component.
pub fn same_component(snapshot: &Snapshot, a: RouterId, b: RouterId) -> bool {
    if a == b {
        return true;
    }
    let mut visited: HashSet<RouterId> = HashSet::new();
    visited.insert(a);
    let mut queue = VecDeque::from([a]);
    while let Some(node) = queue.pop_front() {
        for neighbor in snapshot.neighbors_undirected(node) {
            if neighbor == b {
                return true;
            }
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }
    false
}

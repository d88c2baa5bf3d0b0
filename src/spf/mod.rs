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

//! The SPF engine: single-source shortest paths with the full ECMP predecessor DAG.
//!
//! [`shortest_paths`] runs Dijkstra's algorithm from a single source and records, for every
//! reachable destination, the optimal cost and *all* predecessor pairs `(router, edge)` that
//! participate in any optimal path. [`SpfTable::reconstruct`] derives a [`PathResult`] for a
//! destination: the canonical path, the complete ECMP edge set, and the layered node sets used for
//! step-by-step display.

use std::cmp::Ordering;
use std::collections::{hash_map::Entry, BTreeSet, BinaryHeap, HashMap, VecDeque};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::topology::Snapshot;
use crate::types::{EdgeId, LinkCost, PlanError, RouterId};

lazy_static! {
    static ref NO_PREDS: Vec<(RouterId, EdgeId)> = Vec::new();
}

/// Routing information for a single destination in an [`SpfTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpfNode {
    /// Total cost of the optimal path(s) from the source.
    pub cost: LinkCost,
    /// All `(predecessor, edge)` pairs that lie on any optimal path.
    pub preds: Vec<(RouterId, EdgeId)>,
    /// Minimal hop depth over the optimal DAG; the SPF wave in which the node was finalized.
    pub layer: usize,
}

/// The result of a single-source SPF run. Holds a (cheap) clone of the snapshot it was computed
/// on, so path reconstruction needs no further arguments.
#[derive(Debug, Clone)]
pub struct SpfTable {
    snapshot: Snapshot,
    source: RouterId,
    nodes: HashMap<RouterId, SpfNode>,
}

/// A fully reconstructed shortest path between one `(source, destination)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    /// The source router.
    pub source: RouterId,
    /// The destination router.
    pub destination: RouterId,
    /// Total integer cost of the optimal path.
    pub cost: LinkCost,
    /// Whether at least two distinct equal-cost paths exist.
    pub is_ecmp: bool,
    /// One deterministically chosen router sequence from source to destination. Under ECMP, the
    /// predecessor with the lexicographically smallest handle wins at every step.
    pub canonical_path: Vec<RouterId>,
    /// Every directed edge that participates in any optimal path.
    pub edge_set: BTreeSet<EdgeId>,
    /// The nodes of the ECMP DAG, partitioned by hop distance from the source. One entry per SPF
    /// wave; within a wave, nodes are in handle order.
    pub layered_nodes: Vec<Vec<RouterId>>,
}

/// Compute single-source shortest paths over a snapshot.
///
/// Returns [`PlanError::UnknownRouter`] if `source` is not part of the snapshot. Unreachable
/// destinations are simply absent from the resulting table.
pub fn shortest_paths(snapshot: &Snapshot, source: RouterId) -> Result<SpfTable, PlanError> {
    if !snapshot.contains_router(source) {
        return Err(PlanError::UnknownRouter(format!("{:?}", source)));
    }

    // use a heap to always explore the cheapest tentative paths first; ties are broken by the
    // destination handle so the exploration order is reproducible
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct HeapEntry<'a> {
        cost: LinkCost,
        handle: &'a str,
        node: RouterId,
        parent: RouterId,
        edge: EdgeId,
    }

    impl PartialOrd for HeapEntry<'_> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for HeapEntry<'_> {
        fn cmp(&self, other: &Self) -> Ordering {
            other
                .cost
                .cmp(&self.cost)
                .then_with(|| other.handle.as_bytes().cmp(self.handle.as_bytes()))
        }
    }

    let mut nodes: HashMap<RouterId, SpfNode> = HashMap::with_capacity(snapshot.num_routers());
    nodes.insert(source, SpfNode { cost: 0, preds: Vec::new(), layer: 0 });

    let mut visit_next = BinaryHeap::new();
    visit_next.extend(snapshot.out_edges(source).map(|(edge, target, data)| HeapEntry {
        cost: data.cost(),
        handle: snapshot.handle(target),
        node: target,
        parent: source,
        edge,
    }));

    while let Some(HeapEntry { cost, node, parent, edge, .. }) = visit_next.pop() {
        let parent_layer = nodes.get(&parent).expect("parent is finalized").layer;
        match nodes.entry(node) {
            Entry::Occupied(mut e) => {
                let e = e.get_mut();
                if cost == e.cost {
                    // another optimal path: extend the predecessor DAG
                    e.preds.push((parent, edge));
                    e.layer = e.layer.min(parent_layer + 1);
                } else {
                    debug_assert!(cost > e.cost, "negative link costs are not allowed");
                }
            }
            Entry::Vacant(e) => {
                e.insert(SpfNode {
                    cost,
                    preds: vec![(parent, edge)],
                    layer: parent_layer + 1,
                });
                visit_next.extend(snapshot.out_edges(node).map(|(edge, target, data)| {
                    HeapEntry {
                        cost: cost + data.cost(),
                        handle: snapshot.handle(target),
                        node: target,
                        parent: node,
                        edge,
                    }
                }));
            }
        }
    }

    log::trace!(
        "SPF from {}: {} of {} routers reachable",
        snapshot.handle(source),
        nodes.len(),
        snapshot.num_routers()
    );

    Ok(SpfTable { snapshot: snapshot.clone(), source, nodes })
}

impl SpfTable {
    /// The source router of this table.
    pub fn source(&self) -> RouterId {
        self.source
    }

    /// The snapshot this table was computed on.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The optimal cost towards `dst`, or `None` if `dst` is unreachable.
    pub fn cost(&self, dst: RouterId) -> Option<LinkCost> {
        self.nodes.get(&dst).map(|n| n.cost)
    }

    /// Whether `dst` is reachable from the source.
    pub fn reachable(&self, dst: RouterId) -> bool {
        self.nodes.contains_key(&dst)
    }

    /// The table entry for `dst`.
    pub fn node(&self, dst: RouterId) -> Option<&SpfNode> {
        self.nodes.get(&dst)
    }

    /// All `(predecessor, edge)` pairs of `dst` that lie on any optimal path. Empty if `dst` is
    /// unreachable or the source itself.
    pub fn preds(&self, dst: RouterId) -> &[(RouterId, EdgeId)] {
        self.nodes.get(&dst).map(|n| n.preds.as_slice()).unwrap_or(&NO_PREDS)
    }

    /// Iterate over all reachable destinations and their entries.
    pub fn iter(&self) -> impl Iterator<Item = (RouterId, &SpfNode)> {
        self.nodes.iter().map(|(r, n)| (*r, n))
    }

    /// Reconstruct the full [`PathResult`] towards `dst`, or `None` if `dst` is unreachable.
    pub fn reconstruct(&self, dst: RouterId) -> Option<PathResult> {
        let target = self.nodes.get(&dst)?;

        // collect the ECMP DAG: all nodes and edges reachable from dst via predecessors
        let mut dag_nodes: BTreeSet<RouterId> = BTreeSet::new();
        let mut edge_set: BTreeSet<EdgeId> = BTreeSet::new();
        let mut queue = VecDeque::from([dst]);
        dag_nodes.insert(dst);
        let mut is_ecmp = false;
        while let Some(node) = queue.pop_front() {
            let entry = self.nodes.get(&node).expect("DAG nodes are reachable");
            if node != self.source && entry.preds.len() > 1 {
                is_ecmp = true;
            }
            for (pred, edge) in &entry.preds {
                edge_set.insert(*edge);
                if dag_nodes.insert(*pred) {
                    queue.push_back(*pred);
                }
            }
        }

        // canonical path: walk back choosing the lexicographically smallest predecessor handle
        let mut canonical_path = vec![dst];
        let mut cursor = dst;
        while cursor != self.source {
            let entry = self.nodes.get(&cursor).expect("on an optimal path");
            let (pred, _) = entry
                .preds
                .iter()
                .min_by(|(a, ea), (b, eb)| {
                    self.snapshot
                        .handle(*a)
                        .as_bytes()
                        .cmp(self.snapshot.handle(*b).as_bytes())
                        .then(ea.cmp(eb))
                })
                .expect("every non-source node on an optimal path has a predecessor");
            canonical_path.push(*pred);
            cursor = *pred;
        }
        canonical_path.reverse();

        // layered nodes: hop depth from the source, restricted to the DAG towards dst. Process in
        // cost order so every predecessor's depth is final before it is read.
        let mut by_cost: Vec<RouterId> = dag_nodes.iter().copied().collect();
        by_cost.sort_by_key(|r| self.nodes[r].cost);
        let mut depth: HashMap<RouterId, usize> = HashMap::from([(self.source, 0)]);
        for node in by_cost.iter().copied().filter(|r| *r != self.source) {
            let d = self.nodes[&node]
                .preds
                .iter()
                .map(|(p, _)| depth[p] + 1)
                .min()
                .expect("every DAG node has a predecessor in the DAG");
            depth.insert(node, d);
        }
        let num_layers = depth.values().max().map(|d| d + 1).unwrap_or(1);
        let mut layered_nodes: Vec<Vec<RouterId>> = vec![Vec::new(); num_layers];
        for node in dag_nodes.iter().copied() {
            layered_nodes[depth[&node]].push(node);
        }
        for layer in &mut layered_nodes {
            layer.sort_by(|a, b| {
                self.snapshot.handle(*a).as_bytes().cmp(self.snapshot.handle(*b).as_bytes())
            });
        }

        Some(PathResult {
            source: self.source,
            destination: dst,
            cost: target.cost,
            is_ecmp,
            canonical_path,
            edge_set,
            layered_nodes,
        })
    }
}

impl PathResult {
    /// Render the canonical path as router handles.
    pub fn canonical_handles(&self, snapshot: &Snapshot) -> Vec<String> {
        self.canonical_path.iter().map(|r| snapshot.handle(*r).to_string()).collect()
    }
}

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

//! Builder for [`Snapshot`]s. Collects routers and links, validates the construction invariants,
//! and commits them into an immutable snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::IntoEdgeReferences;

use super::{LinkData, LinkEdges, Router, Snapshot, SnapshotData};
use crate::types::{
    IndexType, LinkCost, LinkDirection, LinkId, PlanError, RouterId, SnapshotId, MAX_LINK_COST,
    MIN_LINK_COST,
};

/// Collects routers and edges and produces a [`Snapshot`] on [`commit`](TopologyBuilder::commit).
///
/// Lookup failures and invalid costs are reported immediately; the structural invariants are
/// re-checked atomically at commit time, so a failed commit never yields a half-built snapshot.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    graph: StableDiGraph<Router, LinkData, IndexType>,
    handles: HashMap<String, RouterId>,
    links: BTreeMap<LinkId, LinkEdges>,
    next_link: u32,
}

impl TopologyBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a router with the given handle and display name.
    pub fn add_router(
        &mut self,
        handle: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<RouterId, PlanError> {
        self.add_router_with(Router::new(handle, name))
    }

    /// Add a fully specified router.
    pub fn add_router_with(&mut self, router: Router) -> Result<RouterId, PlanError> {
        if self.handles.contains_key(&router.handle) {
            return Err(PlanError::InvalidTopology(format!(
                "duplicate router handle {:?}",
                router.handle
            )));
        }
        let handle = router.handle.clone();
        let id = self.graph.add_node(router);
        self.handles.insert(handle, id);
        Ok(id)
    }

    /// Add a logical link between two routers. The forward direction is `source -> target`; pass
    /// `None` as `reverse_cost` to leave the reverse direction absent. Returns the allocated
    /// [`LinkId`].
    pub fn add_link(
        &mut self,
        source: RouterId,
        target: RouterId,
        forward_cost: LinkCost,
        reverse_cost: Option<LinkCost>,
    ) -> Result<LinkId, PlanError> {
        for cost in [Some(forward_cost), reverse_cost].into_iter().flatten() {
            if !(MIN_LINK_COST..=MAX_LINK_COST).contains(&cost) {
                return Err(PlanError::InvalidCost(cost));
            }
        }
        for r in [source, target] {
            if !self.graph.contains_node(r) {
                return Err(PlanError::InvalidTopology(format!(
                    "edge endpoint {:?} does not exist",
                    r
                )));
            }
        }
        let link = LinkId(self.next_link);
        self.next_link += 1;
        let forward = Some(self.graph.add_edge(source, target, LinkData::new(link, forward_cost)));
        let reverse =
            reverse_cost.map(|c| self.graph.add_edge(target, source, LinkData::new(link, c)));
        self.links.insert(link, LinkEdges { source, target, forward, reverse });
        Ok(link)
    }

    /// Mutable access to the metadata of one direction of a link, for attaching interface names,
    /// capacity, or observed traffic. The cost itself is not reachable through this.
    pub fn edge_mut(&mut self, link: LinkId, direction: LinkDirection) -> Option<&mut LinkData> {
        let edge = self.links.get(&link)?.edge(direction)?;
        self.graph.edge_weight_mut(edge)
    }

    /// Look up a previously added router by handle.
    pub fn router_id(&self, handle: &str) -> Option<RouterId> {
        self.handles.get(handle).copied()
    }

    /// Validate the construction invariants and produce an immutable [`Snapshot`].
    pub fn commit(self) -> Result<Snapshot, PlanError> {
        let Self { graph, handles, links, next_link } = self;
        validate(&graph, &links)?;
        log::debug!(
            "committing snapshot with {} routers, {} directed edges, {} logical links",
            graph.node_count(),
            graph.edge_count(),
            links.len()
        );
        Ok(Snapshot::from_data(SnapshotData {
            graph,
            handles,
            links,
            sorted: Vec::new(),
            next_link,
            id: SnapshotId(0),
        }))
    }
}

/// Check the construction invariants on the collected graph.
pub(crate) fn validate(
    graph: &StableDiGraph<Router, LinkData, IndexType>,
    links: &BTreeMap<LinkId, LinkEdges>,
) -> Result<(), PlanError> {
    use petgraph::visit::EdgeRef;

    let mut seen: HashSet<(RouterId, RouterId, LinkId)> = HashSet::new();
    for e in graph.edge_references() {
        let data = e.weight();
        // costs stay in the OSPF range
        if !(MIN_LINK_COST..=MAX_LINK_COST).contains(&data.cost) {
            return Err(PlanError::InvalidCost(data.cost));
        }
        // no duplicate (source, target, link) triple
        if !seen.insert((e.source(), e.target(), data.link)) {
            return Err(PlanError::InvalidTopology(format!(
                "duplicate directed edge ({:?} -> {:?}) on link {}",
                e.source(),
                e.target(),
                data.link
            )));
        }
        // every edge must be registered under its link id
        let Some(reg) = links.get(&data.link) else {
            return Err(PlanError::InvalidTopology(format!(
                "edge on unregistered link {}",
                data.link
            )));
        };
        // one logical link never spans more than two routers
        let endpoints_ok = (e.source() == reg.source && e.target() == reg.target)
            || (e.source() == reg.target && e.target() == reg.source);
        if !endpoints_ok {
            return Err(PlanError::InvalidTopology(format!(
                "link {} spans more than one router pair",
                data.link
            )));
        }
    }
    Ok(())
}

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

//! The graph store: routers, directed edges, logical links, and immutable snapshots.
//!
//! A [`Snapshot`] is the canonical in-memory form of a topology. It is immutable; all queries in
//! this crate operate on a snapshot, and scoped mutations go through [`Snapshot::with_edits`],
//! which produces a *new* snapshot and leaves the input untouched. Cloning a snapshot only bumps a
//! reference count, so it is safe and cheap to hand the same snapshot to many threads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

use crate::types::{
    EdgeId, IndexType, LinkCost, LinkDirection, LinkId, PlanError, RouterId, SnapshotId,
    MAX_LINK_COST, MIN_LINK_COST,
};

mod builder;
pub use builder::TopologyBuilder;

/// A single router (vertex). The handle identifies the router within a snapshot; the remaining
/// attributes are only used for labeling and aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub(crate) handle: String,
    pub(crate) name: String,
    pub(crate) country: Option<String>,
    pub(crate) metadata: BTreeMap<String, String>,
}

impl Router {
    /// Create a new router with the given handle and display name.
    pub fn new(handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: name.into(),
            country: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the country tag.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The caller-assigned handle, unique within a snapshot.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The optional country tag.
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// The metadata map.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Payload of a single directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkData {
    pub(crate) link: LinkId,
    pub(crate) cost: LinkCost,
    /// Interface name on the source router.
    pub source_interface: Option<String>,
    /// Interface name on the target router.
    pub target_interface: Option<String>,
    /// Capacity of this direction in Mbps.
    pub capacity_mbps: Option<u64>,
    /// Observed traffic in this direction in Mbps.
    pub traffic_mbps: Option<f64>,
    /// Administrative status flag. Purely descriptive; failed elements are *absent* from a derived
    /// snapshot instead.
    pub up: bool,
}

impl LinkData {
    pub(crate) fn new(link: LinkId, cost: LinkCost) -> Self {
        Self {
            link,
            cost,
            source_interface: None,
            target_interface: None,
            capacity_mbps: None,
            traffic_mbps: None,
            up: true,
        }
    }

    /// The logical link this directed edge belongs to.
    pub fn link(&self) -> LinkId {
        self.link
    }

    /// The OSPF cost of this direction.
    pub fn cost(&self) -> LinkCost {
        self.cost
    }
}

/// The two directed edges of a logical link, together with its registered endpoints. `forward` is
/// the `source -> target` orientation from when the link was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdges {
    /// The registered source endpoint.
    pub source: RouterId,
    /// The registered target endpoint.
    pub target: RouterId,
    /// The directed edge `source -> target`, if present.
    pub forward: Option<EdgeId>,
    /// The directed edge `target -> source`, if present.
    pub reverse: Option<EdgeId>,
}

impl LinkEdges {
    /// The edge in the given direction, if present.
    pub fn edge(&self, direction: LinkDirection) -> Option<EdgeId> {
        match direction {
            LinkDirection::Forward => self.forward,
            LinkDirection::Reverse => self.reverse,
        }
    }

    /// Whether at least one direction is materialized.
    pub fn is_present(&self) -> bool {
        self.forward.is_some() || self.reverse.is_some()
    }

    /// Iterate over the present directed edges.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> {
        self.forward.into_iter().chain(self.reverse)
    }
}

/// A scoped mutation, applied by [`Snapshot::with_edits`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edit {
    /// Change the cost of one direction of a logical link.
    SetCost {
        /// The logical link.
        link: LinkId,
        /// Which direction to change.
        direction: LinkDirection,
        /// The new cost, in `[1, 65535]`.
        new_cost: LinkCost,
    },
    /// Add a new logical link between two existing routers.
    AddLink {
        /// Source endpoint.
        source: RouterId,
        /// Target endpoint.
        target: RouterId,
        /// Cost of the `source -> target` direction.
        forward_cost: LinkCost,
        /// Cost of the `target -> source` direction; `None` leaves the reverse direction absent.
        reverse_cost: Option<LinkCost>,
    },
    /// Remove a logical link entirely.
    RemoveLink {
        /// The logical link to remove.
        link: LinkId,
    },
    /// Simulate a router failure: the router and all incident edges are absent in the derived
    /// snapshot.
    FailNode {
        /// The router to fail.
        router: RouterId,
    },
    /// Simulate a link failure: both directed edges are absent in the derived snapshot. The link
    /// stays registered so that derived snapshots can still be compared by [`LinkId`].
    FailLink {
        /// The logical link to fail.
        link: LinkId,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SnapshotData {
    pub(crate) graph: StableDiGraph<Router, LinkData, IndexType>,
    pub(crate) handles: HashMap<String, RouterId>,
    pub(crate) links: BTreeMap<LinkId, LinkEdges>,
    /// Router ids sorted by handle bytes. This is the canonical iteration order.
    pub(crate) sorted: Vec<RouterId>,
    pub(crate) next_link: u32,
    pub(crate) id: SnapshotId,
}

/// An immutable topology value. See the [module documentation](self) for the mutation model.
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotData>,
}

impl Snapshot {
    /// Start building a new topology from scratch.
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::new()
    }

    pub(crate) fn from_data(mut data: SnapshotData) -> Self {
        data.sorted = {
            let mut ids: Vec<RouterId> = data.graph.node_indices().collect();
            ids.sort_by(|a, b| data.graph[*a].handle.as_bytes().cmp(data.graph[*b].handle.as_bytes()));
            ids
        };
        data.id = SnapshotId::next();
        Self { inner: Arc::new(data) }
    }

    /// The process-unique identity of this snapshot.
    pub fn id(&self) -> SnapshotId {
        self.inner.id
    }

    /// The number of routers.
    pub fn num_routers(&self) -> usize {
        self.inner.graph.node_count()
    }

    /// The number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.inner.graph.edge_count()
    }

    /// Iterate over all routers in canonical (handle-lexicographic) order.
    pub fn routers(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.inner.sorted.iter().copied()
    }

    /// Look up a router by handle.
    pub fn router_id(&self, handle: &str) -> Option<RouterId> {
        self.inner.handles.get(handle).copied()
    }

    /// Look up a router by handle, or fail with [`PlanError::UnknownRouter`].
    pub fn require_router(&self, handle: &str) -> Result<RouterId, PlanError> {
        self.router_id(handle)
            .ok_or_else(|| PlanError::UnknownRouter(handle.to_string()))
    }

    /// Get the router data for an id.
    pub fn router(&self, id: RouterId) -> Option<&Router> {
        self.inner.graph.node_weight(id)
    }

    /// Whether the router id is present in this snapshot.
    pub fn contains_router(&self, id: RouterId) -> bool {
        self.inner.graph.contains_node(id)
    }

    /// The handle of a router, or `"?"` if the id is not part of this snapshot.
    pub fn handle(&self, id: RouterId) -> &str {
        self.router(id).map(|r| r.handle.as_str()).unwrap_or("?")
    }

    /// Iterate over the outgoing edges of a router as `(edge, target, data)`.
    pub fn out_edges(&self, src: RouterId) -> impl Iterator<Item = (EdgeId, RouterId, &LinkData)> {
        self.inner
            .graph
            .edges(src)
            .map(|e| (e.id(), e.target(), e.weight()))
    }

    /// Iterate over all directed edges as `(edge, source, target, data)`.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, RouterId, RouterId, &LinkData)> {
        self.inner
            .graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target(), e.weight()))
    }

    /// Iterate over all registered logical links.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &LinkEdges)> {
        self.inner.links.iter().map(|(l, e)| (*l, e))
    }

    /// The directed edges of a logical link.
    pub fn link_edges(&self, link: LinkId) -> Option<&LinkEdges> {
        self.inner.links.get(&link)
    }

    /// The directed edges of a logical link as edge ids.
    pub fn edges_for_link(&self, link: LinkId) -> impl Iterator<Item = EdgeId> + '_ {
        self.link_edges(link).into_iter().flat_map(|l| l.edges())
    }

    /// Find the directed edge `src -> dst` that belongs to the given logical link.
    pub fn find_edge(&self, src: RouterId, dst: RouterId, link: LinkId) -> Option<EdgeId> {
        self.inner
            .graph
            .edges_connecting(src, dst)
            .find(|e| e.weight().link == link)
            .map(|e| e.id())
    }

    /// Iterate over the neighbors of a router in the undirected projection: every router connected
    /// by at least one directed edge in either direction. A neighbor may appear more than once.
    pub fn neighbors_undirected(&self, id: RouterId) -> impl Iterator<Item = RouterId> + '_ {
        self.inner.graph.neighbors_undirected(id)
    }

    /// The payload of a directed edge.
    pub fn edge_data(&self, edge: EdgeId) -> Option<&LinkData> {
        self.inner.graph.edge_weight(edge)
    }

    /// The `(source, target)` endpoints of a directed edge.
    pub fn edge_endpoints(&self, edge: EdgeId) -> Option<(RouterId, RouterId)> {
        self.inner.graph.edge_endpoints(edge)
    }

    /// The snapshot-independent identity of a directed edge: `(link, source, target)`. Router ids
    /// are stable across `with_edits`, so this key compares edges across derived snapshots.
    pub fn edge_key(&self, edge: EdgeId) -> Option<(LinkId, RouterId, RouterId)> {
        let (src, dst) = self.edge_endpoints(edge)?;
        Some((self.edge_data(edge)?.link, src, dst))
    }

    /// The per-direction cost table of every registered logical link, keyed by `LinkId`. Used to
    /// compare two snapshots without additional indexing.
    pub fn link_costs(&self) -> BTreeMap<LinkId, (Option<LinkCost>, Option<LinkCost>)> {
        self.inner
            .links
            .iter()
            .map(|(l, e)| {
                let fwd = e.forward.and_then(|id| self.edge_data(id)).map(|d| d.cost);
                let rev = e.reverse.and_then(|id| self.edge_data(id)).map(|d| d.cost);
                (*l, (fwd, rev))
            })
            .collect()
    }

    /// Apply a list of edits and return the derived snapshot. The input snapshot is untouched.
    pub fn with_edits(&self, edits: &[Edit]) -> Result<Snapshot, PlanError> {
        let mut data = (*self.inner).clone();
        for edit in edits {
            apply_edit(&mut data, edit)?;
        }
        builder::validate(&data.graph, &data.links)?;
        log::trace!("derived snapshot from {} with {} edits", self.id(), edits.len());
        Ok(Self::from_data(data))
    }
}

fn check_cost(cost: LinkCost) -> Result<(), PlanError> {
    if (MIN_LINK_COST..=MAX_LINK_COST).contains(&cost) {
        Ok(())
    } else {
        Err(PlanError::InvalidCost(cost))
    }
}

fn apply_edit(data: &mut SnapshotData, edit: &Edit) -> Result<(), PlanError> {
    match edit {
        Edit::SetCost { link, direction, new_cost } => {
            check_cost(*new_cost)?;
            let edges = data.links.get(link).ok_or(PlanError::UnknownLink(*link))?;
            let edge = edges
                .edge(*direction)
                .ok_or(PlanError::UnknownLink(*link))?;
            data.graph
                .edge_weight_mut(edge)
                .expect("link index points at a live edge")
                .cost = *new_cost;
        }
        Edit::AddLink { source, target, forward_cost, reverse_cost } => {
            check_cost(*forward_cost)?;
            if let Some(c) = reverse_cost {
                check_cost(*c)?;
            }
            for r in [source, target] {
                if !data.graph.contains_node(*r) {
                    return Err(PlanError::InvalidTopology(format!(
                        "edge endpoint {:?} does not exist",
                        r
                    )));
                }
            }
            let link = LinkId(data.next_link);
            data.next_link += 1;
            let forward = Some(data.graph.add_edge(*source, *target, LinkData::new(link, *forward_cost)));
            let reverse =
                reverse_cost.map(|c| data.graph.add_edge(*target, *source, LinkData::new(link, c)));
            data.links.insert(
                link,
                LinkEdges { source: *source, target: *target, forward, reverse },
            );
        }
        Edit::RemoveLink { link } => {
            let edges = data.links.remove(link).ok_or(PlanError::UnknownLink(*link))?;
            for e in edges.edges() {
                data.graph.remove_edge(e);
            }
        }
        Edit::FailNode { router } => {
            if !data.graph.contains_node(*router) {
                return Err(PlanError::UnknownRouter(format!("{:?}", router)));
            }
            // clear the link index entries of all incident edges first
            for (_, edges) in data.links.iter_mut() {
                if edges.source == *router || edges.target == *router {
                    edges.forward = None;
                    edges.reverse = None;
                }
            }
            let router_data = data.graph.remove_node(*router).expect("checked above");
            data.handles.remove(&router_data.handle);
        }
        Edit::FailLink { link } => {
            let edges = data.links.get_mut(link).ok_or(PlanError::UnknownLink(*link))?;
            let (fwd, rev) = (edges.forward.take(), edges.reverse.take());
            for e in fwd.into_iter().chain(rev) {
                data.graph.remove_edge(e);
            }
        }
    }
    Ok(())
}

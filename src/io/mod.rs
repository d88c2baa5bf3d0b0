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

//! The topology interchange format: read and write snapshots in the `ospf-topology` JSON shape.
//!
//! Every `link` entry materializes as up to two directed edges sharing one logical link id; a
//! missing `reverse_cost` leaves the reverse direction absent. Duplicate `(source, target)`
//! entries are permitted and become parallel links. Export round-trips the input shape plus any
//! edits applied to the snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::topology::{Router, Snapshot, TopologyBuilder};
use crate::types::{LinkCost, LinkDirection, PlanError};

/// The `type` field every topology file must carry.
pub const TOPOLOGY_TYPE: &str = "ospf-topology";

/// The format version written on export.
pub const TOPOLOGY_VERSION: &str = "1.0";

/// The on-disk topology document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyFile {
    /// Format version.
    pub version: String,
    /// Document type; must be [`TOPOLOGY_TYPE`].
    #[serde(rename = "type")]
    pub kind: String,
    /// The topology payload.
    pub data: TopologyData,
}

/// The payload of a [`TopologyFile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyData {
    /// All routers.
    pub nodes: Vec<NodeSpec>,
    /// All logical links.
    pub links: Vec<LinkSpec>,
}

/// One router entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique handle.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional country tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Capacity metadata of one direction of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySpec {
    /// Total capacity in Mbps.
    pub total_capacity_mbps: u64,
}

/// One logical link entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Source router handle.
    pub source: String,
    /// Target router handle.
    pub target: String,
    /// Cost of the `source -> target` direction.
    pub forward_cost: LinkCost,
    /// Cost of the `target -> source` direction; absent means no reverse edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_cost: Option<LinkCost>,
    /// Interface name on the source router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_interface: Option<String>,
    /// Interface name on the target router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_interface: Option<String>,
    /// Capacity of the forward direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_capacity: Option<CapacitySpec>,
    /// Capacity of the reverse direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_capacity: Option<CapacitySpec>,
    /// Observed traffic on the forward direction in Mbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_traffic_mbps: Option<f64>,
    /// Observed traffic on the reverse direction in Mbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_traffic_mbps: Option<f64>,
}

/// Parse a topology document and build a snapshot from it.
pub fn read_topology(json: &str) -> Result<Snapshot, PlanError> {
    let file: TopologyFile = serde_json::from_str(json)
        .map_err(|e| PlanError::InvalidTopology(format!("malformed topology document: {e}")))?;
    snapshot_from_file(&file)
}

/// Build a snapshot from an already-parsed topology document.
pub fn snapshot_from_file(file: &TopologyFile) -> Result<Snapshot, PlanError> {
    if file.kind != TOPOLOGY_TYPE {
        return Err(PlanError::InvalidTopology(format!(
            "unexpected document type {:?} (expected {:?})",
            file.kind, TOPOLOGY_TYPE
        )));
    }

    let mut builder = TopologyBuilder::new();
    for node in &file.data.nodes {
        let mut router = Router::new(&node.id, &node.name);
        if let Some(country) = &node.country {
            router = router.with_country(country);
        }
        for (k, v) in &node.metadata {
            router = router.with_metadata(k, v);
        }
        builder.add_router_with(router)?;
    }

    for spec in &file.data.links {
        let source = builder
            .router_id(&spec.source)
            .ok_or_else(|| PlanError::UnknownRouter(spec.source.clone()))?;
        let target = builder
            .router_id(&spec.target)
            .ok_or_else(|| PlanError::UnknownRouter(spec.target.clone()))?;
        let link = builder.add_link(source, target, spec.forward_cost, spec.reverse_cost)?;

        if let Some(fwd) = builder.edge_mut(link, LinkDirection::Forward) {
            fwd.source_interface = spec.source_interface.clone();
            fwd.target_interface = spec.target_interface.clone();
            fwd.capacity_mbps = spec.source_capacity.map(|c| c.total_capacity_mbps);
            fwd.traffic_mbps = spec.forward_traffic_mbps;
        }
        if let Some(rev) = builder.edge_mut(link, LinkDirection::Reverse) {
            rev.source_interface = spec.target_interface.clone();
            rev.target_interface = spec.source_interface.clone();
            rev.capacity_mbps = spec.target_capacity.map(|c| c.total_capacity_mbps);
            rev.traffic_mbps = spec.reverse_traffic_mbps;
        }
    }

    builder.commit()
}

/// Export a snapshot into the topology document shape.
pub fn topology_to_file(snapshot: &Snapshot) -> TopologyFile {
    let nodes = snapshot
        .routers()
        .filter_map(|id| snapshot.router(id))
        .map(|r| NodeSpec {
            id: r.handle().to_string(),
            name: r.name().to_string(),
            country: r.country().map(String::from),
            metadata: r.metadata().clone(),
        })
        .collect();

    let mut links = Vec::new();
    for (_, edges) in snapshot.links() {
        // failed links have no materialized direction and are absent from the export
        let (fwd, rev, source, target) = match (edges.forward, edges.reverse) {
            (Some(f), r) => (Some(f), r, edges.source, edges.target),
            // only the reverse direction exists: export it as the forward orientation
            (None, Some(r)) => (Some(r), None, edges.target, edges.source),
            (None, None) => continue,
        };
        let fwd_data = fwd.and_then(|e| snapshot.edge_data(e)).expect("present direction");
        let rev_data = rev.and_then(|e| snapshot.edge_data(e));
        links.push(LinkSpec {
            source: snapshot.handle(source).to_string(),
            target: snapshot.handle(target).to_string(),
            forward_cost: fwd_data.cost(),
            reverse_cost: rev_data.map(|d| d.cost()),
            source_interface: fwd_data.source_interface.clone(),
            target_interface: fwd_data.target_interface.clone(),
            source_capacity: fwd_data.capacity_mbps.map(|c| CapacitySpec { total_capacity_mbps: c }),
            target_capacity: rev_data
                .and_then(|d| d.capacity_mbps)
                .map(|c| CapacitySpec { total_capacity_mbps: c }),
            forward_traffic_mbps: fwd_data.traffic_mbps,
            reverse_traffic_mbps: rev_data.and_then(|d| d.traffic_mbps),
        });
    }

    TopologyFile {
        version: TOPOLOGY_VERSION.to_string(),
        kind: TOPOLOGY_TYPE.to_string(),
        data: TopologyData { nodes, links },
    }
}

/// Export a snapshot as a JSON string.
pub fn write_topology(snapshot: &Snapshot) -> String {
    serde_json::to_string_pretty(&topology_to_file(snapshot)).expect("the shape always serializes")
}

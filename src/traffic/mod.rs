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

//! The traffic and utilization model: map a traffic matrix onto shortest paths (splitting demand
//! equally across ECMP branches) and derive per-edge load and utilization.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::{As, Same};

use crate::spf::shortest_paths;
use crate::topology::{Router, Snapshot};
use crate::types::{EdgeId, LinkId, PlanError, RouterId, Warning};

/// Capacity assumed for edges without capacity metadata, in Mbps.
pub const DEFAULT_CAPACITY_MBPS: u64 = 10_000;

/// Utilization at or above this ratio counts as congested.
pub const CONGESTION_THRESHOLD: f64 = 0.80;

/// Utilization at or below this ratio counts as underutilized.
pub const UNDERUTILIZATION_THRESHOLD: f64 = 0.20;

/// A traffic matrix: demand in Mbps per ordered `(source, destination)` handle pair. Zero and
/// negative entries are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficMatrix {
    #[serde(with = "As::<Vec<(Same, Same)>>")]
    demands: BTreeMap<(String, String), f64>,
}

impl TrafficMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add demand between two routers. Demand accumulates over repeated calls; entries that end
    /// up non-positive are dropped.
    pub fn add(&mut self, src: impl Into<String>, dst: impl Into<String>, mbps: f64) {
        let key = (src.into(), dst.into());
        let entry = self.demands.entry(key.clone()).or_insert(0.0);
        *entry += mbps;
        if *entry <= 0.0 {
            self.demands.remove(&key);
        }
    }

    /// The demand between two routers, or 0.
    pub fn get(&self, src: &str, dst: &str) -> f64 {
        self.demands.get(&(src.to_string(), dst.to_string())).copied().unwrap_or(0.0)
    }

    /// Iterate over all demands as `(source, destination, mbps)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.demands.iter().map(|((s, d), m)| (s.as_str(), d.as_str(), *m))
    }

    /// The number of non-zero entries.
    pub fn len(&self) -> usize {
        self.demands.len()
    }

    /// Whether the matrix has no entries.
    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }

    /// Total demand over all entries, in Mbps.
    pub fn total_mbps(&self) -> f64 {
        self.demands.values().sum()
    }
}

/// Load and utilization of a single directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUtilization {
    /// The logical link the edge belongs to.
    pub link: LinkId,
    /// Source router handle.
    pub source: String,
    /// Target router handle.
    pub target: String,
    /// The capacity used for the ratio (the default if no metadata was present).
    pub capacity_mbps: u64,
    /// Accumulated traffic in Mbps.
    pub traffic_mbps: f64,
    /// `traffic / capacity`, clamped to `[0, 1]`.
    pub utilization_ratio: f64,
}

/// The result of [`utilization`]: per-edge loads plus aggregates.
///
/// The aggregates `max_util` and `avg_util` are computed from the *unclamped* ratios, so the
/// magnitude of an overload stays observable even though the per-edge ratio saturates at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    /// Per-edge utilization, ordered by `(source, target, link)`.
    pub edges: Vec<EdgeUtilization>,
    /// Highest unclamped utilization over all edges.
    pub max_util: f64,
    /// Mean unclamped utilization over all edges.
    pub avg_util: f64,
    /// Number of edges with utilization at or above [`CONGESTION_THRESHOLD`].
    pub congested_edges: usize,
    /// Number of edges with utilization at or below [`UNDERUTILIZATION_THRESHOLD`].
    pub underutilized_edges: usize,
    /// Non-fatal warnings (missing capacity metadata on loaded edges).
    pub notes: Vec<Warning>,
}

impl UtilizationReport {
    /// The utilization entry for the edge `source -> target` on the given link.
    pub fn edge(&self, source: &str, target: &str, link: LinkId) -> Option<&EdgeUtilization> {
        self.edges
            .iter()
            .find(|e| e.link == link && e.source == source && e.target == target)
    }

    /// The most utilized edge, if any edge exists.
    pub fn most_utilized(&self) -> Option<&EdgeUtilization> {
        self.edges.iter().max_by(|a, b| {
            let ra = a.traffic_mbps / a.capacity_mbps as f64;
            let rb = b.traffic_mbps / b.capacity_mbps as f64;
            ra.partial_cmp(&rb).expect("capacities are positive")
        })
    }
}

/// Spread a traffic matrix over the shortest paths of a snapshot and compute per-edge load and
/// utilization. Demand between unreachable pairs is dropped (in-band, not an error); unknown
/// router handles in the matrix are an error.
pub fn utilization(snapshot: &Snapshot, matrix: &TrafficMatrix) -> Result<UtilizationReport, PlanError> {
    // group demands by source so each source needs one SPF run
    let mut by_source: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();
    for (src, dst, mbps) in matrix.iter() {
        snapshot.require_router(src)?;
        snapshot.require_router(dst)?;
        by_source.entry(src).or_default().push((dst, mbps));
    }

    let sources: Vec<(&str, Vec<(&str, f64)>)> = by_source.into_iter().collect();
    let per_source: Vec<HashMap<EdgeId, f64>> = sources
        .par_iter()
        .map(|(src, demands)| {
            let src_id = snapshot.require_router(src)?;
            let table = shortest_paths(snapshot, src_id)?;
            let mut loads: HashMap<EdgeId, f64> = HashMap::new();
            for (dst, mbps) in demands {
                let dst_id = snapshot.require_router(dst)?;
                let Some(path) = table.reconstruct(dst_id) else {
                    log::trace!("dropping {} Mbps {} -> {}: unreachable", mbps, src, dst);
                    continue;
                };
                spread_demand(snapshot, &table, src_id, &path.edge_set, *mbps, &mut loads);
            }
            Ok(loads)
        })
        .collect::<Result<_, PlanError>>()?;

    let mut loads: HashMap<EdgeId, f64> = HashMap::new();
    for partial in per_source {
        for (edge, mbps) in partial {
            *loads.entry(edge).or_default() += mbps;
        }
    }

    Ok(build_report(snapshot, &loads))
}

/// Propagate one demand through the ECMP DAG towards the destination, splitting equally at every
/// branching node, and accumulate the per-edge shares.
fn spread_demand(
    snapshot: &Snapshot,
    table: &crate::spf::SpfTable,
    source: RouterId,
    edge_set: &std::collections::BTreeSet<EdgeId>,
    mbps: f64,
    loads: &mut HashMap<EdgeId, f64>,
) {
    // forward adjacency of the DAG towards this destination
    let mut out: HashMap<RouterId, Vec<(EdgeId, RouterId)>> = HashMap::new();
    let mut nodes: Vec<RouterId> = Vec::new();
    for edge in edge_set {
        let (u, v) = snapshot.edge_endpoints(*edge).expect("edge of a live path");
        out.entry(u).or_default().push((*edge, v));
        nodes.push(u);
        nodes.push(v);
    }
    nodes.sort_unstable();
    nodes.dedup();
    nodes.sort_by_key(|r| table.node(*r).map(|n| n.cost).unwrap_or(0));

    let mut inflow: HashMap<RouterId, f64> = HashMap::from([(source, mbps)]);
    // edge costs are >= 1, so processing in cost order settles each node before its successors
    for node in nodes {
        let Some(flow) = inflow.get(&node).copied() else {
            continue;
        };
        let Some(branches) = out.get(&node) else {
            continue;
        };
        let share = flow / branches.len() as f64;
        for (edge, next) in branches {
            *loads.entry(*edge).or_default() += share;
            *inflow.entry(*next).or_default() += share;
        }
    }
}

fn build_report(snapshot: &Snapshot, loads: &HashMap<EdgeId, f64>) -> UtilizationReport {
    let mut notes = Vec::new();
    let mut edges: Vec<EdgeUtilization> = snapshot
        .edges()
        .map(|(edge, src, dst, data)| {
            let traffic_mbps = loads.get(&edge).copied().unwrap_or(0.0);
            let capacity_mbps = data.capacity_mbps.unwrap_or(DEFAULT_CAPACITY_MBPS);
            if data.capacity_mbps.is_none() && traffic_mbps > 0.0 {
                notes.push(Warning::CapacityMissing {
                    link: data.link(),
                    source_handle: snapshot.handle(src).to_string(),
                    target: snapshot.handle(dst).to_string(),
                    assumed_mbps: DEFAULT_CAPACITY_MBPS,
                });
            }
            let ratio = traffic_mbps / capacity_mbps as f64;
            EdgeUtilization {
                link: data.link(),
                source: snapshot.handle(src).to_string(),
                target: snapshot.handle(dst).to_string(),
                capacity_mbps,
                traffic_mbps,
                utilization_ratio: ratio.clamp(0.0, 1.0),
            }
        })
        .collect();
    edges.sort_by(|a, b| {
        (&a.source, &a.target, a.link).cmp(&(&b.source, &b.target, b.link))
    });
    notes.sort();
    notes.dedup();

    let raw = |e: &EdgeUtilization| e.traffic_mbps / e.capacity_mbps as f64;
    let max_util = edges.iter().map(raw).fold(0.0, f64::max);
    let avg_util = if edges.is_empty() {
        0.0
    } else {
        edges.iter().map(raw).sum::<f64>() / edges.len() as f64
    };
    let congested_edges = edges.iter().filter(|e| raw(e) >= CONGESTION_THRESHOLD).count();
    let underutilized_edges = edges
        .iter()
        .filter(|e| raw(e) <= UNDERUTILIZATION_THRESHOLD)
        .count();

    UtilizationReport {
        edges,
        max_util,
        avg_util,
        congested_edges,
        underutilized_edges,
        notes,
    }
}

/// The built-in synthetic traffic models.
pub enum TrafficModel {
    /// The same demand between every ordered pair.
    Uniform {
        /// Demand per pair in Mbps.
        base_mbps: f64,
    },
    /// Demand proportional to the square root of the product of the `population` metadata of the
    /// two routers (missing population counts as 1): `sqrt(p_src * p_dst) * base / 10`.
    Population {
        /// Base demand in Mbps.
        base_mbps: f64,
    },
    /// Demand inversely proportional to the shortest-path cost between the pair.
    Distance {
        /// Demand at cost 1, in Mbps.
        base_mbps: f64,
    },
    /// Caller-supplied demand function; non-positive results are omitted.
    Custom(Box<dyn Fn(&Router, &Router) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for TrafficModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform { base_mbps } => write!(f, "Uniform {{ base_mbps: {base_mbps} }}"),
            Self::Population { base_mbps } => write!(f, "Population {{ base_mbps: {base_mbps} }}"),
            Self::Distance { base_mbps } => write!(f, "Distance {{ base_mbps: {base_mbps} }}"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Generate a synthetic traffic matrix for a snapshot.
pub fn synthetic_matrix(snapshot: &Snapshot, model: &TrafficModel) -> Result<TrafficMatrix, PlanError> {
    let mut matrix = TrafficMatrix::new();
    match model {
        TrafficModel::Uniform { base_mbps } => {
            for src in snapshot.routers() {
                for dst in snapshot.routers() {
                    if src != dst {
                        matrix.add(snapshot.handle(src), snapshot.handle(dst), *base_mbps);
                    }
                }
            }
        }
        TrafficModel::Population { base_mbps } => {
            let population = |r: RouterId| -> f64 {
                snapshot
                    .router(r)
                    .and_then(|x| x.metadata().get("population"))
                    .and_then(|p| p.parse::<f64>().ok())
                    .unwrap_or(1.0)
            };
            for src in snapshot.routers() {
                for dst in snapshot.routers() {
                    if src != dst {
                        let demand = (population(src) * population(dst)).sqrt() * base_mbps / 10.0;
                        matrix.add(snapshot.handle(src), snapshot.handle(dst), demand);
                    }
                }
            }
        }
        TrafficModel::Distance { base_mbps } => {
            for src in snapshot.routers() {
                let table = shortest_paths(snapshot, src)?;
                for dst in snapshot.routers() {
                    if src == dst {
                        continue;
                    }
                    if let Some(cost) = table.cost(dst) {
                        matrix.add(
                            snapshot.handle(src),
                            snapshot.handle(dst),
                            base_mbps / cost as f64,
                        );
                    }
                }
            }
        }
        TrafficModel::Custom(f) => {
            for src in snapshot.routers() {
                for dst in snapshot.routers() {
                    if src == dst {
                        continue;
                    }
                    let demand = f(
                        snapshot.router(src).expect("iterating live routers"),
                        snapshot.router(dst).expect("iterating live routers"),
                    );
                    if demand > 0.0 {
                        matrix.add(snapshot.handle(src), snapshot.handle(dst), demand);
                    }
                }
            }
        }
    }
    Ok(matrix)
}

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

//! The cost optimizer: bounded greedy local search over integer link costs, minimizing a selected
//! objective under a traffic matrix.
//!
//! Every iteration picks the most congested non-protected edge, enumerates alternate links that
//! paths over that edge could take if they became cheaper, tries the smallest permitted cost
//! decrement on each, and accepts the single best improvement. The search stops when the
//! objective stalls, when a constraint caps the edits, or after a fixed iteration budget.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::connectivity::connectivity;
use crate::spf::shortest_paths;
use crate::topology::{Edit, Snapshot};
use crate::traffic::{utilization, TrafficMatrix, UtilizationReport};
use crate::types::{
    CancellationToken, EdgeId, LinkCost, LinkDirection, LinkId, PlanError, ProgressSink,
    MAX_LINK_COST, MIN_LINK_COST,
};

/// Iteration budget of the greedy search.
const MAX_ITERATIONS: usize = 100;

/// Number of consecutive non-improving iterations after which the search stops.
const STALL_LIMIT: usize = 5;

/// Number of connectivity-regression rejections after which the search stops.
const REJECTION_LIMIT: usize = 2;

/// The objective minimized by [`optimize`].
pub enum Goal {
    /// Minimize the maximum (unclamped) edge utilization.
    Balance,
    /// Minimize the average edge utilization, as a latency proxy.
    Latency,
    /// Maximize country-pair path diversity (inverted into a minimization).
    Diversity,
    /// A caller-supplied objective; smaller is better.
    Custom(Box<dyn Fn(&Snapshot, &UtilizationReport) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balance => f.write_str("Balance"),
            Self::Latency => f.write_str("Latency"),
            Self::Diversity => f.write_str("Diversity"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Bounds on what the optimizer may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Per-edit bound on the relative cost change, in `(0, 1]`.
    pub max_cost_change_percent: f64,
    /// Absolute cap on the number of accepted edits.
    pub max_changes_count: usize,
    /// Logical links that must not change.
    pub protected_links: BTreeSet<LinkId>,
    /// Lower clamp for any new cost.
    pub min_cost: LinkCost,
    /// Upper clamp for any new cost.
    pub max_cost: LinkCost,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_cost_change_percent: 1.0,
            max_changes_count: 10,
            protected_links: BTreeSet::new(),
            min_cost: MIN_LINK_COST,
            max_cost: MAX_LINK_COST,
        }
    }
}

/// One accepted cost edit, in order of acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostChange {
    /// The logical link that changed.
    pub link: LinkId,
    /// The direction of the changed edge.
    pub direction: LinkDirection,
    /// Cost before the edit.
    pub old_cost: LinkCost,
    /// Cost after the edit.
    pub new_cost: LinkCost,
    /// Number of traffic-matrix flows whose canonical path changed due to this edit.
    pub affected_flows: usize,
}

/// The result of [`optimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// The accepted edits, in order of acceptance. Empty if no improvement was found.
    pub changes: Vec<CostChange>,
    /// Utilization before any edit.
    pub before: UtilizationReport,
    /// Utilization after all accepted edits.
    pub after: UtilizationReport,
    /// Number of search iterations performed.
    pub iterations: usize,
    /// `true` iff the search terminated for a reason other than the iteration budget.
    pub converged: bool,
}

/// Run the bounded greedy search. The baseline snapshot is untouched; the returned
/// [`OptimizationResult`] references only costs and handles.
///
/// A search that finds no improvement is *not* an error: it returns an empty change list with
/// `converged = true`.
pub fn optimize(
    baseline: &Snapshot,
    matrix: &TrafficMatrix,
    goal: &Goal,
    constraints: &Constraints,
    token: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<OptimizationResult, PlanError> {
    if !(0.0..=1.0).contains(&constraints.max_cost_change_percent)
        || constraints.max_cost_change_percent == 0.0
    {
        return Err(PlanError::ConstraintViolation(format!(
            "max_cost_change_percent must be in (0, 1], got {}",
            constraints.max_cost_change_percent
        )));
    }

    let before = utilization(baseline, matrix)?;
    let mut current = baseline.clone();
    let mut current_report = before.clone();
    let mut current_obj = evaluate(goal, &current, matrix, &current_report)?;
    let baseline_components = connectivity(&current).num_components();

    let mut changes: Vec<CostChange> = Vec::new();
    let mut stall = 0usize;
    let mut rejections = 0usize;
    let mut rejected: BTreeSet<(LinkId, LinkDirection, LinkCost)> = BTreeSet::new();
    let mut iterations = 0usize;
    let mut converged = false;

    for iteration in 0..MAX_ITERATIONS {
        iterations = iteration + 1;
        token.check()?;
        progress.report(iteration, MAX_ITERATIONS);

        if changes.len() >= constraints.max_changes_count {
            log::debug!("optimizer: change budget exhausted after {} edits", changes.len());
            converged = true;
            break;
        }

        // (a) the most congested edge that is allowed to matter
        let Some(hot) = current_report
            .edges
            .iter()
            .filter(|e| e.traffic_mbps > 0.0)
            .filter(|e| !constraints.protected_links.contains(&e.link))
            .max_by_key(|e| NotNan::new(e.traffic_mbps / e.capacity_mbps as f64).unwrap_or_default())
        else {
            converged = true;
            break;
        };
        let hot_src = current.require_router(&hot.source)?;
        let hot_dst = current.require_router(&hot.target)?;
        let Some(hot_edge) = current.find_edge(hot_src, hot_dst, hot.link) else {
            converged = true;
            break;
        };

        // (b) alternate links that flows over the hot edge could use instead
        let candidates = candidate_edits(&current, matrix, hot_edge, constraints, &rejected)?;
        if candidates.is_empty() {
            log::debug!("optimizer: no candidate edits around {} -> {}", hot.source, hot.target);
            converged = true;
            break;
        }

        // (c) try each candidate and keep the single best improvement
        let mut best: Option<(NotNan<f64>, Snapshot, UtilizationReport, CandidateEdit)> = None;
        for cand in candidates {
            let derived = current.with_edits(&[Edit::SetCost {
                link: cand.link,
                direction: cand.direction,
                new_cost: cand.new_cost,
            }])?;
            let report = utilization(&derived, matrix)?;
            let obj = evaluate(goal, &derived, matrix, &report)?;
            if obj < current_obj && best.as_ref().map(|(b, ..)| obj < *b).unwrap_or(true) {
                best = Some((obj, derived, report, cand));
            }
        }

        let Some((obj, derived, report, cand)) = best else {
            // (d) nothing improves the objective
            stall += 1;
            if stall >= STALL_LIMIT {
                converged = true;
                break;
            }
            continue;
        };

        // connectivity must not regress; cost edits cannot break it, but guard the invariant
        if connectivity(&derived).num_components() > baseline_components {
            rejections += 1;
            rejected.insert((cand.link, cand.direction, cand.new_cost));
            log::debug!(
                "optimizer: rejecting edit on {} ({}): connectivity regression",
                cand.link,
                cand.direction
            );
            if rejections >= REJECTION_LIMIT {
                converged = true;
                break;
            }
            continue;
        }

        let affected_flows = count_affected_flows(&current, &derived, matrix)?;
        log::debug!(
            "optimizer: accept {} {} {} -> {} (objective {} -> {})",
            cand.link,
            cand.direction,
            cand.old_cost,
            cand.new_cost,
            current_obj,
            obj
        );
        changes.push(CostChange {
            link: cand.link,
            direction: cand.direction,
            old_cost: cand.old_cost,
            new_cost: cand.new_cost,
            affected_flows,
        });
        current = derived;
        current_report = report;
        current_obj = obj;
        stall = 0;
    }

    let after = utilization(&current, matrix)?;
    Ok(OptimizationResult { changes, before, after, iterations, converged })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEdit {
    link: LinkId,
    direction: LinkDirection,
    old_cost: LinkCost,
    new_cost: LinkCost,
}

/// Enumerate candidate cost decrements: for every flow whose optimal DAG contains `hot_edge`,
/// consider the out-edges adjacent to that DAG which are not part of it. Lowering such an edge's
/// cost is what can pull the flow onto an alternative path.
fn candidate_edits(
    snapshot: &Snapshot,
    matrix: &TrafficMatrix,
    hot_edge: EdgeId,
    constraints: &Constraints,
    rejected: &BTreeSet<(LinkId, LinkDirection, LinkCost)>,
) -> Result<Vec<CandidateEdit>, PlanError> {
    let mut by_source: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (src, dst, _) in matrix.iter() {
        by_source.entry(src).or_default().push(dst);
    }

    let mut candidates: BTreeMap<(LinkId, LinkDirection, LinkCost), CandidateEdit> =
        BTreeMap::new();
    for (src, dsts) in by_source {
        let table = shortest_paths(snapshot, snapshot.require_router(src)?)?;
        for dst in dsts {
            let Some(path) = table.reconstruct(snapshot.require_router(dst)?) else {
                continue;
            };
            if !path.edge_set.contains(&hot_edge) {
                continue;
            }
            // nodes of the DAG: every endpoint of an edge in the edge set
            let dag_nodes: BTreeSet<_> = path
                .edge_set
                .iter()
                .filter_map(|e| snapshot.edge_endpoints(*e))
                .flat_map(|(u, v)| [u, v])
                .collect();
            for node in dag_nodes {
                for (edge, _, data) in snapshot.out_edges(node) {
                    if path.edge_set.contains(&edge)
                        || constraints.protected_links.contains(&data.link())
                    {
                        continue;
                    }
                    let old_cost = data.cost();
                    let direction = edge_direction(snapshot, data.link(), edge);
                    for new_cost in decrements(old_cost, constraints) {
                        if rejected.contains(&(data.link(), direction, new_cost)) {
                            continue;
                        }
                        candidates
                            .entry((data.link(), direction, new_cost))
                            .or_insert(CandidateEdit {
                                link: data.link(),
                                direction,
                                old_cost,
                                new_cost,
                            });
                    }
                }
            }
        }
    }
    Ok(candidates.into_values().collect())
}

/// The permitted decrements for a cost: the smallest step (one, or 5% of the current cost,
/// whichever is larger) and the deepest drop the constraints allow. Trying both lets the search
/// cross plateaus where a single step changes no path.
fn decrements(cost: LinkCost, constraints: &Constraints) -> Vec<LinkCost> {
    let step = (cost / 20).max(1);
    // the small bias keeps float rounding from forbidding an exactly-allowed drop
    let floor_relative =
        (cost as f64 * (1.0 - constraints.max_cost_change_percent) - 1e-9).ceil() as LinkCost;
    let floor = floor_relative.max(constraints.min_cost);
    let small = cost.saturating_sub(step).max(floor);
    let mut out = Vec::new();
    if small < cost {
        out.push(small);
    }
    if floor < cost && floor != small {
        out.push(floor);
    }
    out
}

fn edge_direction(snapshot: &Snapshot, link: LinkId, edge: EdgeId) -> LinkDirection {
    match snapshot.link_edges(link) {
        Some(edges) if edges.forward == Some(edge) => LinkDirection::Forward,
        _ => LinkDirection::Reverse,
    }
}

/// Evaluate the goal objective; smaller is better.
fn evaluate(
    goal: &Goal,
    snapshot: &Snapshot,
    matrix: &TrafficMatrix,
    report: &UtilizationReport,
) -> Result<NotNan<f64>, PlanError> {
    let value = match goal {
        Goal::Balance => report.max_util,
        Goal::Latency => report.avg_util,
        Goal::Diversity => -path_diversity(snapshot, matrix)?,
        Goal::Custom(f) => f(snapshot, report),
    };
    NotNan::new(value).map_err(|_| {
        PlanError::ConstraintViolation("objective evaluated to NaN".to_string())
    })
}

/// Average number of distinct logical links used between each pair of countries. More distinct
/// links means more failure diversity.
fn path_diversity(snapshot: &Snapshot, matrix: &TrafficMatrix) -> Result<f64, PlanError> {
    let mut by_source: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (src, dst, _) in matrix.iter() {
        by_source.entry(src).or_default().push(dst);
    }
    let mut links_per_pair: BTreeMap<(String, String), BTreeSet<LinkId>> = BTreeMap::new();
    for (src, dsts) in by_source {
        let src_id = snapshot.require_router(src)?;
        let table = shortest_paths(snapshot, src_id)?;
        let src_country = country_of(snapshot, src_id);
        for dst in dsts {
            let dst_id = snapshot.require_router(dst)?;
            let Some(path) = table.reconstruct(dst_id) else {
                continue;
            };
            let links = links_per_pair
                .entry((src_country.clone(), country_of(snapshot, dst_id)))
                .or_default();
            links.extend(
                path.edge_set.iter().filter_map(|e| snapshot.edge_data(*e)).map(|d| d.link()),
            );
        }
    }
    if links_per_pair.is_empty() {
        return Ok(0.0);
    }
    let total: usize = links_per_pair.values().map(|s| s.len()).sum();
    Ok(total as f64 / links_per_pair.len() as f64)
}

fn country_of(snapshot: &Snapshot, id: crate::types::RouterId) -> String {
    snapshot
        .router(id)
        .and_then(|r| r.country())
        .unwrap_or("unknown")
        .to_string()
}

/// Count the traffic-matrix flows whose optimal edge set differs between the two snapshots.
/// Edges are compared by `(link, source, target)`, which is stable across derived snapshots.
fn count_affected_flows(
    old: &Snapshot,
    new: &Snapshot,
    matrix: &TrafficMatrix,
) -> Result<usize, PlanError> {
    let edge_keys = |snapshot: &Snapshot, path: &crate::spf::PathResult| {
        path.edge_set
            .iter()
            .filter_map(|e| snapshot.edge_key(*e))
            .collect::<BTreeSet<_>>()
    };
    let mut by_source: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (src, dst, _) in matrix.iter() {
        by_source.entry(src).or_default().push(dst);
    }
    let mut affected = 0;
    for (src, dsts) in by_source {
        let old_table = shortest_paths(old, old.require_router(src)?)?;
        let new_table = shortest_paths(new, new.require_router(src)?)?;
        for dst in dsts {
            let old_path = old_table
                .reconstruct(old.require_router(dst)?)
                .map(|p| edge_keys(old, &p));
            let new_path = new_table
                .reconstruct(new.require_router(dst)?)
                .map(|p| edge_keys(new, &p));
            if old_path != new_path {
                affected += 1;
            }
        }
    }
    Ok(affected)
}

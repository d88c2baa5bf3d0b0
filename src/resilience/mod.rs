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

//! Single-point-of-failure enumeration and the resilience score.
//!
//! Every logical link and every router is failed in turn (on a derived snapshot; the input is
//! untouched) and the resulting partition structure is compared against the baseline. The
//! resilience score combines the SPOF counts with topology diversity and capacity headroom into
//! an explainable 0..10 value.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::connectivity::components;
use crate::topology::{Edit, Snapshot};
use crate::types::{CancellationToken, LinkId, PlanError};

/// Severity of a single point of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpofSeverity {
    /// Any remaining case.
    Low,
    /// Isolates at least one node, or affects 10-25% of pairs.
    Medium,
    /// Partitions the graph into exactly two components, or affects 25-50% of pairs.
    High,
    /// Partitions the graph into more than two components, or affects more than 50% of pairs.
    Critical,
}

/// The failed element a SPOF refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpofElement {
    /// A router, by handle.
    Node(String),
    /// A logical link.
    Link(LinkId),
}

/// What to do about a SPOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpofRecommendation {
    /// Add a parallel or alternative path around the element.
    AddRedundantPath,
    /// Attach the isolated site to a second upstream.
    ConnectIsolatedSite,
    /// The element is a structural hub; reinforce it or split its role.
    ReinforceCoreElement,
}

/// A single point of failure: an element whose removal partitions the graph or isolates a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spof {
    /// The failed element.
    pub element: SpofElement,
    /// Severity classification.
    pub severity: SpofSeverity,
    /// Number of ordered router pairs that lose connectivity.
    pub paths_affected: usize,
    /// Number of routers that end up isolated.
    pub nodes_isolated: usize,
    /// Whether the failure splits the surviving graph into multiple components.
    pub causes_partition: bool,
    /// Remediation hint.
    pub recommendation: SpofRecommendation,
}

/// The result of [`spof_analysis`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpofReport {
    /// The top-K SPOFs, ordered by severity, then by `paths_affected`, both descending.
    pub spofs: Vec<Spof>,
    /// How many elements (links plus nodes) were evaluated.
    pub elements_evaluated: usize,
    /// Full count of critical SPOFs (not limited to the top-K).
    pub num_critical: usize,
    /// Full count of high SPOFs.
    pub num_high: usize,
    /// Full count of medium SPOFs.
    pub num_medium: usize,
    /// Full count of low SPOFs.
    pub num_low: usize,
}

/// Verbal band of the overall resilience score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResilienceLevel {
    /// `overall < 3`
    Critical,
    /// `3 <= overall < 5`
    Low,
    /// `5 <= overall < 7`
    Medium,
    /// `7 <= overall < 9`
    High,
    /// `overall >= 9`
    Excellent,
}

impl ResilienceLevel {
    fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Excellent
        } else if score >= 7.0 {
            Self::High
        } else if score >= 5.0 {
            Self::Medium
        } else if score >= 3.0 {
            Self::Low
        } else {
            Self::Critical
        }
    }
}

/// The three sub-scores of the resilience score, each in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResilienceBreakdown {
    /// Penalized by SPOF counts.
    pub redundancy: f64,
    /// Rewarded by country spread and edge density per country.
    pub diversity: f64,
    /// Derived from average utilization where capacity metadata exists.
    pub capacity: f64,
}

/// The overall resilience assessment of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceScore {
    /// Weighted overall score in `[0, 10]`, rounded to one decimal.
    pub overall: f64,
    /// The sub-scores.
    pub breakdown: ResilienceBreakdown,
    /// Verbal band of `overall`.
    pub level: ResilienceLevel,
    /// Suggested improvements, most pressing first.
    pub improvements: Vec<String>,
}

/// Default number of SPOFs returned by [`spof_analysis`].
pub const DEFAULT_TOP_K: usize = 20;

/// Enumerate single points of failure by failing every logical link and every router in turn.
///
/// The failures run in parallel on derived snapshots; the input snapshot is untouched. Severity
/// percentages are taken relative to the squared router count, so that a failed router's own
/// pairs weigh in as well.
pub fn spof_analysis(
    snapshot: &Snapshot,
    top_k: usize,
    token: &CancellationToken,
) -> Result<SpofReport, PlanError> {
    let num_routers = snapshot.num_routers();
    let baseline_comps = components(snapshot);
    let baseline_comp_count = baseline_comps.len();
    let baseline_isolated = baseline_comps.iter().filter(|c| c.len() == 1).count();
    let baseline_pairs = connected_pairs(&baseline_comps);
    // denominator for the severity percentages
    let total = (num_routers * num_routers).max(1);

    let link_elements: Vec<SpofElement> = snapshot
        .links()
        .filter(|(_, e)| e.is_present())
        .map(|(l, _)| SpofElement::Link(l))
        .collect();
    let node_elements: Vec<SpofElement> = snapshot
        .routers()
        .map(|r| SpofElement::Node(snapshot.handle(r).to_string()))
        .collect();
    let elements: Vec<SpofElement> = link_elements.into_iter().chain(node_elements).collect();
    let elements_evaluated = elements.len();

    let mut spofs: Vec<Spof> = elements
        .into_par_iter()
        .map(|element| {
            token.check()?;
            let edit = match &element {
                SpofElement::Link(l) => Edit::FailLink { link: *l },
                SpofElement::Node(h) => Edit::FailNode {
                    router: snapshot.require_router(h)?,
                },
            };
            let failed = snapshot.with_edits(&[edit])?;
            let comps = components(&failed);
            let surviving_pairs = connected_pairs(&comps);
            let paths_affected = baseline_pairs.saturating_sub(surviving_pairs);
            let nodes_isolated = comps.iter().filter(|c| c.len() == 1).count();
            let causes_partition = comps.len() > baseline_comp_count;

            // an element is a SPOF iff failing it partitions the graph or isolates a node
            if !causes_partition && nodes_isolated <= baseline_isolated {
                return Ok(None);
            }

            let share = paths_affected as f64 / total as f64;
            let severity = if comps.len() > 2 || share > 0.5 {
                SpofSeverity::Critical
            } else if comps.len() == 2 || share >= 0.25 {
                SpofSeverity::High
            } else if nodes_isolated > 0 || share >= 0.10 {
                SpofSeverity::Medium
            } else {
                SpofSeverity::Low
            };

            let recommendation = match (&element, nodes_isolated) {
                (SpofElement::Link(_), _) => SpofRecommendation::AddRedundantPath,
                (SpofElement::Node(_), 0) => SpofRecommendation::ReinforceCoreElement,
                (SpofElement::Node(_), _) => SpofRecommendation::ConnectIsolatedSite,
            };

            Ok(Some(Spof {
                element,
                severity,
                paths_affected,
                nodes_isolated,
                causes_partition,
                recommendation,
            }))
        })
        .collect::<Result<Vec<Option<Spof>>, PlanError>>()?
        .into_iter()
        .flatten()
        .collect();

    spofs.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.paths_affected.cmp(&a.paths_affected))
            .then(a.element.cmp(&b.element))
    });

    let count = |s: SpofSeverity| spofs.iter().filter(|x| x.severity == s).count();
    let (num_critical, num_high, num_medium, num_low) = (
        count(SpofSeverity::Critical),
        count(SpofSeverity::High),
        count(SpofSeverity::Medium),
        count(SpofSeverity::Low),
    );
    spofs.truncate(top_k);
    let report = SpofReport {
        spofs,
        elements_evaluated,
        num_critical,
        num_high,
        num_medium,
        num_low,
    };
    log::debug!(
        "SPOF analysis: {} critical, {} high, {} medium, {} low (evaluated {})",
        report.num_critical,
        report.num_high,
        report.num_medium,
        report.num_low,
        report.elements_evaluated
    );
    Ok(report)
}

/// Number of ordered router pairs that are connected, given the component structure.
fn connected_pairs(comps: &[Vec<crate::types::RouterId>]) -> usize {
    comps.iter().map(|c| c.len() * (c.len() - 1)).sum()
}

/// Compute the resilience score of a snapshot. Runs a full SPOF enumeration internally.
pub fn resilience(snapshot: &Snapshot, token: &CancellationToken) -> Result<ResilienceScore, PlanError> {
    let spofs = spof_analysis(snapshot, usize::MAX, token)?;

    let redundancy = (10.0
        - 2.5 * spofs.num_critical as f64
        - 1.5 * spofs.num_high as f64
        - 0.5 * spofs.num_medium as f64)
        .max(1.0);

    // diversity: country spread plus edge density per country
    let countries: BTreeSet<&str> = snapshot
        .routers()
        .filter_map(|r| snapshot.router(r).and_then(|x| x.country()))
        .collect();
    let mut diversity: f64 = 5.0;
    if countries.len() >= 10 {
        diversity += 2.0;
    } else if countries.len() >= 5 {
        diversity += 1.0;
    }
    if !countries.is_empty() {
        let edges_per_country = snapshot.num_edges() as f64 / countries.len() as f64;
        if edges_per_country >= 5.0 {
            diversity += 2.0;
        } else if edges_per_country >= 3.0 {
            diversity += 1.0;
        }
    }
    let diversity = diversity.min(10.0);

    // capacity: average utilization over the edges that carry both capacity and traffic metadata
    let utils: Vec<f64> = snapshot
        .edges()
        .filter_map(|(_, _, _, data)| match (data.capacity_mbps, data.traffic_mbps) {
            (Some(cap), Some(traffic)) if cap > 0 => Some(traffic / cap as f64),
            _ => None,
        })
        .collect();
    let capacity = if utils.is_empty() {
        5.0
    } else {
        let avg = utils.iter().sum::<f64>() / utils.len() as f64;
        if avg < 0.3 {
            10.0
        } else if avg < 0.5 {
            8.0
        } else if avg < 0.7 {
            6.0
        } else if avg < 0.85 {
            4.0
        } else {
            2.0
        }
    };

    let overall = ((0.4 * redundancy + 0.3 * diversity + 0.3 * capacity) * 10.0).round() / 10.0;
    let level = ResilienceLevel::from_score(overall);

    let mut improvements = Vec::new();
    if spofs.num_critical > 0 {
        improvements.push(format!(
            "eliminate {} critical single point(s) of failure",
            spofs.num_critical
        ));
    }
    if spofs.num_high > 0 {
        improvements.push(format!(
            "add redundancy around {} high-severity element(s)",
            spofs.num_high
        ));
    }
    if diversity < 7.0 {
        improvements.push("increase geographic spread or per-country link density".to_string());
    }
    if capacity < 5.0 {
        improvements.push("provision additional capacity on highly utilized links".to_string());
    }

    Ok(ResilienceScore {
        overall,
        breakdown: ResilienceBreakdown { redundancy, diversity, capacity },
        level,
        improvements,
    })
}

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

//! The blast-radius scorer: aggregate an [`ImpactReport`](crate::impact::ImpactReport) into a
//! single risk score, a per-flow zone classification, country-pair aggregates, and rollback
//! hints.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_with::{As, Same};

use crate::impact::{ImpactKind, ImpactReport};
use crate::topology::Snapshot;
use crate::types::{LinkCost, LinkDirection, LinkId};

/// Risk level derived from the blast-radius score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// `risk_score < 20`
    Low,
    /// `20 <= risk_score < 40`
    Medium,
    /// `40 <= risk_score < 70`
    High,
    /// `risk_score >= 70`
    Critical,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        if score < 20.0 {
            Self::Low
        } else if score < 40.0 {
            Self::Medium
        } else if score < 70.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// How closely an impacted flow is tied to the changed elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowZone {
    /// The baseline path traversed a changed link.
    Direct,
    /// The path changed without traversing a changed link in the baseline.
    Indirect,
    /// Only the ECMP status or cost changed; the edge set is intact.
    Secondary,
    /// Included for context only; the flow is not impacted.
    Unaffected,
}

/// Zone classification of a single impacted flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowClassification {
    /// Source router handle.
    pub source: String,
    /// Destination router handle.
    pub destination: String,
    /// The zone of the flow.
    pub zone: FlowZone,
}

/// Aggregated impact between one ordered pair of countries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryPairImpact {
    /// Number of impacted flows per kind.
    #[serde(with = "As::<Vec<(Same, Same)>>")]
    pub by_kind: BTreeMap<ImpactKind, usize>,
    /// Average signed cost delta over flows with costs on both sides.
    pub avg_cost_delta: f64,
}

/// How to undo the change on one direction of a logical link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// Restore the prior cost (re-adding the edge if the candidate removed it).
    RestoreCost {
        /// The cost before the change.
        cost: LinkCost,
    },
    /// The candidate added this edge; remove it again.
    RemoveEdge,
}

/// Rollback hint for one changed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackHint {
    /// The logical link.
    pub link: LinkId,
    /// The direction of the changed edge.
    pub direction: LinkDirection,
    /// What to do to undo the change.
    pub action: RollbackAction,
}

/// Operator guidance derived from the score and the record mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTag {
    /// The change is low risk and can be applied directly.
    SafeToApply,
    /// Roll the change out in stages and watch the affected flows.
    StageRollout,
    /// Some flows become unreachable; verify reachability requirements first.
    VerifyReachability,
    /// ECMP redundancy is lost on some flows; check failure coverage.
    CheckEcmpRedundancy,
    /// The change affects flows across many countries; notify the affected regions.
    NotifyAffectedRegions,
}

/// The aggregated risk assessment of a proposed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastRadiusReport {
    /// Total risk score in `[0, 100]`.
    pub risk_score: f64,
    /// Level band of the score.
    pub risk_level: RiskLevel,
    /// Score component: share of affected flows, capped at 40.
    pub flow_impact: f64,
    /// Score component: average relative cost delta, capped at 20.
    pub cost_magnitude: f64,
    /// Score component: distinct affected countries, capped at 20.
    pub country_diversity: f64,
    /// Score component: unique-path (non-ECMP) flows affected, capped at 20.
    pub critical_paths: f64,
    /// Impact aggregated per ordered `(source country, destination country)` pair.
    #[serde(with = "As::<Vec<(Same, Same)>>")]
    pub country_pairs: BTreeMap<(String, String), CountryPairImpact>,
    /// Zone classification of every impacted flow.
    pub zones: Vec<FlowClassification>,
    /// Operator guidance.
    pub recommendations: Vec<RecommendationTag>,
    /// How to undo each changed edge.
    pub rollback: Vec<RollbackHint>,
}

/// Aggregate an impact report into a [`BlastRadiusReport`]. `baseline` resolves router handles to
/// country tags; the report itself carries everything else.
pub fn blast_radius(report: &ImpactReport, baseline: &Snapshot) -> BlastRadiusReport {
    let total_pairs = report.summary.total_pairs;
    let affected = report.summary.pairs_changed;

    // component 1: how many flows are touched
    let flow_impact = if total_pairs == 0 {
        0.0
    } else {
        (100.0 * affected as f64 / total_pairs as f64).min(40.0)
    };

    // component 2: how big the cost swings are, relative to the old cost
    let deltas: Vec<f64> = report
        .records
        .iter()
        .filter_map(|r| match (r.old_cost, r.new_cost) {
            (Some(o), Some(n)) if o > 0 => {
                Some((n as f64 - o as f64).abs() / o as f64)
            }
            _ => None,
        })
        .collect();
    let cost_magnitude = if deltas.is_empty() {
        0.0
    } else {
        (deltas.iter().sum::<f64>() / deltas.len() as f64 * 100.0 / 5.0).min(20.0)
    };

    // component 3: how many countries are involved
    let country_of = |handle: &str| -> String {
        baseline
            .router_id(handle)
            .and_then(|id| baseline.router(id))
            .and_then(|r| r.country())
            .unwrap_or("unknown")
            .to_string()
    };
    let affected_countries: BTreeSet<String> = report
        .records
        .iter()
        .flat_map(|r| [country_of(&r.source), country_of(&r.destination)])
        .filter(|c| c != "unknown")
        .collect();
    let country_diversity = (3.0 * affected_countries.len() as f64).min(20.0);

    // component 4: flows that had no ECMP fallback in the baseline
    let critical_count = report
        .records
        .iter()
        .filter(|r| r.old_cost.is_some() && !r.was_ecmp)
        .count();
    let critical_paths = (5.0 * critical_count as f64).min(20.0);

    let risk_score = (flow_impact + cost_magnitude + country_diversity + critical_paths)
        .clamp(0.0, 100.0);
    let risk_level = RiskLevel::from_score(risk_score);

    // country-pair aggregation
    let mut country_pairs: BTreeMap<(String, String), CountryPairImpact> = BTreeMap::new();
    let mut pair_deltas: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for r in &report.records {
        let key = (country_of(&r.source), country_of(&r.destination));
        let entry = country_pairs.entry(key.clone()).or_default();
        *entry.by_kind.entry(r.kind).or_default() += 1;
        if let (Some(o), Some(n)) = (r.old_cost, r.new_cost) {
            pair_deltas.entry(key).or_default().push(n as f64 - o as f64);
        }
    }
    for (key, deltas) in pair_deltas {
        let avg = deltas.iter().sum::<f64>() / deltas.len() as f64;
        country_pairs.get_mut(&key).expect("inserted above").avg_cost_delta = avg;
    }

    // zone classification per impacted flow
    let zones = report
        .records
        .iter()
        .map(|r| {
            let baseline_hit = r
                .old_links
                .as_ref()
                .map(|links| links.iter().any(|l| report.changed_links.contains(l)))
                .unwrap_or(false);
            let zone = if baseline_hit {
                FlowZone::Direct
            } else if r.path_changed {
                FlowZone::Indirect
            } else {
                FlowZone::Secondary
            };
            FlowClassification {
                source: r.source.clone(),
                destination: r.destination.clone(),
                zone,
            }
        })
        .collect();

    let mut recommendations = Vec::new();
    if report.records_of_kind(ImpactKind::NewlyBroken).next().is_some() {
        recommendations.push(RecommendationTag::VerifyReachability);
    }
    if report.records_of_kind(ImpactKind::LostEcmp).next().is_some() {
        recommendations.push(RecommendationTag::CheckEcmpRedundancy);
    }
    if affected_countries.len() >= 3 {
        recommendations.push(RecommendationTag::NotifyAffectedRegions);
    }
    if risk_level >= RiskLevel::Medium {
        recommendations.push(RecommendationTag::StageRollout);
    } else if recommendations.is_empty() {
        recommendations.push(RecommendationTag::SafeToApply);
    }

    let rollback = report
        .link_changes
        .iter()
        .map(|c| RollbackHint {
            link: c.link,
            direction: c.direction,
            action: match c.old_cost {
                Some(cost) => RollbackAction::RestoreCost { cost },
                None => RollbackAction::RemoveEdge,
            },
        })
        .collect();

    log::debug!(
        "blast radius: score {:.1} ({:?}), {} zones, {} rollback hints",
        risk_score,
        risk_level,
        affected,
        report.link_changes.len()
    );

    BlastRadiusReport {
        risk_score,
        risk_level,
        flow_impact,
        cost_magnitude,
        country_diversity,
        critical_paths,
        country_pairs,
        zones,
        recommendations,
        rollback,
    }
}

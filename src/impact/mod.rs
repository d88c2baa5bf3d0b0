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

//! The all-pairs differential analyzer: compare routing between a baseline and a candidate
//! snapshot for every ordered `(source, destination)` pair, and classify every difference.
//!
//! The per-source SPF runs execute in parallel; the report is nevertheless deterministic, ordered
//! by `(source handle, destination handle)`. Progress is reported once per source, and the
//! cancellation token is polled at the same granularity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::{EitherOrBoth, Itertools};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::{As, Same};

use crate::spf::shortest_paths;
use crate::topology::{Router, Snapshot};
use crate::types::{
    CancellationToken, LinkCost, LinkDirection, LinkId, PlanError, ProgressSink, RouterId,
};

/// Classification of a single routing difference. The variants are evaluated in the order they
/// are listed: the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactKind {
    /// The pair was reachable in the baseline but is not in the candidate.
    NewlyBroken,
    /// The pair was unreachable in the baseline but is reachable in the candidate.
    NewlyReachable,
    /// The new path traverses a logical link that exists only in the candidate.
    Migration,
    /// The edge sets differ, but no candidate-only link is involved.
    Reroute,
    /// The pair had equal-cost multipath before, but not anymore.
    LostEcmp,
    /// The pair gained equal-cost multipath.
    GainedEcmp,
    /// Same route shape, higher cost.
    CostIncrease,
    /// Same route shape, lower cost.
    CostDecrease,
}

impl std::fmt::Display for ImpactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NewlyBroken => "newly_broken",
            Self::NewlyReachable => "newly_reachable",
            Self::Migration => "migration",
            Self::Reroute => "reroute",
            Self::LostEcmp => "lost_ecmp",
            Self::GainedEcmp => "gained_ecmp",
            Self::CostIncrease => "cost_increase",
            Self::CostDecrease => "cost_decrease",
        };
        f.write_str(s)
    }
}

/// One `(source, destination)` pair whose routing differs between baseline and candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRecord {
    /// Source router handle.
    pub source: String,
    /// Destination router handle.
    pub destination: String,
    /// Optimal cost in the baseline; absent if the pair was unreachable.
    pub old_cost: Option<LinkCost>,
    /// Optimal cost in the candidate; absent if the pair is newly unreachable.
    pub new_cost: Option<LinkCost>,
    /// Canonical path in the baseline, as handles.
    pub old_canonical_path: Option<Vec<String>>,
    /// Canonical path in the candidate, as handles.
    pub new_canonical_path: Option<Vec<String>>,
    /// Whether the baseline had equal-cost multipath.
    pub was_ecmp: bool,
    /// Whether the candidate has equal-cost multipath.
    pub is_ecmp: bool,
    /// Whether the optimal edge sets differ.
    pub path_changed: bool,
    /// The logical links used by any optimal baseline path.
    pub old_links: Option<BTreeSet<LinkId>>,
    /// The logical links used by any optimal candidate path.
    pub new_links: Option<BTreeSet<LinkId>>,
    /// The classification of this difference.
    pub kind: ImpactKind,
}

/// The cost of one direction of a logical link, before and after. `None` means the direction (or
/// the whole link) is absent on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkChange {
    /// The logical link.
    pub link: LinkId,
    /// The direction of the changed edge.
    pub direction: LinkDirection,
    /// Cost in the baseline.
    pub old_cost: Option<LinkCost>,
    /// Cost in the candidate.
    pub new_cost: Option<LinkCost>,
}

/// Summary counters of an [`ImpactReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// Total number of ordered pairs over the routers common to both snapshots.
    pub total_pairs: usize,
    /// Number of pairs that passed the filter and were compared.
    pub pairs_compared: usize,
    /// Number of pairs that differ.
    pub pairs_changed: usize,
    /// Per-kind record counts.
    #[serde(with = "As::<Vec<(Same, Same)>>")]
    pub by_kind: BTreeMap<ImpactKind, usize>,
}

/// The result of [`analyze_impact`]: all differing pairs, summary counters, and the link-level
/// delta between the two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// All differing pairs, ordered by `(source handle, destination handle)`.
    pub records: Vec<ImpactRecord>,
    /// Summary counters.
    pub summary: ImpactSummary,
    /// Logical links whose presence or cost differs between the snapshots.
    pub changed_links: BTreeSet<LinkId>,
    /// The concrete per-direction deltas behind `changed_links`.
    pub link_changes: Vec<LinkChange>,
}

impl ImpactReport {
    /// Iterate over the records of a specific kind.
    pub fn records_of_kind(&self, kind: ImpactKind) -> impl Iterator<Item = &ImpactRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }
}

/// Restricts which `(source, destination)` pairs are *emitted*. The SPF work is unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactFilter {
    /// Only emit pairs whose source country is in this set.
    pub source_countries: Option<BTreeSet<String>>,
    /// Only emit pairs whose destination handle is in this set.
    pub destinations: Option<BTreeSet<String>>,
}

impl ImpactFilter {
    fn matches(&self, src: &Router, dst: &Router) -> bool {
        if let Some(countries) = &self.source_countries {
            if !src.country().map(|c| countries.contains(c)).unwrap_or(false) {
                return false;
            }
        }
        if let Some(destinations) = &self.destinations {
            if !destinations.contains(dst.handle()) {
                return false;
            }
        }
        true
    }
}

/// Shape of one reconstructed path, reduced to what the comparison needs. Edges are keyed by
/// `(link, source, target)` so they compare across snapshots.
struct PathShape {
    cost: LinkCost,
    is_ecmp: bool,
    canonical: Vec<String>,
    edge_keys: BTreeSet<(LinkId, RouterId, RouterId)>,
    links_used: BTreeSet<LinkId>,
}

fn path_shape(snapshot: &Snapshot, result: &crate::spf::PathResult) -> PathShape {
    let edge_keys: BTreeSet<_> = result
        .edge_set
        .iter()
        .filter_map(|e| snapshot.edge_key(*e))
        .collect();
    let links_used = edge_keys.iter().map(|(l, _, _)| *l).collect();
    PathShape {
        cost: result.cost,
        is_ecmp: result.is_ecmp,
        canonical: result.canonical_handles(snapshot),
        edge_keys,
        links_used,
    }
}

/// Compare routing between `baseline` and `candidate` for every ordered pair of routers present
/// in both snapshots, and classify each difference.
///
/// The per-source loop runs in parallel. On cancellation, partial results are discarded and
/// [`PlanError::Cancelled`] is returned.
pub fn analyze_impact(
    baseline: &Snapshot,
    candidate: &Snapshot,
    filter: Option<&ImpactFilter>,
    token: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<ImpactReport, PlanError> {
    // routers present in both snapshots, matched by handle, in canonical order
    let common: Vec<(RouterId, RouterId)> = baseline
        .routers()
        .filter_map(|b| {
            candidate
                .router_id(baseline.handle(b))
                .map(|c| (b, c))
        })
        .collect();

    let (changed_links, link_changes) = diff_links(baseline, candidate);
    // links that exist in the candidate only; used by the migration rule
    let candidate_only: BTreeSet<LinkId> = candidate
        .links()
        .filter(|(_, e)| e.is_present())
        .map(|(l, _)| l)
        .filter(|l| {
            !baseline
                .link_edges(*l)
                .map(|e| e.is_present())
                .unwrap_or(false)
        })
        .collect();

    let total = common.len();
    let done = AtomicUsize::new(0);
    let compared = AtomicUsize::new(0);

    let per_source: Vec<Vec<ImpactRecord>> = common
        .par_iter()
        .map(|(src_base, src_cand)| {
            token.check()?;

            let old_table = shortest_paths(baseline, *src_base)?;
            let new_table = shortest_paths(candidate, *src_cand)?;
            let src_router = baseline.router(*src_base).expect("common router");

            let mut records = Vec::new();
            for (dst_base, dst_cand) in &common {
                if dst_base == src_base {
                    continue;
                }
                let dst_router = baseline.router(*dst_base).expect("common router");
                if let Some(f) = filter {
                    if !f.matches(src_router, dst_router) {
                        continue;
                    }
                }
                compared.fetch_add(1, Ordering::Relaxed);

                let old = old_table.reconstruct(*dst_base).map(|p| path_shape(baseline, &p));
                let new = new_table.reconstruct(*dst_cand).map(|p| path_shape(candidate, &p));
                if let Some(record) =
                    compare_pair(src_router.handle(), dst_router.handle(), old, new, &candidate_only)
                {
                    records.push(record);
                }
            }

            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(n, total);
            Ok(records)
        })
        .collect::<Result<_, PlanError>>()?;

    let records: Vec<ImpactRecord> = per_source.into_iter().flatten().collect();
    let mut by_kind: BTreeMap<ImpactKind, usize> = BTreeMap::new();
    for r in &records {
        *by_kind.entry(r.kind).or_default() += 1;
    }
    let summary = ImpactSummary {
        total_pairs: total * total.saturating_sub(1),
        pairs_compared: compared.into_inner(),
        pairs_changed: records.len(),
        by_kind,
    };

    log::debug!(
        "impact analysis: {} of {} pairs changed ({} links differ)",
        summary.pairs_changed,
        summary.total_pairs,
        changed_links.len()
    );

    Ok(ImpactReport { records, summary, changed_links, link_changes })
}

/// Classify a single pair. Returns `None` if the routing is identical.
fn compare_pair(
    src: &str,
    dst: &str,
    old: Option<PathShape>,
    new: Option<PathShape>,
    candidate_only: &BTreeSet<LinkId>,
) -> Option<ImpactRecord> {
    let differs = match (&old, &new) {
        (None, None) => false,
        (Some(o), Some(n)) => {
            o.cost != n.cost || o.edge_keys != n.edge_keys || o.is_ecmp != n.is_ecmp
        }
        _ => true,
    };
    if !differs {
        return None;
    }

    let was_ecmp = old.as_ref().map(|o| o.is_ecmp).unwrap_or(false);
    let is_ecmp = new.as_ref().map(|n| n.is_ecmp).unwrap_or(false);
    let path_changed = match (&old, &new) {
        (Some(o), Some(n)) => o.edge_keys != n.edge_keys,
        _ => true,
    };

    // classification rules, evaluated in order; the first match wins
    let kind = match (&old, &new) {
        (Some(_), None) => ImpactKind::NewlyBroken,
        (None, Some(_)) => ImpactKind::NewlyReachable,
        (None, None) => unreachable!("identical pairs are filtered above"),
        (Some(o), Some(n)) => {
            if n.links_used.iter().any(|l| candidate_only.contains(l)) {
                ImpactKind::Migration
            } else if o.edge_keys != n.edge_keys {
                ImpactKind::Reroute
            } else if o.is_ecmp && !n.is_ecmp {
                ImpactKind::LostEcmp
            } else if !o.is_ecmp && n.is_ecmp {
                ImpactKind::GainedEcmp
            } else if n.cost > o.cost {
                ImpactKind::CostIncrease
            } else {
                ImpactKind::CostDecrease
            }
        }
    };

    Some(ImpactRecord {
        source: src.to_string(),
        destination: dst.to_string(),
        old_cost: old.as_ref().map(|o| o.cost),
        new_cost: new.as_ref().map(|n| n.cost),
        old_canonical_path: old.as_ref().map(|o| o.canonical.clone()),
        new_canonical_path: new.as_ref().map(|n| n.canonical.clone()),
        was_ecmp,
        is_ecmp,
        path_changed,
        old_links: old.map(|o| o.links_used),
        new_links: new.map(|n| n.links_used),
        kind,
    })
}

/// Compute the link-level delta between two snapshots, per direction.
fn diff_links(baseline: &Snapshot, candidate: &Snapshot) -> (BTreeSet<LinkId>, Vec<LinkChange>) {
    let old = baseline.link_costs();
    let new = candidate.link_costs();

    let mut changed = BTreeSet::new();
    let mut changes = Vec::new();
    for entry in old.iter().merge_join_by(new.iter(), |(a, _), (b, _)| a.cmp(b)) {
        let (link, (old_fwd, old_rev), (new_fwd, new_rev)) = match entry {
            EitherOrBoth::Both((l, o), (_, n)) => (*l, *o, *n),
            EitherOrBoth::Left((l, o)) => (*l, *o, (None, None)),
            EitherOrBoth::Right((l, n)) => (*l, (None, None), *n),
        };
        for (direction, old_cost, new_cost) in [
            (LinkDirection::Forward, old_fwd, new_fwd),
            (LinkDirection::Reverse, old_rev, new_rev),
        ] {
            if old_cost != new_cost {
                changed.insert(link);
                changes.push(LinkChange { link, direction, old_cost, new_cost });
            }
        }
    }
    (changed, changes)
}

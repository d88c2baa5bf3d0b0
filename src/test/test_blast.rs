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

//! Test the blast-radius scorer: score components, zones, country pairs, and rollback hints.

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use crate::blast::{blast_radius, FlowZone, RecommendationTag, RiskLevel, RollbackAction};
use crate::impact::analyze_impact;
use crate::topology::{Edit, Router, Snapshot};
use crate::types::{CancellationToken, LinkDirection, LinkId, NoProgress, PlanError, RouterId};

/// The four-node square with one router per country.
fn tagged_square() -> Result<(Snapshot, (RouterId, RouterId, RouterId, RouterId)), PlanError> {
    let mut builder = Snapshot::builder();
    let a = builder.add_router_with(Router::new("A", "A").with_country("nl"))?;
    let b = builder.add_router_with(Router::new("B", "B").with_country("de"))?;
    let c = builder.add_router_with(Router::new("C", "C").with_country("dk"))?;
    let d = builder.add_router_with(Router::new("D", "D").with_country("ie"))?;
    builder.add_link(a, b, 1, Some(1))?;
    builder.add_link(a, c, 1, Some(1))?;
    builder.add_link(b, d, 1, Some(1))?;
    builder.add_link(c, d, 1, Some(1))?;
    Ok((builder.commit()?, (a, b, c, d)))
}

#[test]
fn asymmetric_link_raise() -> Result<(), PlanError> {
    // raising only the A -> B direction to 100 impacts exactly the flows whose baseline optimum
    // traversed that edge: (A,B), (A,D), and (C,B)
    let (net, _) = tagged_square()?;
    let candidate = net.with_edits(&[Edit::SetCost {
        link: LinkId(0),
        direction: LinkDirection::Forward,
        new_cost: 100,
    }])?;
    let impact = analyze_impact(&net, &candidate, None, &CancellationToken::new(), &NoProgress)?;
    let pairs: Vec<(&str, &str)> = impact
        .records
        .iter()
        .map(|r| (r.source.as_str(), r.destination.as_str()))
        .collect();
    assert_eq!(pairs, vec![("A", "B"), ("A", "D"), ("C", "B")]);

    let report = blast_radius(&impact, &net);

    // flow impact: 3 of 12 ordered pairs
    assert_abs_diff_eq!(report.flow_impact, 25.0);
    // cost deltas: (A,B) 1 -> 3, the others keep their cost
    assert_abs_diff_eq!(report.cost_magnitude, (2.0 / 3.0) * 100.0 / 5.0, epsilon = 1e-9);
    // four distinct countries appear among the affected flows
    assert_abs_diff_eq!(report.country_diversity, 12.0);
    // only (A,B) was a unique path in the baseline
    assert_abs_diff_eq!(report.critical_paths, 5.0);
    assert_abs_diff_eq!(
        report.risk_score,
        report.flow_impact + report.cost_magnitude + report.country_diversity
            + report.critical_paths,
        epsilon = 1e-9
    );
    assert_eq!(report.risk_level, RiskLevel::High);

    // every affected baseline path traversed the changed edge
    assert!(report.zones.iter().all(|z| z.zone == FlowZone::Direct));
    assert_eq!(report.zones.len(), 3);

    // rollback: restore the prior forward cost
    assert_eq!(report.rollback.len(), 1);
    assert_eq!(report.rollback[0].link, LinkId(0));
    assert_eq!(report.rollback[0].direction, LinkDirection::Forward);
    assert_eq!(report.rollback[0].action, RollbackAction::RestoreCost { cost: 1 });

    assert!(report.recommendations.contains(&RecommendationTag::NotifyAffectedRegions));
    assert!(report.recommendations.contains(&RecommendationTag::StageRollout));
    Ok(())
}

#[test]
fn country_pairs_aggregate_kind_and_delta() -> Result<(), PlanError> {
    let (net, _) = tagged_square()?;
    let candidate = net.with_edits(&[Edit::SetCost {
        link: LinkId(0),
        direction: LinkDirection::Forward,
        new_cost: 100,
    }])?;
    let impact = analyze_impact(&net, &candidate, None, &CancellationToken::new(), &NoProgress)?;
    let report = blast_radius(&impact, &net);

    let nl_de = &report.country_pairs[&("nl".to_string(), "de".to_string())];
    assert_eq!(nl_de.by_kind.values().sum::<usize>(), 1);
    assert_abs_diff_eq!(nl_de.avg_cost_delta, 2.0); // cost 1 -> 3

    let nl_ie = &report.country_pairs[&("nl".to_string(), "ie".to_string())];
    assert_abs_diff_eq!(nl_ie.avg_cost_delta, 0.0); // rerouted at equal cost
    assert_eq!(report.country_pairs.len(), 3);
    Ok(())
}

#[test]
fn added_link_rolls_back_by_removal() -> Result<(), PlanError> {
    let (net, (a, _, _, d)) = tagged_square()?;
    let candidate = net.with_edits(&[Edit::AddLink {
        source: a,
        target: d,
        forward_cost: 1,
        reverse_cost: None,
    }])?;
    let impact = analyze_impact(&net, &candidate, None, &CancellationToken::new(), &NoProgress)?;
    let report = blast_radius(&impact, &net);

    assert_eq!(report.rollback.len(), 1);
    assert_eq!(report.rollback[0].action, RollbackAction::RemoveEdge);

    // the flow moved onto a link the baseline never had, so its baseline path cannot contain a
    // changed edge: the zone is indirect
    assert_eq!(report.zones.len(), 1);
    assert_eq!(report.zones[0].zone, FlowZone::Indirect);
    Ok(())
}

#[test]
fn no_impact_is_low_risk() -> Result<(), PlanError> {
    // the score must stay within bounds at both ends
    let (net, _) = tagged_square()?;
    let impact = analyze_impact(&net, &net, None, &CancellationToken::new(), &NoProgress)?;
    let report = blast_radius(&impact, &net);

    assert_abs_diff_eq!(report.risk_score, 0.0);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert!(report.zones.is_empty());
    assert!(report.rollback.is_empty());
    assert_eq!(report.recommendations, vec![RecommendationTag::SafeToApply]);
    Ok(())
}

#[test]
fn score_is_bounded() -> Result<(), PlanError> {
    // a change that breaks connectivity for many flows must still score within [0, 100]
    let (net, _) = tagged_square()?;
    let candidate = net.with_edits(&[
        Edit::FailLink { link: LinkId(2) },
        Edit::FailLink { link: LinkId(3) },
    ])?;
    let impact = analyze_impact(&net, &candidate, None, &CancellationToken::new(), &NoProgress)?;
    let report = blast_radius(&impact, &net);

    assert!(report.risk_score >= 0.0);
    assert!(report.risk_score <= 100.0);
    assert!(report.flow_impact <= 40.0);
    assert!(report.cost_magnitude <= 20.0);
    assert!(report.country_diversity <= 20.0);
    assert!(report.critical_paths <= 20.0);
    Ok(())
}

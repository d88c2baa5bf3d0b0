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

//! Test the connectivity analyzer: components, isolated nodes, and the agreement between the
//! undirected projection and SPF reachability.

use maplit::btreeset;
use pretty_assertions::assert_eq;

use super::{chain_net, square_links, square_net};
use crate::connectivity::{connectivity, same_component};
use crate::spf::shortest_paths;
use crate::topology::{Edit, Snapshot};
use crate::types::PlanError;

#[test]
fn square_is_fully_connected() -> Result<(), PlanError> {
    let (net, _) = square_net()?;
    let report = connectivity(&net);
    assert!(report.is_fully_connected);
    assert_eq!(report.num_components(), 1);
    assert_eq!(report.largest_component, 4);
    assert!(report.isolated_nodes.is_empty());
    Ok(())
}

#[test]
fn single_link_failure_keeps_square_connected() -> Result<(), PlanError> {
    let (net, _) = square_net()?;
    let (_, _, l_bd, _) = square_links();
    let failed = net.with_edits(&[Edit::FailLink { link: l_bd }])?;
    assert!(connectivity(&failed).is_fully_connected);
    Ok(())
}

#[test]
fn chain_partitions_on_middle_failure() -> Result<(), PlanError> {
    let (net, (_, y, _)) = chain_net()?;
    let failed = net.with_edits(&[Edit::FailNode { router: y }])?;
    let report = connectivity(&failed);

    assert!(!report.is_fully_connected);
    assert_eq!(
        report.components,
        vec![btreeset! {"X".to_string()}, btreeset! {"Z".to_string()}]
    );
    assert_eq!(report.isolated_nodes, btreeset! {"X".to_string(), "Z".to_string()});
    assert_eq!(report.largest_component, 1);
    Ok(())
}

#[test]
fn components_are_ordered_by_smallest_handle() -> Result<(), PlanError> {
    // two islands: {M, Z} and {B, Q}; the B-island sorts first
    let mut builder = Snapshot::builder();
    let m = builder.add_router("M", "M")?;
    let z = builder.add_router("Z", "Z")?;
    let b = builder.add_router("B", "B")?;
    let q = builder.add_router("Q", "Q")?;
    builder.add_link(m, z, 1, Some(1))?;
    builder.add_link(b, q, 1, Some(1))?;
    let net = builder.commit()?;

    let report = connectivity(&net);
    assert_eq!(
        report.components,
        vec![
            btreeset! {"B".to_string(), "Q".to_string()},
            btreeset! {"M".to_string(), "Z".to_string()},
        ]
    );
    assert!(!report.is_fully_connected);
    assert_eq!(report.largest_component, 2);
    Ok(())
}

#[test]
fn one_way_link_counts_as_connected() -> Result<(), PlanError> {
    // the undirected projection treats a single direction as a connection
    let mut builder = Snapshot::builder();
    let a = builder.add_router("A", "A")?;
    let b = builder.add_router("B", "B")?;
    builder.add_link(a, b, 1, None)?;
    let net = builder.commit()?;
    assert!(connectivity(&net).is_fully_connected);
    assert!(same_component(&net, b, a));
    Ok(())
}

#[test]
fn spf_reachability_matches_components() -> Result<(), PlanError> {
    // with bidirectional links, a destination is in the SPF table iff it shares a component
    // with the source
    let mut builder = Snapshot::builder();
    let a = builder.add_router("A", "A")?;
    let b = builder.add_router("B", "B")?;
    let c = builder.add_router("C", "C")?;
    let d = builder.add_router("D", "D")?;
    builder.add_link(a, b, 1, Some(1))?;
    builder.add_link(c, d, 1, Some(1))?;
    let net = builder.commit()?;

    for src in net.routers() {
        let table = shortest_paths(&net, src)?;
        for dst in net.routers() {
            if src == dst {
                continue;
            }
            assert_eq!(
                table.reachable(dst),
                same_component(&net, src, dst),
                "{} -> {}",
                net.handle(src),
                net.handle(dst)
            );
        }
    }
    Ok(())
}

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

//! Shared fixtures for the test suite.

use crate::topology::{Snapshot, TopologyBuilder};
use crate::types::{LinkDirection, LinkId, PlanError, RouterId};

mod test_blast;
mod test_connectivity;
mod test_io;
mod test_optimizer;

/// A square of four routers with unit costs on every link. `A - B`, `A - C`, `B - D`, and `C - D`,
/// each materialized as two directed edges. Two equal-cost paths lead from `A` to `D`.
fn square_net() -> Result<(Snapshot, (RouterId, RouterId, RouterId, RouterId)), PlanError>
{
    let mut builder = Snapshot::builder();
    let a = builder.add_router("A", "A")?;
    let b = builder.add_router("B", "B")?;
    let c = builder.add_router("C", "C")?;
    let d = builder.add_router("D", "D")?;
    builder.add_link(a, b, 1, Some(1))?;
    builder.add_link(a, c, 1, Some(1))?;
    builder.add_link(b, d, 1, Some(1))?;
    builder.add_link(c, d, 1, Some(1))?;
    let snapshot = builder.commit()?;
    Ok((snapshot, (a, b, c, d)))
}

/// The links of [`square_net`], in insertion order: `A - B`, `A - C`, `B - D`, `C - D`.
fn square_links() -> (LinkId, LinkId, LinkId, LinkId) {
    (LinkId(0), LinkId(1), LinkId(2), LinkId(3))
}

/// A three-router chain `X - Y - Z` with two bidirectional links. `Y` and both links are single
/// points of failure.
fn chain_net() -> Result<(Snapshot, (RouterId, RouterId, RouterId)), PlanError> {
    let mut builder = Snapshot::builder();
    let x = builder.add_router("X", "X")?;
    let y = builder.add_router("Y", "Y")?;
    let z = builder.add_router("Z", "Z")?;
    builder.add_link(x, y, 1, Some(1))?;
    builder.add_link(y, z, 1, Some(1))?;
    let snapshot = builder.commit()?;
    Ok((snapshot, (x, y, z)))
}

/// A complete graph on four routers, each in a different country, unit costs everywhere. No
/// element is a single point of failure.
fn mesh4_net() -> Result<Snapshot, PlanError> {
    use crate::topology::Router;

    let mut builder = TopologyBuilder::new();
    let countries = ["nl", "de", "dk", "ie"];
    let handles = ["R1", "R2", "R3", "R4"];
    let mut ids = Vec::new();
    for (handle, country) in handles.iter().zip(countries) {
        ids.push(builder.add_router_with(Router::new(*handle, *handle).with_country(country))?);
    }
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            builder.add_link(ids[i], ids[j], 1, Some(1))?;
        }
    }
    builder.commit()
}

/// The optimizer fixture: a diamond with a bottleneck. `A -> B` costs 1 and `A -> C` costs 10, so
/// all traffic from `A` to `D` crowds onto `A -> B -> D`. Every edge has 1000 Mbps capacity.
fn diamond_net() -> Result<(Snapshot, (RouterId, RouterId, RouterId, RouterId)), PlanError>
{
    let mut builder = Snapshot::builder();
    let a = builder.add_router("A", "A")?;
    let b = builder.add_router("B", "B")?;
    let c = builder.add_router("C", "C")?;
    let d = builder.add_router("D", "D")?;
    let links = [
        builder.add_link(a, b, 1, Some(1))?,
        builder.add_link(a, c, 10, Some(10))?,
        builder.add_link(b, d, 1, Some(1))?,
        builder.add_link(c, d, 1, Some(1))?,
    ];
    for link in links {
        for direction in [LinkDirection::Forward, LinkDirection::Reverse] {
            builder.edge_mut(link, direction).expect("both directions exist").capacity_mbps =
                Some(1000);
        }
    }
    let snapshot = builder.commit()?;
    Ok((snapshot, (a, b, c, d)))
}

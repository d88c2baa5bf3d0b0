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

//! Test the topology interchange format and the scenario store.

use pretty_assertions::assert_eq;

use crate::io::{read_topology, topology_to_file, write_topology};
use crate::spf::shortest_paths;
use crate::store::ScenarioStore;
use crate::store::{list_scenarios, load_scenario, save_scenario, MemoryStore, Scenario};
use crate::topology::Edit;
use crate::types::{LinkDirection, LinkId, PlanError};

const SQUARE_JSON: &str = r#"{
  "version": "1.0",
  "type": "ospf-topology",
  "data": {
    "nodes": [
      { "id": "A", "name": "Amsterdam", "country": "nl" },
      { "id": "B", "name": "Berlin", "country": "de" },
      { "id": "C", "name": "Copenhagen" },
      { "id": "D", "name": "Dublin" }
    ],
    "links": [
      { "source": "A", "target": "B", "forward_cost": 1, "reverse_cost": 1 },
      { "source": "A", "target": "C", "forward_cost": 1, "reverse_cost": 1,
        "source_capacity": { "total_capacity_mbps": 10000 } },
      { "source": "B", "target": "D", "forward_cost": 1, "reverse_cost": 1 },
      { "source": "C", "target": "D", "forward_cost": 1, "reverse_cost": 1 }
    ]
  }
}"#;

#[test]
fn import_builds_the_square() -> Result<(), PlanError> {
    let net = read_topology(SQUARE_JSON)?;
    assert_eq!(net.num_routers(), 4);
    assert_eq!(net.num_edges(), 8);

    let a = net.require_router("A")?;
    let d = net.require_router("D")?;
    let path = shortest_paths(&net, a)?.reconstruct(d).unwrap();
    assert_eq!(path.cost, 2);
    assert!(path.is_ecmp);

    assert_eq!(net.router(a).unwrap().name(), "Amsterdam");
    assert_eq!(net.router(a).unwrap().country(), Some("nl"));

    // capacity metadata lands on the forward direction of A - C
    let c = net.require_router("C")?;
    let edge = net.find_edge(a, c, LinkId(1)).unwrap();
    assert_eq!(net.edge_data(edge).unwrap().capacity_mbps, Some(10_000));
    Ok(())
}

#[test]
fn missing_reverse_cost_leaves_direction_absent() -> Result<(), PlanError> {
    let json = r#"{
      "version": "1.0", "type": "ospf-topology",
      "data": {
        "nodes": [ { "id": "A", "name": "A" }, { "id": "B", "name": "B" } ],
        "links": [ { "source": "A", "target": "B", "forward_cost": 5 } ]
      }
    }"#;
    let net = read_topology(json)?;
    assert_eq!(net.num_edges(), 1);
    let b = net.require_router("B")?;
    let a = net.require_router("A")?;
    assert!(!shortest_paths(&net, b)?.reachable(a));
    Ok(())
}

#[test]
fn duplicate_entries_become_parallel_links() -> Result<(), PlanError> {
    let json = r#"{
      "version": "1.0", "type": "ospf-topology",
      "data": {
        "nodes": [ { "id": "A", "name": "A" }, { "id": "B", "name": "B" } ],
        "links": [
          { "source": "A", "target": "B", "forward_cost": 3, "reverse_cost": 3 },
          { "source": "A", "target": "B", "forward_cost": 5, "reverse_cost": 5 }
        ]
      }
    }"#;
    let net = read_topology(json)?;
    assert_eq!(net.links().count(), 2);
    let a = net.require_router("A")?;
    let b = net.require_router("B")?;
    assert_eq!(shortest_paths(&net, a)?.cost(b), Some(3));
    Ok(())
}

#[test]
fn malformed_documents_are_rejected() {
    assert_eq!(read_topology("{").unwrap_err().code(), "invalid_topology");

    let wrong_type = r#"{ "version": "1.0", "type": "bgp-topology",
        "data": { "nodes": [], "links": [] } }"#;
    assert_eq!(read_topology(wrong_type).unwrap_err().code(), "invalid_topology");

    let unknown_router = r#"{ "version": "1.0", "type": "ospf-topology",
        "data": { "nodes": [ { "id": "A", "name": "A" } ],
                  "links": [ { "source": "A", "target": "Z", "forward_cost": 1 } ] } }"#;
    assert_eq!(read_topology(unknown_router).unwrap_err().code(), "unknown_router");

    let zero_cost = r#"{ "version": "1.0", "type": "ospf-topology",
        "data": { "nodes": [ { "id": "A", "name": "A" }, { "id": "B", "name": "B" } ],
                  "links": [ { "source": "A", "target": "B", "forward_cost": 0 } ] } }"#;
    assert_eq!(read_topology(zero_cost).unwrap_err().code(), "invalid_cost");
}

#[test]
fn export_round_trips() -> Result<(), PlanError> {
    let net = read_topology(SQUARE_JSON)?;
    let exported = write_topology(&net);
    let reimported = read_topology(&exported)?;
    assert_eq!(topology_to_file(&net), topology_to_file(&reimported));
    Ok(())
}

#[test]
fn export_reflects_edits() -> Result<(), PlanError> {
    let net = read_topology(SQUARE_JSON)?;
    let edited = net.with_edits(&[Edit::SetCost {
        link: LinkId(0),
        direction: LinkDirection::Forward,
        new_cost: 42,
    }])?;

    let file = topology_to_file(&edited);
    let ab = file
        .data
        .links
        .iter()
        .find(|l| l.source == "A" && l.target == "B")
        .unwrap();
    assert_eq!(ab.forward_cost, 42);
    assert_eq!(ab.reverse_cost, Some(1));
    Ok(())
}

#[test]
fn failed_links_are_absent_from_export() -> Result<(), PlanError> {
    let net = read_topology(SQUARE_JSON)?;
    let failed = net.with_edits(&[Edit::FailLink { link: LinkId(0) }])?;
    let file = topology_to_file(&failed);
    assert_eq!(file.data.links.len(), 3);
    assert!(!file.data.links.iter().any(|l| l.source == "A" && l.target == "B"));
    Ok(())
}

#[test]
fn scenario_store_round_trip() -> Result<(), PlanError> {
    let net = read_topology(SQUARE_JSON)?;
    let scenario = Scenario {
        name: "raise-a-b".to_string(),
        topology: topology_to_file(&net),
        edits: vec![Edit::SetCost {
            link: LinkId(0),
            direction: LinkDirection::Forward,
            new_cost: 20,
        }],
    };

    let mut store = MemoryStore::new();
    save_scenario(&mut store, &scenario)?;
    assert_eq!(list_scenarios(&store), vec!["raise-a-b".to_string()]);

    let loaded = load_scenario(&store, "raise-a-b")?.expect("saved above");
    assert_eq!(loaded, scenario);

    // materializing applies the edits on top of the stored topology
    let snapshot = loaded.snapshot()?;
    let a = snapshot.require_router("A")?;
    let b = snapshot.require_router("B")?;
    let edge = snapshot.find_edge(a, b, LinkId(0)).unwrap();
    assert_eq!(snapshot.edge_data(edge).unwrap().cost(), 20);

    assert_eq!(load_scenario(&store, "unknown")?, None);
    Ok(())
}

#[test]
fn malformed_stored_scenario_is_rejected() {
    let mut store = MemoryStore::new();
    store.put("scenarios", "broken", serde_json::json!({ "not": "a scenario" }));
    assert_eq!(
        load_scenario(&store, "broken").unwrap_err().code(),
        "invalid_topology"
    );
}

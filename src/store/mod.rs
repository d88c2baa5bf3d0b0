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

//! The persistence boundary: a small key-value interface the host provides, used to store
//! user-saved scenarios (a topology plus an edit list). Contents are opaque to the engine beyond
//! JSON shape validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::io::{snapshot_from_file, TopologyFile};
use crate::topology::{Edit, Snapshot};
use crate::types::PlanError;

/// The namespace under which scenarios are stored.
pub const SCENARIO_NAMESPACE: &str = "scenarios";

/// The key-value interface the host injects. Values are JSON; namespaces separate concerns.
pub trait ScenarioStore {
    /// Read a value.
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
    /// Write a value, replacing any previous one.
    fn put(&mut self, namespace: &str, key: &str, value: Value);
    /// List all keys in a namespace.
    fn list(&self, namespace: &str) -> Vec<String>;
}

/// An in-memory [`ScenarioStore`], used as the reference implementation and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<(String, String), Value>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScenarioStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.data.get(&(namespace.to_string(), key.to_string())).cloned()
    }

    fn put(&mut self, namespace: &str, key: &str, value: Value) {
        self.data.insert((namespace.to_string(), key.to_string()), value);
    }

    fn list(&self, namespace: &str) -> Vec<String> {
        self.data
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

/// A saved what-if scenario: a base topology document plus the edits applied on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name of the scenario.
    pub name: String,
    /// The base topology.
    pub topology: TopologyFile,
    /// Edits applied on top of the base topology.
    pub edits: Vec<Edit>,
}

impl Scenario {
    /// Materialize the scenario into a snapshot: build the base topology and apply the edits.
    pub fn snapshot(&self) -> Result<Snapshot, PlanError> {
        snapshot_from_file(&self.topology)?.with_edits(&self.edits)
    }
}

/// Persist a scenario under its name.
pub fn save_scenario(store: &mut dyn ScenarioStore, scenario: &Scenario) -> Result<(), PlanError> {
    let value = serde_json::to_value(scenario)
        .map_err(|e| PlanError::InvalidTopology(format!("scenario does not serialize: {e}")))?;
    store.put(SCENARIO_NAMESPACE, &scenario.name, value);
    Ok(())
}

/// Load a scenario by name, validating its shape. Unknown names yield `None`.
pub fn load_scenario(
    store: &dyn ScenarioStore,
    name: &str,
) -> Result<Option<Scenario>, PlanError> {
    let Some(value) = store.get(SCENARIO_NAMESPACE, name) else {
        return Ok(None);
    };
    let scenario: Scenario = serde_json::from_value(value)
        .map_err(|e| PlanError::InvalidTopology(format!("stored scenario is malformed: {e}")))?;
    Ok(Some(scenario))
}

/// List all saved scenario names.
pub fn list_scenarios(store: &dyn ScenarioStore) -> Vec<String> {
    store.list(SCENARIO_NAMESPACE)
}

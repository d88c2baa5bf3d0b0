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

//! Convenience re-exports of the most commonly used types and entry points.

pub use crate::blast::{blast_radius, BlastRadiusReport, RiskLevel};
pub use crate::connectivity::{connectivity, ConnectivityReport};
pub use crate::formatter::SnapshotFormatter;
pub use crate::impact::{analyze_impact, ImpactFilter, ImpactKind, ImpactRecord, ImpactReport};
pub use crate::io::{read_topology, write_topology, TopologyFile};
pub use crate::optimizer::{optimize, Constraints, CostChange, Goal, OptimizationResult};
pub use crate::resilience::{
    resilience, spof_analysis, ResilienceScore, Spof, SpofReport, SpofSeverity,
};
pub use crate::spf::{shortest_paths, PathResult, SpfTable};
pub use crate::store::{
    list_scenarios, load_scenario, save_scenario, MemoryStore, Scenario, ScenarioStore,
};
pub use crate::topology::{Edit, LinkData, Router, Snapshot, TopologyBuilder};
pub use crate::traffic::{
    synthetic_matrix, utilization, TrafficMatrix, TrafficModel, UtilizationReport,
};
pub use crate::types::{
    CancellationToken, LinkCost, LinkDirection, LinkId, NoProgress, PlanError, ProgressSink,
    RouterId, Warning,
};

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

//! Test the cost optimizer: congestion relief, constraints, and convergence metadata.

use approx::assert_abs_diff_eq;
use maplit::btreeset;
use pretty_assertions::assert_eq;

use super::{diamond_net, square_net};
use crate::optimizer::{optimize, Constraints, Goal};
use crate::traffic::TrafficMatrix;
use crate::types::{CancellationToken, LinkDirection, LinkId, NoProgress, PlanError};

fn diamond_matrix() -> TrafficMatrix {
    let mut matrix = TrafficMatrix::new();
    for _ in 0..5 {
        matrix.add("A", "D", 1000.0);
    }
    matrix
}

#[test]
fn relieves_the_bottleneck() -> Result<(), PlanError> {
    // all 5000 Mbps crowd onto A -> B -> D; lowering the A -> C cost to 1 splits the flow
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.9,
        ..Default::default()
    };

    let result = optimize(
        &net,
        &matrix,
        &Goal::Balance,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;

    assert_abs_diff_eq!(result.before.max_util, 5.0);
    assert!(result.converged);
    assert_eq!(result.changes.len(), 1);
    let change = &result.changes[0];
    assert_eq!(change.link, LinkId(1)); // the A - C link
    assert_eq!(change.direction, LinkDirection::Forward);
    assert_eq!(change.old_cost, 10);
    assert_eq!(change.new_cost, 1);
    assert_eq!(change.affected_flows, 1);

    // the flow now splits across both branches
    assert_abs_diff_eq!(result.after.max_util, 2.5);
    assert!(result.after.max_util <= result.before.max_util);
    Ok(())
}

#[test]
fn balanced_traffic_needs_no_changes() -> Result<(), PlanError> {
    // a no-improvement search is a successful result with an empty change list
    let (net, _) = square_net()?;
    let mut matrix = TrafficMatrix::new();
    matrix.add("A", "D", 100.0);

    let result = optimize(
        &net,
        &matrix,
        &Goal::Balance,
        &Constraints::default(),
        &CancellationToken::new(),
        &NoProgress,
    )?;
    assert!(result.changes.is_empty());
    assert!(result.converged);
    assert_eq!(result.before, result.after);
    Ok(())
}

#[test]
fn protected_links_never_change() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.9,
        protected_links: btreeset! {LinkId(1)},
        ..Default::default()
    };

    let result = optimize(
        &net,
        &matrix,
        &Goal::Balance,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;
    assert!(result.changes.is_empty());
    assert!(result.converged);
    Ok(())
}

#[test]
fn relative_bound_limits_the_drop() -> Result<(), PlanError> {
    // with a 10% bound, the A -> C cost can only fall to 9, which changes no path
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.1,
        ..Default::default()
    };

    let result = optimize(
        &net,
        &matrix,
        &Goal::Balance,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;
    assert!(result.changes.is_empty());
    assert!(result.converged);
    assert_abs_diff_eq!(result.after.max_util, 5.0);
    Ok(())
}

#[test]
fn invalid_percentage_is_a_constraint_violation() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let result = optimize(
        &net,
        &diamond_matrix(),
        &Goal::Balance,
        &Constraints { max_cost_change_percent: 0.0, ..Default::default() },
        &CancellationToken::new(),
        &NoProgress,
    );
    assert_eq!(result.unwrap_err().code(), "constraint_violation");
    Ok(())
}

#[test]
fn latency_goal_minimizes_average() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.9,
        ..Default::default()
    };

    let result = optimize(
        &net,
        &matrix,
        &Goal::Latency,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;
    // splitting the flow does not change the total load, so the average stays put and the
    // search terminates without edits
    assert!(result.converged);
    assert!(result.after.avg_util <= result.before.avg_util);
    Ok(())
}

#[test]
fn custom_goal_is_respected() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.9,
        ..Default::default()
    };

    // minimize the maximum utilization, like Balance, but through the custom hook
    let goal = Goal::Custom(Box::new(|_, report| report.max_util));
    let result = optimize(
        &net,
        &matrix,
        &goal,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;
    assert_eq!(result.changes.len(), 1);
    assert_abs_diff_eq!(result.after.max_util, 2.5);
    Ok(())
}

#[test]
fn cancellation_aborts_the_search() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let token = CancellationToken::new();
    token.cancel();
    let result = optimize(
        &net,
        &diamond_matrix(),
        &Goal::Balance,
        &Constraints::default(),
        &token,
        &NoProgress,
    );
    assert_eq!(result.unwrap_err(), PlanError::Cancelled);
    Ok(())
}

#[test]
fn iteration_budget_is_reported() -> Result<(), PlanError> {
    let (net, _) = diamond_net()?;
    let matrix = diamond_matrix();
    let constraints = Constraints {
        max_cost_change_percent: 0.9,
        ..Default::default()
    };
    let result = optimize(
        &net,
        &matrix,
        &Goal::Balance,
        &constraints,
        &CancellationToken::new(),
        &NoProgress,
    )?;
    assert!(result.iterations >= 1);
    assert!(result.iterations <= 100);
    Ok(())
}

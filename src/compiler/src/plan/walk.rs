// Copyright 2022 Singularity Data
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

use std::collections::HashSet;
use std::rc::Rc;

use super::{PlanNode, PlanRef};

/// Linearizes the reachable plan nodes in a post-order that respects data
/// dependencies: children before parents, each node exactly once.
///
/// The visited set is keyed by node *identity* (`Rc` pointer), not value:
/// a DAG reaches shared subexpressions through several parents and two
/// distinct nodes may compare equal, so value-based dedup would be wrong
/// both ways. The order is deterministic for a given plan.
pub fn post_order(root: &PlanRef) -> Vec<PlanRef> {
    let mut stack: Vec<(PlanRef, bool)> = vec![(root.clone(), false)];
    let mut visited: HashSet<*const PlanNode> = HashSet::new();
    let mut order = Vec::new();

    while let Some((node, visit)) = stack.pop() {
        if visit {
            order.push(node);
        } else if visited.insert(Rc::as_ptr(&node)) {
            stack.push((node.clone(), true));
            for child in node.children() {
                stack.push((child, false));
            }
        }
    }
    order
}

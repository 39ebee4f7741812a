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

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use renoirc_common::error::Result;

use super::{post_order, PlanNode, PlanRef};

/// Write an indented rendering of the plan tree, children below their
/// parents. Shared subexpressions are printed once per reachable path.
pub fn explain(node: &PlanRef, level: usize, f: &mut dyn std::fmt::Write) -> std::fmt::Result {
    writeln!(f, "{}{}", " ".repeat(level * 2), node)?;
    for child in node.children() {
        explain(&child, level + 1, f)?;
    }
    Ok(())
}

/// Render the plan DAG as Graphviz text. Node ids follow the traversal
/// order, so the artifact is stable across runs.
pub fn to_dot(root: &PlanRef) -> String {
    let order = post_order(root);
    let index: HashMap<*const PlanNode, usize> = order
        .iter()
        .enumerate()
        .map(|(i, node)| (Rc::as_ptr(node), i))
        .collect();

    let mut out = String::from("digraph query {\n");
    for (i, node) in order.iter().enumerate() {
        let label = node.to_string().replace('"', "\\\"");
        writeln!(out, "  n{} [label=\"{}\"];", i, label).unwrap();
        for child in node.children() {
            writeln!(out, "  n{} -> n{};", i, index[&Rc::as_ptr(&child)]).unwrap();
        }
    }
    out.push_str("}\n");
    out
}

/// Side-channel debug artifact of `render_query_graph`.
pub fn render_dot(root: &PlanRef, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_dot(root))?;
    log::info!("rendered query graph to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use renoirc_common::catalog::{Field, Schema};
    use renoirc_common::types::DataType;

    use super::*;

    #[test]
    fn test_dot_lists_every_reachable_node() {
        let scan = PlanNode::table_scan(
            "t1",
            Schema::new(vec![Field::with_name(DataType::Int64, "int1")]),
        );
        let sel = PlanNode::selection(
            scan,
            vec![PlanNode::column("int1", DataType::Int64, true)],
            vec![],
        );

        let dot = to_dot(&sel);
        assert!(dot.starts_with("digraph query {"));
        assert_eq!(dot.matches("[label=").count(), 3);
        assert_eq!(dot.matches("->").count(), 2);
    }
}

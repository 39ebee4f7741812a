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

use renoirc_common::error::{CompileError, Result};

use super::{render_literal, Pipeline};
use crate::plan::PlanRef;
use crate::schema::SchemaRegistry;

/// A row predicate: one comparison between a column and a literal.
///
/// On a nullable column the predicate unwraps first, so a missing value
/// always fails the comparison.
#[derive(Clone, Debug)]
pub struct FilterOp {
    node: PlanRef,
}

impl FilterOp {
    pub fn new(node: PlanRef) -> Self {
        Self { node }
    }

    pub fn plan_node(&self) -> &PlanRef {
        &self.node
    }

    pub fn does_add_struct(&self) -> bool {
        false
    }

    pub fn generate(
        &self,
        _pos: usize,
        _pipeline: &Pipeline,
        registry: &mut SchemaRegistry,
    ) -> Result<String> {
        let cmp = self
            .node
            .as_comparison()
            .ok_or_else(|| CompileError::MalformedPlan("filter without a comparison".into()))?;
        let col = cmp.left.as_column_ref().ok_or_else(|| {
            CompileError::UnsupportedPlan(format!(
                "filter comparison with a {} on the left, expected a column",
                cmp.left.kind_name()
            ))
        })?;
        let lit = cmp.right.as_literal().ok_or_else(|| {
            CompileError::UnsupportedPlan(format!(
                "filter comparison with a {} on the right, expected a literal",
                cmp.right.kind_name()
            ))
        })?;

        let prev = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("filter before any table scan".into()))?;
        let op = cmp.kind.dataflow_op();
        let value = render_literal(&lit.data);

        if prev.is_col_nullable(&col.name)? {
            Ok(format!(
                ".filter(|x| x.{}.clone().is_some_and(|v| v {} {}))",
                col.name, op, value
            ))
        } else {
            Ok(format!(".filter(|x| x.{} {} {})", col.name, op, value))
        }
    }
}

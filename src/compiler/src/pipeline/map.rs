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

use itertools::Itertools;
use renoirc_common::catalog::Field;
use renoirc_common::error::{CompileError, Result};

use super::{closure_head, is_keyed_at, render_literal, Pipeline};
use crate::plan::{BinaryArith, PlanRef};
use crate::schema::{SchemaRegistry, StructDef};

/// A column mutation: every previous column passes through unchanged and one
/// new column is computed from a binary arithmetic expression.
///
/// Nullability of the new column is synthesized from the operands, not taken
/// from the alias: the result is nullable iff any operand column is, and the
/// arithmetic is lifted over `Option` accordingly so a missing operand
/// yields a missing result.
#[derive(Clone, Debug)]
pub struct MapOp {
    node: PlanRef,
}

/// One rendered operand of the arithmetic: its expression over the row `x`
/// and whether it is nullable in the input struct.
fn render_operand(operand: &PlanRef, prev: &StructDef) -> Result<(String, bool)> {
    match operand.as_ref() {
        crate::plan::PlanNode::ColumnRef(col) => {
            let nullable = prev.is_col_nullable(&col.name)?;
            Ok((format!("x.{}", col.name), nullable))
        }
        crate::plan::PlanNode::Literal(lit) => Ok((render_literal(&lit.data), false)),
        other => Err(CompileError::UnsupportedPlan(format!(
            "arithmetic over a {}, expected a column or literal",
            other.kind_name()
        ))),
    }
}

fn render_arith(arith: &BinaryArith, prev: &StructDef) -> Result<(String, bool)> {
    let (left, left_nullable) = render_operand(&arith.left, prev)?;
    let (right, right_nullable) = render_operand(&arith.right, prev)?;
    let op = arith.kind.dataflow_op();

    let expr = match (left_nullable, right_nullable) {
        (false, false) => format!("{} {} {}", left, op, right),
        (true, false) => format!("{}.map(|v| v {} {})", left, op, right),
        (false, true) => format!("{}.map(|v| {} {} v)", right, left, op),
        (true, true) => format!("{}.zip({}).map(|(v, w)| v {} w)", left, right, op),
    };
    Ok((expr, left_nullable || right_nullable))
}

impl MapOp {
    pub fn new(node: PlanRef) -> Self {
        Self { node }
    }

    pub fn plan_node(&self) -> &PlanRef {
        &self.node
    }

    pub fn does_add_struct(&self) -> bool {
        true
    }

    pub fn generate(
        &self,
        pos: usize,
        pipeline: &Pipeline,
        registry: &mut SchemaRegistry,
    ) -> Result<String> {
        let alias = self
            .node
            .as_alias()
            .ok_or_else(|| CompileError::MalformedPlan("map without an alias".into()))?;
        let arith = alias.child.as_binary_arith().ok_or_else(|| {
            CompileError::MalformedPlan(format!(
                "alias `{}` does not wrap a binary arithmetic",
                alias.name
            ))
        })?;
        let prev = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("map before any table scan".into()))?;

        let (expr, nullable) = render_arith(arith, &prev)?;

        let mut fields = prev.schema.fields.clone();
        fields.push(Field {
            data_type: alias.data_type.clone(),
            name: alias.name.clone(),
            nullable,
        });
        let new = registry.from_args(fields);

        let passthrough = prev
            .schema
            .fields()
            .iter()
            .map(|f| format!("{}: x.{}", f.name, f.name))
            .join(", ");
        let head = closure_head(is_keyed_at(pipeline.ops(), pos));
        Ok(format!(
            ".map({} {}{{{}, {}: {}}})",
            head,
            new.name_struct(),
            passthrough,
            alias.name,
            expr
        ))
    }
}

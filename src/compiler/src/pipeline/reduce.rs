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

use renoirc_common::catalog::Field;
use renoirc_common::error::{CompileError, Result};

use super::Pipeline;
use crate::plan::{Aggregation, Alias, ColumnRef, PlanRef, ReduceKind, Reduction};
use crate::schema::{SchemaRegistry, StructDef};

/// The single aggregate of an aggregation node: its output alias, the
/// reduction it wraps and the reduced column.
fn single_aggregate(agg: &Aggregation) -> Result<(&Alias, &Reduction, &ColumnRef)> {
    let mut aliases = agg.aggs.iter().filter_map(|a| a.as_alias());
    let alias = aliases
        .next()
        .ok_or_else(|| CompileError::MalformedPlan("aggregation without an aggregate alias".into()))?;
    if aliases.next().is_some() {
        return Err(CompileError::UnsupportedPlan(
            "aggregation with more than one aggregate expression".into(),
        ));
    }
    let reduction = alias.child.as_reduction().ok_or_else(|| {
        CompileError::MalformedPlan(format!(
            "aggregate alias `{}` does not wrap a reduction",
            alias.name
        ))
    })?;
    let col = reduction.arg.as_column_ref().ok_or_else(|| {
        CompileError::MalformedPlan("reduction argument must be a column".into())
    })?;
    Ok((alias, reduction, col))
}

/// Rename map appended after a reduce: the engine keeps the reduced column
/// under its input name, the declared output schema renames it. Wraps the
/// value when the declared output is nullable but the input column was not.
fn rename_fragment(
    registry: &mut SchemaRegistry,
    out: Field,
    col: &str,
    col_nullable: bool,
    keyed: bool,
) -> String {
    let widen = out.nullable && !col_nullable;
    let new = registry.from_args(vec![out]);
    let field = &new.schema.fields()[0];
    let value = if widen {
        format!("Some(x.{})", col)
    } else {
        format!("x.{}", col)
    };
    let head = if keyed { "|(_, x)|" } else { "|x|" };
    format!(
        ".map({} {}{{{}: {}}})",
        head,
        new.name_struct(),
        field.name,
        value
    )
}

/// A whole-stream reduction with no group keys. The initial reducer set is
/// sum; on nullable inputs the combiner keeps the present value when the
/// other side is missing.
#[derive(Clone, Debug)]
pub struct LoneReduceOp {
    node: PlanRef,
}

impl LoneReduceOp {
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
        _pos: usize,
        _pipeline: &Pipeline,
        registry: &mut SchemaRegistry,
    ) -> Result<String> {
        let agg = self
            .node
            .as_aggregation()
            .ok_or_else(|| CompileError::MalformedPlan("reduction without an aggregation".into()))?;
        let (_, reduction, col) = single_aggregate(agg)?;
        if reduction.kind != ReduceKind::Sum {
            return Err(CompileError::UnsupportedPlan(format!(
                "ungrouped reduction `{:?}`, only Sum is available",
                reduction.kind
            )));
        }

        let prev = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("reduction before any table scan".into()))?;
        let nullable = prev.is_col_nullable(&col.name)?;

        let mut mid = if nullable {
            format!(
                ".reduce(|a, b| {}{{{}: match (a.{}.clone(), b.{}.clone()) {{(Some(v), Some(w)) => Some(v + w), (v, w) => v.or(w)}}, ..a}})",
                prev.name_struct(),
                col.name,
                col.name,
                col.name
            )
        } else {
            format!(
                ".reduce(|a, b| {}{{{}: a.{} + b.{}, ..a}})",
                prev.name_struct(),
                col.name,
                col.name,
                col.name
            )
        };

        // renaming map after the reduce, matching the frontend's renaming of
        // the reduced column
        let out = agg
            .schema
            .fields()
            .first()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("aggregation with an empty schema".into()))?;
        mid.push_str(&rename_fragment(registry, out, &col.name, nullable, false));
        Ok(mid)
    }
}

/// A grouped reduction: one `group_by` per key, an in-place reduce on the
/// aggregated column, and the rename map onto the declared output column.
#[derive(Clone, Debug)]
pub struct GroupReduceOp {
    node: PlanRef,
}

/// Lifted combiner arms for a nullable column: sum treats a missing side as
/// its identity, max/min/first keep the present side, and only two missing
/// values stay missing.
fn lifted_arms(kind: ReduceKind) -> &'static str {
    match kind {
        ReduceKind::Sum => "(Some(v), Some(w)) => Some(v + w), (v, w) => v.or(w)",
        ReduceKind::Max => "(Some(v), Some(w)) => Some(max(v, w)), (v, w) => v.or(w)",
        ReduceKind::Min => "(Some(v), Some(w)) => Some(min(v, w)), (v, w) => v.or(w)",
        ReduceKind::First => unreachable!("first is combined with `or` directly"),
    }
}

impl GroupReduceOp {
    pub fn new(node: PlanRef) -> Self {
        Self { node }
    }

    pub fn plan_node(&self) -> &PlanRef {
        &self.node
    }

    pub fn does_add_struct(&self) -> bool {
        true
    }

    fn reduce_fragment(&self, kind: ReduceKind, col: &str, nullable: bool) -> String {
        if nullable {
            return match kind {
                ReduceKind::First => format!(
                    ".reduce(|a, b| {{a.{} = a.{}.clone().or(b.{}.clone());}})",
                    col, col, col
                ),
                kind => format!(
                    ".reduce(|a, b| {{a.{} = match (a.{}.clone(), b.{}.clone()) {{{}}};}})",
                    col,
                    col,
                    col,
                    lifted_arms(kind)
                ),
            };
        }
        match kind {
            ReduceKind::Sum => format!(".reduce(|a, b| a.{} = a.{} + b.{})", col, col, col),
            ReduceKind::Max => format!(
                ".reduce(|a, b| a.{} = max(a.{}.clone(), b.{}.clone()))",
                col, col, col
            ),
            ReduceKind::Min => format!(
                ".reduce(|a, b| a.{} = min(a.{}.clone(), b.{}.clone()))",
                col, col, col
            ),
            ReduceKind::First => ".reduce(|_a, _b| {})".to_string(),
        }
    }

    pub fn generate(
        &self,
        _pos: usize,
        _pipeline: &Pipeline,
        registry: &mut SchemaRegistry,
    ) -> Result<String> {
        let agg = self
            .node
            .as_aggregation()
            .ok_or_else(|| CompileError::MalformedPlan("reduction without an aggregation".into()))?;
        let (_, reduction, col) = single_aggregate(agg)?;

        let prev: StructDef = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("reduction before any table scan".into()))?;

        let mut mid = String::new();
        for by in &agg.by {
            let by = by.as_column_ref().ok_or_else(|| {
                CompileError::MalformedPlan("group key must be a column".into())
            })?;
            // the key is cloned out of the row to avoid aliasing it
            prev.is_col_nullable(&by.name)?;
            mid.push_str(&format!(".group_by(|x| x.{}.clone())", by.name));
        }

        let nullable = prev.is_col_nullable(&col.name)?;
        mid.push_str(&self.reduce_fragment(reduction.kind, &col.name, nullable));

        // the output struct holds the single declared aggregate column; the
        // group keys live on in the stream key
        let out = agg
            .schema
            .fields()
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("aggregation with an empty schema".into()))?;
        mid.push_str(&rename_fragment(registry, out, &col.name, nullable, true));
        Ok(mid)
    }
}

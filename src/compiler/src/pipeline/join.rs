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

use super::{is_keyed_at, source_before, Pipeline};
use crate::plan::{ColumnRef, ComparisonKind, JoinKind, PlanRef};
use crate::schema::{SchemaRegistry, StructDef};

/// Joins the current branch with the last completed one on a single column
/// equality.
///
/// The driving side is the branch the join appears in; the argument stream
/// is the branch-final variable of the previously completed branch. Emission
/// branches on which sides are already keyed: an unkeyed side is grouped by
/// its join key on the fly, two keyed sides merge on their existing keys,
/// and two plain sides use the key-projection join form. Outer and left
/// joins unwrap the optional side(s) with defaults before the combined
/// struct is built.
#[derive(Clone, Debug)]
pub struct JoinOp {
    node: PlanRef,
}

/// The predicate column that lives in this side's struct. The plan states
/// the equality over the two table columns; each side picks the name its
/// schema actually contains.
fn resolve_key<'a>(
    side: &StructDef,
    prefer: &'a ColumnRef,
    other: &'a ColumnRef,
) -> Result<&'a str> {
    if side.schema.contains(&prefer.name) {
        Ok(&prefer.name)
    } else if side.schema.contains(&other.name) {
        Ok(&other.name)
    } else {
        Err(CompileError::MalformedPlan(format!(
            "neither join key `{}` nor `{}` exists in {}",
            prefer.name,
            other.name,
            side.name_struct()
        )))
    }
}

impl JoinOp {
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
        let join = self
            .node
            .as_join()
            .ok_or_else(|| CompileError::MalformedPlan("join operator without a join node".into()))?;

        let right = registry
            .last_complete_transform()
            .cloned()
            .ok_or_else(|| {
                CompileError::MalformedPlan("join with no completed input branch".into())
            })?;
        let left = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("join before any table scan".into()))?;

        if join.predicates.len() != 1 {
            return Err(CompileError::UnsupportedPlan(format!(
                "join with {} predicates, expected a single equality",
                join.predicates.len()
            )));
        }
        let cmp = join.predicates[0].as_comparison().ok_or_else(|| {
            CompileError::MalformedPlan("join predicate must be a comparison".into())
        })?;
        if cmp.kind != ComparisonKind::Equals {
            return Err(CompileError::UnsupportedPlan(format!(
                "join on a {:?} predicate, only equality is available",
                cmp.kind
            )));
        }
        let a = cmp.left.as_column_ref().ok_or_else(|| {
            CompileError::MalformedPlan("join predicate must compare two columns".into())
        })?;
        let b = cmp.right.as_column_ref().ok_or_else(|| {
            CompileError::MalformedPlan("join predicate must compare two columns".into())
        })?;
        let left_key = resolve_key(&left, a, b)?;
        let right_key = resolve_key(&right, b, a)?;

        let call = join.kind.dataflow_call();
        let right_var = right.name_short();
        let left_keyed = is_keyed_at(pipeline.ops(), pos);
        // the argument side is keyed iff its own branch ended keyed, which
        // is the shape observed at this branch's source
        let src = source_before(pipeline.ops(), pos)
            .ok_or_else(|| CompileError::MalformedPlan("join before any table scan".into()))?;
        let right_keyed = is_keyed_at(pipeline.ops(), src);

        let mut mid = match (left_keyed, right_keyed) {
            (true, false) => format!(
                ".{}({}.group_by(|x| x.{}.clone()))",
                call, right_var, right_key
            ),
            (true, true) => format!(".{}({})", call, right_var),
            (false, true) => format!(
                ".group_by(|x| x.{}.clone()).{}({})",
                left_key, call, right_var
            ),
            (false, false) => format!(
                ".{}({}, |x| x.{}.clone(), |y| y.{}.clone())",
                call, right_var, left_key, right_key
            ),
        };

        match join.kind {
            JoinKind::LeftOuter => {
                mid.push_str(".map(|(_, (x, y))| (x, y.unwrap_or_default()))");
            }
            JoinKind::FullOuter => {
                mid.push_str(".map(|(_, (x, y))| (x.unwrap_or_default(), y.unwrap_or_default()))");
            }
            JoinKind::Inner => {}
        }

        let joined = registry.from_join(&left, &right, join.kind, (left_key, right_key));

        // project the joined tuple into the combined struct; a value whose
        // nullability the join widened is wrapped so the field types agree
        let left_len = left.schema.len();
        let project = |joined_field: &Field, source_field: &Field, side: usize| {
            let value = format!("x.{}.{}", side, source_field.name);
            if joined_field.nullable && !source_field.nullable {
                format!("{}: Some({})", joined_field.name, value)
            } else {
                format!("{}: {}", joined_field.name, value)
            }
        };
        let fields = joined.schema.fields()[..left_len]
            .iter()
            .zip_eq(left.schema.fields())
            .map(|(jf, lf)| project(jf, lf, 0))
            .chain(
                joined.schema.fields()[left_len..]
                    .iter()
                    .zip_eq(right.schema.fields())
                    .map(|(jf, rf)| project(jf, rf, 1)),
            )
            .join(", ");
        mid.push_str(&format!(
            ".map(|(_, x)| {}{{{}}})",
            joined.name_struct(),
            fields
        ));
        Ok(mid)
    }
}

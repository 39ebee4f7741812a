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
use crate::plan::{PlanRef, ReduceKind};
use crate::schema::SchemaRegistry;

/// A grouped rolling reduction over a fixed-length sliding window.
///
/// The window spec must name a group-by column and a preceding count with
/// `following == 0`; the emitted window length is `preceding + 1` sliding by
/// one row. The engine only produces full windows, so positions at a group
/// start that would see a shorter window yield no row: the result is a
/// subset of what a reference backend computes for the same plan.
#[derive(Clone, Debug)]
pub struct ExplicitWindowOp {
    node: PlanRef,
}

impl ExplicitWindowOp {
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
        let alias = self
            .node
            .as_alias()
            .ok_or_else(|| CompileError::MalformedPlan("window without an alias".into()))?;
        let win = alias.child.as_window_aggregate().ok_or_else(|| {
            CompileError::MalformedPlan(format!(
                "alias `{}` does not wrap a window aggregate",
                alias.name
            ))
        })?;

        if win.spec.following != 0 {
            return Err(CompileError::UnsupportedPlan(format!(
                "window with following = {}, only 0 is available",
                win.spec.following
            )));
        }
        if win.spec.preceding == 0 {
            return Err(CompileError::UnsupportedPlan(
                "window with no preceding rows".into(),
            ));
        }
        if win.spec.group_by.is_empty() {
            return Err(CompileError::UnsupportedPlan(
                "window without a group-by column".into(),
            ));
        }

        let reduction = win.func.as_reduction().ok_or_else(|| {
            CompileError::MalformedPlan("window aggregate must wrap a reduction".into())
        })?;
        if reduction.kind != ReduceKind::Sum {
            return Err(CompileError::UnsupportedPlan(format!(
                "window reduction `{:?}`, only Sum is available",
                reduction.kind
            )));
        }
        let col = reduction.arg.as_column_ref().ok_or_else(|| {
            CompileError::MalformedPlan("reduction argument must be a column".into())
        })?;

        let prev = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("window before any table scan".into()))?;
        prev.is_col_nullable(&win.spec.group_by)?;
        let nullable = prev.is_col_nullable(&col.name)?;

        let new = registry.from_args(vec![Field {
            data_type: alias.data_type.clone(),
            name: alias.name.clone(),
            nullable,
        }]);

        let size = win.spec.preceding + 1;
        let accumulate = if nullable {
            format!(
                "acc.{} = match (acc.{}.clone(), x.{}.clone()) {{(Some(v), Some(w)) => Some(v + w), (v, w) => v.or(w)}};",
                alias.name, alias.name, col.name
            )
        } else {
            format!("acc.{} = acc.{} + x.{};", alias.name, alias.name, col.name)
        };
        Ok(format!(
            ".group_by(|x| x.{}.clone()).window(CountWindow::sliding({}, 1)).fold({}::default(), |acc, x| {{{}}})",
            win.spec.group_by,
            size,
            new.name_struct(),
            accumulate
        ))
    }
}

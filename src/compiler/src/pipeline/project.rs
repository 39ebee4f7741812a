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
use renoirc_common::error::{CompileError, Result};

use super::{closure_head, is_keyed_at, Pipeline};
use crate::plan::PlanRef;
use crate::schema::SchemaRegistry;

/// A column projection: builds a row struct of the selected columns,
/// preserving their types and nullability.
#[derive(Clone, Debug)]
pub struct ProjectOp {
    node: PlanRef,
    columns: Vec<PlanRef>,
}

impl ProjectOp {
    pub fn new(node: PlanRef, columns: Vec<PlanRef>) -> Self {
        Self { node, columns }
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
        let prev = registry
            .last()
            .cloned()
            .ok_or_else(|| CompileError::MalformedPlan("projection before any table scan".into()))?;

        let mut fields = Vec::with_capacity(self.columns.len());
        let mut names = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let col = column.as_column_ref().ok_or_else(|| {
                CompileError::MalformedPlan("projection of a non-column expression".into())
            })?;
            let field = prev.schema.field_by_name(&col.name).ok_or_else(|| {
                CompileError::MalformedPlan(format!(
                    "column `{}` not found in {}",
                    col.name,
                    prev.name_struct()
                ))
            })?;
            fields.push(field.clone());
            names.push(col.name.clone());
        }
        let new = registry.from_args(fields);

        let head = closure_head(is_keyed_at(pipeline.ops(), pos));
        let assignments = new
            .schema
            .fields()
            .iter()
            .zip_eq(&names)
            .map(|(field, name)| format!("{}: x.{}", field.name, name))
            .join(", ");
        Ok(format!(
            ".map({} {}{{{}}})",
            head,
            new.name_struct(),
            assignments
        ))
    }
}

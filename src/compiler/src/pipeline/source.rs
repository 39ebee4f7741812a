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

use super::{Pipeline, StreamOp};
use crate::plan::{PlanRef, TableScan};
use crate::schema::SchemaRegistry;

/// Opens a new branch: binds a fresh CSV stream for one source table.
///
/// Reaching a source means the previous table's transformations are over,
/// which is what a later join uses to find its other input. Besides the raw
/// CSV binding, the fragment pre-binds the variable of the *last* struct
/// this branch will register (`var_{id + pending}`), so the whole transform
/// chain of the branch stays reachable under one name.
#[derive(Clone, Debug)]
pub struct SourceOp {
    node: PlanRef,
}

impl SourceOp {
    pub fn new(node: PlanRef) -> Self {
        Self { node }
    }

    pub fn plan_node(&self) -> &PlanRef {
        &self.node
    }

    pub fn does_add_struct(&self) -> bool {
        true
    }

    pub fn table_scan(&self) -> Result<&TableScan> {
        self.node
            .as_table_scan()
            .ok_or_else(|| CompileError::MalformedPlan("source operator without a table scan".into()))
    }

    pub fn generate(
        &self,
        pos: usize,
        pipeline: &Pipeline,
        registry: &mut SchemaRegistry,
    ) -> Result<String> {
        let scan = self.table_scan()?;

        registry.transform_completed();
        let def = registry.from_table(scan);

        let path = registry
            .ctx()
            .table_file(&scan.table_name)
            .ok_or_else(|| {
                CompileError::MalformedPlan(format!(
                    "no csv file registered for table `{}`",
                    scan.table_name
                ))
            })?
            .to_path_buf();

        // the branch-final struct id is this struct's id plus the number of
        // struct-adding operators between here and the next source
        let pending = pipeline.ops()[pos + 1..]
            .iter()
            .take_while(|op| !matches!(op, StreamOp::Source(_)))
            .filter(|op| op.does_add_struct())
            .count() as u32;

        let table_var = def.table_var().unwrap_or_else(|| def.name_short());
        Ok(format!(
            ";\nlet {} = ctx.stream_csv::<{}>(\"{}\");\nlet var_{} = {}",
            table_var,
            def.name_struct(),
            path.display(),
            def.id + pending,
            table_var,
        ))
    }
}

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

//! The registry of row structs synthesized along the pipeline.
//!
//! Every schema-changing operator registers one `StructDef`; ids are
//! assigned by the compilation context's monotone counter, so the id of a
//! struct produced by an operator is strictly greater than the id of any
//! struct it consumed. The registry also remembers which struct closed the
//! previous per-table transformation chain (`last_complete_transform`),
//! which is how a join finds its other input.

use renoirc_common::catalog::{Field, Schema};
use renoirc_common::error::{CompileError, Result};

use crate::context::CompileContextRef;
use crate::plan::{Aggregation, JoinKind, TableScan};

/// One row struct of the emitted program.
#[derive(Clone, Debug)]
pub struct StructDef {
    pub id: u32,
    pub schema: Schema,
    /// The logical name of the source table, for structs born from a scan.
    pub table_name: Option<String>,
}

impl StructDef {
    /// The emitted record type name.
    pub fn name_struct(&self) -> String {
        format!("Struct_var_{}", self.id)
    }

    /// The emitted stream variable holding rows of this struct. Sources
    /// pre-bind the variable of the *last* struct of their branch, so this
    /// name is valid for any struct a join or sink may reference.
    pub fn name_short(&self) -> String {
        format!("var_{}", self.id)
    }

    /// Variable name of the raw CSV stream, for structs born from a scan.
    pub fn table_var(&self) -> Option<String> {
        self.table_name.as_ref().map(|name| {
            let var: String = name
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
                .to_lowercase();
            if var.is_empty() {
                format!("table_{}", self.id)
            } else {
                var
            }
        })
    }

    /// Nullability of a column of this struct. Referencing a column the
    /// struct does not contain is a structural error in the plan.
    pub fn is_col_nullable(&self, name: &str) -> Result<bool> {
        self.schema
            .field_by_name(name)
            .map(|f| f.nullable)
            .ok_or_else(|| {
                CompileError::MalformedPlan(format!(
                    "column `{}` not found in {}",
                    name,
                    self.name_struct()
                ))
            })
    }
}

pub struct SchemaRegistry {
    ctx: CompileContextRef,
    structs: Vec<StructDef>,
    last_complete_transform: Option<usize>,
}

impl SchemaRegistry {
    pub fn new(ctx: CompileContextRef) -> Self {
        Self {
            ctx,
            structs: Vec::new(),
            last_complete_transform: None,
        }
    }

    pub fn ctx(&self) -> &CompileContextRef {
        &self.ctx
    }

    /// The struct currently feeding the next operator.
    pub fn last(&self) -> Option<&StructDef> {
        self.structs.last()
    }

    /// The struct that closed the previous per-table transformation chain.
    pub fn last_complete_transform(&self) -> Option<&StructDef> {
        self.last_complete_transform.map(|i| &self.structs[i])
    }

    /// Marks the current `last()` as the end of a finished branch. Called by
    /// a source operator before it opens the next branch.
    pub fn transform_completed(&mut self) {
        self.last_complete_transform = self.structs.len().checked_sub(1);
    }

    /// All structs registered so far, in id order.
    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    pub fn from_table(&mut self, scan: &TableScan) -> StructDef {
        self.register(scan.schema.clone(), Some(scan.table_name.clone()))
    }

    /// Schema declared by an aggregation: group keys first, then aggregate
    /// outputs, with types and nullability as the frontend stated them.
    pub fn from_aggregation(&mut self, agg: &Aggregation) -> StructDef {
        self.register(agg.schema.clone(), None)
    }

    /// Free-form struct: used by column mutations (previous columns plus the
    /// appended one), by reductions (rename of the reduced column) and by
    /// projections (the selected columns).
    pub fn from_args(&mut self, fields: Vec<Field>) -> StructDef {
        self.register(Schema::new(fields), None)
    }

    /// Left columns followed by right columns; a right column whose name
    /// collides with a left one is suffixed `_right`. The join kind governs
    /// nullability: inner preserves, left widens all right columns, full
    /// outer widens the non-key columns of both sides.
    pub fn from_join(
        &mut self,
        left: &StructDef,
        right: &StructDef,
        kind: JoinKind,
        keys: (&str, &str),
    ) -> StructDef {
        let mut fields = Vec::with_capacity(left.schema.len() + right.schema.len());
        for f in left.schema.fields() {
            let widened = kind == JoinKind::FullOuter && f.name != keys.0;
            fields.push(Field {
                data_type: f.data_type.clone(),
                name: f.name.clone(),
                nullable: f.nullable || widened,
            });
        }
        for f in right.schema.fields() {
            let name = if left.schema.contains(&f.name) {
                format!("{}_right", f.name)
            } else {
                f.name.clone()
            };
            let widened = match kind {
                JoinKind::Inner => false,
                JoinKind::LeftOuter => true,
                JoinKind::FullOuter => f.name != keys.1,
            };
            fields.push(Field {
                data_type: f.data_type.clone(),
                name,
                nullable: f.nullable || widened,
            });
        }
        self.register(Schema::new(fields), None)
    }

    fn register(&mut self, schema: Schema, table_name: Option<String>) -> StructDef {
        let def = StructDef {
            id: self.ctx.next_struct_id(),
            schema,
            table_name,
        };
        self.structs.push(def.clone());
        def
    }
}

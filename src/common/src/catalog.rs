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

use crate::types::DataType;

/// One column of a relation or of a row struct flowing through the emitted
/// pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub data_type: DataType,
    pub name: String,
    /// A nullable column is materialized as `Option<T>` by the emitter.
    pub nullable: bool,
}

impl Field {
    /// A nullable field, the default the plan frontend assumes.
    pub fn with_name(data_type: DataType, name: impl Into<String>) -> Self {
        Self {
            data_type,
            name: name.into(),
            nullable: true,
        }
    }

    pub fn non_null(data_type: DataType, name: impl Into<String>) -> Self {
        Self {
            data_type,
            name: name.into(),
            nullable: false,
        }
    }
}

/// The schema of a relation: an ordered list of fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field_by_name(name).is_some()
    }
}

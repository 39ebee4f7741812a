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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column data types recognized by the compiler. Types are declared by the
/// plan and are never inferred from the CSV sources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Varchar,
}

impl DataType {
    /// Name of the Rust type the emitted program materializes a column of
    /// this type with. Nullability is layered on top by the emitter
    /// (`Option<T>`).
    pub fn dataflow_type_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool",
            DataType::Int64 => "i64",
            DataType::Float64 => "f64",
            DataType::Varchar => "String",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An owned scalar value, the payload of plan literals.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarImpl {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl ScalarImpl {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarImpl::Bool(_) => DataType::Boolean,
            ScalarImpl::Int64(_) => DataType::Int64,
            ScalarImpl::Float64(_) => DataType::Float64,
            ScalarImpl::Utf8(_) => DataType::Varchar,
        }
    }
}

impl From<i64> for ScalarImpl {
    fn from(v: i64) -> Self {
        ScalarImpl::Int64(v)
    }
}

impl From<f64> for ScalarImpl {
    fn from(v: f64) -> Self {
        ScalarImpl::Float64(v)
    }
}

impl From<&str> for ScalarImpl {
    fn from(v: &str) -> Self {
        ScalarImpl::Utf8(v.to_string())
    }
}

impl From<bool> for ScalarImpl {
    fn from(v: bool) -> Self {
        ScalarImpl::Bool(v)
    }
}

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

use std::process::ExitStatus;

use thiserror::Error;

/// A specialized Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// The error taxonomy of a compilation. Every kind is fatal for the current
/// compilation; the surrounding CLI maps each kind to a distinct exit code.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Structural error in the input plan: unknown column, missing required
    /// child, or an inconsistent node shape.
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    /// A well-formed plan construct the operator IR does not cover.
    #[error("unsupported plan construct: {0}")]
    UnsupportedPlan(String),

    /// A source table's CSV header disagrees with the plan's declared schema.
    #[error("schema mismatch for table `{table}`: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// An external binary could not be started at all.
    #[error("toolchain missing: failed to launch `{cmd}`: {source}")]
    ToolchainMissing {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// The external formatter or compiler exited non-zero.
    #[error("`{cmd}` exited with {status}:\n{stderr}")]
    ExternalCompile {
        cmd: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The emitted program exited non-zero or panicked.
    #[error("emitted program exited with {status}:\n{stderr}")]
    ExternalRun { status: ExitStatus, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CompileError {
    /// Short name of the error kind, handy for logging and for mapping to
    /// process exit codes in the embedding binary.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::MalformedPlan(_) => "MalformedPlan",
            CompileError::UnsupportedPlan(_) => "UnsupportedPlan",
            CompileError::SchemaMismatch { .. } => "SchemaMismatch",
            CompileError::ToolchainMissing { .. } => "ToolchainMissing",
            CompileError::ExternalCompile { .. } => "ExternalCompileError",
            CompileError::ExternalRun { .. } => "ExternalRunError",
            CompileError::Io(_) => "IOError",
            CompileError::Internal(_) => "InternalError",
        }
    }
}

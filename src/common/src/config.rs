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

use std::fs;
use std::path::PathBuf;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The switches recognized by the dataflow compiler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Invoke the external formatter, compiler and runner on the generated
    /// program. When false, compilation stops after writing the file.
    #[serde(default = "default::run_after_gen")]
    pub run_after_gen: bool,

    /// Render the plan DAG as a Graphviz artifact next to the output.
    #[serde(default = "default::render_query_graph")]
    pub render_query_graph: bool,

    /// When false the compiler core is bypassed entirely and the plan is
    /// handed to an alternate backend unchanged.
    #[serde(default = "default::perform_compilation")]
    pub perform_compilation: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        toml::from_str("").unwrap()
    }
}

impl CompilerConfig {
    pub fn init(path: PathBuf) -> Result<Self> {
        let config_str = fs::read_to_string(path.clone()).map_err(|e| {
            anyhow!(
                "failed to open config file '{}': {}",
                path.to_string_lossy(),
                e
            )
        })?;
        let config: CompilerConfig =
            toml::from_str(config_str.as_str()).map_err(|e| anyhow!("parse error {}", e))?;
        Ok(config)
    }
}

mod default {
    pub fn run_after_gen() -> bool {
        true
    }

    pub fn render_query_graph() -> bool {
        false
    }

    pub fn perform_compilation() -> bool {
        true
    }
}

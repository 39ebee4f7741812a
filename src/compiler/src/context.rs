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

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use renoirc_common::config::CompilerConfig;

/// The state owned by one compilation: the monotone row-struct id counter,
/// the table-name to CSV-file mapping, the compilation root and the
/// configuration. Nothing here outlives the `compile` call that created it.
pub struct CompileContext {
    /// The id assigned to the next registered row struct.
    next_struct_id: Cell<u32>,
    table_files: HashMap<String, PathBuf>,
    root: PathBuf,
    config: CompilerConfig,
}

pub type CompileContextRef = Rc<CompileContext>;

impl CompileContext {
    pub fn new(
        root: impl Into<PathBuf>,
        config: CompilerConfig,
        files_tables: impl IntoIterator<Item = (PathBuf, String)>,
    ) -> Self {
        let table_files = files_tables
            .into_iter()
            .map(|(file, table)| (table, file))
            .collect();
        Self {
            next_struct_id: Cell::new(0),
            table_files,
            root: root.into(),
            config,
        }
    }

    pub fn next_struct_id(&self) -> u32 {
        let id = self.next_struct_id.get();
        self.next_struct_id.set(id + 1);
        id
    }

    pub fn table_file(&self, table: &str) -> Option<&Path> {
        self.table_files.get(table).map(PathBuf::as_path)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The cargo package the generated program is written into.
    pub fn template_dir(&self) -> PathBuf {
        self.root.join("renoir-template")
    }

    pub fn main_path(&self) -> PathBuf {
        self.template_dir().join("src").join("main.rs")
    }

    pub fn result_path(&self) -> PathBuf {
        self.root.join("out").join("result.csv")
    }

    pub fn query_graph_path(&self) -> PathBuf {
        self.root.join("out").join("query.dot")
    }
}

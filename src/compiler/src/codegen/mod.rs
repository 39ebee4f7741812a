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

//! Assembles the emitted program out of three regions: a header with the
//! row-struct declarations and the prelude, the body of operator fragments,
//! and a footer with the CSV sink and the runtime entry point. The body is
//! rendered before the header: rendering registers the structs the header
//! must declare.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use renoirc_common::catalog::Field;
use renoirc_common::error::{CompileError, Result};

use crate::context::CompileContextRef;
use crate::schema::{SchemaRegistry, StructDef};

pub mod toolchain;

const PRELUDE: &str = "\
use renoir::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
";

fn field_decl(field: &Field) -> String {
    let base = field.data_type.dataflow_type_name();
    if field.nullable {
        format!("    {}: Option<{}>,", field.name, base)
    } else {
        format!("    {}: {},", field.name, base)
    }
}

fn struct_decl(def: &StructDef) -> String {
    let mut decl = String::new();
    writeln!(
        decl,
        "#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialOrd, PartialEq)]"
    )
    .unwrap();
    writeln!(decl, "struct {} {{", def.name_struct()).unwrap();
    for field in def.schema.fields() {
        writeln!(decl, "{}", field_decl(field)).unwrap();
    }
    decl.push_str("}\n");
    decl
}

/// Write the complete program to `<root>/renoir-template/src/main.rs`,
/// overwriting any prior contents.
pub fn emit_program(
    registry: &SchemaRegistry,
    body: &str,
    ctx: &CompileContextRef,
) -> Result<PathBuf> {
    let terminal = registry
        .last()
        .ok_or_else(|| CompileError::MalformedPlan("plan produced an empty pipeline".into()))?;

    let mut program = String::from(PRELUDE);
    for def in registry.structs() {
        program.push('\n');
        program.push_str(&struct_decl(def));
    }

    program.push_str("\nfn logic(ctx: &StreamContext) {\n");
    // the first source opens the first chain, so the leading terminator of
    // its fragment has nothing to close
    program.push_str(body.strip_prefix(";\n").unwrap_or(body));

    let result_path = ctx.result_path();
    program.push_str(&format!(
        ";\n{}.write_csv_one(\"{}\");\n}}\n",
        terminal.name_short(),
        result_path.display()
    ));
    program.push_str(
        "\nfn main() {\n    let ctx = StreamContext::new_local();\n    logic(&ctx);\n    ctx.execute_blocking();\n}\n",
    );

    let main_path = ctx.main_path();
    if let Some(parent) = main_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&main_path, program)?;
    log::info!("wrote generated program to {}", main_path.display());
    Ok(main_path)
}

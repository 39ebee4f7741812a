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

//! Invocations of the external formatter, compiler and runner over the
//! template package. The tools are untrusted collaborators: their stderr is
//! carried into the diagnostic verbatim and a non-zero exit is never
//! swallowed.

use std::path::Path;
use std::process::{Command, Output};

use renoirc_common::error::{CompileError, Result};

fn invoke(program: &str, args: &[&str], dir: &Path) -> Result<Output> {
    log::info!("running `{} {}` in {}", program, args.join(" "), dir.display());
    Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| CompileError::ToolchainMissing {
            cmd: program.to_string(),
            source: e,
        })
}

fn describe(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Format the generated source and compile the template package.
pub fn format_and_build(template_dir: &Path) -> Result<()> {
    for (program, args) in [("cargo-fmt", &[][..]), ("cargo", &["build"][..])] {
        let output = invoke(program, args, template_dir)?;
        if !output.status.success() {
            return Err(CompileError::ExternalCompile {
                cmd: describe(program, args),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
    }
    Ok(())
}

/// Run the compiled program; it writes the result CSV itself.
pub fn run_generated(template_dir: &Path) -> Result<()> {
    let output = invoke("cargo", &["run"], template_dir)?;
    if !output.status.success() {
        return Err(CompileError::ExternalRun {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

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

//! Translates a relational logical plan into a self-contained streaming
//! dataflow program.
//!
//! The pipeline of one compilation: the plan walker linearizes the DAG in
//! dependency order, the classifier maps each recognized node shape to one
//! dataflow operator, and rendering the operators in order synthesizes the
//! row structs the emitted program declares. The emitter writes the program
//! into the template package and, when configured, drives the external
//! formatter, compiler and runner over it.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::rc::Rc;

use renoirc_common::config::CompilerConfig;
use renoirc_common::error::{CompileError, Result};

pub mod codegen;
pub mod context;
pub mod pipeline;
pub mod plan;
pub mod schema;

use context::{CompileContext, CompileContextRef};
use pipeline::{Pipeline, StreamOp};
use plan::PlanRef;
use schema::SchemaRegistry;

/// How far a compilation went.
#[derive(Debug)]
pub enum CompileOutcome {
    /// The core was bypassed; the plan is to be handed to an alternate
    /// backend unchanged.
    Bypassed,
    /// The program was written but no external tool ran.
    Generated { main_path: PathBuf },
    /// The program was formatted, compiled and executed; its output CSV is
    /// at `result_path`.
    Executed {
        main_path: PathBuf,
        result_path: PathBuf,
    },
}

/// Compile `query` into a dataflow program reading the given CSV tables.
///
/// `files_tables` maps each source table of the plan to its CSV file; `root`
/// is the directory holding the template package and the `out/` artifacts.
pub fn compile_plan_to_dataflow(
    query: &PlanRef,
    files_tables: Vec<(PathBuf, String)>,
    root: impl Into<PathBuf>,
    config: CompilerConfig,
) -> Result<CompileOutcome> {
    let ctx: CompileContextRef = Rc::new(CompileContext::new(root, config, files_tables));

    if !ctx.config().perform_compilation {
        log::info!("compilation disabled, handing the plan over unchanged");
        return Ok(CompileOutcome::Bypassed);
    }
    if ctx.config().render_query_graph {
        plan::render_dot(query, &ctx.query_graph_path())?;
    }

    let order = plan::post_order(query);
    log::info!("parsed plan: {} reachable nodes", order.len());

    let mut pipeline = Pipeline::new();
    for node in &order {
        if let Some(op) = pipeline::classify(node, &pipeline)? {
            pipeline.push(op);
        }
    }
    if !matches!(pipeline.ops().first(), Some(StreamOp::Source(_))) {
        return Err(CompileError::MalformedPlan(
            "plan contains no table scan".into(),
        ));
    }
    validate_source_headers(&pipeline, &ctx)?;

    let mut registry = SchemaRegistry::new(ctx.clone());
    let body = pipeline.generate(&mut registry)?;
    let main_path = codegen::emit_program(&registry, &body, &ctx)?;

    if !ctx.config().run_after_gen {
        return Ok(CompileOutcome::Generated { main_path });
    }
    codegen::toolchain::format_and_build(&ctx.template_dir())?;
    codegen::toolchain::run_generated(&ctx.template_dir())?;
    Ok(CompileOutcome::Executed {
        main_path,
        result_path: ctx.result_path(),
    })
}

/// Check every source table's CSV header against the plan's declared schema.
/// Types cannot be read off a header, so the check covers column count,
/// names and order; types stay as declared by the plan.
fn validate_source_headers(pipeline: &Pipeline, ctx: &CompileContextRef) -> Result<()> {
    for op in pipeline.ops() {
        let StreamOp::Source(source) = op else {
            continue;
        };
        let scan = source.table_scan()?;
        let path = ctx.table_file(&scan.table_name).ok_or_else(|| {
            CompileError::MalformedPlan(format!(
                "no csv file registered for table `{}`",
                scan.table_name
            ))
        })?;

        let mut header = String::new();
        let bytes = BufReader::new(File::open(path)?).read_line(&mut header)?;
        if bytes == 0 {
            return Err(CompileError::SchemaMismatch {
                table: scan.table_name.clone(),
                reason: "csv file has no header row".into(),
            });
        }
        let names: Vec<String> = header
            .trim_end()
            .split(',')
            .map(|name| name.trim().to_string())
            .collect();
        let declared = scan.schema.names();
        if names.len() != declared.len() {
            return Err(CompileError::SchemaMismatch {
                table: scan.table_name.clone(),
                reason: format!(
                    "csv header has {} columns, plan declares {}",
                    names.len(),
                    declared.len()
                ),
            });
        }
        for (i, (header_name, declared_name)) in names.iter().zip(&declared).enumerate() {
            if header_name != declared_name {
                return Err(CompileError::SchemaMismatch {
                    table: scan.table_name.clone(),
                    reason: format!(
                        "header column {} is `{}`, plan declares `{}`",
                        i, header_name, declared_name
                    ),
                });
            }
        }
    }
    Ok(())
}
